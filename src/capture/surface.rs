//! Data URL codec for surface captures and cropped artifacts.
//!
//! The host capture primitive hands back `data:image/png;base64,...`
//! strings, and artifacts travel between contexts in the same form.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat};

/// Image formats accepted on the wire.
const ACCEPTED: &[(&str, ImageFormat)] = &[
    ("image/png", ImageFormat::Png),
    ("image/jpeg", ImageFormat::Jpeg),
];

/// Validates a data URL and returns its decoded bytes and format.
///
/// The declared MIME type must be an accepted image type, the body must be
/// non-empty base64, and the decoded bytes must sniff as the declared format.
pub fn decode_data_url(data_url: &str) -> Result<(ImageFormat, Vec<u8>), CaptureError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| CaptureError::MalformedDataUrl("missing data: prefix".into()))?;
    let (header, body) = rest
        .split_once(',')
        .ok_or_else(|| CaptureError::MalformedDataUrl("missing ',' separator".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| CaptureError::MalformedDataUrl("payload is not base64".into()))?;

    let declared = ACCEPTED
        .iter()
        .find(|(m, _)| m.eq_ignore_ascii_case(mime))
        .map(|(_, f)| *f)
        .ok_or_else(|| CaptureError::UnsupportedFormat(mime.to_string()))?;

    if body.is_empty() {
        return Err(CaptureError::EmptyPayload);
    }

    let bytes = STANDARD
        .decode(body.trim())
        .map_err(|e| CaptureError::MalformedDataUrl(e.to_string()))?;
    if bytes.is_empty() {
        return Err(CaptureError::EmptyPayload);
    }

    let sniffed =
        image::guess_format(&bytes).map_err(|e| CaptureError::UnsupportedFormat(e.to_string()))?;
    if sniffed != declared {
        return Err(CaptureError::UnsupportedFormat(format!(
            "declared {} but payload is {:?}",
            mime, sniffed
        )));
    }

    Ok((declared, bytes))
}

/// Decodes a data URL into pixels.
pub fn decode_image(data_url: &str) -> Result<DynamicImage, CaptureError> {
    let (format, bytes) = decode_data_url(data_url)?;
    image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| CaptureError::DecodeFailed(e.to_string()))
}

/// Wraps PNG bytes as a data URL.
pub fn encode_png_data_url(png_bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png_bytes))
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image payload is empty")]
    EmptyPayload,

    #[error("Image decode failed: {0}")]
    DecodeFailed(String),

    #[error("Surface capture failed: {0}")]
    CaptureFailed(String),
}

//! Pure region geometry and cropping logic: functional core.
//!
//! This module has zero infrastructure dependencies.
//! It takes pixel data in, returns pixel data out.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// A pointer position in viewport (CSS pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in viewport coordinates. Width and height are
/// never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    /// Bounding box of two corners, in either order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Checks the selection size policy. Both bounds are inclusive.
    pub fn check_size(&self, min: f64, max: f64) -> Result<(), RegionRejection> {
        let dims = [self.width, self.height];
        if dims.iter().any(|d| !d.is_finite()) {
            return Err(RegionRejection::NotFinite);
        }
        if dims.iter().any(|&d| d < min) {
            return Err(RegionRejection::TooSmall {
                width: self.width,
                height: self.height,
                min,
            });
        }
        if dims.iter().any(|&d| d > max) {
            return Err(RegionRejection::TooLarge {
                width: self.width,
                height: self.height,
                max,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegionRejection {
    #[error("Selection {width}x{height} is smaller than {min}x{min}")]
    TooSmall { width: f64, height: f64, min: f64 },

    #[error("Selection {width}x{height} is larger than {max}x{max}")]
    TooLarge { width: f64, height: f64, max: f64 },

    #[error("Selection has non-finite dimensions")]
    NotFinite,
}

/// Crops a full-surface capture to `region` and returns PNG bytes.
///
/// `region` is in CSS pixels; the capture is in device pixels, so every
/// coordinate is scaled by `device_pixel_ratio` and rounded. The scaled
/// rectangle is clipped to the image, and the output is downscaled
/// (aspect preserved) so neither side exceeds `max_raster_side`.
pub fn crop_to_png_bytes(
    image: &DynamicImage,
    region: &Region,
    device_pixel_ratio: f64,
    max_raster_side: u32,
) -> Result<Vec<u8>, CropError> {
    let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };

    let x = scale(region.x, dpr);
    let y = scale(region.y, dpr);
    let mut width = scale(region.width, dpr);
    let mut height = scale(region.height, dpr);

    if width == 0 || height == 0 {
        return Err(CropError::ZeroDimension);
    }

    let (img_width, img_height) = (image.width(), image.height());

    if x >= img_width || y >= img_height {
        return Err(CropError::OutOfBounds {
            requested: (x, y, width, height),
            image_size: (img_width, img_height),
        });
    }

    width = width.min(img_width - x);
    height = height.min(img_height - y);

    let mut cropped = image.crop_imm(x, y, width, height);

    let max_side = max_raster_side.max(1);
    if width > max_side || height > max_side {
        log::debug!(
            "Clamping {}x{} crop to {}px per side",
            width,
            height,
            max_side
        );
        cropped = cropped.resize(max_side, max_side, FilterType::Triangle);
    }

    let mut png_bytes: Vec<u8> = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| CropError::EncodingFailed(e.to_string()))?;

    Ok(png_bytes)
}

fn scale(v: f64, dpr: f64) -> u32 {
    let scaled = (v * dpr).round();
    if scaled.is_finite() && scaled > 0.0 {
        scaled.min(u32::MAX as f64) as u32
    } else {
        0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Crop rectangle has zero width or height")]
    ZeroDimension,

    #[error(
        "Crop rectangle ({},{},{},{}) lies outside image bounds ({}x{})",
        requested.0, requested.1, requested.2, requested.3,
        image_size.0, image_size.1
    )]
    OutOfBounds {
        requested: (u32, u32, u32, u32),
        image_size: (u32, u32),
    },

    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}

//! OCR collaborator interface.
//!
//! Recognition itself is external (a worker in the panel's context, or a
//! platform engine). The panel only depends on this trait.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecognitionLevel {
    #[default]
    Fast,
    Accurate,
}

impl RecognitionLevel {
    pub fn name(&self) -> &'static str {
        match self {
            RecognitionLevel::Fast => "fast",
            RecognitionLevel::Accurate => "accurate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrOutput {
    pub text: String,
    pub char_count: i64,
    pub latency_ms: f64,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    pub recognition_level: String,
}

impl OcrOutput {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text in encoded image bytes (PNG or JPEG).
    async fn recognize(&self, image: Vec<u8>, level: RecognitionLevel) -> Result<OcrOutput>;
}

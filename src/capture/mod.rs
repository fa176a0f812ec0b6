//! Region capture domain: public API.
//!
//! Geometry and cropping live in `region` (pure), the data URL codec in
//! `surface`. External code should only use what is exported here.

mod region;
mod surface;

pub use region::{crop_to_png_bytes, CropError, Point, Region, RegionRejection};
pub use surface::{decode_data_url, decode_image, encode_png_data_url, CaptureError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The most recent cropped capture. Overwritten by the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureArtifact {
    pub image_data: String,
    pub captured_at: DateTime<Utc>,
    pub region: Region,
}

impl CaptureArtifact {
    pub fn new(image_data: String, region: Region) -> Self {
        Self {
            image_data,
            captured_at: Utc::now(),
            region,
        }
    }
}

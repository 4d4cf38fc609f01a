//! Image domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Image record
///
/// The worker is the sole writer of `status` and `created_image_id` while a
/// build runs; everything else is opaque and preserved through `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: Uuid,
    pub status: ImageStatus,
    #[serde(default)]
    pub created_image_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Image build status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageStatus {
    Queued,
    Building,
    Error,
    Complete,
}

impl ImageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageStatus::Queued => "QUEUED",
            ImageStatus::Building => "BUILDING",
            ImageStatus::Error => "ERROR",
            ImageStatus::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

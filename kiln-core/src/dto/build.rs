//! Build progress DTOs for worker-to-coordinator communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::image::ImageStatus;

/// Progress notification for one build phase transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStatusUpdate {
    pub state: ImageStatus,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly_id: Option<Uuid>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Request to deploy a freshly built image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub assembly_id: Uuid,
    pub image_id: String,
}

//! Build dispatch and progress endpoints

use crate::error::Result;
use crate::{CoordinatorClient, handle_empty_response, handle_response};
use kiln_core::domain::job::JobEnvelope;
use kiln_core::dto::build::BuildStatusUpdate;
use reqwest::StatusCode;
use uuid::Uuid;

impl CoordinatorClient {
    // =============================================================================
    // Job Dispatch
    // =============================================================================

    /// Fetch the next job queued for this worker
    ///
    /// # Returns
    /// `None` when the coordinator answers `204 No Content`
    pub async fn next_job(&self, worker_id: &str) -> Result<Option<JobEnvelope>> {
        let url = format!("{}/api/workers/{}/jobs/next", self.base_url, worker_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        handle_response(response).await.map(Some)
    }

    // =============================================================================
    // Build Progress
    // =============================================================================

    /// Report a build phase transition
    ///
    /// # Arguments
    /// * `build_id` - The build (image) the update belongs to
    /// * `update` - New state, description and optional artifact/assembly ids
    pub async fn notify(&self, build_id: Uuid, update: &BuildStatusUpdate) -> Result<()> {
        let url = format!("{}/api/builds/{}/status", self.base_url, build_id);
        tracing::debug!("POST {} state={}", url, update.state);

        let response = self.client.post(&url).json(update).send().await?;

        handle_empty_response(response).await
    }
}

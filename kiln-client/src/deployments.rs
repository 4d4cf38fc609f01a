//! Deployment trigger endpoint

use crate::error::Result;
use crate::{CoordinatorClient, handle_empty_response};
use kiln_core::dto::build::DeployRequest;
use uuid::Uuid;

impl CoordinatorClient {
    /// Ask the coordinator to deploy a built image to an assembly
    pub async fn deploy(&self, assembly_id: Uuid, image_id: &str) -> Result<()> {
        let url = format!("{}/api/deployments", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&DeployRequest {
                assembly_id,
                image_id: image_id.to_string(),
            })
            .send()
            .await?;

        handle_empty_response(response).await
    }
}

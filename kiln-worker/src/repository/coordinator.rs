//! Coordinator repository
//!
//! Job dispatch, progress notifications and the deployment trigger all go to
//! the remote coordinator through the shared [`CoordinatorClient`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use kiln_client::CoordinatorClient;
use kiln_core::domain::job::JobEnvelope;
use kiln_core::dto::build::BuildStatusUpdate;
use uuid::Uuid;

use super::{DeploymentTrigger, JobSource, Notifier};

#[async_trait]
impl Notifier for CoordinatorClient {
    async fn notify(&self, build_id: Uuid, update: &BuildStatusUpdate) -> Result<()> {
        CoordinatorClient::notify(self, build_id, update)
            .await
            .context("Failed to send build status update")
    }
}

#[async_trait]
impl DeploymentTrigger for CoordinatorClient {
    async fn deploy(&self, assembly_id: Uuid, image_id: &str) -> Result<()> {
        CoordinatorClient::deploy(self, assembly_id, image_id)
            .await
            .context("Failed to trigger deployment")
    }
}

#[async_trait]
impl JobSource for CoordinatorClient {
    async fn next_job(&self, worker_id: &str) -> Result<Option<JobEnvelope>> {
        CoordinatorClient::next_job(self, worker_id)
            .await
            .context("Failed to fetch next job")
    }
}

//! Repository layer
//!
//! Narrow, trait-based interfaces to the services the worker depends on but
//! does not implement: the record service, the coordinator (dispatch,
//! notifications, deployment), the identity catalog, the secret vault and
//! object storage. The HTTP implementations are stateless clients without
//! business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod coordinator;
mod identity;
mod object_store;
mod records;
mod vault;

use anyhow::Result;
use async_trait::async_trait;
use kiln_core::domain::assembly::Assembly;
use kiln_core::domain::image::Image;
use kiln_core::domain::job::{JobEnvelope, RequestContext};
use kiln_core::dto::build::BuildStatusUpdate;
use uuid::Uuid;

/// Access to the shared assembly and image records
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_assembly(&self, ctx: &RequestContext, id: Uuid) -> Result<Assembly>;

    async fn save_assembly(&self, ctx: &RequestContext, assembly: &Assembly) -> Result<()>;

    async fn get_image(&self, ctx: &RequestContext, id: Uuid) -> Result<Image>;

    async fn save_image(&self, ctx: &RequestContext, image: &Image) -> Result<()>;
}

/// Queue the dispatch layer feeds this worker from
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Next job for `worker_id`, `None` when nothing is queued
    async fn next_job(&self, worker_id: &str) -> Result<Option<JobEnvelope>>;
}

/// One-way progress notifications to the remote coordinator
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, build_id: Uuid, update: &BuildStatusUpdate) -> Result<()>;
}

/// Downstream deployment of a built image
#[async_trait]
pub trait DeploymentTrigger: Send + Sync {
    async fn deploy(&self, assembly_id: Uuid, image_id: &str) -> Result<()>;
}

/// Service catalog lookups needed to build the script environment
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Public endpoint of the artifact (image) store
    async fn image_endpoint(&self, ctx: &RequestContext) -> Result<String>;
}

/// Remote secret management service
#[async_trait]
pub trait SecretVault: Send + Sync {
    async fn get_secret(&self, ctx: &RequestContext, reference: &str) -> Result<String>;
}

/// Remote object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        ctx: &RequestContext,
        container: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<()>;
}

pub use identity::{HttpServiceCatalog, StaticServiceCatalog};
pub use object_store::HttpObjectStore;
pub use vault::HttpSecretVault;

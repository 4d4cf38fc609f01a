//! Record repository
//!
//! Assembly and image records served by the control-plane API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use kiln_client::RecordClient;
use kiln_core::domain::assembly::Assembly;
use kiln_core::domain::image::Image;
use kiln_core::domain::job::RequestContext;
use uuid::Uuid;

use super::RecordStore;

#[async_trait]
impl RecordStore for RecordClient {
    async fn get_assembly(&self, ctx: &RequestContext, id: Uuid) -> Result<Assembly> {
        RecordClient::get_assembly(self, &ctx.auth_token, id)
            .await
            .with_context(|| format!("Failed to fetch assembly {}", id))
    }

    async fn save_assembly(&self, ctx: &RequestContext, assembly: &Assembly) -> Result<()> {
        RecordClient::save_assembly(self, &ctx.auth_token, assembly)
            .await
            .with_context(|| format!("Failed to save assembly {}", assembly.id))
    }

    async fn get_image(&self, ctx: &RequestContext, id: Uuid) -> Result<Image> {
        RecordClient::get_image(self, &ctx.auth_token, id)
            .await
            .with_context(|| format!("Failed to fetch image {}", id))
    }

    async fn save_image(&self, ctx: &RequestContext, image: &Image) -> Result<()> {
        RecordClient::save_image(self, &ctx.auth_token, image)
            .await
            .with_context(|| format!("Failed to save image {}", image.id))
    }
}

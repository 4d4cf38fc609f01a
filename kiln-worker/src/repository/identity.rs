//! Identity catalog repository
//!
//! Resolves service endpoints for the job's caller through the identity
//! service's catalog.

use anyhow::{Context, Result};
use async_trait::async_trait;
use kiln_core::domain::job::RequestContext;
use reqwest::Client;
use serde::Deserialize;

use super::ServiceCatalog;

const IMAGE_SERVICE_TYPE: &str = "image";
const PUBLIC_INTERFACE: &str = "public";

/// HTTP implementation of ServiceCatalog backed by `GET {auth_url}/auth/catalog`
pub struct HttpServiceCatalog {
    client: Client,
}

impl HttpServiceCatalog {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpServiceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceCatalog for HttpServiceCatalog {
    async fn image_endpoint(&self, ctx: &RequestContext) -> Result<String> {
        if ctx.auth_token.is_empty() {
            anyhow::bail!("no auth token available for catalog lookup");
        }

        let url = format!("{}/auth/catalog", ctx.auth_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", &ctx.auth_token)
            .send()
            .await
            .context("Failed to fetch service catalog")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to fetch service catalog: {} - {}", status, body);
        }

        let catalog = response
            .json::<CatalogResponse>()
            .await
            .context("Failed to parse service catalog")?;

        find_endpoint(&catalog, IMAGE_SERVICE_TYPE, PUBLIC_INTERFACE)
            .ok_or_else(|| anyhow::anyhow!("no public image endpoint in service catalog"))
    }
}

/// Fixed endpoint from configuration
pub struct StaticServiceCatalog {
    image_endpoint: String,
}

impl StaticServiceCatalog {
    pub fn new(image_endpoint: impl Into<String>) -> Self {
        Self {
            image_endpoint: image_endpoint.into(),
        }
    }
}

#[async_trait]
impl ServiceCatalog for StaticServiceCatalog {
    async fn image_endpoint(&self, _ctx: &RequestContext) -> Result<String> {
        Ok(self.image_endpoint.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    catalog: Vec<CatalogService>,
}

#[derive(Debug, Deserialize)]
struct CatalogService {
    #[serde(rename = "type")]
    service_type: String,
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    interface: String,
    url: String,
}

fn find_endpoint(catalog: &CatalogResponse, service_type: &str, interface: &str) -> Option<String> {
    catalog
        .catalog
        .iter()
        .filter(|service| service.service_type == service_type)
        .flat_map(|service| service.endpoints.iter())
        .find(|endpoint| endpoint.interface == interface)
        .map(|endpoint| endpoint.url.clone())
}

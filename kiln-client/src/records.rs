//! Assembly and image record endpoints
//!
//! Records are fetched and written back whole. The typed models in
//! `kiln_core` keep unknown fields, so a save only changes what the worker
//! actually modified.

use crate::error::Result;
use crate::{handle_empty_response, handle_response};
use kiln_core::domain::assembly::Assembly;
use kiln_core::domain::image::Image;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

const AUTH_HEADER: &str = "X-Auth-Token";

/// HTTP client for the record service
#[derive(Debug, Clone)]
pub struct RecordClient {
    base_url: String,
    client: Client,
}

impl RecordClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Assemblies
    // =============================================================================

    pub async fn get_assembly(&self, auth_token: &str, id: Uuid) -> Result<Assembly> {
        self.get(auth_token, "assemblies", id).await
    }

    pub async fn save_assembly(&self, auth_token: &str, assembly: &Assembly) -> Result<()> {
        self.put(auth_token, "assemblies", assembly.id, assembly).await
    }

    // =============================================================================
    // Images
    // =============================================================================

    pub async fn get_image(&self, auth_token: &str, id: Uuid) -> Result<Image> {
        self.get(auth_token, "images", id).await
    }

    pub async fn save_image(&self, auth_token: &str, image: &Image) -> Result<()> {
        self.put(auth_token, "images", image.id, image).await
    }

    async fn get<T: DeserializeOwned>(&self, auth_token: &str, kind: &str, id: Uuid) -> Result<T> {
        let url = format!("{}/v1/{}/{}", self.base_url, kind, id);
        let response = self
            .client
            .get(&url)
            .header(AUTH_HEADER, auth_token)
            .send()
            .await?;

        handle_response(response).await
    }

    async fn put<T: Serialize>(&self, auth_token: &str, kind: &str, id: Uuid, body: &T) -> Result<()> {
        let url = format!("{}/v1/{}/{}", self.base_url, kind, id);
        let response = self
            .client
            .put(&url)
            .header(AUTH_HEADER, auth_token)
            .json(body)
            .send()
            .await?;

        handle_empty_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_client_trims_trailing_slash() {
        let client = RecordClient::new("http://api:9777/");
        assert_eq!(client.base_url(), "http://api:9777");
    }
}

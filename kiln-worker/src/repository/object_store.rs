//! Object storage repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use kiln_core::domain::job::RequestContext;
use reqwest::Client;

use super::ObjectStore;

/// HTTP implementation of ObjectStore: `PUT {base_url}/{container}/{key}`
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, container: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, container, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(
        &self,
        ctx: &RequestContext,
        container: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<()> {
        let url = self.object_url(container, key);

        let response = self
            .client
            .put(&url)
            .header("X-Auth-Token", &ctx.auth_token)
            .header("Content-Type", "text/plain")
            .body(body)
            .send()
            .await
            .context("Failed to upload object")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to upload object: {} - {}", status, body);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url() {
        let store = HttpObjectStore::new("http://swift:8080/v1/AUTH_demo/");
        assert_eq!(
            store.object_url("kiln-logs", "a/b/build.log"),
            "http://swift:8080/v1/AUTH_demo/kiln-logs/a/b/build.log"
        );
    }
}

//! Secret vault repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use kiln_core::domain::job::RequestContext;
use reqwest::Client;

use super::SecretVault;

/// HTTP implementation of SecretVault
///
/// References are either absolute secret URLs or ids resolved against the
/// configured vault base URL. The payload is read from `{secret}/payload`.
pub struct HttpSecretVault {
    client: Client,
    base_url: Option<String>,
}

impl HttpSecretVault {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    fn secret_url(&self, reference: &str) -> Result<String> {
        let reference = reference.trim_end_matches('/');
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(format!("{}/payload", reference));
        }

        match &self.base_url {
            Some(base) => Ok(format!("{}/v1/secrets/{}/payload", base, reference)),
            None => anyhow::bail!(
                "secret reference '{}' is not a URL and no vault URL is configured",
                reference
            ),
        }
    }
}

#[async_trait]
impl SecretVault for HttpSecretVault {
    async fn get_secret(&self, ctx: &RequestContext, reference: &str) -> Result<String> {
        let url = self.secret_url(reference)?;

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", &ctx.auth_token)
            .header("Accept", "text/plain")
            .send()
            .await
            .context("Failed to fetch secret")?;

        // The body may echo the secret back; only the status is reported.
        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch secret: {}", response.status());
        }

        response.text().await.context("Failed to read secret payload")
    }
}

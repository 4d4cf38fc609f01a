//! Kiln HTTP Clients
//!
//! Typed HTTP clients for the services a build worker talks to:
//! - [`CoordinatorClient`]: job dispatch, build progress notifications and
//!   the downstream deployment trigger
//! - [`RecordClient`]: assembly and image records
//!
//! # Example
//!
//! ```no_run
//! use kiln_client::CoordinatorClient;
//!
//! #[tokio::main]
//! async fn main() -> kiln_client::Result<()> {
//!     let client = CoordinatorClient::new("http://localhost:9777");
//!
//!     if let Some(envelope) = client.next_job("worker-1").await? {
//!         println!("got job: {:?}", envelope.request);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod builds;
mod deployments;
mod records;

pub use error::{ClientError, Result};
pub use records::RecordClient;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the remote coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    /// Base URL of the coordinator (e.g., "http://localhost:9777")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl CoordinatorClient {
    /// Create a new coordinator client
    ///
    /// # Example
    /// ```
    /// use kiln_client::CoordinatorClient;
    ///
    /// let client = CoordinatorClient::new("http://localhost:9777");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new coordinator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the coordinator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// =============================================================================
// Response Handlers
// =============================================================================

/// Check the status code and deserialize a JSON body
pub(crate) async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Check the status code of a response whose body is ignored
pub(crate) async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = CoordinatorClient::new("http://localhost:9777");
        assert_eq!(client.base_url(), "http://localhost:9777");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = CoordinatorClient::new("http://localhost:9777/");
        assert_eq!(client.base_url(), "http://localhost:9777");
    }

    #[test]
    fn test_client_with_custom_client() {
        let client = CoordinatorClient::with_client("http://localhost:9777", Client::new());
        assert_eq!(client.base_url(), "http://localhost:9777");
    }
}

//! Credential resolver
//!
//! Turns a job's optional credential reference into the deploy key for its
//! source repository. The decoded payload and the key itself are never
//! logged; only the reference and the outcome are.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kiln_core::domain::credential::{find_private_key, parse_deploy_keys};
use kiln_core::domain::job::RequestContext;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::CredentialBackend;
use crate::error::{Result, WorkerError};
use crate::repository::SecretVault;

/// A deploy key held only for the duration of one job
///
/// An empty key means "clone anonymously".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw key, for handing to the toolchain
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("PrivateKey(<empty>)")
        } else {
            f.write_str("PrivateKey(<redacted>)")
        }
    }
}

enum Backend {
    Local { secrets_file: PathBuf },
    Vault(Arc<dyn SecretVault>),
}

pub struct CredentialResolver {
    backend: Backend,
}

impl CredentialResolver {
    /// Reads references from a local JSON map of base64-encoded payloads
    pub fn local(secrets_file: impl AsRef<Path>) -> Self {
        Self {
            backend: Backend::Local {
                secrets_file: secrets_file.as_ref().to_path_buf(),
            },
        }
    }

    /// Fetches references from the secret vault
    pub fn vault(vault: Arc<dyn SecretVault>) -> Self {
        Self {
            backend: Backend::Vault(vault),
        }
    }

    pub fn from_config(backend: &CredentialBackend, vault: Arc<dyn SecretVault>) -> Self {
        match backend {
            CredentialBackend::Local { secrets_file } => Self::local(secrets_file),
            CredentialBackend::Vault => Self::vault(vault),
        }
    }

    /// Resolves the deploy key for `source_url`
    ///
    /// No reference, an unknown reference, or no record for `source_url`
    /// all give an empty key. Only a failing backend is an error.
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        credential_ref: Option<&str>,
        source_url: &str,
    ) -> Result<PrivateKey> {
        let Some(reference) = credential_ref.filter(|r| !r.is_empty()) else {
            return Ok(PrivateKey::empty());
        };

        let payload = match &self.backend {
            Backend::Local { secrets_file } => {
                match read_local_payload(secrets_file, reference).await? {
                    Some(payload) => payload,
                    None => {
                        warn!("Credential reference {} not found in local store", reference);
                        return Ok(PrivateKey::empty());
                    }
                }
            }
            Backend::Vault(vault) => vault
                .get_secret(ctx, reference)
                .await
                .map_err(|e| WorkerError::SecretRetrieval(format!("{:#}", e)))?,
        };

        let keys = parse_deploy_keys(&payload).map_err(|e| {
            WorkerError::SecretRetrieval(format!("malformed deploy key payload: {}", e))
        })?;

        match find_private_key(&keys, source_url) {
            Some(key) => {
                debug!("Resolved deploy key for {}", source_url);
                Ok(PrivateKey::new(key))
            }
            None => {
                debug!("No deploy key registered for {}", source_url);
                Ok(PrivateKey::empty())
            }
        }
    }
}

async fn read_local_payload(secrets_file: &Path, reference: &str) -> Result<Option<String>> {
    let raw = tokio::fs::read_to_string(secrets_file).await.map_err(|e| {
        WorkerError::SecretRetrieval(format!("cannot read {}: {}", secrets_file.display(), e))
    })?;

    let store: HashMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
        WorkerError::SecretRetrieval(format!("corrupt store {}: {}", secrets_file.display(), e))
    })?;

    let Some(encoded) = store.get(reference) else {
        return Ok(None);
    };

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| WorkerError::SecretRetrieval(format!("invalid base64 payload: {}", e)))?;

    String::from_utf8(decoded)
        .map(Some)
        .map_err(|_| WorkerError::SecretRetrieval("payload is not valid UTF-8".to_string()))
}

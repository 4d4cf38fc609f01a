//! Worker configuration
//!
//! Defines all configurable parameters for the worker: where the build
//! toolchain lives, where task logs go, how they are shipped, and where
//! deploy keys are read from.

use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Where captured task logs are shipped after a stage finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogUploadStrategy {
    /// Copy into a durable local directory
    Local { dir: PathBuf },
    /// Push to an object store container
    ObjectStorage { url: String, container: String },
    /// Unrecognized strategy name; logs stay where the script left them
    Disabled { requested: String },
}

impl LogUploadStrategy {
    /// Resolves a strategy name from configuration
    ///
    /// Unknown names fall back to [`LogUploadStrategy::Disabled`] rather than
    /// failing, so a typo never blocks builds.
    pub fn from_name(
        name: &str,
        local_dir: PathBuf,
        object_store_url: Option<String>,
        container: String,
    ) -> Self {
        match name.trim().to_lowercase().as_str() {
            "local" => LogUploadStrategy::Local { dir: local_dir },
            "object-storage" | "swift" => LogUploadStrategy::ObjectStorage {
                url: object_store_url.unwrap_or_default(),
                container,
            },
            other => LogUploadStrategy::Disabled {
                requested: other.to_string(),
            },
        }
    }
}

/// Where deploy keys referenced by jobs are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialBackend {
    /// Local key-value file of base64-encoded payloads
    Local { secrets_file: PathBuf },
    /// Remote secret vault
    Vault,
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this worker instance
    pub worker_id: String,

    /// Coordinator base URL (e.g., "http://localhost:9777")
    pub coordinator_url: String,

    /// Record service base URL for assemblies and images
    pub api_url: String,

    /// Root of the build toolchain (`<root>/<toolchain>/<builder>/<script>`)
    pub toolchain_dir: PathBuf,

    /// Directory the scripts write task logs into
    pub task_log_dir: PathBuf,

    /// Prefix of the log link posted with commit statuses
    pub log_url_prefix: String,

    pub log_upload: LogUploadStrategy,

    pub credential_backend: CredentialBackend,

    /// Secret vault base URL for references that are not absolute URLs
    pub vault_url: Option<String>,

    /// Artifact-store endpoint; when unset it is looked up in the identity catalog
    pub image_endpoint: Option<String>,

    /// How often to ask the coordinator for work
    pub poll_interval: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(worker_id: String, coordinator_url: String) -> Self {
        Self {
            worker_id,
            api_url: coordinator_url.clone(),
            coordinator_url,
            toolchain_dir: PathBuf::from("./contrib"),
            task_log_dir: PathBuf::from("/var/log/kiln/tasks"),
            log_url_prefix: "http://localhost/logs/".to_string(),
            log_upload: LogUploadStrategy::Local {
                dir: PathBuf::from("/var/lib/kiln/logs"),
            },
            credential_backend: CredentialBackend::Vault,
            vault_url: None,
            image_endpoint: None,
            poll_interval: Duration::from_secs(5),
        }
    }

    /// Loads the worker configuration at startup
    ///
    /// Falls back to [`Config::default`] only when `COORDINATOR_URL` is not
    /// set at all. Any other bad value is an error, so a typo never silently
    /// replaces the operator's settings with defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// [`Config::load`] over an arbitrary variable lookup
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let config = if lookup("COORDINATOR_URL").is_some() {
            Self::from_lookup(&lookup)?
        } else {
            info!("COORDINATOR_URL not set, using default configuration");
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - COORDINATOR_URL (required)
    /// - WORKER_ID (optional, default: random UUID)
    /// - API_URL (optional, default: COORDINATOR_URL)
    /// - TOOLCHAIN_DIR, TASK_LOG_DIR, LOG_URL_PREFIX (optional)
    /// - LOG_UPLOAD_STRATEGY (optional, `local` | `object-storage`, default: local)
    /// - LOG_STORE_DIR, OBJECT_STORE_URL, OBJECT_STORE_CONTAINER (optional)
    /// - CREDENTIAL_BACKEND (optional, `local` | `vault`, default: vault)
    /// - GIT_SECRETS_FILE, VAULT_URL (optional)
    /// - IMAGE_ENDPOINT (optional)
    /// - POLL_INTERVAL (optional, seconds, default: 5)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let coordinator_url = lookup("COORDINATOR_URL")
            .ok_or_else(|| anyhow::anyhow!("COORDINATOR_URL environment variable not set"))?;

        let worker_id = lookup("WORKER_ID").unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut config = Self::new(worker_id, coordinator_url);

        if let Some(api_url) = lookup("API_URL") {
            config.api_url = api_url;
        }
        if let Some(dir) = lookup("TOOLCHAIN_DIR") {
            config.toolchain_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("TASK_LOG_DIR") {
            config.task_log_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = lookup("LOG_URL_PREFIX") {
            config.log_url_prefix = prefix;
        }

        let strategy = lookup("LOG_UPLOAD_STRATEGY").unwrap_or_else(|| "local".into());
        let log_store_dir = lookup("LOG_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/var/lib/kiln/logs"));
        let container = lookup("OBJECT_STORE_CONTAINER").unwrap_or_else(|| "kiln-logs".into());
        config.log_upload = LogUploadStrategy::from_name(
            &strategy,
            log_store_dir,
            lookup("OBJECT_STORE_URL"),
            container,
        );

        config.credential_backend = match lookup("CREDENTIAL_BACKEND")
            .unwrap_or_else(|| "vault".into())
            .to_lowercase()
            .as_str()
        {
            "local" => CredentialBackend::Local {
                secrets_file: lookup("GIT_SECRETS_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/etc/kiln/git-secrets.json")),
            },
            "vault" => CredentialBackend::Vault,
            other => anyhow::bail!("unknown CREDENTIAL_BACKEND '{}'", other),
        };

        config.vault_url = lookup("VAULT_URL");
        config.image_endpoint = lookup("IMAGE_ENDPOINT");

        if let Some(secs) = lookup("POLL_INTERVAL") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid POLL_INTERVAL '{}'", secs))?;
            config.poll_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_id.is_empty() {
            anyhow::bail!("worker_id cannot be empty");
        }

        for (name, url) in [("coordinator_url", &self.coordinator_url), ("api_url", &self.api_url)]
        {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.poll_interval.as_secs() == 0 {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if let LogUploadStrategy::ObjectStorage { url, container } = &self.log_upload {
            if url.is_empty() {
                anyhow::bail!("OBJECT_STORE_URL is required for the object-storage log strategy");
            }
            if container.is_empty() {
                anyhow::bail!("object store container cannot be empty");
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            "http://localhost:9777".to_string(),
        )
    }
}

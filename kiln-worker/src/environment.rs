//! Environment builder
//!
//! Produces the isolated environment a toolchain script runs with. Only a
//! short allow-list of the worker's own variables is inherited; everything
//! else is job specific.

use kiln_core::domain::job::RequestContext;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, WorkerError};
use crate::repository::ServiceCatalog;

/// Worker variables passed through to scripts
pub const INHERITED_VARS: [&str; 6] = ["PATH", "LOGNAME", "LANG", "HOME", "USER", "TERM"];

pub const AUTH_TOKEN_VAR: &str = "OS_AUTH_TOKEN";
pub const AUTH_URL_VAR: &str = "OS_AUTH_URL";
pub const IMAGE_URL_VAR: &str = "OS_IMAGE_URL";
pub const PROJECT_ID_VAR: &str = "PROJECT_ID";
pub const BUILD_ID_VAR: &str = "BUILD_ID";
pub const TASK_DIR_VAR: &str = "KILN_TASK_DIR";

/// Execution environment of one script run
#[derive(Clone)]
pub struct JobEnvironment {
    vars: BTreeMap<String, String>,
    run_id: Uuid,
    task_dir: PathBuf,
}

impl JobEnvironment {
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Identifier generated for this run, exported as `BUILD_ID`
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Where the run's captured output is written
    pub fn log_path(&self) -> PathBuf {
        self.task_dir.join(format!("{}.log", self.run_id))
    }

    /// Rendering safe for logs: the auth token is dropped
    pub fn redacted(&self) -> String {
        self.vars
            .iter()
            .filter(|(key, _)| key.as_str() != AUTH_TOKEN_VAR)
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for JobEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobEnvironment({})", self.redacted())
    }
}

pub struct EnvironmentBuilder {
    catalog: Arc<dyn ServiceCatalog>,
    task_log_dir: PathBuf,
    inherited: BTreeMap<String, String>,
}

impl EnvironmentBuilder {
    /// Creates a builder inheriting the allow-listed variables of this process
    pub fn new(catalog: Arc<dyn ServiceCatalog>, task_log_dir: impl AsRef<Path>) -> Self {
        Self {
            catalog,
            task_log_dir: task_log_dir.as_ref().to_path_buf(),
            inherited: BTreeMap::new(),
        }
        .with_inherited(std::env::vars())
    }

    /// Replaces the inherited variables, keeping only allow-listed names
    pub fn with_inherited(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.inherited = vars
            .into_iter()
            .filter(|(key, _)| INHERITED_VARS.contains(&key.as_str()))
            .collect();
        self
    }

    /// Builds the environment for one script run
    ///
    /// Fails with [`WorkerError::Environment`] when the artifact-store
    /// endpoint cannot be resolved; a script is never started with a
    /// partial environment.
    pub async fn build(&self, ctx: &RequestContext) -> Result<JobEnvironment> {
        let image_url = self
            .catalog
            .image_endpoint(ctx)
            .await
            .map_err(|e| WorkerError::Environment(format!("{:#}", e)))?;

        let run_id = Uuid::new_v4();
        let task_dir = self.task_log_dir.to_string_lossy().to_string();

        let mut vars = self.inherited.clone();
        vars.insert(AUTH_TOKEN_VAR.to_string(), ctx.auth_token.clone());
        vars.insert(AUTH_URL_VAR.to_string(), ctx.auth_url.clone());
        vars.insert(IMAGE_URL_VAR.to_string(), image_url);
        vars.insert(PROJECT_ID_VAR.to_string(), ctx.tenant.clone());
        vars.insert(BUILD_ID_VAR.to_string(), run_id.to_string());
        vars.insert(TASK_DIR_VAR.to_string(), task_dir);

        debug!("Prepared environment with {} variables", vars.len());

        Ok(JobEnvironment {
            vars,
            run_id,
            task_dir: self.task_log_dir.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StaticServiceCatalog;
    use crate::testing::{FailingCatalog, request_context};

    fn inherited() -> Vec<(String, String)> {
        vec![
            ("PATH".into(), "/usr/bin:/bin".into()),
            ("HOME".into(), "/home/kiln".into()),
            ("AWS_SECRET_ACCESS_KEY".into(), "leak".into()),
            ("LD_PRELOAD".into(), "/tmp/evil.so".into()),
        ]
    }

    #[tokio::test]
    async fn test_only_allow_listed_vars_inherited() {
        let builder = EnvironmentBuilder::new(
            Arc::new(StaticServiceCatalog::new("http://glance:9292")),
            "/tmp/tasks",
        )
        .with_inherited(inherited());

        let env = builder.build(&request_context()).await.unwrap();

        assert_eq!(env.get("PATH"), Some("/usr/bin:/bin"));
        assert_eq!(env.get("HOME"), Some("/home/kiln"));
        assert!(env.get("AWS_SECRET_ACCESS_KEY").is_none());
        assert!(env.get("LD_PRELOAD").is_none());
    }

    #[tokio::test]
    async fn test_job_vars_present() {
        let builder = EnvironmentBuilder::new(
            Arc::new(StaticServiceCatalog::new("http://glance:9292")),
            "/tmp/tasks",
        )
        .with_inherited(Vec::new());

        let env = builder.build(&request_context()).await.unwrap();

        assert_eq!(env.get(AUTH_TOKEN_VAR), Some("token-abc"));
        assert_eq!(env.get(AUTH_URL_VAR), Some("http://identity:5000/v3"));
        assert_eq!(env.get(IMAGE_URL_VAR), Some("http://glance:9292"));
        assert_eq!(env.get(PROJECT_ID_VAR), Some("demo"));
        assert_eq!(env.get(TASK_DIR_VAR), Some("/tmp/tasks"));
        assert_eq!(env.get(BUILD_ID_VAR), Some(env.run_id().to_string().as_str()));
        assert_eq!(
            env.log_path(),
            PathBuf::from(format!("/tmp/tasks/{}.log", env.run_id()))
        );
    }

    #[tokio::test]
    async fn test_run_id_fresh_per_build() {
        let builder = EnvironmentBuilder::new(
            Arc::new(StaticServiceCatalog::new("http://glance:9292")),
            "/tmp/tasks",
        );
        let first = builder.build(&request_context()).await.unwrap();
        let second = builder.build(&request_context()).await.unwrap();
        assert_ne!(first.run_id(), second.run_id());
    }

    #[tokio::test]
    async fn test_redacted_hides_token() {
        let builder = EnvironmentBuilder::new(
            Arc::new(StaticServiceCatalog::new("http://glance:9292")),
            "/tmp/tasks",
        );
        let env = builder.build(&request_context()).await.unwrap();
        assert!(!env.redacted().contains("token-abc"));
        assert!(!format!("{:?}", env).contains("token-abc"));
        assert!(env.redacted().contains("PROJECT_ID=demo"));
    }

    #[tokio::test]
    async fn test_catalog_failure_is_environment_error() {
        let builder = EnvironmentBuilder::new(Arc::new(FailingCatalog), "/tmp/tasks");
        let err = builder.build(&request_context()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Environment(_)));
        assert!(err.is_fatal());
    }
}

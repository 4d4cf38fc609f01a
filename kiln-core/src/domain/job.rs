//! Build job domain types
//!
//! A build job is ephemeral: it is handed to a worker by the dispatch layer,
//! lives for one invocation and is never persisted. Only its effects on
//! assemblies and images survive.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Caller identity forwarded with every job
///
/// Used to authenticate against the record service, the identity catalog,
/// the secret vault and object storage on behalf of the job's owner.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub auth_token: String,
    pub auth_url: String,
    pub tenant: String,
}

// Keep the token out of Debug output.
impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("auth_token", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("tenant", &self.tenant)
            .finish()
    }
}

/// Source repository reference
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source_url: String,
    #[serde(default)]
    pub commit_sha: Option<String>,
    /// Commit-status callback of the review system
    #[serde(default)]
    pub status_url: Option<String>,
    #[serde(default)]
    pub status_token: Option<String>,
}

impl fmt::Debug for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceInfo")
            .field("source_url", &self.source_url)
            .field("commit_sha", &self.commit_sha)
            .field("status_url", &self.status_url)
            .field("status_token", &self.status_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One build or unit-test request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildJob {
    pub build_id: Uuid,
    pub source: SourceInfo,
    pub name: String,
    pub base_image_id: String,
    pub source_format: String,
    pub image_format: String,
    #[serde(default)]
    pub assembly_id: Option<Uuid>,
    #[serde(default)]
    pub test_cmd: Option<String>,
    #[serde(default)]
    pub credential_ref: Option<String>,
}

/// Pipeline stage a process runs for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Unittest,
    Build,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Unittest => "unittest",
            Stage::Build => "build",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work item delivered by the dispatch layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum JobRequest {
    Build { job: BuildJob },
    Unittest { job: BuildJob },
    Echo { message: String },
}

/// A job request together with the identity it runs under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    #[serde(default)]
    pub context: RequestContext,
    #[serde(flatten)]
    pub request: JobRequest,
}

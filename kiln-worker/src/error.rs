//! Worker error taxonomy
//!
//! Fatal kinds abort the job and leave the assembly/image in `ERROR`.
//! Best-effort kinds are logged where they happen and never change the
//! outcome of a job.

use kiln_core::domain::assembly::AssemblyStatus;
use kiln_core::domain::job::Stage;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The execution environment for the script could not be assembled
    #[error("failed to prepare build environment: {0}")]
    Environment(String),

    /// A credential reference was given but its backend failed
    #[error("failed to retrieve source credentials: {0}")]
    SecretRetrieval(String),

    /// The toolchain script could not be started
    #[error("failed to launch {program}: {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The build finished but did not report a usable image id
    #[error("image not created")]
    BuildArtifactMissing,

    /// The build script exited unsuccessfully
    #[error("build script exited with code {code}")]
    BuildScriptFailed { code: i32 },

    /// The unit-test command exited with a non-zero code
    #[error("unit tests failed with code {code}")]
    TestFailure { code: i32 },

    #[error("failed to notify coordinator: {0}")]
    NotificationDelivery(String),

    #[error("failed to upload {stage} log: {message}")]
    LogUpload { stage: Stage, message: String },

    #[error("failed to report commit status: {0}")]
    StatusReport(String),

    /// Reading or writing an assembly/image record failed
    #[error("record store error: {0}")]
    Record(String),

    #[error("refusing assembly transition {from} -> {to}")]
    InvalidTransition {
        from: AssemblyStatus,
        to: AssemblyStatus,
    },
}

impl WorkerError {
    /// Whether this error terminates the job
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::Environment(_)
                | WorkerError::SecretRetrieval(_)
                | WorkerError::ProcessLaunch { .. }
                | WorkerError::BuildArtifactMissing
                | WorkerError::BuildScriptFailed { .. }
        )
    }
}

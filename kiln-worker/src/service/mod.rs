//! Service layer
//!
//! Business logic shared by every job: state transitions and progress
//! notifications, log shipping and commit-status reporting. Each service is
//! built once at startup and reused across jobs; per-job state lives in the
//! `JobContext` passed to every call.

mod commit_status;
mod log_upload;
mod status;

pub use commit_status::CommitStatusReporter;
pub use log_upload::{LogUploader, object_key};
pub use status::{BUILD_STARTED, BUILD_SUCCEEDED, StatusCoordinator};

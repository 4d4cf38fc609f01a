//! Per-job execution context
//!
//! Created when a job starts and dropped when it ends. Holds:
//! - The caller identity the job runs under
//! - The build and assembly ids used to tag every log line
//! - Support info collected along the way (command, environment, output markers)
//! - The last assembly status this job applied, for transition checks

use kiln_core::domain::assembly::AssemblyStatus;
use kiln_core::domain::job::{BuildJob, RequestContext, Stage};
use std::collections::BTreeMap;
use tracing::{Span, debug, info_span};
use uuid::Uuid;

pub struct JobContext {
    pub request: RequestContext,
    pub build_id: Uuid,
    pub assembly_id: Option<Uuid>,
    support_info: BTreeMap<String, String>,
    assembly_status: AssemblyStatus,
}

impl JobContext {
    /// Creates a fresh context for one job
    ///
    /// Nothing is inherited from a previous job; every job starts from
    /// `QUEUED` with empty support info.
    pub fn new(request: RequestContext, job: &BuildJob) -> Self {
        Self {
            request,
            build_id: job.build_id,
            assembly_id: job.assembly_id,
            support_info: BTreeMap::new(),
            assembly_status: AssemblyStatus::Queued,
        }
    }

    /// Span every step of a stage runs inside
    pub fn span(&self, stage: Stage) -> Span {
        info_span!(
            "job",
            build_id = %self.build_id,
            assembly_id = ?self.assembly_id,
            stage = %stage,
        )
    }

    /// Records a piece of diagnostic information for this job
    ///
    /// Callers must redact secrets before recording.
    pub fn support_info(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        debug!(key, value = %value, "support info");
        self.support_info.insert(key.to_string(), value);
    }

    pub fn support(&self, key: &str) -> Option<&str> {
        self.support_info.get(key).map(String::as_str)
    }

    /// Last assembly status applied by this job
    pub fn assembly_status(&self) -> AssemblyStatus {
        self.assembly_status
    }

    pub(crate) fn record_assembly_status(&mut self, status: AssemblyStatus) {
        self.assembly_status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_job;

    #[test]
    fn test_new_context_starts_clean() {
        let job = sample_job(None);
        let ctx = JobContext::new(RequestContext::default(), &job);
        assert_eq!(ctx.build_id, job.build_id);
        assert_eq!(ctx.assembly_status(), AssemblyStatus::Queued);
        assert!(ctx.support("build_cmd").is_none());
    }

    #[test]
    fn test_support_info_overwrites() {
        let mut ctx = JobContext::new(RequestContext::default(), &sample_job(None));
        ctx.support_info("build_out_line", "first");
        ctx.support_info("build_out_line", "second");
        assert_eq!(ctx.support("build_out_line"), Some("second"));
    }
}

//! Commit-status reporter
//!
//! Posts test progress back to the review system that triggered the build,
//! when the job's source carries a status URL and token. The reporter never
//! influences the outcome of a job.

use kiln_core::domain::job::SourceInfo;
use kiln_core::dto::commit_status::CommitStatus;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{Result, WorkerError};

pub struct CommitStatusReporter {
    client: Client,
    log_url_prefix: String,
}

impl CommitStatusReporter {
    pub fn new(log_url_prefix: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            log_url_prefix: log_url_prefix.into(),
        }
    }

    /// Link posted with every status: prefix plus the commit id at the end
    /// of the status URL
    pub fn log_url(&self, status_url: &str) -> String {
        let commit = status_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        format!("{}{}", self.log_url_prefix, commit)
    }

    /// Tests are about to run
    pub async fn pending(&self, source: &SourceInfo) {
        self.report(source, |url| CommitStatus::pending(url)).await;
    }

    /// Tests finished
    pub async fn finished(&self, source: &SourceInfo, passed: bool) {
        self.report(source, |url| CommitStatus::finished(passed, url))
            .await;
    }

    async fn report(&self, source: &SourceInfo, status: impl FnOnce(String) -> CommitStatus) {
        let (Some(url), Some(token)) = (&source.status_url, &source.status_token) else {
            debug!("No status URL or token, not reporting commit status");
            return;
        };

        let body = status(self.log_url(url));
        if let Err(e) = self.post(url, token, &body).await {
            warn!("{}", e);
        }
    }

    async fn post(&self, url: &str, token: &str, body: &CommitStatus) -> Result<()> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("token {}", token))
            .json(body)
            .send()
            .await
            .map_err(|e| WorkerError::StatusReport(e.to_string()))?;

        if response.status() != StatusCode::CREATED {
            return Err(WorkerError::StatusReport(format!(
                "{} answered {}",
                url,
                response.status()
            )));
        }

        Ok(())
    }
}

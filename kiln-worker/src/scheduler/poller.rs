//! Job poller
//!
//! Polls the dispatch queue and runs jobs sequentially. A worker instance
//! never has more than one job in flight, so per-job state never has to be
//! shared.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::{debug, error, info};

use crate::handler::JobHandler;
use crate::repository::JobSource;

pub struct JobPoller {
    worker_id: String,
    poll_interval: Duration,
    source: Arc<dyn JobSource>,
    handler: Arc<JobHandler>,
}

impl JobPoller {
    pub fn new(
        worker_id: String,
        poll_interval: Duration,
        source: Arc<dyn JobSource>,
        handler: Arc<JobHandler>,
    ) -> Self {
        Self {
            worker_id,
            poll_interval,
            source,
            handler,
        }
    }

    /// Starts the polling loop
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting job poller for {} (interval: {:?})",
            self.worker_id, self.poll_interval
        );

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match self.poll_and_execute_once().await {
                Ok(0) => debug!("No jobs available"),
                Ok(executed) => info!("Executed {} job(s) this cycle", executed),
                Err(e) => error!("Error during poll cycle: {:#}", e),
            }
        }
    }

    /// Runs queued jobs until the queue reports none left
    pub async fn poll_and_execute_once(&self) -> Result<usize> {
        let mut executed = 0;

        while let Some(envelope) = self
            .source
            .next_job(&self.worker_id)
            .await
            .context("Failed to poll for jobs")?
        {
            debug!("Received {:?}", envelope.request);
            self.handler.dispatch(envelope).await;
            executed += 1;
        }

        Ok(executed)
    }
}

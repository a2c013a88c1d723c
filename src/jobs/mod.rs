//! Background driver for scheduled license checks.
//!
//! The host scheduler is cooperative: tasks only fire when something polls
//! it. Long-running processes without incoming requests use this runner to
//! poll on a cron schedule instead. Requires the `background-jobs` feature.
//!
//! # Usage
//!
//! ```rust,ignore
//! use addon_license::jobs::CheckJobRunner;
//!
//! let runner = CheckJobRunner::new(Arc::clone(&host)).await?;
//! runner.start().await?;
//! ```

use chrono::Utc;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler as TokioJobScheduler};
use tracing::info;

use crate::host::Host;

/// Polls the host scheduler and fires due tasks.
pub struct CheckJobRunner {
    scheduler: TokioJobScheduler,
    host: Arc<Host>,
    cron: String,
}

impl CheckJobRunner {
    /// Create a runner polling on the configured `schedule.poll_cron`.
    pub async fn new(host: Arc<Host>) -> Result<Self, JobError> {
        let cron = host.config.schedule.poll_cron.clone();
        Self::with_cron(host, cron).await
    }

    pub async fn with_cron(host: Arc<Host>, cron: impl Into<String>) -> Result<Self, JobError> {
        let scheduler = TokioJobScheduler::new()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        Ok(Self {
            scheduler,
            host,
            cron: cron.into(),
        })
    }

    /// Register the poll job and start the scheduler.
    pub async fn start(&self) -> Result<(), JobError> {
        let host = Arc::clone(&self.host);

        let job = Job::new_async(self.cron.as_str(), move |_uuid, _l| {
            let host = Arc::clone(&host);
            Box::pin(async move {
                let fired = host.run_due_tasks(Utc::now()).await;
                if !fired.is_empty() {
                    info!("Background poll fired: {}", fired.join(", "));
                }
            })
        })
        .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .start()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!("License check poller started (schedule: {})", self.cron);
        Ok(())
    }

    /// Stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobError> {
        info!("Shutting down license check poller");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))
    }

    /// Poll once immediately.
    pub async fn run_now(&self) -> Vec<String> {
        self.host.run_due_tasks(Utc::now()).await
    }

    pub fn cron(&self) -> &str {
        &self.cron
    }
}

/// Errors that can occur in the background runner.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(String),
}

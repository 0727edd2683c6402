//! Waiting on server-side jobs.
//!
//! Every job-creating action returns a ticket; `await_job` polls the job
//! through the store until it reaches a terminal status or the timeout
//! elapses. The number of polls is bounded by `timeout / interval + 1`, and
//! a poll still in flight at the deadline is cut off.

use std::time::Duration;

use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::{Config, JOB_POLL_INTERVAL_SECS, JOB_POLL_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::state::EntityStore;
use crate::types::{Job, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobWait {
    interval: Duration,
    timeout: Duration,
}

impl JobWait {
    /// `interval` is floored at 1ms.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            timeout,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.job_poll_interval, cfg.job_poll_timeout)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn max_attempts(&self) -> u128 {
        self.timeout.as_millis() / self.interval.as_millis().max(1) + 1
    }
}

impl Default for JobWait {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(JOB_POLL_INTERVAL_SECS),
            Duration::from_secs(JOB_POLL_TIMEOUT_SECS),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(Job),
    Failed {
        job_id: String,
        message: String,
    },
    TimedOut {
        job_id: String,
        /// Status from the last successful poll, if any.
        last_status: Option<JobStatus>,
        /// Time actually spent waiting; never past the configured timeout.
        waited: Duration,
    },
}

impl JobOutcome {
    pub fn into_result(self) -> Result<Job> {
        match self {
            JobOutcome::Completed(job) => Ok(job),
            JobOutcome::Failed { job_id, message } => Err(AppError::JobFailed { job_id, message }),
            JobOutcome::TimedOut { job_id, waited, .. } => Err(AppError::JobTimeout {
                job_id,
                timeout_secs: waited.as_secs(),
            }),
        }
    }
}

/// Poll `job_id` via [`EntityStore::fetch_job`] until COMPLETED, FAILED or
/// timeout. Fetch failures are left in the store's error slot and polling
/// carries on until the deadline.
pub async fn await_job(store: &EntityStore, job_id: &str, wait: JobWait) -> JobOutcome {
    let started = Instant::now();
    let deadline = started + wait.timeout;
    let mut last_status = None;
    let mut attempt: u128 = 0;

    while attempt < wait.max_attempts() {
        attempt += 1;
        let Ok(polled) = timeout_at(deadline, store.fetch_job(job_id)).await else {
            // The abandoned fetch never settled; close it out in the store.
            store.fail(
                "fetch_job",
                &AppError::JobTimeout {
                    job_id: job_id.to_string(),
                    timeout_secs: wait.timeout.as_secs(),
                },
            );
            break;
        };
        if let Some(job) = polled {
            debug!(
                job_id,
                attempt = attempt as u64,
                status = %job.status,
                progress = job.progress,
                "Job polled"
            );
            match job.status {
                JobStatus::Completed => {
                    info!(job_id, result = ?job.result_ref(), "Job completed");
                    return JobOutcome::Completed(job);
                }
                JobStatus::Failed => {
                    let message = job
                        .error
                        .unwrap_or_else(|| "job failed without an error message".to_string());
                    warn!(job_id, %message, "Job failed");
                    return JobOutcome::Failed {
                        job_id: job_id.to_string(),
                        message,
                    };
                }
                status => last_status = Some(status),
            }
        }

        if Instant::now() + wait.interval > deadline {
            break;
        }
        sleep(wait.interval).await;
    }

    let waited = started.elapsed();
    warn!(
        job_id,
        timeout_secs = wait.timeout.as_secs(),
        waited_ms = waited.as_millis() as u64,
        ?last_status,
        "Gave up waiting for job"
    );
    JobOutcome::TimedOut {
        job_id: job_id.to_string(),
        last_status,
        waited,
    }
}

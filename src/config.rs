use std::time::Duration;

use crate::error::{AppError, Result};

pub const API_BASE_URL: &str = "http://localhost:8000";

/// Health/jobs refresh period for the background poller (seconds).
pub const POLL_INTERVAL_SECS: u64 = 30;

/// Delay between job status checks while waiting for a job to finish (seconds).
pub const JOB_POLL_INTERVAL_SECS: u64 = 2;

/// Give up waiting on a job after this many seconds.
pub const JOB_POLL_TIMEOUT_SECS: u64 = 120;

/// Per-request HTTP timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Training window used by `create_simple_model` when the caller gives none (days).
pub const DEFAULT_TRAINING_DAYS: u32 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub log_level: String,
    /// POLL_INTERVAL_SECS
    pub poll_interval: Duration,
    /// JOB_POLL_INTERVAL_SECS
    pub job_poll_interval: Duration,
    /// JOB_POLL_TIMEOUT_SECS
    pub job_poll_timeout: Duration,
    /// HTTP_TIMEOUT_SECS
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_base_url: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            poll_interval: secs_from_env("POLL_INTERVAL_SECS", POLL_INTERVAL_SECS)?,
            job_poll_interval: secs_from_env("JOB_POLL_INTERVAL_SECS", JOB_POLL_INTERVAL_SECS)?,
            job_poll_timeout: secs_from_env("JOB_POLL_TIMEOUT_SECS", JOB_POLL_TIMEOUT_SECS)?,
            http_timeout: secs_from_env("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: API_BASE_URL.to_string(),
            log_level: "info".to_string(),
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            job_poll_interval: Duration::from_secs(JOB_POLL_INTERVAL_SECS),
            job_poll_timeout: Duration::from_secs(JOB_POLL_TIMEOUT_SECS),
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        }
    }
}

fn secs_from_env(key: &str, default: u64) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => parse_secs(key, &raw),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| AppError::Config(format!("{key} must be a whole number of seconds")))?;
    if secs == 0 {
        return Err(AppError::Config(format!("{key} must be greater than zero")));
    }
    Ok(Duration::from_secs(secs))
}

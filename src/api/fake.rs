//! Scripted in-memory `TrainerApi` for store, poller and job-waiter tests.
//!
//! Responses are queued per operation as JSON values with an optional delay
//! (honoured through tokio's clock, so paused-time tests stay deterministic).
//! The last queued step repeats once the queue is drained.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::TrainerApi;
use crate::error::{AppError, Result};
use crate::types::{
    ActionAck, Comparison, CompareModelsRequest, HealthStatus, Job, JobTicket, Model,
    QueryParams, ServiceConfig, TestModelRequest, TestResult,
};

#[derive(Clone)]
struct Step {
    delay: Duration,
    response: std::result::Result<Value, String>,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    scripts: Mutex<HashMap<&'static str, VecDeque<Step>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    last_params: Mutex<Option<QueryParams>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, op: &'static str, value: Value) -> &Self {
        self.push(op, Duration::ZERO, Ok(value))
    }

    pub fn respond_after(&self, op: &'static str, delay: Duration, value: Value) -> &Self {
        self.push(op, delay, Ok(value))
    }

    pub fn fail(&self, op: &'static str, message: &str) -> &Self {
        self.push(op, Duration::ZERO, Err(message.to_string()))
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn last_params(&self) -> Option<QueryParams> {
        self.last_params.lock().unwrap().clone()
    }

    fn push(
        &self,
        op: &'static str,
        delay: Duration,
        response: std::result::Result<Value, String>,
    ) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(Step { delay, response });
        self
    }

    fn next_step(&self, op: &'static str) -> Option<Step> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(op)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    async fn reply(&self, op: &'static str) -> Result<Value> {
        let step = self
            .next_step(op)
            .ok_or_else(|| AppError::Transport(format!("no scripted response for {op}")))?;
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.response.map_err(AppError::Transport)
    }

    async fn reply_as<T: DeserializeOwned>(&self, op: &'static str) -> Result<T> {
        Ok(serde_json::from_value(self.reply(op).await?)?)
    }
}

#[async_trait]
impl TrainerApi for FakeApi {
    async fn list_models(&self) -> Result<Vec<Model>> {
        self.reply_as("list_models").await
    }

    async fn get_model(&self, _id: i64) -> Result<Model> {
        self.reply_as("get_model").await
    }

    async fn create_model(&self, params: &QueryParams) -> Result<JobTicket> {
        *self.last_params.lock().unwrap() = Some(params.clone());
        self.reply_as("create_model").await
    }

    async fn test_model(&self, _id: i64, _req: &TestModelRequest) -> Result<JobTicket> {
        self.reply_as("test_model").await
    }

    async fn compare_models(&self, _req: &CompareModelsRequest) -> Result<JobTicket> {
        self.reply_as("compare_models").await
    }

    async fn delete_model(&self, _id: i64) -> Result<()> {
        self.reply("delete_model").await.map(|_| ())
    }

    async fn download_model(&self, _id: i64) -> Result<Bytes> {
        let text: String = self.reply_as("download_model").await?;
        Ok(Bytes::from(text.into_bytes()))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.reply_as("list_jobs").await
    }

    async fn get_job(&self, _id: &str) -> Result<Job> {
        self.reply_as("get_job").await
    }

    async fn list_test_results(&self) -> Result<Vec<TestResult>> {
        self.reply_as("list_test_results").await
    }

    async fn get_test_result(&self, _id: i64) -> Result<TestResult> {
        self.reply_as("get_test_result").await
    }

    async fn delete_test_result(&self, _id: i64) -> Result<()> {
        self.reply("delete_test_result").await.map(|_| ())
    }

    async fn list_comparisons(&self) -> Result<Vec<Comparison>> {
        self.reply_as("list_comparisons").await
    }

    async fn get_comparison(&self, _id: i64) -> Result<Comparison> {
        self.reply_as("get_comparison").await
    }

    async fn delete_comparison(&self, _id: i64) -> Result<()> {
        self.reply("delete_comparison").await.map(|_| ())
    }

    async fn health(&self) -> Result<HealthStatus> {
        self.reply_as("health").await
    }

    async fn get_config(&self) -> Result<ServiceConfig> {
        self.reply_as("get_config").await
    }

    async fn update_config(&self, _config: &ServiceConfig) -> Result<ServiceConfig> {
        self.reply_as("update_config").await
    }

    async fn reload_config(&self) -> Result<ServiceConfig> {
        self.reply_as("reload_config").await
    }

    async fn reconnect_db(&self) -> Result<ActionAck> {
        self.reply_as("reconnect_db").await
    }

    async fn metrics_text(&self) -> Result<String> {
        self.reply_as("metrics_text").await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub(crate) fn model_json(id: i64, name: &str) -> Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "model_type": "gradient_boosted_tree",
        "status": "READY",
        "metrics": { "accuracy": 0.61, "f1_score": 0.58 },
        "hyperparameters": { "max_depth": 6 },
        "features": ["price_close", "price_close", "buy_pressure_ma_5"],
        "created_at": "2026-10-01T12:00:00Z",
        "train_start": "2026-09-01",
        "train_end": "2026-10-01"
    })
}

pub(crate) fn job_json(id: &str, status: &str, progress: u8) -> Value {
    serde_json::json!({
        "id": id,
        "status": status,
        "job_type": "train",
        "progress": progress,
        "error": null,
        "created_at": "2026-10-01T12:00:00Z"
    })
}

pub(crate) fn health_json(status: &str, db_connected: bool) -> Value {
    serde_json::json!({
        "status": status,
        "db_connected": db_connected,
        "uptime_seconds": 120.0,
        "jobs_processed": 4,
        "last_error": null
    })
}

//! Client side of the training service REST API.
//!
//! `TrainerApi` is the seam between the entity store and the network: the store
//! only ever talks to a `dyn TrainerApi`, so tests drive it with a scripted fake
//! and the binary plugs in [`http::HttpApiClient`].

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::types::{
    ActionAck, Comparison, CompareModelsRequest, HealthStatus, Job, JobTicket, Model,
    QueryParams, ServiceConfig, TestModelRequest, TestResult,
};

pub mod http;
pub mod latency;
pub mod metrics;

#[cfg(test)]
pub(crate) mod fake;

/// One method per endpoint. Implementations hold no state between calls that
/// could change a result.
#[async_trait]
pub trait TrainerApi: Send + Sync {
    async fn list_models(&self) -> Result<Vec<Model>>;
    async fn get_model(&self, id: i64) -> Result<Model>;
    /// `POST /api/models/create/advanced` with query-encoded parameters.
    async fn create_model(&self, params: &QueryParams) -> Result<JobTicket>;
    async fn test_model(&self, id: i64, req: &TestModelRequest) -> Result<JobTicket>;
    async fn compare_models(&self, req: &CompareModelsRequest) -> Result<JobTicket>;
    async fn delete_model(&self, id: i64) -> Result<()>;
    async fn download_model(&self, id: i64) -> Result<Bytes>;

    async fn list_jobs(&self) -> Result<Vec<Job>>;
    async fn get_job(&self, id: &str) -> Result<Job>;

    async fn list_test_results(&self) -> Result<Vec<TestResult>>;
    async fn get_test_result(&self, id: i64) -> Result<TestResult>;
    async fn delete_test_result(&self, id: i64) -> Result<()>;

    async fn list_comparisons(&self) -> Result<Vec<Comparison>>;
    async fn get_comparison(&self, id: i64) -> Result<Comparison>;
    async fn delete_comparison(&self, id: i64) -> Result<()>;

    /// A 503 response still carries a health body ("service up, DB down") and
    /// must be decoded, not treated as a failure.
    async fn health(&self) -> Result<HealthStatus>;

    async fn get_config(&self) -> Result<ServiceConfig>;
    async fn update_config(&self, config: &ServiceConfig) -> Result<ServiceConfig>;
    async fn reload_config(&self) -> Result<ServiceConfig>;
    async fn reconnect_db(&self) -> Result<ActionAck>;

    /// Raw text exposition from `/api/metrics`; parse with [`metrics::parse_metrics`].
    async fn metrics_text(&self) -> Result<String>;
}

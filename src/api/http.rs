use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::latency::RequestLatency;
use crate::api::TrainerApi;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{
    ActionAck, Comparison, CompareModelsRequest, HealthStatus, Job, JobTicket, Model,
    QueryParams, ServiceConfig, TestModelRequest, TestResult,
};

/// reqwest-backed implementation of [`TrainerApi`].
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    latency: Arc<RequestLatency>,
}

impl HttpApiClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.http_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            latency: Arc::new(RequestLatency::new()),
        })
    }

    /// Shared handle to the round-trip latency histogram.
    pub fn latency(&self) -> Arc<RequestLatency> {
        Arc::clone(&self.latency)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    /// Send and time a request; returns the response whatever its status.
    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        let started = Instant::now();
        let result = builder.send().await;
        let elapsed = started.elapsed();
        self.latency.record(elapsed);
        match result {
            Ok(resp) => {
                debug!(
                    path,
                    status = resp.status().as_u16(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "API response"
                );
                Ok(resp)
            }
            Err(e) if e.is_connect() || e.is_timeout() => {
                Err(AppError::Transport(format!("{path}: {e}")))
            }
            Err(e) => Err(AppError::Http(e)),
        }
    }

    /// Send and require a 2xx status.
    async fn send_ok(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        let resp = self.send(builder, path).await?;
        ensure_success(resp).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.send_ok(self.request(Method::GET, path), path).await?;
        decode(resp).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send_ok(self.request(Method::DELETE, path), path).await?;
        Ok(())
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AppError::from_status(status.as_u16(), &body))
}

/// Decode via text so a malformed body surfaces as a JSON error rather than
/// an opaque transport error.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl TrainerApi for HttpApiClient {
    async fn list_models(&self) -> Result<Vec<Model>> {
        self.get_json("/api/models").await
    }

    async fn get_model(&self, id: i64) -> Result<Model> {
        self.get_json(&format!("/api/models/{id}")).await
    }

    async fn create_model(&self, params: &QueryParams) -> Result<JobTicket> {
        let path = "/api/models/create/advanced";
        let builder = self.request(Method::POST, path).query(params);
        let resp = self.send_ok(builder, path).await?;
        decode(resp).await
    }

    async fn test_model(&self, id: i64, req: &TestModelRequest) -> Result<JobTicket> {
        let path = format!("/api/models/{id}/test");
        let builder = self.request(Method::POST, &path).json(req);
        let resp = self.send_ok(builder, &path).await?;
        decode(resp).await
    }

    async fn compare_models(&self, req: &CompareModelsRequest) -> Result<JobTicket> {
        let path = "/api/models/compare";
        let builder = self.request(Method::POST, path).json(req);
        let resp = self.send_ok(builder, path).await?;
        decode(resp).await
    }

    async fn delete_model(&self, id: i64) -> Result<()> {
        self.delete(&format!("/api/models/{id}")).await
    }

    async fn download_model(&self, id: i64) -> Result<Bytes> {
        let path = format!("/api/models/{id}/download");
        let resp = self
            .send_ok(self.request(Method::GET, &path), &path)
            .await?;
        Ok(resp.bytes().await?)
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.get_json("/api/jobs").await
    }

    async fn get_job(&self, id: &str) -> Result<Job> {
        self.get_json(&format!("/api/jobs/{id}")).await
    }

    async fn list_test_results(&self) -> Result<Vec<TestResult>> {
        self.get_json("/api/test-results").await
    }

    async fn get_test_result(&self, id: i64) -> Result<TestResult> {
        self.get_json(&format!("/api/test-results/{id}")).await
    }

    async fn delete_test_result(&self, id: i64) -> Result<()> {
        self.delete(&format!("/api/test-results/{id}")).await
    }

    async fn list_comparisons(&self) -> Result<Vec<Comparison>> {
        self.get_json("/api/comparisons").await
    }

    async fn get_comparison(&self, id: i64) -> Result<Comparison> {
        self.get_json(&format!("/api/comparisons/{id}")).await
    }

    async fn delete_comparison(&self, id: i64) -> Result<()> {
        self.delete(&format!("/api/comparisons/{id}")).await
    }

    async fn health(&self) -> Result<HealthStatus> {
        let path = "/api/health";
        let resp = self.send(self.request(Method::GET, path), path).await?;
        if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
            return decode(resp).await;
        }
        decode(ensure_success(resp).await?).await
    }

    async fn get_config(&self) -> Result<ServiceConfig> {
        self.get_json("/api/config").await
    }

    async fn update_config(&self, config: &ServiceConfig) -> Result<ServiceConfig> {
        let path = "/api/config";
        let builder = self.request(Method::PUT, path).json(config);
        let resp = self.send_ok(builder, path).await?;
        decode(resp).await
    }

    async fn reload_config(&self) -> Result<ServiceConfig> {
        let path = "/api/config/reload";
        let resp = self
            .send_ok(self.request(Method::POST, path), path)
            .await?;
        decode(resp).await
    }

    async fn reconnect_db(&self) -> Result<ActionAck> {
        let path = "/api/config/reconnect-db";
        let resp = self
            .send_ok(self.request(Method::POST, path), path)
            .await?;
        decode(resp).await
    }

    async fn metrics_text(&self) -> Result<String> {
        let path = "/api/metrics";
        let resp = self
            .send_ok(self.request(Method::GET, path), path)
            .await?;
        Ok(resp.text().await?)
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Open key-value maps
// ---------------------------------------------------------------------------

/// Value kinds allowed in hyperparameter and service-config maps. `Null`
/// stands for an unset value (e.g. a random forest's unbounded `max_depth`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Null => write!(f, "null"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

pub type Hyperparameters = BTreeMap<String, ParamValue>;

/// Service settings as served by `/api/config` (DB DSN, polling intervals,
/// job concurrency limits, training-hour bounds, ...).
pub type ServiceConfig = BTreeMap<String, ParamValue>;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    GradientBoostedTree,
    RandomForest,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModelType::GradientBoostedTree => "gradient_boosted_tree",
            ModelType::RandomForest => "random_forest",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelStatus {
    Pending,
    Training,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: u64,
    pub fp: u64,
    pub tn: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingMetrics {
    pub accuracy: Option<f64>,
    pub f1_score: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub roc_auc: Option<f64>,
    /// Matthews correlation coefficient.
    pub mcc: Option<f64>,
    pub confusion_matrix: Option<ConfusionMatrix>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Any,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Any => "any",
        };
        write!(f, "{s}")
    }
}

/// Prediction target for time-based models: "does the price move by
/// `threshold_percent` in `direction` within `horizon_minutes`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBasedConfig {
    pub horizon_minutes: u32,
    pub threshold_percent: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub name: String,
    pub model_type: ModelType,
    pub status: ModelStatus,
    #[serde(default)]
    pub metrics: TrainingMetrics,
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
    /// Ordered as the model consumes them. May contain duplicates.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub time_based: Option<TimeBasedConfig>,
    pub created_at: Option<String>,
    pub train_start: Option<String>,
    pub train_end: Option<String>,
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// COMPLETED and FAILED jobs never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub job_type: String,
    /// Percent complete, 0-100. Fractional values are passed through.
    #[serde(default)]
    pub progress: f64,
    pub error: Option<String>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub result_model_id: Option<i64>,
    #[serde(default)]
    pub result_test_result_id: Option<i64>,
    #[serde(default)]
    pub result_comparison_id: Option<i64>,
}

/// What a completed job produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultRef {
    Model(i64),
    TestResult(i64),
    Comparison(i64),
}

impl Job {
    pub fn result_ref(&self) -> Option<ResultRef> {
        self.result_model_id
            .map(ResultRef::Model)
            .or(self.result_test_result_id.map(ResultRef::TestResult))
            .or(self.result_comparison_id.map(ResultRef::Comparison))
    }
}

/// Returned by every endpoint that starts server-side work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTicket {
    pub job_id: String,
    pub status: JobStatus,
}

// ---------------------------------------------------------------------------
// Test results and comparisons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub model_id: i64,
    pub test_start: Option<String>,
    pub test_end: Option<String>,
    pub accuracy: Option<f64>,
    pub f1_score: Option<f64>,
    pub roc_auc: Option<f64>,
    pub simulated_profit: Option<f64>,
    #[serde(default)]
    pub confusion_matrix: Option<ConfusionMatrix>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub id: i64,
    pub model_ids: Vec<i64>,
    /// Ranking payload; its shape is owned by the server.
    #[serde(default)]
    pub results: serde_json::Value,
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Health, metrics, acknowledgements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Error,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    #[serde(default)]
    pub db_connected: bool,
    #[serde(default)]
    pub uptime_seconds: f64,
    #[serde(default)]
    pub jobs_processed: u64,
    pub last_error: Option<String>,
}

/// One line of the `/api/metrics` text exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionAck {
    pub status: Option<String>,
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Query parameters for `POST /api/models/create/advanced`.
pub type QueryParams = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateModelRequest {
    pub name: String,
    pub model_type: ModelType,
    pub train_start: String,
    pub train_end: String,
    pub features: Vec<String>,
    pub hyperparameters: Hyperparameters,
}

impl CreateModelRequest {
    /// Features are sent as repeated `features` keys; hyperparameters as a
    /// single JSON-encoded value. A blank name or an empty feature list is
    /// rejected before anything is sent.
    pub fn query_params(&self) -> Result<QueryParams> {
        if self.name.trim().is_empty() {
            return Err(AppError::Payload("model name must not be empty".to_string()));
        }
        if self.features.is_empty() {
            return Err(AppError::Payload(format!(
                "model {} needs at least one feature",
                self.name
            )));
        }
        let mut params = vec![
            ("name".to_string(), self.name.clone()),
            ("model_type".to_string(), self.model_type.to_string()),
            ("start_date".to_string(), self.train_start.clone()),
            ("end_date".to_string(), self.train_end.clone()),
        ];
        params.extend(
            self.features
                .iter()
                .map(|f| ("features".to_string(), f.clone())),
        );
        if !self.hyperparameters.is_empty() {
            params.push((
                "hyperparameters".to_string(),
                serde_json::to_string(&self.hyperparameters)?,
            ));
        }
        Ok(params)
    }
}

/// Name and type only; the server picks default features and hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleModelRequest {
    pub name: String,
    pub model_type: ModelType,
    pub training_days: Option<u32>,
}

impl SimpleModelRequest {
    pub fn query_params(&self) -> QueryParams {
        let days = self
            .training_days
            .unwrap_or(crate::config::DEFAULT_TRAINING_DAYS);
        vec![
            ("name".to_string(), self.name.clone()),
            ("model_type".to_string(), self.model_type.to_string()),
            ("training_days".to_string(), days.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBasedModelRequest {
    pub model: CreateModelRequest,
    pub target: TimeBasedConfig,
}

impl TimeBasedModelRequest {
    pub fn query_params(&self) -> Result<QueryParams> {
        let mut params = self.model.query_params()?;
        params.push(("prediction_type".to_string(), "time_based".to_string()));
        params.push((
            "horizon_minutes".to_string(),
            self.target.horizon_minutes.to_string(),
        ));
        params.push((
            "threshold_percent".to_string(),
            self.target.threshold_percent.to_string(),
        ));
        params.push(("direction".to_string(), self.target.direction.to_string()));
        Ok(params)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestModelRequest {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareModelsRequest {
    pub model_ids: Vec<i64>,
    pub start_date: String,
    pub end_date: String,
}

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use dashmap::DashSet;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::metrics::parse_metrics;
use crate::api::TrainerApi;
use crate::error::{AppError, Result};
use crate::poller::PollHandle;
use crate::types::{
    ActionAck, Comparison, CompareModelsRequest, CreateModelRequest, HealthStatus, Job,
    JobTicket, MetricSample, Model, ServiceConfig, SimpleModelRequest, TestModelRequest,
    TestResult, TimeBasedModelRequest,
};

// ---------------------------------------------------------------------------
// StoreState
// ---------------------------------------------------------------------------

/// Everything the store caches. Readers get clones, never references.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub models: Vec<Model>,
    pub current_model: Option<Model>,
    pub jobs: Vec<Job>,
    pub current_job: Option<Job>,
    pub test_results: Vec<TestResult>,
    pub current_test_result: Option<TestResult>,
    pub comparisons: Vec<Comparison>,
    pub current_comparison: Option<Comparison>,
    pub health: Option<HealthStatus>,
    pub config: Option<ServiceConfig>,
    pub metrics: Vec<MetricSample>,
    /// Shared by every in-flight action; the last one to settle decides it.
    pub is_loading: bool,
    /// Last failure message. Overwritten by the next failure.
    pub error: Option<String>,
    /// When the most recent successful fetch landed.
    pub last_updated: Option<SystemTime>,
    /// Sorted ids picked for comparison. Filled in by `snapshot()`; the live
    /// set is the store's `DashSet`.
    pub selected_model_ids: Vec<i64>,
}

// ---------------------------------------------------------------------------
// EntityStore
// ---------------------------------------------------------------------------

/// Single source of truth for server-derived entities. Only its actions
/// mutate state; each mutation is one synchronous step under the lock, so
/// the lock is never held across a network call.
pub struct EntityStore {
    api: Arc<dyn TrainerApi>,
    state: Mutex<StoreState>,
    /// model ids picked for comparison
    selected_model_ids: DashSet<i64>,
    /// Bumped after every mutation; views re-render on change.
    revision: watch::Sender<u64>,
    poll_period: Duration,
    poller: Mutex<Option<PollHandle>>,
}

impl EntityStore {
    pub fn new(api: Arc<dyn TrainerApi>, poll_period: Duration) -> Arc<Self> {
        let (revision, _) = watch::channel(0);
        Arc::new(Self {
            api,
            state: Mutex::new(StoreState::default()),
            selected_model_ids: DashSet::new(),
            revision,
            poll_period,
            poller: Mutex::new(None),
        })
    }

    // --- reading ---

    pub fn snapshot(&self) -> StoreState {
        let mut state = self.read(Clone::clone);
        state.selected_model_ids = self.selected_model_ids();
        state
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn models(&self) -> Vec<Model> {
        self.read(|s| s.models.clone())
    }

    pub fn get_model(&self, id: i64) -> Option<Model> {
        self.read(|s| s.models.iter().find(|m| m.id == id).cloned())
    }

    pub fn current_model(&self) -> Option<Model> {
        self.read(|s| s.current_model.clone())
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.read(|s| s.jobs.clone())
    }

    pub fn current_job(&self) -> Option<Job> {
        self.read(|s| s.current_job.clone())
    }

    pub fn test_results(&self) -> Vec<TestResult> {
        self.read(|s| s.test_results.clone())
    }

    pub fn comparisons(&self) -> Vec<Comparison> {
        self.read(|s| s.comparisons.clone())
    }

    pub fn health(&self) -> Option<HealthStatus> {
        self.read(|s| s.health.clone())
    }

    pub fn config(&self) -> Option<ServiceConfig> {
        self.read(|s| s.config.clone())
    }

    pub fn metrics(&self) -> Vec<MetricSample> {
        self.read(|s| s.metrics.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.read(|s| s.is_loading)
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    pub fn last_updated(&self) -> Option<SystemTime> {
        self.read(|s| s.last_updated)
    }

    /// Sorted for stable display; membership is what matters.
    pub fn selected_model_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.selected_model_ids.iter().map(|r| *r.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_selected(&self, id: i64) -> bool {
        self.selected_model_ids.contains(&id)
    }

    // --- fetch-collection actions ---

    pub async fn fetch_models(&self) {
        self.fetch("fetch_models", self.api.list_models(), |s, models| {
            s.models = models;
        })
        .await;
    }

    pub async fn fetch_jobs(&self) {
        self.fetch("fetch_jobs", self.api.list_jobs(), |s, jobs| s.jobs = jobs)
            .await;
    }

    pub async fn fetch_test_results(&self) {
        self.fetch("fetch_test_results", self.api.list_test_results(), |s, results| {
            s.test_results = results;
        })
        .await;
    }

    pub async fn fetch_comparisons(&self) {
        self.fetch("fetch_comparisons", self.api.list_comparisons(), |s, comparisons| {
            s.comparisons = comparisons;
        })
        .await;
    }

    pub async fn fetch_health(&self) {
        self.fetch("fetch_health", self.api.health(), |s, health| {
            s.health = Some(health);
        })
        .await;
    }

    pub async fn fetch_config(&self) {
        self.fetch("fetch_config", self.api.get_config(), |s, config| {
            s.config = Some(config);
        })
        .await;
    }

    pub async fn fetch_metrics(&self) {
        self.fetch("fetch_metrics", self.api.metrics_text(), |s, text| {
            s.metrics = parse_metrics(&text);
        })
        .await;
    }

    // --- fetch-single actions ---
    // The id need not be in the cached collection. Errors land in `error`;
    // the fetched entity is returned for callers that poll.

    pub async fn fetch_model(&self, id: i64) -> Option<Model> {
        self.fetch("fetch_model", self.api.get_model(id), |s, model| {
            s.current_model = Some(model.clone());
            model
        })
        .await
    }

    pub async fn fetch_job(&self, id: &str) -> Option<Job> {
        self.fetch("fetch_job", self.api.get_job(id), |s, job| {
            s.current_job = Some(job.clone());
            job
        })
        .await
    }

    pub async fn fetch_test_result(&self, id: i64) -> Option<TestResult> {
        self.fetch("fetch_test_result", self.api.get_test_result(id), |s, result| {
            s.current_test_result = Some(result.clone());
            result
        })
        .await
    }

    pub async fn fetch_comparison(&self, id: i64) -> Option<Comparison> {
        self.fetch("fetch_comparison", self.api.get_comparison(id), |s, comparison| {
            s.current_comparison = Some(comparison.clone());
            comparison
        })
        .await
    }

    // --- mutating actions ---
    // Creation returns a job ticket only; callers refetch jobs to see it.

    pub async fn create_model(&self, req: &CreateModelRequest) -> Result<JobTicket> {
        let params = self.prepare("create_model", req.query_params())?;
        self.mutate("create_model", self.api.create_model(&params), |_, _| {})
            .await
    }

    pub async fn create_simple_model(&self, req: &SimpleModelRequest) -> Result<JobTicket> {
        let params = req.query_params();
        self.mutate("create_simple_model", self.api.create_model(&params), |_, _| {})
            .await
    }

    pub async fn create_time_based_model(
        &self,
        req: &TimeBasedModelRequest,
    ) -> Result<JobTicket> {
        let params = self.prepare("create_time_based_model", req.query_params())?;
        self.mutate("create_time_based_model", self.api.create_model(&params), |_, _| {})
            .await
    }

    pub async fn test_model(&self, id: i64, req: &TestModelRequest) -> Result<JobTicket> {
        self.mutate("test_model", self.api.test_model(id, req), |_, _| {})
            .await
    }

    pub async fn compare_models(&self, req: &CompareModelsRequest) -> Result<JobTicket> {
        self.mutate("compare_models", self.api.compare_models(req), |_, _| {})
            .await
    }

    pub async fn delete_model(&self, id: i64) -> Result<()> {
        self.mutate("delete_model", self.api.delete_model(id), |s, _| {
            s.models.retain(|m| m.id != id);
            if s.current_model.as_ref().is_some_and(|m| m.id == id) {
                s.current_model = None;
            }
            self.selected_model_ids.remove(&id);
        })
        .await
    }

    pub async fn delete_test_result(&self, id: i64) -> Result<()> {
        self.mutate("delete_test_result", self.api.delete_test_result(id), |s, _| {
            s.test_results.retain(|r| r.id != id);
            if s.current_test_result.as_ref().is_some_and(|r| r.id == id) {
                s.current_test_result = None;
            }
        })
        .await
    }

    pub async fn delete_comparison(&self, id: i64) -> Result<()> {
        self.mutate("delete_comparison", self.api.delete_comparison(id), |s, _| {
            s.comparisons.retain(|c| c.id != id);
            if s.current_comparison.as_ref().is_some_and(|c| c.id == id) {
                s.current_comparison = None;
            }
        })
        .await
    }

    pub async fn update_config(&self, config: &ServiceConfig) -> Result<ServiceConfig> {
        self.mutate("update_config", self.api.update_config(config), |s, updated| {
            s.config = Some(updated.clone());
        })
        .await
    }

    pub async fn reload_config(&self) -> Result<ServiceConfig> {
        self.mutate("reload_config", self.api.reload_config(), |s, reloaded| {
            s.config = Some(reloaded.clone());
        })
        .await
    }

    pub async fn reconnect_db(&self) -> Result<ActionAck> {
        self.mutate("reconnect_db", self.api.reconnect_db(), |_, _| {})
            .await
    }

    /// Raw model artifact. Leaves cached state, loading and error untouched.
    pub async fn download_model(&self, id: i64) -> Result<Bytes> {
        let bytes = self.api.download_model(id).await?;
        debug!(model_id = id, size = bytes.len(), "Model artifact downloaded");
        Ok(bytes)
    }

    // --- selection ---

    pub fn select_model(&self, id: i64) {
        if self.selected_model_ids.insert(id) {
            self.notify();
        }
    }

    pub fn deselect_model(&self, id: i64) {
        if self.selected_model_ids.remove(&id).is_some() {
            self.notify();
        }
    }

    pub fn clear_model_selection(&self) {
        if !self.selected_model_ids.is_empty() {
            self.selected_model_ids.clear();
            self.notify();
        }
    }

    // --- polling ---

    /// Start refreshing health and jobs every poll period. Returns false if a
    /// poller is already running.
    pub fn start_polling(self: &Arc<Self>) -> bool {
        let mut slot = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("Poller already running");
            return false;
        }
        *slot = Some(PollHandle::spawn(self, self.poll_period));
        info!(period_secs = self.poll_period.as_secs(), "Polling started");
        true
    }

    /// No-op when nothing is polling.
    pub fn stop_polling(&self) {
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Completed ticks of the current poller, 0 when idle.
    pub fn poll_ticks(&self) -> u64 {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, PollHandle::ticks)
    }

    // --- internals ---

    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn update<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let result = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut state)
        };
        self.notify();
        result
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    fn begin(&self, action: &'static str) {
        debug!(action, "Action started");
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    pub(crate) fn fail(&self, action: &'static str, err: &AppError) {
        warn!(action, error = %err, "Action failed");
        let message = err.to_string();
        self.update(|s| {
            s.is_loading = false;
            s.error = Some(message);
        });
    }

    /// Record a failure that happened before any request was sent.
    fn prepare<T>(&self, action: &'static str, built: Result<T>) -> Result<T> {
        built.inspect_err(|e| self.fail(action, e))
    }

    /// Fetch contract: failures are recorded, never returned.
    async fn fetch<T, R>(
        &self,
        action: &'static str,
        call: impl Future<Output = Result<T>>,
        apply: impl FnOnce(&mut StoreState, T) -> R,
    ) -> Option<R> {
        self.begin(action);
        match call.await {
            Ok(value) => {
                let result = self.update(|s| {
                    s.is_loading = false;
                    s.last_updated = Some(SystemTime::now());
                    apply(s, value)
                });
                debug!(action, "Fetch complete");
                Some(result)
            }
            Err(e) => {
                self.fail(action, &e);
                None
            }
        }
    }

    /// Mutation contract: failures are recorded and returned to the caller.
    async fn mutate<T>(
        &self,
        action: &'static str,
        call: impl Future<Output = Result<T>>,
        apply: impl FnOnce(&mut StoreState, &T),
    ) -> Result<T> {
        self.begin(action);
        match call.await {
            Ok(value) => {
                self.update(|s| {
                    s.is_loading = false;
                    apply(s, &value);
                });
                info!(action, "Action complete");
                Ok(value)
            }
            Err(e) => {
                self.fail(action, &e);
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{health_json, job_json, model_json, FakeApi};
    use crate::types::{Direction, HealthState, ModelType, ParamValue, TimeBasedConfig};
    use serde_json::json;

    fn store_with(api: &Arc<FakeApi>) -> Arc<EntityStore> {
        EntityStore::new(api.clone(), Duration::from_secs(30))
    }

    fn model_ids(store: &EntityStore) -> Vec<i64> {
        store.models().iter().map(|m| m.id).collect()
    }

    #[tokio::test]
    async fn fetch_models_empty_list_clears_error() {
        let api = Arc::new(FakeApi::new());
        api.fail("list_jobs", "boom");
        api.respond("list_models", json!([]));
        let store = store_with(&api);

        store.fetch_jobs().await;
        assert!(store.error().is_some());

        store.fetch_models().await;
        let state = store.snapshot();
        assert!(state.models.is_empty());
        assert!(state.error.is_none());
        assert!(!state.is_loading);
        assert!(state.last_updated.is_some());
    }

    #[tokio::test]
    async fn fetch_models_failure_keeps_previous_collection() {
        let api = Arc::new(FakeApi::new());
        api.respond("list_models", json!([model_json(1, "alpha")]))
            .fail("list_models", "network unreachable");
        let store = store_with(&api);

        store.fetch_models().await;
        let first_update = store.last_updated();
        store.fetch_models().await;

        assert_eq!(model_ids(&store), vec![1]);
        let error = store.error().unwrap();
        assert!(error.contains("network unreachable"), "error={error}");
        assert!(!store.is_loading());
        assert_eq!(store.last_updated(), first_update);
    }

    #[tokio::test]
    async fn fetch_collection_is_full_replace() {
        let api = Arc::new(FakeApi::new());
        api.respond("list_models", json!([model_json(1, "alpha"), model_json(2, "beta")]))
            .respond("list_models", json!([model_json(2, "beta"), model_json(3, "gamma")]));
        let store = store_with(&api);

        store.fetch_models().await;
        store.fetch_models().await;
        assert_eq!(model_ids(&store), vec![2, 3]);
    }

    #[tokio::test]
    async fn fetch_single_fills_current_slot_only() {
        let api = Arc::new(FakeApi::new());
        api.respond("get_model", model_json(42, "solo"));
        let store = store_with(&api);

        let fetched = store.fetch_model(42).await.unwrap();
        assert_eq!(fetched.id, 42);
        assert_eq!(store.current_model().map(|m| m.id), Some(42));
        assert!(store.models().is_empty());
        // Duplicate feature entries survive; de-duplication is the classifier's job.
        assert_eq!(fetched.features.len(), 3);
    }

    #[tokio::test]
    async fn fetch_test_result_fills_current_slot() {
        let api = Arc::new(FakeApi::new());
        api.respond(
            "get_test_result",
            json!({
                "id": 12,
                "model_id": 5,
                "accuracy": 0.64,
                "confusion_matrix": { "tp": 40, "fp": 10, "tn": 35, "fn": 15 }
            }),
        );
        let store = store_with(&api);

        let fetched = store.fetch_test_result(12).await.unwrap();

        assert_eq!(fetched.model_id, 5);
        assert_eq!(fetched.confusion_matrix.map(|m| m.fn_), Some(15));
        assert_eq!(store.snapshot().current_test_result, Some(fetched));
        assert!(store.test_results().is_empty());
        assert!(store.last_updated().is_some());
    }

    #[tokio::test]
    async fn collection_fetch_tolerates_fractional_progress_and_null_params() {
        let api = Arc::new(FakeApi::new());
        let mut job = job_json("j1", "RUNNING", 0);
        job["progress"] = json!(45.5);
        let mut model = model_json(1, "forest");
        model["hyperparameters"] = json!({ "max_depth": null, "n_estimators": 200 });
        api.respond("list_jobs", json!([job, job_json("j2", "PENDING", 0)]))
            .respond("list_models", json!([model]));
        let store = store_with(&api);

        store.fetch_jobs().await;
        store.fetch_models().await;

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].progress, 45.5);
        let models = store.models();
        assert_eq!(models[0].hyperparameters["max_depth"], ParamValue::Null);
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn fetch_single_failure_returns_none_and_records_error() {
        let api = Arc::new(FakeApi::new());
        api.fail("get_job", "timed out");
        let store = store_with(&api);

        assert!(store.fetch_job("job-1").await.is_none());
        assert!(store.error().unwrap().contains("timed out"));
        assert!(store.current_job().is_none());
    }

    #[tokio::test]
    async fn selection_is_idempotent() {
        let api = Arc::new(FakeApi::new());
        let store = store_with(&api);

        store.select_model(1);
        store.select_model(2);
        store.select_model(1);
        assert_eq!(store.selected_model_ids(), vec![1, 2]);

        store.deselect_model(9);
        assert_eq!(store.selected_model_ids(), vec![1, 2]);

        store.deselect_model(1);
        assert_eq!(store.selected_model_ids(), vec![2]);
        assert!(!store.is_selected(1));

        store.clear_model_selection();
        store.clear_model_selection();
        assert!(store.selected_model_ids().is_empty());
    }

    #[tokio::test]
    async fn snapshot_carries_sorted_selection() {
        let api = Arc::new(FakeApi::new());
        let store = store_with(&api);
        assert!(store.snapshot().selected_model_ids.is_empty());

        store.select_model(7);
        store.select_model(3);
        assert_eq!(store.snapshot().selected_model_ids, vec![3, 7]);

        store.deselect_model(7);
        assert_eq!(store.snapshot().selected_model_ids, vec![3]);
    }

    #[tokio::test]
    async fn selection_leaves_error_alone() {
        let api = Arc::new(FakeApi::new());
        api.fail("list_models", "down");
        let store = store_with(&api);

        store.fetch_models().await;
        store.select_model(1);
        store.clear_model_selection();
        assert!(store.error().is_some());
    }

    #[tokio::test]
    async fn delete_model_patches_collection_and_selection() {
        let api = Arc::new(FakeApi::new());
        api.respond("list_models", json!([model_json(1, "alpha"), model_json(2, "beta")]))
            .respond("get_model", model_json(1, "alpha"))
            .respond("delete_model", json!({ "message": "deleted" }));
        let store = store_with(&api);

        store.fetch_models().await;
        store.fetch_model(1).await;
        store.select_model(1);
        store.select_model(2);

        store.delete_model(1).await.unwrap();

        assert_eq!(model_ids(&store), vec![2]);
        assert_eq!(store.selected_model_ids(), vec![2]);
        assert!(store.current_model().is_none());
        assert_eq!(api.calls("list_models"), 1);
    }

    #[tokio::test]
    async fn failed_delete_records_error_and_returns_it() {
        let api = Arc::new(FakeApi::new());
        api.respond("list_models", json!([model_json(1, "alpha")]))
            .fail("delete_model", "model is in use");
        let store = store_with(&api);

        store.fetch_models().await;
        store.select_model(1);

        let err = store.delete_model(1).await.unwrap_err();
        assert!(err.to_string().contains("model is in use"));
        assert_eq!(store.error(), Some(err.to_string()));
        assert_eq!(model_ids(&store), vec![1]);
        assert!(store.is_selected(1));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn create_returns_ticket_without_touching_jobs() {
        let api = Arc::new(FakeApi::new());
        api.respond("create_model", json!({ "job_id": "job-9", "status": "PENDING" }));
        let store = store_with(&api);

        let req = CreateModelRequest {
            name: "btc-gbt".to_string(),
            model_type: ModelType::GradientBoostedTree,
            train_start: "2026-09-01".to_string(),
            train_end: "2026-10-01".to_string(),
            features: vec!["price_close".to_string(), "volume_spike".to_string()],
            hyperparameters: Default::default(),
        };
        let ticket = store.create_model(&req).await.unwrap();

        assert_eq!(ticket.job_id, "job-9");
        assert!(store.jobs().is_empty());
        let params = api.last_params().unwrap();
        assert!(params.contains(&("features".to_string(), "volume_spike".to_string())));
    }

    #[tokio::test]
    async fn create_time_based_model_sends_target_params() {
        let api = Arc::new(FakeApi::new());
        api.respond("create_model", json!({ "job_id": "job-tb", "status": "PENDING" }));
        let store = store_with(&api);

        let req = TimeBasedModelRequest {
            model: CreateModelRequest {
                name: "btc-15m-up".to_string(),
                model_type: ModelType::GradientBoostedTree,
                train_start: "2026-09-01".to_string(),
                train_end: "2026-10-01".to_string(),
                features: vec!["price_close".to_string()],
                hyperparameters: Default::default(),
            },
            target: TimeBasedConfig {
                horizon_minutes: 15,
                threshold_percent: 0.5,
                direction: Direction::Up,
            },
        };
        let ticket = store.create_time_based_model(&req).await.unwrap();

        assert_eq!(ticket.job_id, "job-tb");
        let params = api.last_params().unwrap();
        for expected in [
            ("name", "btc-15m-up"),
            ("features", "price_close"),
            ("prediction_type", "time_based"),
            ("horizon_minutes", "15"),
            ("threshold_percent", "0.5"),
            ("direction", "up"),
        ] {
            let pair = (expected.0.to_string(), expected.1.to_string());
            assert!(params.contains(&pair), "missing {pair:?}");
        }
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn invalid_create_request_fails_before_sending() {
        let api = Arc::new(FakeApi::new());
        api.respond("create_model", json!({ "job_id": "never", "status": "PENDING" }));
        let store = store_with(&api);

        let req = CreateModelRequest {
            name: "no-features".to_string(),
            model_type: ModelType::RandomForest,
            train_start: "2026-09-01".to_string(),
            train_end: "2026-10-01".to_string(),
            features: Vec::new(),
            hyperparameters: Default::default(),
        };
        let err = store.create_model(&req).await.unwrap_err();

        assert!(matches!(err, AppError::Payload(_)));
        assert_eq!(store.error(), Some(err.to_string()));
        assert!(!store.is_loading());
        assert_eq!(api.calls("create_model"), 0);
        assert!(api.last_params().is_none());
    }

    #[tokio::test]
    async fn create_simple_model_uses_advanced_endpoint() {
        let api = Arc::new(FakeApi::new());
        api.respond("create_model", json!({ "job_id": "job-1", "status": "PENDING" }));
        let store = store_with(&api);

        let req = SimpleModelRequest {
            name: "quick".to_string(),
            model_type: ModelType::RandomForest,
            training_days: Some(7),
        };
        store.create_simple_model(&req).await.unwrap();
        let params = api.last_params().unwrap();
        assert!(params.contains(&("training_days".to_string(), "7".to_string())));
        assert!(params.contains(&("model_type".to_string(), "random_forest".to_string())));
    }

    #[tokio::test]
    async fn test_and_compare_return_tickets() {
        let api = Arc::new(FakeApi::new());
        api.respond("test_model", json!({ "job_id": "t-1", "status": "PENDING" }))
            .respond("compare_models", json!({ "job_id": "c-1", "status": "RUNNING" }));
        let store = store_with(&api);

        let window = TestModelRequest {
            start_date: "2026-10-01".to_string(),
            end_date: "2026-10-08".to_string(),
        };
        assert_eq!(store.test_model(5, &window).await.unwrap().job_id, "t-1");

        let compare = CompareModelsRequest {
            model_ids: vec![5, 6],
            start_date: window.start_date.clone(),
            end_date: window.end_date.clone(),
        };
        assert_eq!(store.compare_models(&compare).await.unwrap().job_id, "c-1");
    }

    #[tokio::test]
    async fn delete_test_result_and_comparison_patch_collections() {
        let api = Arc::new(FakeApi::new());
        api.respond(
            "list_test_results",
            json!([
                { "id": 1, "model_id": 5, "accuracy": 0.6 },
                { "id": 2, "model_id": 5, "accuracy": 0.7 }
            ]),
        )
        .respond("delete_test_result", json!(null))
        .respond("list_comparisons", json!([{ "id": 8, "model_ids": [5, 6] }]))
        .respond("get_comparison", json!({ "id": 8, "model_ids": [5, 6] }))
        .respond("delete_comparison", json!(null));
        let store = store_with(&api);

        store.fetch_test_results().await;
        store.delete_test_result(1).await.unwrap();
        let ids: Vec<i64> = store.test_results().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);

        store.fetch_comparisons().await;
        store.fetch_comparison(8).await;
        store.delete_comparison(8).await.unwrap();
        assert!(store.comparisons().is_empty());
        assert!(store.snapshot().current_comparison.is_none());
    }

    #[tokio::test]
    async fn config_actions_replace_cached_config() {
        let api = Arc::new(FakeApi::new());
        api.respond("get_config", json!({ "max_concurrent_jobs": 2 }))
            .respond("update_config", json!({ "max_concurrent_jobs": 4 }))
            .respond("reload_config", json!({ "max_concurrent_jobs": 3, "db_dsn": "pg" }))
            .respond("reconnect_db", json!({ "status": "ok" }));
        let store = store_with(&api);

        store.fetch_config().await;
        let mut edited = store.config().unwrap();
        edited.insert("max_concurrent_jobs".to_string(), ParamValue::Number(4.0));
        store.update_config(&edited).await.unwrap();
        assert_eq!(
            store.config().unwrap()["max_concurrent_jobs"],
            ParamValue::Number(4.0)
        );

        store.reload_config().await.unwrap();
        assert_eq!(store.config().unwrap().len(), 2);

        let ack = store.reconnect_db().await.unwrap();
        assert_eq!(ack.status.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn health_and_metrics_are_cached() {
        let api = Arc::new(FakeApi::new());
        api.respond("health", health_json("degraded", false))
            .respond("metrics_text", json!("# comment\njobs_total 7\n"));
        let store = store_with(&api);

        store.fetch_health().await;
        store.fetch_metrics().await;

        let health = store.health().unwrap();
        assert_eq!(health.status, HealthState::Degraded);
        assert!(!health.db_connected);
        let metrics = store.metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].value, 7.0);
    }

    #[tokio::test]
    async fn download_does_not_touch_state() {
        let api = Arc::new(FakeApi::new());
        api.fail("list_models", "down").respond("download_model", json!("PK"));
        let store = store_with(&api);

        store.fetch_models().await;
        let before = store.snapshot();
        let bytes = store.download_model(1).await.unwrap();

        assert_eq!(bytes.as_ref(), b"PK");
        assert_eq!(store.error(), before.error);
        assert_eq!(store.last_updated(), before.last_updated);
    }

    #[tokio::test(start_paused = true)]
    async fn last_resolved_fetch_wins() {
        let api = Arc::new(FakeApi::new());
        // Issued first, resolves last.
        api.respond_after("list_models", Duration::from_millis(50), json!([model_json(1, "old")]))
            .respond_after("list_models", Duration::from_millis(10), json!([model_json(2, "new")]));
        let store = store_with(&api);

        tokio::join!(store.fetch_models(), store.fetch_models());

        assert_eq!(model_ids(&store), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_flag_is_shared_across_actions() {
        let api = Arc::new(FakeApi::new());
        api.respond_after("list_models", Duration::from_millis(50), json!([model_json(1, "a")]))
            .respond_after("list_jobs", Duration::from_millis(10), json!([]));
        let store = store_with(&api);

        let slow = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.fetch_models().await })
        };
        tokio::task::yield_now().await;
        assert!(store.is_loading());

        store.fetch_jobs().await;
        // fetch_models is still in flight, but the faster action cleared the flag.
        assert!(!store.is_loading());
        assert!(store.models().is_empty());

        slow.await.unwrap();
        assert_eq!(model_ids(&store), vec![1]);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn subscribers_see_revision_bumps() {
        let api = Arc::new(FakeApi::new());
        api.respond("list_jobs", json!([job_json("j1", "RUNNING", 10)]));
        let store = store_with(&api);
        let mut rx = store.subscribe();

        store.fetch_jobs().await;
        assert!(rx.has_changed().unwrap());
        let seen = *rx.borrow_and_update();
        assert!(seen >= 2);

        store.select_model(3);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        store.select_model(3);
        assert!(!rx.has_changed().unwrap());
    }
}

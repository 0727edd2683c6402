use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use trainer_console::api::http::HttpApiClient;
use trainer_console::api::latency::RequestLatency;
use trainer_console::api::metrics::metric_total;
use trainer_console::config::Config;
use trainer_console::error::Result;
use trainer_console::features::summary_counts;
use trainer_console::jobs::{await_job, JobOutcome, JobWait};
use trainer_console::state::{EntityStore, StoreState};
use trainer_console::types::Model;

/// Store notifications arrive in bursts (one per action step); wait this long
/// before rendering so a poll tick prints one line.
const RENDER_DEBOUNCE_MS: u64 = 250;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.as_slice() {
        [cmd, job_id] if cmd == "wait" => wait_for(cfg, job_id).await,
        [] => watch(cfg).await,
        _ => {
            eprintln!("usage: trainer-console [wait <job_id>]");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

/// Live console: bootstrap, then one summary line per store update burst.
async fn watch(cfg: Config) -> Result<()> {
    let client = HttpApiClient::new(&cfg)?;
    let latency = client.latency();
    let store = EntityStore::new(Arc::new(client), cfg.poll_interval);
    info!("Training service at {}", cfg.api_base_url);

    // --- Bootstrap ---
    tokio::join!(store.fetch_models(), store.fetch_config(), store.fetch_metrics());
    if let Some(e) = store.error() {
        warn!("Bootstrap incomplete: {e}");
    }

    let models = store.models();
    info!("{} models loaded", models.len());
    for model in &models {
        log_model(model);
    }
    if let Some(config) = store.config() {
        info!("Service config: {} settings", config.len());
    }
    if let Some(processed) = metric_total(&store.metrics(), "jobs_processed_total") {
        info!("Jobs processed (metrics): {processed:.0}");
    }

    // --- Live view ---
    let mut changes = store.subscribe();
    store.start_polling();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(RENDER_DEBOUNCE_MS)).await;
                changes.borrow_and_update();
                let state = store.snapshot();
                if !state.is_loading {
                    log_summary(&state, &latency);
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    store.stop_polling();
    Ok(())
}

/// Block until a job finishes, then report what it produced.
async fn wait_for(cfg: Config, job_id: &str) -> Result<()> {
    let client = HttpApiClient::new(&cfg)?;
    let store = EntityStore::new(Arc::new(client), cfg.poll_interval);
    let wait = JobWait::from_config(&cfg);
    info!(
        job_id,
        interval_secs = wait.interval().as_secs(),
        timeout_secs = wait.timeout().as_secs(),
        "Waiting for job"
    );

    match await_job(&store, job_id, wait).await {
        JobOutcome::Completed(job) => {
            info!("Job {} completed: {:?}", job.id, job.result_ref());
            Ok(())
        }
        outcome => outcome.into_result().map(|_| ()),
    }
}

fn log_model(model: &Model) {
    let counts = summary_counts(&model.features);
    info!(
        model_id = model.id,
        name = %model.name,
        status = ?model.status,
        "MODEL {} | {} | acc: {} | features: {} base, {} engineering, {} flag ({} unique)",
        model.id,
        model.model_type,
        fmt_metric(model.metrics.accuracy),
        counts.base,
        counts.engineering,
        counts.flag,
        counts.total,
    );
}

fn log_summary(state: &StoreState, latency: &RequestLatency) {
    let health = state
        .health
        .as_ref()
        .map(|h| format!("{} (db: {})", h.status, if h.db_connected { "up" } else { "down" }))
        .unwrap_or_else(|| "unknown".to_string());
    let active_jobs = state.jobs.iter().filter(|j| !j.status.is_terminal()).count();
    let (p50, p95, p99) = latency.percentiles();

    info!(
        "STATUS | health: {} | jobs: {} active / {} total | api p50/p95/p99: {}/{}/{}",
        health,
        active_jobs,
        state.jobs.len(),
        fmt_us(p50),
        fmt_us(p95),
        fmt_us(p99),
    );
    for job in state.jobs.iter().filter(|j| !j.status.is_terminal()) {
        info!("  job {} [{}] {} {:.0}%", job.id, job.job_type, job.status, job.progress);
    }
    if let Some(err) = &state.error {
        warn!("Last error: {err}");
    }
}

fn fmt_metric(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.3}")).unwrap_or_else(|| "n/a".to_string())
}

fn fmt_us(v: Option<u64>) -> String {
    v.map(|us| format!("{:.1}ms", us as f64 / 1000.0))
        .unwrap_or_else(|| "n/a".to_string())
}

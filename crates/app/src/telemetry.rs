use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{
    BuildError as PrometheusBuildError, PrometheusBuilder, PrometheusHandle,
};
use std::{
    sync::{Mutex, OnceLock},
    time::Instant,
};
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self as tracing_fmt, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use pet_registry_util::{AppConfig, Environment};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to initialize tracing: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),
    #[error("failed to initialize prometheus recorder: {0}")]
    Metrics(#[from] PrometheusBuildError),
}

static TRACING_INIT: OnceLock<()> = OnceLock::new();
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static METRICS_INSTALL_GUARD: OnceLock<Mutex<()>> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_git_sha() -> &'static str {
    option_env!("GIT_SHA").unwrap_or("unknown")
}

pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryError> {
    if TRACING_INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base = tracing_fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_timer(UtcTime::rfc_3339());

    match config.environment {
        Environment::Development | Environment::Test => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(base.pretty())
                .try_init()?;
        }
        Environment::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(base.json())
                .try_init()?;
        }
    }

    TRACING_INIT.set(()).ok();
    tracing::info!(
        stage = "telemetry",
        env = %config.environment.as_str(),
        version = BUILD_VERSION,
        git_sha = build_git_sha(),
        "tracing initialized"
    );
    Ok(())
}

/// Installs the Prometheus recorder once per process and returns its handle.
pub fn init_metrics() -> Result<PrometheusHandle, TelemetryError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let guard = METRICS_INSTALL_GUARD
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("metrics install guard poisoned");

    if let Some(handle) = METRICS_HANDLE.get() {
        drop(guard);
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    METRICS_HANDLE.set(handle.clone()).ok();
    drop(guard);

    describe_gauge!("app_build_info", "Build metadata for the running binary");
    describe_gauge!("app_uptime_seconds", "Seconds since the process started");
    describe_gauge!(
        "breed_catalog_entries",
        "Number of breeds held by the in-memory catalog"
    );
    describe_histogram!(
        "breed_catalog_load_seconds",
        "Time spent fetching and indexing the breed catalog at startup"
    );
    describe_counter!(
        "pet_requests_total",
        "Count of pet API requests, labelled by route and result"
    );
    START_TIME.get_or_init(Instant::now);

    Ok(handle)
}

pub fn render_metrics(handle: &PrometheusHandle) -> String {
    let mut body = handle.render();
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }

    body.push_str("# TYPE app_build_info gauge\n");
    body.push_str(&format!(
        "app_build_info{{version=\"{}\",git=\"{}\"}} 1\n",
        BUILD_VERSION,
        build_git_sha()
    ));

    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs_f64())
        .unwrap_or_default();
    body.push_str("# TYPE app_uptime_seconds gauge\n");
    body.push_str(&format!("app_uptime_seconds {}\n", uptime));

    body
}

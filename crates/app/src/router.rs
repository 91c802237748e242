use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use pet_registry_core::BreedCatalog;
use pet_registry_storage::PetStore;

use crate::{pets, telemetry};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Shared state handed to every request handler.
///
/// The breed catalog is built before the state exists and is only ever read.
#[derive(Clone)]
pub struct AppState<S> {
    metrics: PrometheusHandle,
    catalog: Arc<BreedCatalog>,
    store: S,
    clock: Clock,
}

impl<S: PetStore> AppState<S> {
    pub fn new(metrics: PrometheusHandle, catalog: BreedCatalog, store: S) -> Self {
        Self {
            metrics,
            catalog: Arc::new(catalog),
            store,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn catalog(&self) -> &BreedCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router<S: PetStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics::<S>))
        .route("/pets", post(pets::create::<S>))
        .route("/pets/", get(pets::missing_id))
        .route("/pets/:id", get(pets::get::<S>))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics<S: PetStore>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .unwrap()
}

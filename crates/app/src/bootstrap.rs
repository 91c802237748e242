use std::time::Instant;

use metrics::{gauge, histogram};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use pet_registry_breeds::{BreedFetcher, BreedSource, BreedSourceError};
use pet_registry_core::{BreedCatalog, CatalogError};
use pet_registry_storage::PetStore;
use pet_registry_util::BreedSourceConfig;

use crate::router::AppState;

/// Failures that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("breed source unavailable: {0}")]
    SourceUnavailable(#[from] BreedSourceError),
    #[error("breed catalog build failed: {0}")]
    CatalogBuildFailed(#[from] CatalogError),
}

/// Resolves the configured breed source.
pub fn breed_source(config: &BreedSourceConfig) -> Result<BreedSource, StartupError> {
    let source = match config {
        BreedSourceConfig::Remote {
            endpoint: Some(endpoint),
        } => BreedSource::remote(endpoint)?,
        BreedSourceConfig::Remote { endpoint: None } => BreedSource::default_remote()?,
        BreedSourceConfig::Fixture { path } => BreedSource::Fixture(path.clone()),
    };
    Ok(source)
}

/// Fetches the breed payload once and indexes it.
pub async fn load_breed_catalog(
    fetcher: &BreedFetcher,
    source: &BreedSource,
) -> Result<BreedCatalog, StartupError> {
    let start = Instant::now();
    let mode = source.mode();
    let location = source.location();

    let payload = fetcher.fetch(source).await.map_err(|err| {
        error!(stage = "catalog", mode, %location, error = %err, "unable to load breed data");
        err
    })?;

    let catalog = BreedCatalog::from_payload(&payload).map_err(|err| {
        error!(stage = "catalog", mode, %location, error = %err, "cannot decode breed payload");
        err
    })?;

    if catalog.replaced() > 0 {
        warn!(
            stage = "catalog",
            replaced = catalog.replaced(),
            "breed payload repeats ids; later entries kept"
        );
    }
    if catalog.is_empty() {
        warn!(stage = "catalog", mode, %location, "breed catalog is empty; pet creation will be rejected");
    }

    debug!(stage = "catalog", ids = ?catalog.ids(), "indexed breed ids");
    gauge!("breed_catalog_entries").set(catalog.len() as f64);
    histogram!("breed_catalog_load_seconds").record(start.elapsed().as_secs_f64());
    info!(
        stage = "catalog",
        mode,
        %location,
        entries = catalog.len(),
        bytes = payload.len(),
        "breed catalog loaded"
    );

    Ok(catalog)
}

/// Loads the catalog and assembles the handler state around `store`.
pub async fn build_state<S: PetStore>(
    metrics: PrometheusHandle,
    store: S,
    fetcher: &BreedFetcher,
    source: &BreedSource,
) -> Result<AppState<S>, StartupError> {
    let catalog = load_breed_catalog(fetcher, source).await?;
    Ok(AppState::new(metrics, catalog, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Write, path::PathBuf};

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use pet_registry_breeds::DEFAULT_BREED_ENDPOINT;
    use pet_registry_storage::MemoryPetStore;
    use serde_json::{json, Value};
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    use crate::{router::app_router, telemetry};

    fn fixture(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write fixture");
        file.flush().expect("flush fixture");
        file
    }

    fn fetcher() -> BreedFetcher {
        BreedFetcher::with_default_client().expect("client")
    }

    async fn create(app: axum::Router, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/pets")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .expect("handler should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[test]
    fn resolves_configured_sources() {
        let remote = breed_source(&BreedSourceConfig::Remote { endpoint: None }).expect("remote");
        assert_eq!(remote.location(), DEFAULT_BREED_ENDPOINT);

        let custom = breed_source(&BreedSourceConfig::Remote {
            endpoint: Some("http://localhost:9000/breeds".to_string()),
        })
        .expect("custom remote");
        assert_eq!(custom.location(), "http://localhost:9000/breeds");

        let path = PathBuf::from("breeds.json");
        let fixture = breed_source(&BreedSourceConfig::Fixture { path: path.clone() })
            .expect("fixture");
        assert_eq!(fixture, BreedSource::Fixture(path));

        let err = breed_source(&BreedSourceConfig::Remote {
            endpoint: Some("::not a url".to_string()),
        })
        .expect_err("invalid endpoint");
        assert!(matches!(err, StartupError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn fixture_end_to_end() {
        let file = fixture(r#"[{"id":"b1","name":"Labrador"}]"#);
        let source = BreedSource::Fixture(file.path().to_path_buf());
        let metrics = telemetry::init_metrics().expect("metrics init");

        let state = build_state(metrics, MemoryPetStore::new(), &fetcher(), &source)
            .await
            .expect("state builds");
        assert_eq!(state.catalog().len(), 1);

        let (status, body) = create(
            app_router(state.clone()),
            json!({ "name": "Rex", "photo": "http://x/rex.jpg", "breed_id": "b1" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["breed_details"]["name"], "Labrador");

        let (status, _) = create(
            app_router(state),
            json!({ "name": "Rex", "photo": "http://x/rex.jpg", "breed_id": "b9" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn loading_same_fixture_twice_is_identical() {
        let file = fixture(r#"[{"id":"b1","name":"Labrador"},{"id":"b2","name":"Beagle"}]"#);
        let source = BreedSource::Fixture(file.path().to_path_buf());

        let first = load_breed_catalog(&fetcher(), &source).await.expect("first");
        let second = load_breed_catalog(&fetcher(), &source).await.expect("second");
        assert_eq!(first, second);
        assert_eq!(first.ids(), vec!["b1", "b2"]);
    }

    #[tokio::test]
    async fn missing_fixture_aborts_startup() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = BreedSource::Fixture(dir.path().join("absent.json"));
        let metrics = telemetry::init_metrics().expect("metrics init");

        let err = build_state(metrics, MemoryPetStore::new(), &fetcher(), &source)
            .await
            .err()
            .expect("startup should fail");
        assert!(matches!(err, StartupError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn malformed_fixture_aborts_startup() {
        let file = fixture(r#"{"breeds": "not a list"}"#);
        let source = BreedSource::Fixture(file.path().to_path_buf());

        let err = load_breed_catalog(&fetcher(), &source)
            .await
            .expect_err("catalog should fail");
        assert!(matches!(err, StartupError::CatalogBuildFailed(_)));
    }

    #[tokio::test]
    async fn empty_fixture_list_is_accepted() {
        let file = fixture("[]");
        let source = BreedSource::Fixture(file.path().to_path_buf());

        let catalog = load_breed_catalog(&fetcher(), &source)
            .await
            .expect("empty catalog loads");
        assert!(catalog.is_empty());
    }
}

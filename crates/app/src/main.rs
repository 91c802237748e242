mod bootstrap;
mod pets;
mod problem;
mod router;
mod telemetry;

use std::net::SocketAddr;

use tracing::info;

use pet_registry_breeds::BreedFetcher;
use pet_registry_storage::Database;
use pet_registry_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;

    let source = bootstrap::breed_source(&config.breed_source)?;
    info!(stage = "app", mode = config.breed_source.mode(), location = %source.location(), "loading breed catalog");
    let fetcher = BreedFetcher::with_default_client()?;
    let state = bootstrap::build_state(metrics, database.pets(), &fetcher, &source).await?;

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}

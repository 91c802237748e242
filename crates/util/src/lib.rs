pub mod config;

use std::{env, net::SocketAddr};

pub use config::{AppConfig, BreedSourceConfig, ConfigError, Environment, DEFAULT_DATABASE_URL};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Loads environment variables from `.env` when available.
///
/// Missing files are ignored so the function is safe in production builds
/// where dotenv files are not deployed.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Returns the address the HTTP server should bind to.
///
/// The value is resolved from the `APP_BIND_ADDR` environment variable and
/// falls back to [`DEFAULT_BIND_ADDR`] when the variable is not set.
pub fn server_bind_address() -> Result<SocketAddr, std::net::AddrParseError> {
    let value = env::var("APP_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    value.parse()
}

// Tests in this crate mutate process-wide environment variables.
#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));

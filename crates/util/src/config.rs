use std::{env, fmt, net::SocketAddr, path::PathBuf};

use super::server_bind_address;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://pets.db?mode=rwc";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Where the breed catalog is loaded from at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreedSourceConfig {
    /// Fetch from the breed API. `None` keeps the built-in endpoint.
    Remote { endpoint: Option<String> },
    /// Read a local JSON fixture.
    Fixture { path: PathBuf },
}

impl BreedSourceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mode = env::var("BREED_SOURCE_MODE").unwrap_or_else(|_| "remote".to_string());
        match mode.as_str() {
            "remote" => {
                let endpoint = env::var("BREED_SOURCE_URL")
                    .ok()
                    .filter(|value| !value.trim().is_empty());
                Ok(Self::Remote { endpoint })
            }
            "fixture" => {
                let path = env::var("BREED_FIXTURE_PATH")
                    .ok()
                    .filter(|value| !value.trim().is_empty())
                    .ok_or(ConfigError::MissingFixturePath)?;
                Ok(Self::Fixture {
                    path: PathBuf::from(path),
                })
            }
            other => Err(ConfigError::InvalidBreedSource(other.to_string())),
        }
    }

    /// Returns the mode label used in logs.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "remote",
            Self::Fixture { .. } => "fixture",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub breed_source: BreedSourceConfig,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let breed_source = BreedSourceConfig::from_env()?;

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            breed_source,
        })
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    InvalidBreedSource(String),
    MissingFixturePath,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::InvalidBreedSource(value) => write!(
                f,
                "BREED_SOURCE_MODE must be 'remote' or 'fixture' (got {value})"
            ),
            Self::MissingFixturePath => {
                write!(f, "BREED_FIXTURE_PATH is required when BREED_SOURCE_MODE=fixture")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

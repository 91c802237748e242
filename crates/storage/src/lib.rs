pub mod memory;

use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, Row, SqlitePool};
use thiserror::Error;

use pet_registry_core::types::{Breed, Pet};

pub use memory::MemoryPetStore;

/// Persistence capability required by the pet handlers.
///
/// Implementations must be safe to call concurrently from many requests.
pub trait PetStore: Clone + Send + Sync + 'static {
    /// Stores a new pet keyed by `pet.id`. Existing ids are never overwritten.
    fn insert(&self, pet: &Pet) -> impl Future<Output = Result<(), PetStoreError>> + Send;

    /// Loads the pet with the given id.
    fn select(&self, id: &str) -> impl Future<Output = Result<Option<Pet>, PetStoreError>> + Send;
}

/// Errors surfaced by [`PetStore`] implementations.
#[derive(Debug, Error)]
pub enum PetStoreError {
    #[error("pet id already exists: {id}")]
    Duplicate { id: String },
    #[error("failed to encode or decode breed details: {0}")]
    BreedDetails(#[from] serde_json::Error),
    #[error("invalid create_time stored for pet: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to the pets table.
    pub fn pets(&self) -> PetRepository {
        PetRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
}

/// SQLite-backed [`PetStore`].
#[derive(Clone)]
pub struct PetRepository {
    pool: SqlitePool,
}

impl PetStore for PetRepository {
    async fn insert(&self, pet: &Pet) -> Result<(), PetStoreError> {
        let breed_details = serde_json::to_string(&pet.breed_details)?;
        let result = sqlx::query(
            "INSERT INTO pets (id, name, photo, breed_id, breed_details_json, create_time) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&pet.id)
        .bind(&pet.name)
        .bind(&pet.photo)
        .bind(&pet.breed_details.id)
        .bind(breed_details)
        .bind(to_rfc3339(pet.create_time))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(PetStoreError::Duplicate { id: pet.id.clone() })
            }
            Err(err) => Err(PetStoreError::Database(err)),
        }
    }

    async fn select(&self, id: &str) -> Result<Option<Pet>, PetStoreError> {
        let Some(row) = sqlx::query(
            "SELECT id, name, photo, breed_details_json, create_time FROM pets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let breed_json: String = row.get("breed_details_json");
        let breed_details: Breed = serde_json::from_str(&breed_json)?;
        let create_time: String = row.get("create_time");
        let create_time = DateTime::parse_from_rfc3339(&create_time)?.with_timezone(&Utc);

        Ok(Some(Pet {
            id: row.get("id"),
            name: row.get("name"),
            photo: row.get("photo"),
            breed_details,
            create_time,
        }))
    }
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

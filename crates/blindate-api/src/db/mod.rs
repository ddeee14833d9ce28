//! # Database Persistence Layer
//!
//! PostgreSQL implementations of the engine ports via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, the API
//! stores engagements, chat rooms and the notification outbox in Postgres
//! and reads users and blocks from it. When absent, the API runs on the
//! in-memory adapters of `blindate-engine` (development and testing).
//!
//! Engagements and chat rooms are stored as JSONB documents with their
//! query keys and a `version` column beside them. Updates are a
//! compare-and-swap on `version`; a lost race or a violated unique index
//! surfaces as [`StorageError::Conflict`] and the engine retries.
//!
//! Migrations are embedded and run by `blindate migrate` at deployment
//! time, or on API start when `BLINDATE_MIGRATE_ON_START=true`.

pub mod chat_rooms;
pub mod engagements;
pub mod notifications;
pub mod users;

use std::sync::Arc;

use sqlx::postgres::{PgPool, PgPoolOptions};

use blindate_engine::{Clock, Ports, StorageError};

pub use chat_rooms::PgChatRoomRepository;
pub use engagements::PgEngagementRepository;
pub use notifications::PgNotificationOutbox;
pub use users::PgUserDirectory;

/// Open a pool against `url`.
pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Apply the embedded migrations. Already-applied ones are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Engine ports backed by `pool`, with live events sent to `events`.
pub fn ports(
    pool: PgPool,
    events: Arc<dyn blindate_engine::EventSink>,
    clock: Arc<dyn Clock>,
) -> Ports {
    Ports {
        engagements: Arc::new(PgEngagementRepository::new(pool.clone())),
        chat_rooms: Arc::new(PgChatRoomRepository::new(pool.clone())),
        users: Arc::new(PgUserDirectory::new(pool.clone())),
        notifier: Arc::new(PgNotificationOutbox::new(pool)),
        events,
        clock,
    }
}

/// Map a driver error onto the storage taxonomy.
pub(crate) fn storage_error(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StorageError::Conflict("unique constraint violated".into())
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. } => StorageError::Corrupt(err.to_string()),
        _ => {
            tracing::error!(error = %err, "database operation failed");
            StorageError::Unavailable("database operation failed".into())
        }
    }
}

/// Serialize a record into the JSONB `document` column.
pub(crate) fn to_document<T: serde::Serialize>(
    kind: &str,
    record: &T,
) -> Result<serde_json::Value, StorageError> {
    serde_json::to_value(record).map_err(|e| {
        tracing::error!(error = %e, kind, "failed to serialize record");
        StorageError::Corrupt(format!("{kind} could not be serialized"))
    })
}

/// Decode a JSONB `document` column.
pub(crate) fn from_document<T: serde::de::DeserializeOwned>(
    kind: &str,
    id: uuid::Uuid,
    document: serde_json::Value,
) -> Result<T, StorageError> {
    serde_json::from_value(document).map_err(|e| {
        tracing::error!(%id, error = %e, kind, "stored document could not be decoded");
        StorageError::Corrupt(format!("{kind} document could not be decoded"))
    })
}

/// Stored versions are `BIGINT`; the engine counts in `u64`.
pub(crate) fn version_to_db(version: u64) -> Result<i64, StorageError> {
    i64::try_from(version).map_err(|_| StorageError::Corrupt("version overflow".into()))
}

pub(crate) fn version_from_db(version: i64) -> Result<u64, StorageError> {
    u64::try_from(version).map_err(|_| StorageError::Corrupt("negative version".into()))
}

//! User directory reads on `users` and `user_blocks`.
//!
//! Profiles are owned by the surrounding platform; this adapter only reads
//! them, and writes blocks.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use blindate_core::UserId;
use blindate_engine::{StorageError, UserDirectory, UserProfile};

use super::storage_error;

/// [`UserDirectory`] over PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or update a user. Used by operators and tests to seed users.
    pub async fn upsert(&self, user: UserId, verified: bool) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO users (id, verified) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET verified = EXCLUDED.verified",
        )
        .bind(user.as_uuid())
        .bind(verified)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn profile(&self, user: UserId) -> Result<Option<UserProfile>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, verified FROM users WHERE id = $1")
            .bind(user.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(|r| UserProfile {
            id: UserId::from_uuid(r.id),
            verified: r.verified,
        }))
    }

    async fn is_blocked(&self, a: UserId, b: UserId) -> Result<bool, StorageError> {
        sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM user_blocks
                 WHERE (blocker = $1 AND blocked = $2)
                    OR (blocker = $2 AND blocked = $1)
             )",
        )
        .bind(a.as_uuid())
        .bind(b.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)
    }

    async fn block_mutual(&self, a: UserId, b: UserId) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO user_blocks (blocker, blocked)
             VALUES ($1, $2), ($2, $1)
             ON CONFLICT DO NOTHING",
        )
        .bind(a.as_uuid())
        .bind(b.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    verified: bool,
}

//! Engagement persistence.
//!
//! All queries run against the `engagements` table. The single-active
//! engagement per pair is enforced by the partial unique index
//! `engagements_one_active_per_pair`; state-machine rules are enforced in
//! `blindate-state`, not in SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use blindate_core::{EngagementId, ParticipantPair, Timestamp, UserId};
use blindate_engine::{EngagementRepository, StorageError};
use blindate_state::{Engagement, EngagementStatus};

use super::{from_document, storage_error, to_document, version_from_db, version_to_db};

const SELECT: &str = "SELECT id, version, document FROM engagements";

/// [`EngagementRepository`] over PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgEngagementRepository {
    pool: PgPool,
}

impl PgEngagementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_all(
        &self,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, EngagementRow, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Engagement>, StorageError> {
        query
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(EngagementRow::into_record)
            .collect()
    }
}

/// Indexed columns derived from the document.
struct Columns {
    status: &'static str,
    scheduled_for: Option<DateTime<Utc>>,
    document: serde_json::Value,
}

fn columns(engagement: &Engagement) -> Result<Columns, StorageError> {
    Ok(Columns {
        status: engagement.status.as_str(),
        scheduled_for: engagement.meeting.scheduled_for.map(|t| *t.as_datetime()),
        document: to_document("engagement", engagement)?,
    })
}

#[async_trait]
impl EngagementRepository for PgEngagementRepository {
    async fn get(&self, id: EngagementId) -> Result<Option<Engagement>, StorageError> {
        let row = sqlx::query_as::<_, EngagementRow>(&format!("{SELECT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.map(EngagementRow::into_record).transpose()
    }

    async fn find_active_by_pair(
        &self,
        pair: &ParticipantPair,
    ) -> Result<Option<Engagement>, StorageError> {
        let row = sqlx::query_as::<_, EngagementRow>(&format!(
            "{SELECT} WHERE participant_low = $1 AND participant_high = $2 AND active"
        ))
        .bind(pair.low().as_uuid())
        .bind(pair.high().as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.map(EngagementRow::into_record).transpose()
    }

    async fn find_all_by_pair(
        &self,
        pair: &ParticipantPair,
    ) -> Result<Vec<Engagement>, StorageError> {
        let sql = format!(
            "{SELECT} WHERE participant_low = $1 AND participant_high = $2 ORDER BY created_at"
        );
        self.fetch_all(
            sqlx::query_as::<_, EngagementRow>(&sql)
                .bind(*pair.low().as_uuid())
                .bind(*pair.high().as_uuid()),
        )
        .await
    }

    async fn list_for_participant(&self, user: UserId) -> Result<Vec<Engagement>, StorageError> {
        let sql = format!(
            "{SELECT} WHERE participant_low = $1 OR participant_high = $1 ORDER BY updated_at DESC"
        );
        self.fetch_all(sqlx::query_as::<_, EngagementRow>(&sql).bind(*user.as_uuid()))
            .await
    }

    async fn list_due_for_grace(
        &self,
        scheduled_before: Timestamp,
    ) -> Result<Vec<Engagement>, StorageError> {
        let sql = format!("{SELECT} WHERE status = $1 AND scheduled_for < $2 ORDER BY scheduled_for");
        self.fetch_all(
            sqlx::query_as::<_, EngagementRow>(&sql)
                .bind(EngagementStatus::Accepted.as_str())
                .bind(*scheduled_before.as_datetime()),
        )
        .await
    }

    async fn insert(&self, engagement: &Engagement) -> Result<(), StorageError> {
        let cols = columns(engagement)?;
        sqlx::query(
            "INSERT INTO engagements
                (id, participant_low, participant_high, status, active, scheduled_for,
                 version, document, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(engagement.id.as_uuid())
        .bind(engagement.participants.low().as_uuid())
        .bind(engagement.participants.high().as_uuid())
        .bind(cols.status)
        .bind(engagement.active)
        .bind(cols.scheduled_for)
        .bind(version_to_db(engagement.version)?)
        .bind(&cols.document)
        .bind(engagement.created_at.as_datetime())
        .bind(engagement.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn update(&self, engagement: &Engagement) -> Result<u64, StorageError> {
        let cols = columns(engagement)?;
        let new_version: Option<i64> = sqlx::query_scalar(
            "UPDATE engagements
                SET status = $2, active = $3, scheduled_for = $4, document = $5,
                    updated_at = $6, version = version + 1
              WHERE id = $1 AND version = $7
              RETURNING version",
        )
        .bind(engagement.id.as_uuid())
        .bind(cols.status)
        .bind(engagement.active)
        .bind(cols.scheduled_for)
        .bind(&cols.document)
        .bind(engagement.updated_at.as_datetime())
        .bind(version_to_db(engagement.version)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match new_version {
            Some(v) => version_from_db(v),
            None => Err(StorageError::Conflict(format!(
                "engagement changed since version {}",
                engagement.version
            ))),
        }
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct EngagementRow {
    id: Uuid,
    version: i64,
    document: serde_json::Value,
}

impl EngagementRow {
    /// The `version` column is authoritative over the copy in the document.
    fn into_record(self) -> Result<Engagement, StorageError> {
        let mut engagement: Engagement = from_document("engagement", self.id, self.document)?;
        engagement.version = version_from_db(self.version)?;
        Ok(engagement)
    }
}

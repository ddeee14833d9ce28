//! Chat room persistence operations on the `chat_rooms` table.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use blindate_core::{ChatRoomId, EngagementId};
use blindate_engine::{ChatRoomRepository, StorageError};
use blindate_state::ChatRoom;

use super::{from_document, storage_error, to_document, version_from_db, version_to_db};

/// [`ChatRoomRepository`] over PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgChatRoomRepository {
    pool: PgPool,
}

impl PgChatRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRoomRepository for PgChatRoomRepository {
    async fn get(&self, id: ChatRoomId) -> Result<Option<ChatRoom>, StorageError> {
        let row = sqlx::query_as::<_, ChatRoomRow>(
            "SELECT id, version, document FROM chat_rooms WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.map(ChatRoomRow::into_record).transpose()
    }

    async fn find_by_engagement(
        &self,
        engagement_id: EngagementId,
    ) -> Result<Option<ChatRoom>, StorageError> {
        let row = sqlx::query_as::<_, ChatRoomRow>(
            "SELECT id, version, document FROM chat_rooms
              WHERE engagement_id = $1
              ORDER BY created_at DESC
              LIMIT 1",
        )
        .bind(engagement_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.map(ChatRoomRow::into_record).transpose()
    }

    async fn insert(&self, room: &ChatRoom) -> Result<(), StorageError> {
        let document = to_document("chat room", room)?;
        sqlx::query(
            "INSERT INTO chat_rooms (id, engagement_id, status, version, document, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(room.id.as_uuid())
        .bind(room.engagement_id.as_uuid())
        .bind(room.status.as_str())
        .bind(version_to_db(room.version)?)
        .bind(&document)
        .bind(room.created_at.as_datetime())
        .bind(room.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn update(&self, room: &ChatRoom) -> Result<u64, StorageError> {
        let document = to_document("chat room", room)?;
        let new_version: Option<i64> = sqlx::query_scalar(
            "UPDATE chat_rooms
                SET status = $2, document = $3, updated_at = $4, version = version + 1
              WHERE id = $1 AND version = $5
              RETURNING version",
        )
        .bind(room.id.as_uuid())
        .bind(room.status.as_str())
        .bind(&document)
        .bind(room.updated_at.as_datetime())
        .bind(version_to_db(room.version)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match new_version {
            Some(v) => version_from_db(v),
            None => Err(StorageError::Conflict(format!(
                "chat room changed since version {}",
                room.version
            ))),
        }
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ChatRoomRow {
    id: Uuid,
    version: i64,
    document: serde_json::Value,
}

impl ChatRoomRow {
    fn into_record(self) -> Result<ChatRoom, StorageError> {
        let mut room: ChatRoom = from_document("chat room", self.id, self.document)?;
        room.version = version_from_db(self.version)?;
        Ok(room)
    }
}

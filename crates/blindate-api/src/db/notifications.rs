//! Notification outbox.
//!
//! Each notification is one row in `notifications`. Physical delivery
//! (push, email, sockets) is done by an external worker that reads
//! undelivered rows and stamps `delivered_at`.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use blindate_engine::{Notification, Notifier, NotifyError};

/// [`Notifier`] that appends to the Postgres outbox.
#[derive(Debug, Clone)]
pub struct PgNotificationOutbox {
    pool: PgPool,
}

impl PgNotificationOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for PgNotificationOutbox {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        sqlx::query(
            "INSERT INTO notifications
                (id, recipient, sender, event_type, message, reference_type, reference_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(notification.recipient.as_uuid())
        .bind(notification.sender.map(|s| *s.as_uuid()))
        .bind(notification.event.as_str())
        .bind(&notification.message)
        .bind(notification.reference.kind())
        .bind(notification.reference.id())
        .execute(&self.pool)
        .await
        .map_err(|e| NotifyError(format!("outbox insert failed: {e}")))?;
        Ok(())
    }
}

//! # Ports
//!
//! The boundaries between the engine and the outside world:
//!
//! - [`EngagementRepository`] and [`ChatRoomRepository`]: persistence with
//!   optimistic concurrency. `update` is a compare-and-swap on the record's
//!   `version`; a lost race is reported as [`StorageError::Conflict`].
//! - [`UserDirectory`]: the external profile store (verification, blocks).
//! - [`Notifier`]: best-effort user notifications. Failures are logged by
//!   the engine and never fail the triggering operation.
//! - [`EventSink`]: fire-and-forget live-update events for a real-time
//!   transport. Delivery is not acknowledged.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use blindate_core::{ChatRoomId, EngagementId, Location, ParticipantPair, Timestamp, UserId};
use blindate_state::{ChatMessage, ChatRoom, Engagement, NegotiationStatus};

use crate::clock::Clock;
use crate::error::StorageError;

// ─── Repositories ────────────────────────────────────────────────────

/// Persistence for engagements.
#[async_trait]
pub trait EngagementRepository: Send + Sync {
    async fn get(&self, id: EngagementId) -> Result<Option<Engagement>, StorageError>;

    /// The active engagement of `pair`, if any.
    async fn find_active_by_pair(
        &self,
        pair: &ParticipantPair,
    ) -> Result<Option<Engagement>, StorageError>;

    /// Every engagement of `pair`, active or archived.
    async fn find_all_by_pair(&self, pair: &ParticipantPair)
        -> Result<Vec<Engagement>, StorageError>;

    /// Every engagement `user` participates in, most recently updated first.
    async fn list_for_participant(&self, user: UserId) -> Result<Vec<Engagement>, StorageError>;

    /// `Accepted` engagements scheduled strictly before `scheduled_before`.
    async fn list_due_for_grace(
        &self,
        scheduled_before: Timestamp,
    ) -> Result<Vec<Engagement>, StorageError>;

    /// Store a new engagement.
    ///
    /// `Conflict` if the id exists or the pair already has an active
    /// engagement.
    async fn insert(&self, engagement: &Engagement) -> Result<(), StorageError>;

    /// Replace the stored engagement if its version still equals
    /// `engagement.version`. Returns the new version.
    async fn update(&self, engagement: &Engagement) -> Result<u64, StorageError>;
}

/// Persistence for negotiation chat rooms.
#[async_trait]
pub trait ChatRoomRepository: Send + Sync {
    async fn get(&self, id: ChatRoomId) -> Result<Option<ChatRoom>, StorageError>;

    /// The most recently created room of an engagement.
    async fn find_by_engagement(
        &self,
        engagement_id: EngagementId,
    ) -> Result<Option<ChatRoom>, StorageError>;

    /// Store a new room. `Conflict` if the id exists.
    async fn insert(&self, room: &ChatRoom) -> Result<(), StorageError>;

    /// Compare-and-swap on `room.version`. Returns the new version.
    async fn update(&self, room: &ChatRoom) -> Result<u64, StorageError>;
}

// ─── User directory ──────────────────────────────────────────────────

/// What the engine needs to know about a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub verified: bool,
}

/// The external profile store.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `None` when the user does not exist.
    async fn profile(&self, user: UserId) -> Result<Option<UserProfile>, StorageError>;

    /// Whether either user has blocked the other.
    async fn is_blocked(&self, a: UserId, b: UserId) -> Result<bool, StorageError>;

    /// Block in both directions. Idempotent.
    async fn block_mutual(&self, a: UserId, b: UserId) -> Result<(), StorageError>;
}

// ─── Notifications ───────────────────────────────────────────────────

/// Fixed notification vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Invite,
    Accepted,
    Rejected,
    Updated,
    Reviewed,
    Cancelled,
    VideoLinkReady,
    LocationVoted,
    NegotiationStarted,
    LocationConfirmed,
    ChatMessage,
    ChatClosed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invite => "invite",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Updated => "updated",
            Self::Reviewed => "reviewed",
            Self::Cancelled => "cancelled",
            Self::VideoLinkReady => "video-link-ready",
            Self::LocationVoted => "location-voted",
            Self::NegotiationStarted => "negotiation-started",
            Self::LocationConfirmed => "location-confirmed",
            Self::ChatMessage => "chat-message",
            Self::ChatClosed => "chat-closed",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Reference {
    Engagement(EngagementId),
    ChatRoom(ChatRoomId),
}

impl Reference {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Engagement(_) => "engagement",
            Self::ChatRoom(_) => "chat_room",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Engagement(id) => *id.as_uuid(),
            Self::ChatRoom(id) => *id.as_uuid(),
        }
    }
}

/// A request to tell `recipient` about something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    /// `None` for system-originated events.
    pub sender: Option<UserId>,
    pub event: EventType,
    /// User-facing text. Never names the sender.
    pub message: String,
    pub reference: Reference,
}

/// Delivery failure reported by a [`Notifier`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Notification port.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

// ─── Live events ─────────────────────────────────────────────────────

/// Where a live event should be fanned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    Engagement(EngagementId),
    ChatRoom(ChatRoomId),
}

/// Real-time update for connected clients.
///
/// `NewMessage` carries the stored message with its true sender; a
/// transport must project it per subscriber before delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LiveEvent {
    LocationVoteUpdated {
        engagement_id: EngagementId,
        status: NegotiationStatus,
    },
    NegotiationChatCreated {
        engagement_id: EngagementId,
        chat_room_id: ChatRoomId,
    },
    LocationConfirmed {
        engagement_id: EngagementId,
        location: Location,
    },
    NewMessage {
        chat_room_id: ChatRoomId,
        message: ChatMessage,
    },
    ChatClosed {
        chat_room_id: ChatRoomId,
    },
}

impl LiveEvent {
    pub fn scope(&self) -> EventScope {
        match self {
            Self::LocationVoteUpdated { engagement_id, .. }
            | Self::NegotiationChatCreated { engagement_id, .. }
            | Self::LocationConfirmed { engagement_id, .. } => EventScope::Engagement(*engagement_id),
            Self::NewMessage { chat_room_id, .. } | Self::ChatClosed { chat_room_id } => {
                EventScope::ChatRoom(*chat_room_id)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LocationVoteUpdated { .. } => "locationVoteUpdated",
            Self::NegotiationChatCreated { .. } => "negotiationChatCreated",
            Self::LocationConfirmed { .. } => "locationConfirmed",
            Self::NewMessage { .. } => "newMessage",
            Self::ChatClosed { .. } => "chatClosed",
        }
    }
}

/// Live-update port.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: LiveEvent);
}

// ─── Bundle ──────────────────────────────────────────────────────────

/// Every adapter the engine needs.
#[derive(Clone)]
pub struct Ports {
    pub engagements: Arc<dyn EngagementRepository>,
    pub chat_rooms: Arc<dyn ChatRoomRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub notifier: Arc<dyn Notifier>,
    pub events: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Ports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_serialize_kebab_case() {
        let json = serde_json::to_string(&EventType::VideoLinkReady).unwrap();
        assert_eq!(json, "\"video-link-ready\"");
        assert_eq!(EventType::NegotiationStarted.as_str(), "negotiation-started");
    }

    #[test]
    fn live_event_scope_and_name() {
        let room = ChatRoomId::new();
        let event = LiveEvent::ChatClosed { chat_room_id: room };
        assert_eq!(event.scope(), EventScope::ChatRoom(room));
        assert_eq!(event.name(), "chatClosed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "chatClosed");
    }

    #[test]
    fn reference_exposes_kind_and_id() {
        let id = EngagementId::new();
        let r = Reference::Engagement(id);
        assert_eq!(r.kind(), "engagement");
        assert_eq!(r.id(), *id.as_uuid());
    }
}

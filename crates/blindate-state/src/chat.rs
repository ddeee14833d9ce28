//! # Negotiation Chat Rooms
//!
//! A chat room belongs to exactly one engagement and has exactly its two
//! participants. The message log is append-only and stores real sender
//! ids; anonymity is applied when a transcript is read, so each reader
//! sees "You" and a fixed pseudonym for the other side.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use blindate_core::validation;
use blindate_core::{ChatRoomId, EngagementId, ParticipantPair, Timestamp, UserId, ValidationError};

/// The name under which the other participant appears.
pub const COUNTERPART_PSEUDONYM: &str = "Your Blind Date";

const MAX_MESSAGE_CHARS: usize = 2000;

/// Lifecycle of a chat room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRoomStatus {
    Active,
    Closed,
}

impl ChatRoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum MessageSender {
    System,
    Participant(UserId),
}

/// One entry in a room's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: MessageSender,
    pub body: String,
    pub sent_at: Timestamp,
}

impl ChatMessage {
    pub fn is_system_message(&self) -> bool {
        self.sender == MessageSender::System
    }

    /// This message as `reader` sees it.
    pub fn view_for(&self, reader: &UserId) -> MessageView {
        let (author, display_name) = match self.sender {
            MessageSender::System => (MessageAuthor::System, "System"),
            MessageSender::Participant(id) if id == *reader => (MessageAuthor::You, "You"),
            MessageSender::Participant(_) => (MessageAuthor::Counterpart, COUNTERPART_PSEUDONYM),
        };
        MessageView {
            author,
            display_name: display_name.to_string(),
            body: self.body.clone(),
            sent_at: self.sent_at,
            is_system_message: self.is_system_message(),
        }
    }
}

/// Errors from chat room operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("caller is not a participant of this chat room")]
    NotAParticipant,

    #[error("chat room is closed")]
    Closed,

    #[error("message body must not be empty")]
    EmptyMessage,

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Author label in an anonymised transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAuthor {
    You,
    Counterpart,
    System,
}

/// A message as shown to one reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub author: MessageAuthor,
    pub display_name: String,
    pub body: String,
    pub sent_at: Timestamp,
    pub is_system_message: bool,
}

/// A negotiation chat room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: ChatRoomId,
    pub engagement_id: EngagementId,
    pub participants: ParticipantPair,
    pub status: ChatRoomStatus,
    pub messages: Vec<ChatMessage>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: u64,
}

impl ChatRoom {
    /// Open a room seeded with one system message.
    pub fn open(
        id: ChatRoomId,
        engagement_id: EngagementId,
        participants: ParticipantPair,
        opening_message: &str,
        now: Timestamp,
    ) -> Self {
        let mut room = Self {
            id,
            engagement_id,
            participants,
            status: ChatRoomStatus::Active,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        room.post_system(opening_message, now);
        room
    }

    pub fn is_active(&self) -> bool {
        self.status == ChatRoomStatus::Active
    }

    pub fn require_participant(&self, user: &UserId) -> Result<(), ChatError> {
        if self.participants.contains(user) {
            Ok(())
        } else {
            Err(ChatError::NotAParticipant)
        }
    }

    /// The participant who is not `user`.
    pub fn counterpart(&self, user: &UserId) -> Result<UserId, ChatError> {
        self.participants.other(user).ok_or(ChatError::NotAParticipant)
    }

    /// Append a participant message. Returns the stored message.
    pub fn post(
        &mut self,
        sender: UserId,
        body: &str,
        now: Timestamp,
    ) -> Result<ChatMessage, ChatError> {
        self.require_participant(&sender)?;
        if !self.is_active() {
            return Err(ChatError::Closed);
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        validation::max_chars("content", body, MAX_MESSAGE_CHARS)?;

        let message = ChatMessage {
            sender: MessageSender::Participant(sender),
            body: body.to_string(),
            sent_at: now,
        };
        self.messages.push(message.clone());
        self.updated_at = now;
        Ok(message)
    }

    /// Append a system message regardless of room status.
    pub fn post_system(&mut self, body: &str, now: Timestamp) -> ChatMessage {
        let message = ChatMessage {
            sender: MessageSender::System,
            body: body.to_string(),
            sent_at: now,
        };
        self.messages.push(message.clone());
        self.updated_at = now;
        message
    }

    /// Close the room and append `notice`.
    ///
    /// Closing a closed room is a no-op; returns whether anything changed.
    pub fn close(&mut self, actor: UserId, notice: &str, now: Timestamp) -> Result<bool, ChatError> {
        self.require_participant(&actor)?;
        if !self.is_active() {
            return Ok(false);
        }
        self.status = ChatRoomStatus::Closed;
        self.post_system(notice, now);
        Ok(true)
    }

    /// The full log, anonymised for `reader`, in send order.
    pub fn transcript_for(&self, reader: &UserId) -> Result<Vec<MessageView>, ChatError> {
        self.require_participant(reader)?;
        Ok(self.messages.iter().map(|m| m.view_for(reader)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Timestamp {
        Timestamp::parse("now", "2026-05-01T12:00:00Z").unwrap()
    }

    fn room() -> (ChatRoom, UserId, UserId) {
        let (a, b) = (UserId::new(), UserId::new());
        let pair = ParticipantPair::new(a, b).unwrap();
        let r = ChatRoom::open(ChatRoomId::new(), EngagementId::new(), pair, "hello", now());
        (r, a, b)
    }

    #[test]
    fn open_seeds_system_message() {
        let (r, _, _) = room();
        assert!(r.is_active());
        assert_eq!(r.messages.len(), 1);
        assert!(r.messages[0].is_system_message());
    }

    #[test]
    fn post_trims_and_appends() {
        let (mut r, a, _) = room();
        let m = r.post(a, "  how about 7pm? ", now()).unwrap();
        assert_eq!(m.body, "how about 7pm?");
        assert_eq!(r.messages.len(), 2);
    }

    #[test]
    fn blank_message_rejected() {
        let (mut r, a, _) = room();
        assert_eq!(r.post(a, " \n ", now()), Err(ChatError::EmptyMessage));
    }

    #[test]
    fn outsider_cannot_post_or_read() {
        let (mut r, _, _) = room();
        let outsider = UserId::new();
        assert_eq!(r.post(outsider, "hi", now()), Err(ChatError::NotAParticipant));
        assert_eq!(r.transcript_for(&outsider), Err(ChatError::NotAParticipant));
    }

    #[test]
    fn closed_room_rejects_posts_and_close_is_idempotent() {
        let (mut r, a, b) = room();
        assert!(r.close(a, "closed", now()).unwrap());
        assert_eq!(r.post(b, "wait", now()), Err(ChatError::Closed));
        let len = r.messages.len();
        assert!(!r.close(b, "closed", now()).unwrap());
        assert_eq!(r.messages.len(), len);
    }

    #[test]
    fn transcript_is_anonymised_per_reader() {
        let (mut r, a, b) = room();
        r.post(a, "hi from a", now()).unwrap();
        r.post(b, "hi from b", now()).unwrap();

        let for_a = r.transcript_for(&a).unwrap();
        assert_eq!(for_a[0].author, MessageAuthor::System);
        assert_eq!(for_a[1].display_name, "You");
        assert_eq!(for_a[2].display_name, COUNTERPART_PSEUDONYM);

        let for_b = r.transcript_for(&b).unwrap();
        assert_eq!(for_b[1].author, MessageAuthor::Counterpart);
        assert_eq!(for_b[2].author, MessageAuthor::You);

        let json = serde_json::to_string(&for_a).unwrap();
        assert!(!json.contains(&a.as_uuid().to_string()));
        assert!(!json.contains(&b.as_uuid().to_string()));
    }

    #[test]
    fn sender_serializes_tagged() {
        let a = UserId::new();
        let json = serde_json::to_value(MessageSender::Participant(a)).unwrap();
        assert_eq!(json["kind"], "participant");
        let sys = serde_json::to_value(MessageSender::System).unwrap();
        assert_eq!(sys["kind"], "system");
    }
}

//! # Negotiation Chat Service
//!
//! Posting, closing and reading negotiation chat rooms. Every appended
//! message, system messages included, is broadcast to live subscribers of
//! the room and goes through the notification port.

use std::sync::Arc;

use blindate_core::{ChatRoomId, EngagementId, Timestamp, UserId};
use blindate_state::{ChatMessage, ChatRoom, Engagement, MessageView};

use crate::context::EngineContext;
use crate::error::{BlindateError, StorageError};
use crate::ports::{EventType, LiveEvent, Notification, Reference};

const OPENING_NOTICE: &str =
    "This chat is for agreeing on where to meet. Identities stay hidden until the date.";
const CLOSING_NOTICE: &str = "The chat has been closed.";

/// Negotiation chat operations.
#[derive(Clone)]
pub struct NegotiationChat {
    ctx: Arc<EngineContext>,
}

impl NegotiationChat {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Append `body` from `actor`. Returns the message as `actor` sees it.
    pub async fn post_message(
        &self,
        room_id: ChatRoomId,
        actor: UserId,
        body: &str,
    ) -> Result<MessageView, BlindateError> {
        let now = self.ctx.now();
        let (room, message) = self
            .ctx
            .mutate_chat_room(room_id, |room| room.post(actor, body, now))
            .await?;

        self.ctx.publish(LiveEvent::NewMessage {
            chat_room_id: room.id,
            message: message.clone(),
        });
        let other = room.counterpart(&actor)?;
        self.ctx
            .notify(Notification {
                recipient: other,
                sender: Some(actor),
                event: EventType::ChatMessage,
                message: "Your blind date sent you a message.".into(),
                reference: Reference::ChatRoom(room.id),
            })
            .await;
        Ok(message.view_for(&actor))
    }

    /// Close the room. Closing a closed room changes nothing.
    pub async fn close(&self, room_id: ChatRoomId, actor: UserId) -> Result<ChatRoom, BlindateError> {
        let now = self.ctx.now();
        let (room, changed) = self
            .ctx
            .mutate_chat_room(room_id, |room| room.close(actor, CLOSING_NOTICE, now))
            .await?;
        if !changed {
            return Ok(room);
        }

        tracing::info!(chat_room = %room.id, "negotiation chat closed");
        if let Some(notice) = room.messages.last() {
            self.ctx.publish(LiveEvent::NewMessage {
                chat_room_id: room.id,
                message: notice.clone(),
            });
        }
        self.ctx.publish(LiveEvent::ChatClosed {
            chat_room_id: room.id,
        });
        let other = room.counterpart(&actor)?;
        self.ctx
            .notify(Notification {
                recipient: other,
                sender: Some(actor),
                event: EventType::ChatClosed,
                message: "Your blind date closed the negotiation chat.".into(),
                reference: Reference::ChatRoom(room.id),
            })
            .await;
        Ok(room)
    }

    /// The room's messages, anonymised for `reader`.
    pub async fn transcript(
        &self,
        room_id: ChatRoomId,
        reader: UserId,
    ) -> Result<Vec<MessageView>, BlindateError> {
        let room = self.ctx.load_chat_room(room_id).await?;
        Ok(room.transcript_for(&reader)?)
    }

    /// The negotiation room of an engagement.
    pub async fn room_for_engagement(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
    ) -> Result<ChatRoom, BlindateError> {
        let engagement = self.ctx.load_engagement(engagement_id).await?;
        engagement.require_participant(&actor)?;
        let room_id = engagement
            .negotiation
            .chat_room_id
            .ok_or(BlindateError::NotFound("chat room"))?;
        self.ctx.load_chat_room(room_id).await
    }

    /// Create room `room_id` for `engagement` unless it already exists.
    ///
    /// Returns whether this call created it. Concurrent callers racing on
    /// the same id create exactly one room.
    pub(crate) async fn ensure_room(
        &self,
        engagement: &Engagement,
        room_id: ChatRoomId,
        now: Timestamp,
    ) -> Result<bool, BlindateError> {
        if self.ctx.ports.chat_rooms.get(room_id).await?.is_some() {
            return Ok(false);
        }
        let room = ChatRoom::open(
            room_id,
            engagement.id,
            engagement.participants,
            OPENING_NOTICE,
            now,
        );
        match self.ctx.ports.chat_rooms.insert(&room).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => return Ok(false),
            Err(err) => return Err(err.into()),
        }

        tracing::info!(engagement = %engagement.id, chat_room = %room.id, "negotiation chat created");
        self.ctx.publish(LiveEvent::NegotiationChatCreated {
            engagement_id: engagement.id,
            chat_room_id: room.id,
        });
        if let Some(opening) = room.messages.first() {
            self.broadcast_system_message(&room, opening).await;
        }
        Ok(true)
    }

    /// Append a system message to an active room. Returns whether it was posted.
    pub(crate) async fn announce(
        &self,
        room_id: ChatRoomId,
        text: &str,
    ) -> Result<bool, BlindateError> {
        let now = self.ctx.now();
        let (room, posted) = self
            .ctx
            .mutate_chat_room(room_id, |room| {
                Ok(room.is_active().then(|| room.post_system(text, now)))
            })
            .await?;
        match posted {
            Some(message) => {
                self.broadcast_system_message(&room, &message).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn broadcast_system_message(&self, room: &ChatRoom, message: &ChatMessage) {
        self.ctx.publish(LiveEvent::NewMessage {
            chat_room_id: room.id,
            message: message.clone(),
        });
        for recipient in room.participants.members() {
            self.ctx
                .notify(Notification {
                    recipient,
                    sender: None,
                    event: EventType::ChatMessage,
                    message: message.body.clone(),
                    reference: Reference::ChatRoom(room.id),
                })
                .await;
        }
    }
}

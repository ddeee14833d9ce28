//! # Location Negotiation Service
//!
//! Drives the negotiation sub-machine of an accepted engagement and its
//! side effects:
//!
//! | Outcome | Live event | Notification |
//! |---------|------------|--------------|
//! | one vote in | `locationVoteUpdated` | other: `location-voted` |
//! | votes differ | `locationVoteUpdated`, `negotiationChatCreated` (first time) | other: `negotiation-started` |
//! | votes match | `locationVoteUpdated`, `locationConfirmed` | both: `location-confirmed` |
//!
//! The chat room id is fixed in the engagement record before the room is
//! created, so a retried or concurrent vote can never create a second room.

use std::sync::Arc;

use serde::Serialize;

use blindate_core::{ChatRoomId, EngagementId, Location, UserId};
use blindate_state::{ChatInitiation, ChatRoom, Engagement, NegotiationView, VoteOutcome};

use crate::chat::NegotiationChat;
use crate::context::EngineContext;
use crate::error::BlindateError;
use crate::ports::{EventType, LiveEvent, Notification, Reference};

/// Result of a vote, from the voter's point of view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteReceipt {
    pub negotiation: NegotiationView,
    /// Set when the vote opened the negotiation chat.
    pub chat_room_created: bool,
}

/// Location negotiation operations.
#[derive(Clone)]
pub struct LocationNegotiator {
    ctx: Arc<EngineContext>,
    chat: NegotiationChat,
}

impl LocationNegotiator {
    pub(crate) fn new(ctx: Arc<EngineContext>, chat: NegotiationChat) -> Self {
        Self { ctx, chat }
    }

    /// Record `actor`'s proposed location and resolve it against the other vote.
    ///
    /// A confirmed location is closed to votes (`InvalidState`);
    /// [`confirm_final_location`](Self::confirm_final_location) replaces it.
    pub async fn vote(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
        location: Location,
    ) -> Result<VoteReceipt, BlindateError> {
        let now = self.ctx.now();
        let proposed_room = ChatRoomId::new();
        let (engagement, outcome) = self
            .ctx
            .mutate_engagement(engagement_id, |e| {
                e.vote(actor, location.clone(), proposed_room, now)
            })
            .await?;
        let other = engagement.counterpart(&actor)?;

        self.ctx.publish(LiveEvent::LocationVoteUpdated {
            engagement_id: engagement.id,
            status: engagement.negotiation.status(),
        });

        let mut chat_room_created = false;
        match &outcome {
            VoteOutcome::AwaitingCounterpart => {
                self.notify(
                    &engagement,
                    other,
                    actor,
                    EventType::LocationVoted,
                    "Your blind date proposed a place to meet. Cast your vote.",
                )
                .await;
            }
            VoteOutcome::Negotiating { room, .. } => {
                chat_room_created = self.chat.ensure_room(&engagement, *room, now).await?;
                self.notify(
                    &engagement,
                    other,
                    actor,
                    EventType::NegotiationStarted,
                    "Your votes differ. Agree on a place in the negotiation chat.",
                )
                .await;
            }
            VoteOutcome::Confirmed(final_location) => {
                self.announce_confirmation(&engagement, actor, final_location, true)
                    .await?;
            }
        }

        Ok(VoteReceipt {
            negotiation: engagement.negotiation_view(&actor)?,
            chat_room_created,
        })
    }

    /// Open the negotiation chat without waiting for a disagreement.
    ///
    /// Returns the existing room unchanged if there already is one.
    pub async fn initiate_chat(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
    ) -> Result<ChatRoom, BlindateError> {
        let now = self.ctx.now();
        let proposed_room = ChatRoomId::new();
        let (engagement, initiation) = self
            .ctx
            .mutate_engagement(engagement_id, |e| e.initiate_chat(actor, proposed_room, now))
            .await?;

        let created = self
            .chat
            .ensure_room(&engagement, initiation.room_id(), now)
            .await?;
        if created && matches!(initiation, ChatInitiation::Created(_)) {
            let other = engagement.counterpart(&actor)?;
            self.notify(
                &engagement,
                other,
                actor,
                EventType::NegotiationStarted,
                "Your blind date opened a chat to agree on a place to meet.",
            )
            .await;
        }
        self.ctx.load_chat_room(initiation.room_id()).await
    }

    /// Set the meeting location directly, overriding the votes.
    pub async fn confirm_final_location(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
        location: Location,
    ) -> Result<NegotiationView, BlindateError> {
        let now = self.ctx.now();
        let (engagement, confirmed) = self
            .ctx
            .mutate_engagement(engagement_id, |e| {
                e.confirm_final_location(actor, location.clone(), now)
            })
            .await?;

        if let Some(room_id) = engagement.negotiation.chat_room_id {
            let text = format!("The meeting location is confirmed: {confirmed}.");
            match self.chat.announce(room_id, &text).await {
                Ok(_) => {}
                Err(BlindateError::NotFound(_)) => {
                    tracing::warn!(engagement = %engagement.id, "negotiation chat missing at confirmation");
                }
                Err(err) => return Err(err),
            }
        }
        self.announce_confirmation(&engagement, actor, &confirmed, false)
            .await?;
        Ok(engagement.negotiation_view(&actor)?)
    }

    /// `actor`'s view of the negotiation.
    pub async fn get_status(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
    ) -> Result<NegotiationView, BlindateError> {
        let engagement = self.ctx.load_engagement(engagement_id).await?;
        Ok(engagement.negotiation_view(&actor)?)
    }

    async fn announce_confirmation(
        &self,
        engagement: &Engagement,
        actor: UserId,
        location: &Location,
        notify_actor: bool,
    ) -> Result<(), BlindateError> {
        tracing::info!(engagement = %engagement.id, "meeting location confirmed");
        self.ctx.publish(LiveEvent::LocationConfirmed {
            engagement_id: engagement.id,
            location: location.clone(),
        });
        let message = format!("Your meeting place is confirmed: {location}.");
        let other = engagement.counterpart(&actor)?;
        self.notify(engagement, other, actor, EventType::LocationConfirmed, &message)
            .await;
        if notify_actor {
            self.notify(engagement, actor, other, EventType::LocationConfirmed, &message)
                .await;
        }
        Ok(())
    }

    async fn notify(
        &self,
        engagement: &Engagement,
        recipient: UserId,
        sender: UserId,
        event: EventType,
        message: &str,
    ) {
        self.ctx
            .notify(Notification {
                recipient,
                sender: Some(sender),
                event,
                message: message.to_string(),
                reference: Reference::Engagement(engagement.id),
            })
            .await;
    }
}

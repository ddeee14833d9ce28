//! # Location Negotiation
//!
//! Sub-machine of an `Accepted` engagement:
//!
//! ```text
//! Pending ──(votes match)──────────────────────────▶ Confirmed
//!    │                                                  ▲
//!    └──(votes differ / chat requested)──▶ Negotiating ─┘ (confirm)
//! ```
//!
//! The phase carries the final location, so a confirmed negotiation
//! always has one and an unconfirmed one never does. Each participant
//! holds at most one vote; voting again replaces the earlier vote.
//! Opening a chat room is requested by the machine and performed by the
//! caller. The machine records the room id it was handed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use blindate_core::{ChatRoomId, Location, Timestamp, UserId};

use crate::engagement::{Engagement, EngagementError, EngagementStatus};

/// Public status of the negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    Pending,
    Negotiating,
    Confirmed,
}

impl NegotiationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Negotiating => "negotiating",
            Self::Confirmed => "confirmed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum NegotiationPhase {
    Pending,
    Negotiating,
    Confirmed { final_location: Location },
}

/// Votes, phase and chat room of one engagement's location negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationNegotiation {
    phase: NegotiationPhase,
    /// At most one vote per participant.
    pub votes: BTreeMap<UserId, Location>,
    /// The negotiation chat room, once opened.
    pub chat_room_id: Option<ChatRoomId>,
}

impl Default for LocationNegotiation {
    fn default() -> Self {
        Self {
            phase: NegotiationPhase::Pending,
            votes: BTreeMap::new(),
            chat_room_id: None,
        }
    }
}

impl LocationNegotiation {
    pub fn status(&self) -> NegotiationStatus {
        match self.phase {
            NegotiationPhase::Pending => NegotiationStatus::Pending,
            NegotiationPhase::Negotiating => NegotiationStatus::Negotiating,
            NegotiationPhase::Confirmed { .. } => NegotiationStatus::Confirmed,
        }
    }

    /// The agreed venue. `Some` exactly when confirmed.
    pub fn final_location(&self) -> Option<&Location> {
        match &self.phase {
            NegotiationPhase::Confirmed { final_location } => Some(final_location),
            _ => None,
        }
    }

    pub fn has_voted(&self, user: &UserId) -> bool {
        self.votes.contains_key(user)
    }

    /// Room to use for a chat: the existing one, or `proposed` if none.
    /// The flag is true when `proposed` was adopted.
    fn adopt_room(&mut self, proposed: ChatRoomId) -> (ChatRoomId, bool) {
        match self.chat_room_id {
            Some(existing) => (existing, false),
            None => {
                self.chat_room_id = Some(proposed);
                (proposed, true)
            }
        }
    }
}

/// What a vote led to.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    /// The other participant has not voted yet.
    AwaitingCounterpart,
    /// Both votes name the same place.
    Confirmed(Location),
    /// The votes differ. `room_created` is true when the caller must create
    /// the chat room `room`.
    Negotiating { room: ChatRoomId, room_created: bool },
}

/// Result of an explicit chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatInitiation {
    /// A room already existed.
    Existing(ChatRoomId),
    /// The proposed room id was adopted; the caller must create it.
    Created(ChatRoomId),
}

impl ChatInitiation {
    pub fn room_id(&self) -> ChatRoomId {
        match self {
            Self::Existing(id) | Self::Created(id) => *id,
        }
    }
}

/// A participant's view of the negotiation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NegotiationView {
    pub status: NegotiationStatus,
    pub has_voted: bool,
    pub other_has_voted: bool,
    pub final_location: Option<Location>,
    pub chat_room_id: Option<ChatRoomId>,
}

impl Engagement {
    /// Record or replace `actor`'s vote and evaluate it against the other
    /// participant's.
    ///
    /// `proposed_room` is adopted as the chat room id if the votes differ
    /// and no room exists yet.
    ///
    /// Fails with [`EngagementError::InvalidState`] once the location is
    /// confirmed. Use [`confirm_final_location`](Self::confirm_final_location)
    /// to change a confirmed venue.
    pub fn vote(
        &mut self,
        actor: UserId,
        location: Location,
        proposed_room: ChatRoomId,
        now: Timestamp,
    ) -> Result<VoteOutcome, EngagementError> {
        const OP: &str = "vote on a location";
        let other = self.counterpart(&actor)?;
        self.require_status(&[EngagementStatus::Accepted], OP)?;
        if self.negotiation.status() == NegotiationStatus::Confirmed {
            return Err(EngagementError::InvalidState {
                operation: OP,
                reason: "the meeting location is already confirmed".into(),
            });
        }
        location.validate()?;

        self.negotiation.votes.insert(actor, location.clone());
        self.updated_at = now;

        let theirs = self.negotiation.votes.get(&other).cloned();
        let outcome = match theirs {
            None => VoteOutcome::AwaitingCounterpart,
            Some(theirs) if theirs.same_place(&location) => {
                self.confirm_location(location.clone());
                VoteOutcome::Confirmed(location)
            }
            Some(_) => {
                self.negotiation.phase = NegotiationPhase::Negotiating;
                let (room, room_created) = self.negotiation.adopt_room(proposed_room);
                VoteOutcome::Negotiating { room, room_created }
            }
        };
        Ok(outcome)
    }

    /// Open, or return, the negotiation chat room without a disagreement.
    pub fn initiate_chat(
        &mut self,
        actor: UserId,
        proposed_room: ChatRoomId,
        now: Timestamp,
    ) -> Result<ChatInitiation, EngagementError> {
        self.require_participant(&actor)?;
        self.require_status(&[EngagementStatus::Accepted], "open a negotiation chat")?;

        let (room, created) = self.negotiation.adopt_room(proposed_room);
        if !created {
            return Ok(ChatInitiation::Existing(room));
        }
        if self.negotiation.status() == NegotiationStatus::Pending {
            self.negotiation.phase = NegotiationPhase::Negotiating;
        }
        self.updated_at = now;
        Ok(ChatInitiation::Created(room))
    }

    /// Set the final location directly, from any negotiation phase.
    ///
    /// Overrides an earlier confirmation. The meeting location follows.
    pub fn confirm_final_location(
        &mut self,
        actor: UserId,
        location: Location,
        now: Timestamp,
    ) -> Result<Location, EngagementError> {
        self.require_participant(&actor)?;
        self.require_status(&[EngagementStatus::Accepted], "confirm a location")?;
        location.validate()?;

        self.confirm_location(location.clone());
        self.updated_at = now;
        Ok(location)
    }

    /// `actor`'s view of the negotiation.
    pub fn negotiation_view(&self, actor: &UserId) -> Result<NegotiationView, EngagementError> {
        let other = self.counterpart(actor)?;
        Ok(NegotiationView {
            status: self.negotiation.status(),
            has_voted: self.negotiation.has_voted(actor),
            other_has_voted: self.negotiation.has_voted(&other),
            final_location: self.negotiation.final_location().cloned(),
            chat_room_id: self.negotiation.chat_room_id,
        })
    }

    fn confirm_location(&mut self, location: Location) {
        self.meeting.location = Some(location.clone());
        self.negotiation.phase = NegotiationPhase::Confirmed {
            final_location: location,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::Decision;
    use blindate_core::EngagementId;

    fn now() -> Timestamp {
        Timestamp::parse("now", "2026-05-01T12:00:00Z").unwrap()
    }

    fn accepted() -> (Engagement, UserId, UserId) {
        let (a, b) = (UserId::new(), UserId::new());
        let mut e = Engagement::invite(EngagementId::new(), a, b, now()).unwrap();
        e.respond(b, Decision::Accepted, now()).unwrap();
        (e, a, b)
    }

    fn cafe_x() -> Location {
        Location::new("Cafe X", "12 Main St")
    }

    fn park_y() -> Location {
        Location::new("Park Y", "")
    }

    #[test]
    fn matching_votes_confirm() {
        let (mut e, a, b) = accepted();
        assert_eq!(
            e.vote(a, cafe_x(), ChatRoomId::new(), now()).unwrap(),
            VoteOutcome::AwaitingCounterpart
        );
        assert_eq!(
            e.vote(b, cafe_x(), ChatRoomId::new(), now()).unwrap(),
            VoteOutcome::Confirmed(cafe_x())
        );
        assert_eq!(e.negotiation.status(), NegotiationStatus::Confirmed);
        assert_eq!(e.negotiation.final_location(), Some(&cafe_x()));
        assert_eq!(e.meeting.location, Some(cafe_x()));
        assert!(e.negotiation.chat_room_id.is_none());
    }

    #[test]
    fn differing_votes_adopt_room_once() {
        let (mut e, a, b) = accepted();
        let room = ChatRoomId::new();
        e.vote(a, cafe_x(), ChatRoomId::new(), now()).unwrap();
        let first = e.vote(b, park_y(), room, now()).unwrap();
        assert_eq!(
            first,
            VoteOutcome::Negotiating {
                room,
                room_created: true
            }
        );

        let again = e.vote(a, Location::new("Bar Z", ""), ChatRoomId::new(), now()).unwrap();
        assert_eq!(
            again,
            VoteOutcome::Negotiating {
                room,
                room_created: false
            }
        );
        assert_eq!(e.negotiation.status(), NegotiationStatus::Negotiating);
    }

    #[test]
    fn revote_replaces_and_can_converge() {
        let (mut e, a, b) = accepted();
        e.vote(a, cafe_x(), ChatRoomId::new(), now()).unwrap();
        e.vote(b, park_y(), ChatRoomId::new(), now()).unwrap();
        let outcome = e.vote(b, cafe_x(), ChatRoomId::new(), now()).unwrap();
        assert_eq!(outcome, VoteOutcome::Confirmed(cafe_x()));
        assert_eq!(e.negotiation.votes.len(), 2);
    }

    #[test]
    fn vote_after_confirmation_rejected() {
        let (mut e, a, b) = accepted();
        e.vote(a, cafe_x(), ChatRoomId::new(), now()).unwrap();
        e.vote(b, cafe_x(), ChatRoomId::new(), now()).unwrap();
        let err = e.vote(a, park_y(), ChatRoomId::new(), now()).unwrap_err();
        assert!(matches!(err, EngagementError::InvalidState { .. }));
    }

    #[test]
    fn vote_requires_accepted() {
        let (a, b) = (UserId::new(), UserId::new());
        let mut e = Engagement::invite(EngagementId::new(), a, b, now()).unwrap();
        let err = e.vote(a, cafe_x(), ChatRoomId::new(), now()).unwrap_err();
        assert!(matches!(err, EngagementError::InvalidState { .. }));
    }

    #[test]
    fn vote_with_blank_name_rejected() {
        let (mut e, a, _) = accepted();
        let err = e
            .vote(a, Location::new(" ", "x"), ChatRoomId::new(), now())
            .unwrap_err();
        assert!(matches!(err, EngagementError::Validation(_)));
    }

    #[test]
    fn initiate_chat_is_idempotent() {
        let (mut e, a, b) = accepted();
        let room = ChatRoomId::new();
        assert_eq!(
            e.initiate_chat(a, room, now()).unwrap(),
            ChatInitiation::Created(room)
        );
        assert_eq!(e.negotiation.status(), NegotiationStatus::Negotiating);
        assert_eq!(
            e.initiate_chat(b, ChatRoomId::new(), now()).unwrap(),
            ChatInitiation::Existing(room)
        );
    }

    #[test]
    fn confirm_overrides_from_any_phase() {
        let (mut e, a, b) = accepted();
        e.confirm_final_location(a, cafe_x(), now()).unwrap();
        e.confirm_final_location(b, park_y(), now()).unwrap();
        assert_eq!(e.negotiation.final_location(), Some(&park_y()));
        assert_eq!(e.meeting.location, Some(park_y()));
    }

    #[test]
    fn view_is_relative_to_reader() {
        let (mut e, a, b) = accepted();
        e.vote(a, cafe_x(), ChatRoomId::new(), now()).unwrap();
        let va = e.negotiation_view(&a).unwrap();
        let vb = e.negotiation_view(&b).unwrap();
        assert!(va.has_voted && !va.other_has_voted);
        assert!(!vb.has_voted && vb.other_has_voted);
        assert_eq!(
            e.negotiation_view(&UserId::new()).unwrap_err(),
            EngagementError::NotAParticipant
        );
    }

    #[test]
    fn confirmed_phase_serializes_final_location() {
        let (mut e, a, _) = accepted();
        e.confirm_final_location(a, cafe_x(), now()).unwrap();
        let json = serde_json::to_value(&e.negotiation).unwrap();
        assert_eq!(json["phase"]["status"], "confirmed");
        assert_eq!(json["phase"]["final_location"]["name"], "Cafe X");
        let back: LocationNegotiation = serde_json::from_value(json).unwrap();
        assert_eq!(back, e.negotiation);
    }
}

//! # Engagement Lifecycle State Machine
//!
//! Models a blind-date invitation from first invite to review.
//!
//! ## States
//!
//! ```text
//! Pending ──▶ Accepted ──▶ Completed
//!    │            │
//!    ├──▶ Rejected │
//!    │            │
//!    └──▶ Cancelled ◀┘
//! ```
//!
//! `Rejected`, `Completed` and `Cancelled` are terminal. A terminal
//! engagement is inactive; a `Completed` or `Cancelled` one can be
//! reinvited, which starts a fresh episode on the same record. A
//! `Rejected` pair can never be reinvited.
//!
//! ## Checks
//!
//! Every operation checks, in order: membership, current status, then
//! input validation. A non-participant therefore learns nothing about the
//! engagement's state, and an operation on a terminal engagement reports
//! the state conflict even when its payload is also malformed.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use blindate_core::validation;
use blindate_core::{EngagementId, ParticipantPair, Timestamp, UserId, ValidationError};

use crate::meeting::{MeetingDetails, MeetingDetailsUpdate, MeetingMode, Review};
use crate::negotiation::LocationNegotiation;

/// Days after the scheduled start before a half-reviewed date completes.
pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 7;

const MAX_CANCEL_REASON_CHARS: usize = 500;

// ─── Status ──────────────────────────────────────────────────────────

/// Lifecycle status of an engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementStatus {
    /// Invitation sent, waiting on responses.
    Pending,
    /// Both participants accepted.
    Accepted,
    /// A participant declined. Permanent for the pair.
    Rejected,
    /// The date happened and was reviewed.
    Completed,
    /// Called off by a participant.
    Cancelled,
}

impl EngagementStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further lifecycle transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }

    /// Statuses reachable in one step.
    pub fn valid_transitions(&self) -> &'static [EngagementStatus] {
        match self {
            Self::Pending => &[Self::Accepted, Self::Rejected, Self::Cancelled],
            Self::Accepted => &[Self::Completed, Self::Cancelled],
            Self::Rejected | Self::Completed | Self::Cancelled => &[],
        }
    }

    /// Whether `to` is reachable in one step.
    pub fn can_transition_to(&self, to: EngagementStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl std::fmt::Display for EngagementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant's answer to the invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Pending,
    Accepted,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(ValidationError::new(
                "decision",
                format!("must be 'accepted' or 'rejected', got '{other}'"),
            )),
        }
    }
}

/// One participant's response slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub decision: Decision,
    pub responded_at: Option<Timestamp>,
}

impl ParticipantResponse {
    fn accepted(at: Timestamp) -> Self {
        Self {
            decision: Decision::Accepted,
            responded_at: Some(at),
        }
    }

    fn pending() -> Self {
        Self {
            decision: Decision::Pending,
            responded_at: None,
        }
    }
}

/// A committed status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: EngagementStatus,
    pub to: EngagementStatus,
}

/// A record of a state transition, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_state: EngagementStatus,
    pub to_state: EngagementStatus,
    /// `None` for system-driven transitions (grace-period completion).
    pub actor: Option<UserId>,
    pub reason: String,
    pub timestamp: Timestamp,
}

/// Who called the date off, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_by: UserId,
    pub reason: String,
    pub cancelled_at: Timestamp,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from engagement and negotiation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngagementError {
    /// The actor is not one of the two participants.
    #[error("caller is not a participant of this engagement")]
    NotAParticipant,

    /// The operation is not allowed in the current state.
    #[error("cannot {operation}: {reason}")]
    InvalidState {
        operation: &'static str,
        reason: String,
    },

    /// The pair has a rejected engagement on record.
    #[error("this pair has declined before; a new invitation is not possible")]
    PermanentlyRejected,

    /// Malformed input.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// ─── Engagement ──────────────────────────────────────────────────────

/// A blind-date engagement between two users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub id: EngagementId,
    pub participants: ParticipantPair,
    /// Whoever sent the most recent invitation.
    pub initiator: UserId,
    pub status: EngagementStatus,
    /// Exactly one entry per participant.
    pub responses: BTreeMap<UserId, ParticipantResponse>,
    pub meeting: MeetingDetails,
    pub negotiation: LocationNegotiation,
    /// At most one review per participant.
    pub reviews: BTreeMap<UserId, Review>,
    /// True while `Pending` or `Accepted`. At most one active engagement
    /// exists per pair.
    pub active: bool,
    pub cancellation: Option<Cancellation>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Optimistic concurrency token. Bumped by the repository on write.
    pub version: u64,
    pub transition_log: Vec<TransitionRecord>,
}

impl Engagement {
    /// Start a new engagement. The initiator is recorded as accepted.
    pub fn invite(
        id: EngagementId,
        initiator: UserId,
        invitee: UserId,
        now: Timestamp,
    ) -> Result<Self, EngagementError> {
        let participants = ParticipantPair::new(initiator, invitee)?;
        let mut engagement = Self {
            id,
            participants,
            initiator,
            status: EngagementStatus::Pending,
            responses: BTreeMap::new(),
            meeting: MeetingDetails::default(),
            negotiation: LocationNegotiation::default(),
            reviews: BTreeMap::new(),
            active: true,
            cancellation: None,
            created_at: now,
            updated_at: now,
            version: 0,
            transition_log: Vec::new(),
        };
        engagement.reset_responses(initiator, now);
        Ok(engagement)
    }

    /// Start a fresh episode on an archived `Completed` or `Cancelled`
    /// engagement.
    ///
    /// Responses, meeting details, negotiation and reviews are cleared.
    pub fn reinvite(
        &mut self,
        initiator: UserId,
        now: Timestamp,
    ) -> Result<StatusChange, EngagementError> {
        self.require_participant(&initiator)?;
        match self.status {
            EngagementStatus::Rejected => return Err(EngagementError::PermanentlyRejected),
            _ if self.active => {
                return Err(EngagementError::InvalidState {
                    operation: "reinvite",
                    reason: format!("engagement is still {}", self.status),
                })
            }
            _ => {}
        }

        self.initiator = initiator;
        self.reset_responses(initiator, now);
        self.meeting = MeetingDetails::default();
        self.negotiation = LocationNegotiation::default();
        self.reviews.clear();
        self.cancellation = None;
        self.active = true;
        Ok(self.transition_to(
            EngagementStatus::Pending,
            Some(initiator),
            "reinvited",
            now,
        ))
    }

    /// Record `actor`'s decision.
    ///
    /// A rejection moves the engagement to `Rejected` immediately; the
    /// second acceptance moves it to `Accepted`. Re-sending the same
    /// decision is a no-op, including a repeated rejection by the
    /// participant who rejected. Returns the status change, if any.
    pub fn respond(
        &mut self,
        actor: UserId,
        decision: Decision,
        now: Timestamp,
    ) -> Result<Option<StatusChange>, EngagementError> {
        self.require_participant(&actor)?;
        if self.is_repeated_rejection(&actor, decision) {
            return Ok(None);
        }
        self.require_status(&[EngagementStatus::Pending], "respond")?;
        if decision == Decision::Pending {
            return Err(ValidationError::new("decision", "must be 'accepted' or 'rejected'").into());
        }

        let current = self.responses.get(&actor).map(|r| r.decision);
        if current == Some(decision) {
            return Ok(None);
        }
        self.responses.insert(
            actor,
            ParticipantResponse {
                decision,
                responded_at: Some(now),
            },
        );
        self.updated_at = now;

        if decision == Decision::Rejected {
            return Ok(Some(self.transition_to(
                EngagementStatus::Rejected,
                Some(actor),
                "invitation declined",
                now,
            )));
        }
        let all_accepted = self
            .participants
            .members()
            .iter()
            .all(|m| self.decision_of(m) == Decision::Accepted);
        if all_accepted {
            return Ok(Some(self.transition_to(
                EngagementStatus::Accepted,
                Some(actor),
                "both participants accepted",
                now,
            )));
        }
        Ok(None)
    }

    /// Merge a meeting update. Requires `Accepted`.
    ///
    /// Once the venue is confirmed the update may only repeat it; moving
    /// the date elsewhere goes through `confirm_final_location`.
    pub fn update_meeting_details(
        &mut self,
        actor: UserId,
        update: &MeetingDetailsUpdate,
        now: Timestamp,
    ) -> Result<(), EngagementError> {
        const OP: &str = "update meeting details";
        self.require_participant(&actor)?;
        self.require_status(&[EngagementStatus::Accepted], OP)?;
        if let (Some(wanted), Some(confirmed)) =
            (&update.location, self.negotiation.final_location())
        {
            if wanted != confirmed {
                return Err(EngagementError::InvalidState {
                    operation: OP,
                    reason: "the meeting location is already confirmed".into(),
                });
            }
        }
        self.meeting = self.meeting.merged_with(update, now)?;
        self.updated_at = now;
        Ok(())
    }

    /// Add or replace `actor`'s review, then evaluate completion.
    ///
    /// Requires `Accepted` or `Completed` and a scheduled start in the past.
    pub fn submit_review(
        &mut self,
        actor: UserId,
        rating: u8,
        comment: &str,
        now: Timestamp,
        grace: Duration,
    ) -> Result<Option<StatusChange>, EngagementError> {
        const OP: &str = "submit a review";
        self.require_participant(&actor)?;
        self.require_status(
            &[EngagementStatus::Accepted, EngagementStatus::Completed],
            OP,
        )?;
        match self.meeting.scheduled_for {
            None => {
                return Err(EngagementError::InvalidState {
                    operation: OP,
                    reason: "the date has not been scheduled".into(),
                })
            }
            Some(at) if at >= now => {
                return Err(EngagementError::InvalidState {
                    operation: OP,
                    reason: "the date has not happened yet".into(),
                })
            }
            Some(_) => {}
        }

        let review = Review::new(actor, rating, comment, now)?;
        self.reviews.insert(actor, review);
        self.updated_at = now;
        Ok(self.evaluate_completion(now, grace))
    }

    /// Whether an `Accepted` engagement should complete at `now`.
    ///
    /// True once both participants reviewed, or once `grace` has passed
    /// since the scheduled start and at least one review exists.
    pub fn completion_due(&self, now: Timestamp, grace: Duration) -> bool {
        if self.status != EngagementStatus::Accepted {
            return false;
        }
        let all_reviewed = self
            .participants
            .members()
            .iter()
            .all(|m| self.reviews.contains_key(m));
        if all_reviewed {
            return true;
        }
        let grace_elapsed = self
            .meeting
            .scheduled_for
            .is_some_and(|at| now.since(&at) > grace);
        grace_elapsed && !self.reviews.is_empty()
    }

    /// Complete the engagement if [`completion_due`](Self::completion_due).
    pub fn evaluate_completion(&mut self, now: Timestamp, grace: Duration) -> Option<StatusChange> {
        if !self.completion_due(now, grace) {
            return None;
        }
        let reason = if self.reviews.len() == 2 {
            "both participants reviewed"
        } else {
            "review grace period elapsed"
        };
        Some(self.transition_to(EngagementStatus::Completed, None, reason, now))
    }

    /// Call the date off. Allowed from `Pending` or `Accepted`.
    pub fn cancel(
        &mut self,
        actor: UserId,
        reason: &str,
        now: Timestamp,
    ) -> Result<StatusChange, EngagementError> {
        self.require_participant(&actor)?;
        self.require_status(
            &[EngagementStatus::Pending, EngagementStatus::Accepted],
            "cancel",
        )?;
        let reason = reason.trim();
        validation::max_chars("reason", reason, MAX_CANCEL_REASON_CHARS)?;

        self.cancellation = Some(Cancellation {
            cancelled_by: actor,
            reason: reason.to_string(),
            cancelled_at: now,
        });
        Ok(self.transition_to(
            EngagementStatus::Cancelled,
            Some(actor),
            if reason.is_empty() { "cancelled" } else { reason },
            now,
        ))
    }

    /// Attach a provisioned video link. Requires an `Accepted` online date.
    pub fn set_video_link(
        &mut self,
        actor: UserId,
        link: String,
        now: Timestamp,
    ) -> Result<(), EngagementError> {
        self.require_participant(&actor)?;
        self.require_status(&[EngagementStatus::Accepted], "provision a video link")?;
        if self.meeting.mode != MeetingMode::Online {
            return Err(EngagementError::InvalidState {
                operation: "provision a video link",
                reason: "the date is not online".into(),
            });
        }
        self.meeting.video_call_link = Some(link);
        self.updated_at = now;
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Whether `user` is one of the two participants.
    pub fn is_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }

    /// Fail with [`EngagementError::NotAParticipant`] unless `user` participates.
    pub fn require_participant(&self, user: &UserId) -> Result<(), EngagementError> {
        if self.is_participant(user) {
            Ok(())
        } else {
            Err(EngagementError::NotAParticipant)
        }
    }

    /// The participant who is not `user`.
    pub fn counterpart(&self, user: &UserId) -> Result<UserId, EngagementError> {
        self.participants
            .other(user)
            .ok_or(EngagementError::NotAParticipant)
    }

    /// Whether `actor` is re-sending the rejection that ended this engagement.
    pub fn is_repeated_rejection(&self, actor: &UserId, decision: Decision) -> bool {
        self.status == EngagementStatus::Rejected
            && decision == Decision::Rejected
            && self.decision_of(actor) == Decision::Rejected
    }

    /// `user`'s current decision. Non-participants read as pending.
    pub fn decision_of(&self, user: &UserId) -> Decision {
        self.responses
            .get(user)
            .map(|r| r.decision)
            .unwrap_or(Decision::Pending)
    }

    // ── Internals ────────────────────────────────────────────────────

    pub(crate) fn require_status(
        &self,
        allowed: &[EngagementStatus],
        operation: &'static str,
    ) -> Result<(), EngagementError> {
        if allowed.contains(&self.status) {
            return Ok(());
        }
        Err(EngagementError::InvalidState {
            operation,
            reason: format!("engagement is {}", self.status),
        })
    }

    fn reset_responses(&mut self, initiator: UserId, now: Timestamp) {
        self.responses.clear();
        for member in self.participants.members() {
            let response = if member == initiator {
                ParticipantResponse::accepted(now)
            } else {
                ParticipantResponse::pending()
            };
            self.responses.insert(member, response);
        }
    }

    fn transition_to(
        &mut self,
        to: EngagementStatus,
        actor: Option<UserId>,
        reason: &str,
        now: Timestamp,
    ) -> StatusChange {
        let from = self.status;
        self.transition_log.push(TransitionRecord {
            from_state: from,
            to_state: to,
            actor,
            reason: reason.to_string(),
            timestamp: now,
        });
        self.status = to;
        if to.is_terminal() {
            self.active = false;
        }
        self.updated_at = now;
        StatusChange { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindate_core::Location;

    fn t0() -> Timestamp {
        Timestamp::parse("now", "2026-05-01T12:00:00Z").unwrap()
    }

    fn grace() -> Duration {
        Duration::days(DEFAULT_GRACE_PERIOD_DAYS)
    }

    fn pending() -> (Engagement, UserId, UserId) {
        let (a, b) = (UserId::new(), UserId::new());
        let e = Engagement::invite(EngagementId::new(), a, b, t0()).unwrap();
        (e, a, b)
    }

    fn accepted() -> (Engagement, UserId, UserId) {
        let (mut e, a, b) = pending();
        e.respond(b, Decision::Accepted, t0()).unwrap();
        (e, a, b)
    }

    fn scheduled_in_past() -> (Engagement, UserId, UserId) {
        let (mut e, a, b) = accepted();
        let update = MeetingDetailsUpdate {
            mode: Some(MeetingMode::Online),
            scheduled_for: Some(t0().shifted(Duration::hours(2))),
            ..Default::default()
        };
        e.update_meeting_details(a, &update, t0()).unwrap();
        (e, a, b)
    }

    fn after_date() -> Timestamp {
        t0().shifted(Duration::days(1))
    }

    #[test]
    fn status_graph() {
        use EngagementStatus::*;
        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Accepted.can_transition_to(Completed));
        assert!(!Accepted.can_transition_to(Rejected));
        for terminal in [Rejected, Completed, Cancelled] {
            assert!(terminal.is_terminal());
            assert!(terminal.valid_transitions().is_empty());
        }
    }

    #[test]
    fn invite_records_initiator_acceptance() {
        let (e, a, b) = pending();
        assert_eq!(e.status, EngagementStatus::Pending);
        assert!(e.active);
        assert_eq!(e.responses.len(), 2);
        assert_eq!(e.decision_of(&a), Decision::Accepted);
        assert_eq!(e.decision_of(&b), Decision::Pending);
        assert_eq!(e.initiator, a);
    }

    #[test]
    fn self_invite_is_validation_error() {
        let a = UserId::new();
        let err = Engagement::invite(EngagementId::new(), a, a, t0()).unwrap_err();
        assert!(matches!(err, EngagementError::Validation(_)));
    }

    #[test]
    fn second_acceptance_moves_to_accepted() {
        let (mut e, _, b) = pending();
        let change = e.respond(b, Decision::Accepted, t0()).unwrap();
        assert_eq!(
            change,
            Some(StatusChange {
                from: EngagementStatus::Pending,
                to: EngagementStatus::Accepted
            })
        );
        assert_eq!(e.transition_log.len(), 1);
    }

    #[test]
    fn repeated_acceptance_is_noop() {
        let (mut e, a, _) = pending();
        let before = e.clone();
        assert_eq!(e.respond(a, Decision::Accepted, t0()).unwrap(), None);
        assert_eq!(e, before);
    }

    #[test]
    fn rejection_is_terminal_and_inactive() {
        let (mut e, _, b) = pending();
        e.respond(b, Decision::Rejected, t0()).unwrap();
        assert_eq!(e.status, EngagementStatus::Rejected);
        assert!(!e.active);
        let err = e.respond(b, Decision::Accepted, t0()).unwrap_err();
        assert!(matches!(err, EngagementError::InvalidState { .. }));
    }

    #[test]
    fn initiator_can_withdraw_by_rejecting() {
        let (mut e, a, _) = pending();
        let change = e.respond(a, Decision::Rejected, t0()).unwrap().unwrap();
        assert_eq!(change.to, EngagementStatus::Rejected);
    }

    #[test]
    fn repeated_rejection_by_rejecter_is_noop() {
        let (mut e, a, b) = pending();
        e.respond(b, Decision::Rejected, t0()).unwrap();
        let before = e.clone();

        assert!(e.is_repeated_rejection(&b, Decision::Rejected));
        assert_eq!(e.respond(b, Decision::Rejected, t0()).unwrap(), None);
        assert_eq!(e, before);

        assert!(!e.is_repeated_rejection(&a, Decision::Rejected));
        let err = e.respond(a, Decision::Rejected, t0()).unwrap_err();
        assert!(matches!(err, EngagementError::InvalidState { .. }));
    }

    #[test]
    fn confirmed_location_cannot_be_replaced_by_meeting_update() {
        let (mut e, a, b) = accepted();
        let cafe = Location::new("Cafe Luna", "Main St 1");
        e.confirm_final_location(b, cafe.clone(), t0()).unwrap();

        let elsewhere = MeetingDetailsUpdate {
            scheduled_for: Some(t0().shifted(Duration::hours(3))),
            location: Some(Location::new("Park", "Central Sq")),
            ..Default::default()
        };
        let err = e.update_meeting_details(a, &elsewhere, t0()).unwrap_err();
        assert!(matches!(err, EngagementError::InvalidState { .. }));
        assert_eq!(e.meeting.location.as_ref(), Some(&cafe));

        let same = MeetingDetailsUpdate {
            location: Some(cafe.clone()),
            ..elsewhere
        };
        e.update_meeting_details(a, &same, t0()).unwrap();
        assert_eq!(e.meeting.location.as_ref(), e.negotiation.final_location());
    }

    #[test]
    fn pending_decision_is_rejected() {
        let (mut e, _, b) = pending();
        let err = e.respond(b, Decision::Pending, t0()).unwrap_err();
        assert!(matches!(err, EngagementError::Validation(_)));
    }

    #[test]
    fn outsider_is_not_a_participant() {
        let (mut e, _, _) = pending();
        let err = e.respond(UserId::new(), Decision::Accepted, t0()).unwrap_err();
        assert_eq!(err, EngagementError::NotAParticipant);
    }

    #[test]
    fn meeting_details_require_accepted() {
        let (mut e, a, _) = pending();
        let update = MeetingDetailsUpdate {
            mode: Some(MeetingMode::Online),
            scheduled_for: Some(t0().shifted(Duration::hours(1))),
            ..Default::default()
        };
        let err = e.update_meeting_details(a, &update, t0()).unwrap_err();
        assert!(matches!(err, EngagementError::InvalidState { .. }));
    }

    #[test]
    fn meeting_update_on_terminal_reports_state_before_payload() {
        let (mut e, a, _) = accepted();
        e.cancel(a, "", t0()).unwrap();
        let err = e
            .update_meeting_details(a, &MeetingDetailsUpdate::default(), t0())
            .unwrap_err();
        assert!(matches!(err, EngagementError::InvalidState { .. }));
    }

    #[test]
    fn review_before_date_is_invalid_state() {
        let (mut e, a, _) = scheduled_in_past();
        let err = e.submit_review(a, 5, "", t0(), grace()).unwrap_err();
        assert!(matches!(err, EngagementError::InvalidState { .. }));
    }

    #[test]
    fn review_without_schedule_is_invalid_state() {
        let (mut e, a, _) = accepted();
        let err = e.submit_review(a, 5, "", after_date(), grace()).unwrap_err();
        assert!(matches!(err, EngagementError::InvalidState { .. }));
    }

    #[test]
    fn both_reviews_complete() {
        let (mut e, a, b) = scheduled_in_past();
        assert_eq!(e.submit_review(a, 4, "fun", after_date(), grace()).unwrap(), None);
        let change = e.submit_review(b, 5, "great", after_date(), grace()).unwrap();
        assert_eq!(change.map(|c| c.to), Some(EngagementStatus::Completed));
        assert!(!e.active);
        assert_eq!(e.transition_log.last().unwrap().actor, None);
    }

    #[test]
    fn review_upserts() {
        let (mut e, a, _) = scheduled_in_past();
        e.submit_review(a, 2, "meh", after_date(), grace()).unwrap();
        e.submit_review(a, 4, "better on reflection", after_date(), grace())
            .unwrap();
        assert_eq!(e.reviews.len(), 1);
        assert_eq!(e.reviews[&a].rating, 4);
    }

    #[test]
    fn grace_completion_needs_one_review() {
        let (mut e, a, _) = scheduled_in_past();
        let late = t0().shifted(Duration::days(9));
        assert!(!e.completion_due(late, grace()));
        let change = e.submit_review(a, 3, "", late, grace()).unwrap();
        assert_eq!(change.map(|c| c.to), Some(EngagementStatus::Completed));
    }

    #[test]
    fn completed_accepts_late_review_without_new_transition() {
        let (mut e, a, b) = scheduled_in_past();
        let late = t0().shifted(Duration::days(9));
        e.submit_review(a, 3, "", late, grace()).unwrap();
        let logged = e.transition_log.len();
        assert_eq!(e.submit_review(b, 4, "", late, grace()).unwrap(), None);
        assert_eq!(e.reviews.len(), 2);
        assert_eq!(e.transition_log.len(), logged);
    }

    #[test]
    fn cancel_records_reason() {
        let (mut e, _, b) = accepted();
        e.cancel(b, " work trip ", t0()).unwrap();
        let c = e.cancellation.as_ref().unwrap();
        assert_eq!(c.cancelled_by, b);
        assert_eq!(c.reason, "work trip");
        assert!(!e.active);
    }

    #[test]
    fn cancel_terminal_is_invalid_state() {
        let (mut e, _, b) = pending();
        e.respond(b, Decision::Rejected, t0()).unwrap();
        assert!(matches!(
            e.cancel(b, "", t0()),
            Err(EngagementError::InvalidState { .. })
        ));
    }

    #[test]
    fn video_link_requires_online() {
        let (mut e, a, _) = accepted();
        let update = MeetingDetailsUpdate {
            mode: Some(MeetingMode::Offline),
            scheduled_for: Some(t0().shifted(Duration::hours(5))),
            location: Some(Location::new("Cafe X", "12 Main St")),
            ..Default::default()
        };
        e.update_meeting_details(a, &update, t0()).unwrap();
        let err = e.set_video_link(a, "https://meet/x".into(), t0()).unwrap_err();
        assert!(matches!(err, EngagementError::InvalidState { .. }));
    }

    #[test]
    fn reinvite_resets_episode() {
        let (mut e, a, b) = accepted();
        e.cancel(a, "", t0()).unwrap();
        let change = e.reinvite(b, t0()).unwrap();
        assert_eq!(change.to, EngagementStatus::Pending);
        assert!(e.active);
        assert_eq!(e.initiator, b);
        assert_eq!(e.decision_of(&b), Decision::Accepted);
        assert_eq!(e.decision_of(&a), Decision::Pending);
        assert!(e.cancellation.is_none());
        assert!(e.reviews.is_empty());
    }

    #[test]
    fn reinvite_rejected_is_permanent() {
        let (mut e, a, b) = pending();
        e.respond(b, Decision::Rejected, t0()).unwrap();
        assert_eq!(e.reinvite(a, t0()), Err(EngagementError::PermanentlyRejected));
    }

    #[test]
    fn reinvite_active_is_invalid_state() {
        let (mut e, a, _) = pending();
        assert!(matches!(
            e.reinvite(a, t0()),
            Err(EngagementError::InvalidState { .. })
        ));
    }

    #[test]
    fn serde_roundtrip_preserves_record() {
        let (e, _, _) = scheduled_in_past();
        let json = serde_json::to_string(&e).unwrap();
        let back: Engagement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::negotiation::NegotiationStatus;
    use blindate_core::{ChatRoomId, Location};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Action {
        Respond(usize, bool),
        Schedule(usize, i64),
        Review(usize, u8),
        Cancel(usize),
        Vote(usize, u8),
        Confirm(usize),
        InitiateChat(usize),
        VideoLink(usize),
        Advance(i64),
        Sweep,
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            (0..3usize, any::<bool>()).prop_map(|(w, a)| Action::Respond(w, a)),
            (0..3usize, -2..48i64).prop_map(|(w, h)| Action::Schedule(w, h)),
            (0..3usize, 1..=5u8).prop_map(|(w, r)| Action::Review(w, r)),
            (0..3usize).prop_map(Action::Cancel),
            (0..3usize, 0..2u8).prop_map(|(w, p)| Action::Vote(w, p)),
            (0..3usize).prop_map(Action::Confirm),
            (0..3usize).prop_map(Action::InitiateChat),
            (0..3usize).prop_map(Action::VideoLink),
            (1..240i64).prop_map(Action::Advance),
            Just(Action::Sweep),
        ]
    }

    fn place(idx: u8) -> Location {
        Location::new(format!("Venue {idx}"), "1 Main St")
    }

    enum Outcome {
        Changed,
        Failed(EngagementError),
    }

    fn apply(e: &mut Engagement, who: UserId, act: &Action, now: Timestamp) -> Outcome {
        let grace = Duration::days(DEFAULT_GRACE_PERIOD_DAYS);
        let result: Result<(), EngagementError> = match act {
            Action::Respond(_, accept) => {
                let d = if *accept { Decision::Accepted } else { Decision::Rejected };
                e.respond(who, d, now).map(|_| ())
            }
            Action::Schedule(_, hours) => {
                let update = MeetingDetailsUpdate {
                    mode: Some(MeetingMode::Online),
                    scheduled_for: Some(now.shifted(Duration::hours(*hours))),
                    ..Default::default()
                };
                e.update_meeting_details(who, &update, now)
            }
            Action::Review(_, rating) => e.submit_review(who, *rating, "", now, grace).map(|_| ()),
            Action::Cancel(_) => e.cancel(who, "", now).map(|_| ()),
            Action::Vote(_, p) => e.vote(who, place(*p), ChatRoomId::new(), now).map(|_| ()),
            Action::Confirm(_) => e.confirm_final_location(who, place(9), now).map(|_| ()),
            Action::InitiateChat(_) => e.initiate_chat(who, ChatRoomId::new(), now).map(|_| ()),
            Action::VideoLink(_) => e.set_video_link(who, "https://v/x".into(), now),
            Action::Advance(_) | Action::Sweep => {
                e.evaluate_completion(now, grace);
                Ok(())
            }
        };
        match result {
            Ok(()) => Outcome::Changed,
            Err(err) => Outcome::Failed(err),
        }
    }

    fn actor_index(act: &Action) -> Option<usize> {
        match act {
            Action::Respond(w, _)
            | Action::Schedule(w, _)
            | Action::Review(w, _)
            | Action::Cancel(w)
            | Action::Vote(w, _)
            | Action::Confirm(w)
            | Action::InitiateChat(w)
            | Action::VideoLink(w) => Some(*w),
            Action::Advance(_) | Action::Sweep => None,
        }
    }

    /// Whether the engagement's status lets a participant attempt `act`.
    fn status_permits(e: &Engagement, who: UserId, act: &Action) -> bool {
        use EngagementStatus::*;
        match act {
            Action::Respond(_, accept) => {
                e.status == Pending
                    || (!accept && e.is_repeated_rejection(&who, Decision::Rejected))
            }
            Action::Schedule(..)
            | Action::Vote(..)
            | Action::Confirm(_)
            | Action::InitiateChat(_)
            | Action::VideoLink(_) => e.status == Accepted,
            Action::Review(..) => matches!(e.status, Accepted | Completed),
            Action::Cancel(_) => matches!(e.status, Pending | Accepted),
            Action::Advance(_) | Action::Sweep => true,
        }
    }

    /// Actions whose only precondition is the status.
    fn status_is_sufficient(act: &Action) -> bool {
        matches!(
            act,
            Action::Respond(..) | Action::Cancel(_) | Action::Confirm(_) | Action::InitiateChat(_)
        )
    }

    proptest! {
        #[test]
        fn lifecycle_invariants_hold(actions in proptest::collection::vec(action(), 1..40)) {
            let (a, b, outsider) = (UserId::new(), UserId::new(), UserId::new());
            let people = [a, b, outsider];
            let mut now = Timestamp::parse("t", "2026-05-01T12:00:00Z").unwrap();
            let mut e = Engagement::invite(EngagementId::new(), a, b, now).unwrap();

            for act in &actions {
                if let Action::Advance(h) = act {
                    now = now.shifted(Duration::hours(*h));
                }
                let who = actor_index(act).map(|i| people[i]).unwrap_or(a);
                let before = e.clone();
                let permitted = status_permits(&before, who, act);
                let mut working = e.clone();

                match apply(&mut working, who, act, now) {
                    Outcome::Changed => {
                        prop_assert!(who != outsider, "outsider succeeded with {:?}", act);
                        prop_assert!(
                            permitted,
                            "{:?} succeeded while {}", act, before.status
                        );
                        e = working;
                    }
                    Outcome::Failed(err) => {
                        prop_assert_eq!(&working, &before);
                        if who == outsider {
                            prop_assert_eq!(err.clone(), EngagementError::NotAParticipant);
                        } else if !permitted {
                            let is_invalid_state = matches!(err, EngagementError::InvalidState { .. });
                            prop_assert!(
                                is_invalid_state,
                                "{:?} while {} failed with {:?}", act, before.status, err
                            );
                        } else {
                            prop_assert!(
                                !status_is_sufficient(act),
                                "{:?} while {} failed with {:?}", act, before.status, err
                            );
                        }
                    }
                }

                if e.status != before.status {
                    prop_assert!(
                        before.status.can_transition_to(e.status),
                        "illegal transition {} -> {}", before.status, e.status
                    );
                    prop_assert_eq!(e.transition_log.len(), before.transition_log.len() + 1);
                }
                prop_assert_eq!(e.active, !e.status.is_terminal());
                prop_assert_eq!(e.responses.len(), 2);
                prop_assert!(e.responses.keys().all(|k| e.participants.contains(k)));
                prop_assert!(e.reviews.len() <= 2);
                prop_assert!(!e.reviews.contains_key(&outsider));
                prop_assert_eq!(
                    e.negotiation.status() == NegotiationStatus::Confirmed,
                    e.negotiation.final_location().is_some()
                );
                if e.status == EngagementStatus::Accepted || e.status == EngagementStatus::Completed {
                    prop_assert!(e.responses.values().all(|r| r.decision == Decision::Accepted));
                }
                if e.negotiation.status() == NegotiationStatus::Negotiating {
                    prop_assert!(e.negotiation.chat_room_id.is_some());
                }
            }
        }
    }
}

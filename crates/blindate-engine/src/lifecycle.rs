//! # Lifecycle Manager
//!
//! The top-level engagement operations: invite, respond, schedule, review,
//! cancel and video-link provisioning, plus the reads that evaluate
//! grace completion lazily.
//!
//! ## Invitation checks
//!
//! `create_or_reinvite` checks, in order:
//!
//! 1. the two users differ,
//! 2. the invitee exists (`InvalidTarget`),
//! 3. both users are verified (`NotVerified`),
//! 4. the pair was never rejected (`PermanentlyRejected`),
//! 5. neither user blocked the other (`Blocked`).
//!
//! It then returns the active engagement unchanged, reactivates the most
//! recent archived one, or creates a new one.

use std::sync::Arc;

use serde::Serialize;

use blindate_core::{EngagementId, ParticipantPair, Timestamp, UserId};
use blindate_state::{
    Decision, Engagement, EngagementStatus, MeetingDetailsUpdate, StatusChange,
};

use crate::context::EngineContext;
use crate::error::BlindateError;
use crate::ports::{EventType, Notification, Reference};

/// Outcome of a grace-completion sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Engagement lifecycle operations.
#[derive(Clone)]
pub struct LifecycleManager {
    ctx: Arc<EngineContext>,
}

impl LifecycleManager {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Invite `invitee`, or return the pair's current engagement.
    pub async fn create_or_reinvite(
        &self,
        initiator: UserId,
        invitee: UserId,
    ) -> Result<Engagement, BlindateError> {
        let now = self.ctx.now();
        let pair = ParticipantPair::new(initiator, invitee)?;
        let users = &self.ctx.ports.users;

        let invitee_profile = users
            .profile(invitee)
            .await?
            .ok_or(BlindateError::InvalidTarget)?;
        let initiator_profile = users
            .profile(initiator)
            .await?
            .ok_or(BlindateError::NotVerified)?;
        if !(initiator_profile.verified && invitee_profile.verified) {
            return Err(BlindateError::NotVerified);
        }

        let mut attempt = 0;
        loop {
            let history = self.ctx.ports.engagements.find_all_by_pair(&pair).await?;
            if history
                .iter()
                .any(|e| e.status == EngagementStatus::Rejected)
            {
                return Err(BlindateError::PermanentlyRejected);
            }
            if users.is_blocked(initiator, invitee).await? {
                return Err(BlindateError::Blocked);
            }
            if let Some(active) = history.iter().find(|e| e.active) {
                return Ok(active.clone());
            }

            let written = match history.into_iter().max_by_key(|e| e.updated_at) {
                Some(archived) => self.reactivate(archived, initiator, now).await,
                None => self.create(initiator, invitee, now).await,
            };
            match written {
                Ok(engagement) => {
                    self.notify(
                        &engagement,
                        invitee,
                        initiator,
                        EventType::Invite,
                        "You have a new blind date invitation.",
                    )
                    .await;
                    return Ok(engagement);
                }
                Err(BlindateError::Storage(err))
                    if self.ctx.should_retry(&mut attempt, &err, "engagement") =>
                {
                    continue
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn create(
        &self,
        initiator: UserId,
        invitee: UserId,
        now: Timestamp,
    ) -> Result<Engagement, BlindateError> {
        let engagement = Engagement::invite(EngagementId::new(), initiator, invitee, now)?;
        self.ctx.ports.engagements.insert(&engagement).await?;
        tracing::info!(engagement = %engagement.id, "blind date created");
        Ok(engagement)
    }

    async fn reactivate(
        &self,
        mut engagement: Engagement,
        initiator: UserId,
        now: Timestamp,
    ) -> Result<Engagement, BlindateError> {
        let change = engagement.reinvite(initiator, now)?;
        engagement.version = self.ctx.ports.engagements.update(&engagement).await?;
        self.ctx.committed(&engagement, change).await?;
        Ok(engagement)
    }

    /// Record `actor`'s decision on a pending invitation.
    ///
    /// Repeating a rejection re-runs the post-transition hooks, so a
    /// mutual block that failed the first time is applied on retry.
    pub async fn respond(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
        decision: Decision,
    ) -> Result<Engagement, BlindateError> {
        let now = self.ctx.now();
        let (engagement, change) = self
            .ctx
            .mutate_engagement(engagement_id, |e| e.respond(actor, decision, now))
            .await?;

        match change {
            Some(change) => {
                let hooked = self.ctx.committed(&engagement, change).await;
                let other = engagement.counterpart(&actor)?;
                let (event, message) = match change.to {
                    EngagementStatus::Rejected => (
                        EventType::Rejected,
                        "Your blind date invitation was declined.",
                    ),
                    _ => (
                        EventType::Accepted,
                        "Your blind date accepted. Time to pick a place!",
                    ),
                };
                self.notify(&engagement, other, actor, event, message).await;
                hooked?;
            }
            None if engagement.is_repeated_rejection(&actor, decision) => {
                let change = StatusChange {
                    from: EngagementStatus::Pending,
                    to: EngagementStatus::Rejected,
                };
                self.ctx.run_hooks(&engagement, change).await?;
            }
            None => {}
        }
        Ok(engagement)
    }

    /// Merge new meeting details into an accepted engagement.
    pub async fn update_meeting_details(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
        update: MeetingDetailsUpdate,
    ) -> Result<Engagement, BlindateError> {
        let now = self.ctx.now();
        let (engagement, ()) = self
            .ctx
            .mutate_engagement(engagement_id, |e| e.update_meeting_details(actor, &update, now))
            .await?;
        let other = engagement.counterpart(&actor)?;
        self.notify(
            &engagement,
            other,
            actor,
            EventType::Updated,
            "Your blind date updated the meeting details.",
        )
        .await;
        Ok(engagement)
    }

    /// Add or replace `actor`'s review; completes the engagement when due.
    pub async fn submit_review(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
        rating: u8,
        comment: &str,
    ) -> Result<Engagement, BlindateError> {
        let now = self.ctx.now();
        let grace = self.ctx.config.grace_period();
        let (engagement, change) = self
            .ctx
            .mutate_engagement(engagement_id, |e| {
                e.submit_review(actor, rating, comment, now, grace)
            })
            .await?;

        let hooked = match change {
            Some(change) => self.ctx.committed(&engagement, change).await,
            None => Ok(()),
        };
        let other = engagement.counterpart(&actor)?;
        self.notify(
            &engagement,
            other,
            actor,
            EventType::Reviewed,
            "Your blind date left a review.",
        )
        .await;
        hooked?;
        Ok(engagement)
    }

    /// Call the date off.
    pub async fn cancel(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
        reason: &str,
    ) -> Result<Engagement, BlindateError> {
        let now = self.ctx.now();
        let (engagement, change) = self
            .ctx
            .mutate_engagement(engagement_id, |e| e.cancel(actor, reason, now))
            .await?;
        let hooked = self.ctx.committed(&engagement, change).await;

        let other = engagement.counterpart(&actor)?;
        self.notify(
            &engagement,
            other,
            actor,
            EventType::Cancelled,
            "Your blind date was cancelled.",
        )
        .await;
        hooked?;
        Ok(engagement)
    }

    /// Generate a fresh video link for an accepted online date.
    pub async fn provision_video_link(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
    ) -> Result<String, BlindateError> {
        let now = self.ctx.now();
        let meeting_id = uuid::Uuid::new_v4().simple().to_string();
        let link = format!(
            "{}/blindate-{meeting_id}",
            self.ctx.config.video_base_url.trim_end_matches('/')
        );
        let (engagement, ()) = self
            .ctx
            .mutate_engagement(engagement_id, |e| e.set_video_link(actor, link.clone(), now))
            .await?;

        let other = engagement.counterpart(&actor)?;
        self.notify(
            &engagement,
            other,
            actor,
            EventType::VideoLinkReady,
            "The video call link for your blind date is ready.",
        )
        .await;
        Ok(link)
    }

    /// Read an engagement as `actor`, applying grace completion if due.
    pub async fn get(
        &self,
        engagement_id: EngagementId,
        actor: UserId,
    ) -> Result<Engagement, BlindateError> {
        let engagement = self.ctx.load_engagement(engagement_id).await?;
        engagement.require_participant(&actor)?;
        self.complete_if_due(engagement).await
    }

    /// Every engagement of `actor`, most recently updated first.
    pub async fn list_for_user(&self, actor: UserId) -> Result<Vec<Engagement>, BlindateError> {
        let stored = self.ctx.ports.engagements.list_for_participant(actor).await?;
        let mut engagements = Vec::with_capacity(stored.len());
        for engagement in stored {
            engagements.push(self.complete_if_due(engagement).await?);
        }
        engagements.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(engagements)
    }

    /// Apply grace completion to every overdue accepted engagement.
    pub async fn sweep_grace_completions(&self) -> Result<SweepReport, BlindateError> {
        let cutoff = self.ctx.now().shifted(-self.ctx.config.grace_period());
        let due = self.ctx.ports.engagements.list_due_for_grace(cutoff).await?;

        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };
        for engagement in due {
            let id = engagement.id;
            match self.complete_if_due(engagement).await {
                Ok(e) if e.status == EngagementStatus::Completed => report.completed += 1,
                Ok(_) => {}
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(engagement = %id, error = %err, "grace completion failed");
                }
            }
        }
        tracing::info!(
            examined = report.examined,
            completed = report.completed,
            failed = report.failed,
            "grace completion sweep finished"
        );
        Ok(report)
    }

    /// Persist grace completion when it is due at the current instant.
    async fn complete_if_due(&self, engagement: Engagement) -> Result<Engagement, BlindateError> {
        let now = self.ctx.now();
        let grace = self.ctx.config.grace_period();
        if !engagement.completion_due(now, grace) {
            return Ok(engagement);
        }
        let (engagement, change): (Engagement, Option<StatusChange>) = self
            .ctx
            .mutate_engagement(engagement.id, |e| Ok(e.evaluate_completion(now, grace)))
            .await?;
        if let Some(change) = change {
            self.ctx.committed(&engagement, change).await?;
        }
        Ok(engagement)
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

//! # Engine Context
//!
//! Shared plumbing of the three services: ports, configuration, hooks,
//! the optimistic-concurrency write loop, and best-effort side effects.
//!
//! ## Write loop
//!
//! `mutate_*` loads the latest record, applies one transition to an owned
//! copy and writes it back with a compare-and-swap on `version`. On
//! `Conflict` the whole read-apply-write is repeated against the fresh
//! record, so "both have now responded/voted" checks always see the other
//! participant's latest write. A transition that changes nothing is not
//! written at all.

use std::sync::Arc;

use blindate_core::{ChatRoomId, EngagementId, Timestamp};
use blindate_state::{ChatError, ChatRoom, Engagement, EngagementError, StatusChange};

use crate::config::EngineConfig;
use crate::error::{BlindateError, StorageError};
use crate::hooks::TransitionHook;
use crate::ports::{LiveEvent, Notification, Ports};

pub(crate) struct EngineContext {
    pub(crate) ports: Ports,
    pub(crate) config: EngineConfig,
    hooks: Vec<Arc<dyn TransitionHook>>,
}

impl EngineContext {
    pub(crate) fn new(
        ports: Ports,
        config: EngineConfig,
        hooks: Vec<Arc<dyn TransitionHook>>,
    ) -> Self {
        Self {
            ports,
            config,
            hooks,
        }
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.ports.clock.now()
    }

    pub(crate) async fn load_engagement(&self, id: EngagementId) -> Result<Engagement, BlindateError> {
        self.ports
            .engagements
            .get(id)
            .await?
            .ok_or(BlindateError::NotFound("blind date"))
    }

    pub(crate) async fn load_chat_room(&self, id: ChatRoomId) -> Result<ChatRoom, BlindateError> {
        self.ports
            .chat_rooms
            .get(id)
            .await?
            .ok_or(BlindateError::NotFound("chat room"))
    }

    /// Apply `apply` to the latest engagement and persist the result.
    ///
    /// Returns the committed record (or the unchanged one) and the
    /// transition's own output.
    pub(crate) async fn mutate_engagement<R, F>(
        &self,
        id: EngagementId,
        mut apply: F,
    ) -> Result<(Engagement, R), BlindateError>
    where
        F: FnMut(&mut Engagement) -> Result<R, EngagementError>,
    {
        let mut attempt = 0;
        loop {
            let current = self.load_engagement(id).await?;
            let mut next = current.clone();
            let output = apply(&mut next)?;
            if next == current {
                return Ok((current, output));
            }
            match self.ports.engagements.update(&next).await {
                Ok(version) => {
                    next.version = version;
                    return Ok((next, output));
                }
                Err(err) if self.should_retry(&mut attempt, &err, "engagement") => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Chat-room counterpart of [`mutate_engagement`](Self::mutate_engagement).
    pub(crate) async fn mutate_chat_room<R, F>(
        &self,
        id: ChatRoomId,
        mut apply: F,
    ) -> Result<(ChatRoom, R), BlindateError>
    where
        F: FnMut(&mut ChatRoom) -> Result<R, ChatError>,
    {
        let mut attempt = 0;
        loop {
            let current = self.load_chat_room(id).await?;
            let mut next = current.clone();
            let output = apply(&mut next)?;
            if next == current {
                return Ok((current, output));
            }
            match self.ports.chat_rooms.update(&next).await {
                Ok(version) => {
                    next.version = version;
                    return Ok((next, output));
                }
                Err(err) if self.should_retry(&mut attempt, &err, "chat_room") => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Whether a failed write should be attempted again.
    pub(crate) fn should_retry(&self, attempt: &mut u32, err: &StorageError, record: &str) -> bool {
        if !matches!(err, StorageError::Conflict(_)) || *attempt >= self.config.max_conflict_retries {
            return false;
        }
        *attempt += 1;
        metrics::counter!("blindate_conflict_retries_total").increment(1);
        tracing::debug!(record, attempt = *attempt, error = %err, "write conflict, retrying");
        true
    }

    /// Log, count and run hooks for a committed status change.
    ///
    /// The change is already persisted when a hook fails; the hook's error
    /// is returned so the caller can repeat the operation.
    pub(crate) async fn committed(
        &self,
        engagement: &Engagement,
        change: StatusChange,
    ) -> Result<(), BlindateError> {
        tracing::info!(
            engagement = %engagement.id,
            from = change.from.as_str(),
            to = change.to.as_str(),
            "engagement status changed"
        );
        metrics::counter!("blindate_transitions_total", "to" => change.to.as_str()).increment(1);
        self.run_hooks(engagement, change).await
    }

    /// Run every hook for `change`, stopping at the first failure.
    pub(crate) async fn run_hooks(
        &self,
        engagement: &Engagement,
        change: StatusChange,
    ) -> Result<(), BlindateError> {
        for hook in &self.hooks {
            if let Err(err) = hook.after_transition(engagement, change).await {
                metrics::counter!("blindate_hook_failures_total", "hook" => hook.name())
                    .increment(1);
                tracing::warn!(
                    hook = hook.name(),
                    engagement = %engagement.id,
                    error = %err,
                    "post-transition hook failed"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    /// Send a notification; failures are logged and swallowed.
    pub(crate) async fn notify(&self, notification: Notification) {
        if let Err(err) = self.ports.notifier.notify(&notification).await {
            metrics::counter!("blindate_notification_failures_total").increment(1);
            tracing::warn!(
                event = notification.event.as_str(),
                reference = notification.reference.kind(),
                error = %err,
                "notification failed; continuing"
            );
        }
    }

    pub(crate) fn publish(&self, event: LiveEvent) {
        tracing::trace!(event = event.name(), "publishing live event");
        self.ports.events.publish(event);
    }
}

//! # Post-Transition Hooks
//!
//! Policies that react to a committed status change without being part of
//! the state machine. A hook runs once per committed transition, after the
//! write succeeded. Retried attempts that lost a conflict never reach it.
//! Hooks must be idempotent. A failing hook does not undo the transition;
//! its error reaches the caller, and repeating the operation runs the
//! hook again.

use std::sync::Arc;

use async_trait::async_trait;

use blindate_state::{Engagement, EngagementStatus, StatusChange};

use crate::error::BlindateError;
use crate::ports::UserDirectory;

#[async_trait]
pub trait TransitionHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn after_transition(
        &self,
        engagement: &Engagement,
        change: StatusChange,
    ) -> Result<(), BlindateError>;
}

/// Makes a pair mutually invisible once an invitation is rejected.
pub struct MutualBlockOnRejection {
    users: Arc<dyn UserDirectory>,
}

impl MutualBlockOnRejection {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl TransitionHook for MutualBlockOnRejection {
    fn name(&self) -> &'static str {
        "mutual-block-on-rejection"
    }

    async fn after_transition(
        &self,
        engagement: &Engagement,
        change: StatusChange,
    ) -> Result<(), BlindateError> {
        if change.to != EngagementStatus::Rejected {
            return Ok(());
        }
        let [a, b] = engagement.participants.members();
        self.users.block_mutual(a, b).await?;
        tracing::info!(engagement = %engagement.id, "pair blocked after rejection");
        Ok(())
    }
}

//! # blindate-engine: Engagement Orchestration
//!
//! Runs the state machines of `blindate-state` against storage and wires
//! in the side effects: notifications, live events, and post-transition
//! hooks.
//!
//! ## Services
//!
//! - [`LifecycleManager`]: invite, respond, schedule, review, cancel,
//!   video links, reads with lazy grace completion, and the grace sweep.
//! - [`LocationNegotiator`]: votes, explicit chat initiation, direct
//!   confirmation and the per-participant negotiation view.
//! - [`NegotiationChat`]: posting, closing and anonymised transcripts.
//!
//! All three share one context, so they see the same ports, config and
//! hooks. Build them through [`Blindate`].
//!
//! ## Ports
//!
//! Storage, the user directory, notification delivery and live events are
//! traits in [`ports`]. [`memory`] has in-process implementations; the API
//! crate adds PostgreSQL ones.
//!
//! ## Failure Model
//!
//! - A state-machine error leaves storage untouched.
//! - An optimistic-concurrency conflict re-runs the operation against the
//!   fresh record, up to `max_conflict_retries` times.
//! - Notification and live-event failures never fail the operation.

pub mod chat;
pub mod clock;
pub mod config;
mod context;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod memory;
pub mod negotiation;
pub mod ports;

use std::sync::Arc;

pub use chat::NegotiationChat;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::{BlindateError, StorageError};
pub use hooks::{MutualBlockOnRejection, TransitionHook};
pub use lifecycle::{LifecycleManager, SweepReport};
pub use negotiation::{LocationNegotiator, VoteReceipt};
pub use ports::{
    ChatRoomRepository, EngagementRepository, EventScope, EventSink, EventType, LiveEvent,
    Notification, Notifier, NotifyError, Ports, Reference, UserDirectory, UserProfile,
};

use context::EngineContext;

/// The engine: one handle onto the three services.
#[derive(Clone)]
pub struct Blindate {
    lifecycle: LifecycleManager,
    negotiation: LocationNegotiator,
    chat: NegotiationChat,
}

impl Blindate {
    /// Build the engine with the default hooks for `config`.
    pub fn new(ports: Ports, config: EngineConfig) -> Self {
        let mut hooks: Vec<Arc<dyn TransitionHook>> = Vec::new();
        if config.block_on_rejection {
            hooks.push(Arc::new(MutualBlockOnRejection::new(ports.users.clone())));
        }
        Self::with_hooks(ports, config, hooks)
    }

    /// Build the engine with an explicit hook list.
    pub fn with_hooks(
        ports: Ports,
        config: EngineConfig,
        hooks: Vec<Arc<dyn TransitionHook>>,
    ) -> Self {
        let ctx = Arc::new(EngineContext::new(ports, config, hooks));
        let chat = NegotiationChat::new(ctx.clone());
        Self {
            lifecycle: LifecycleManager::new(ctx.clone()),
            negotiation: LocationNegotiator::new(ctx, chat.clone()),
            chat,
        }
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn negotiation(&self) -> &LocationNegotiator {
        &self.negotiation
    }

    pub fn chat(&self) -> &NegotiationChat {
        &self.chat
    }
}

impl std::fmt::Debug for Blindate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blindate").finish_non_exhaustive()
    }
}

//! # blindate-state: Engagement State Machines
//!
//! Pure, synchronous state machines for the blind-date stack. Nothing in
//! this crate performs I/O; the engine loads a record, applies one
//! transition method to it, and persists the result.
//!
//! ## State Machines
//!
//! - **Engagement** (`engagement.rs`): `Pending → Accepted → Completed`
//!   with `Rejected` and `Cancelled` branches. Terminal states reject
//!   every further transition.
//!
//! - **Location negotiation** (`negotiation.rs`): nested under `Accepted`,
//!   `Pending → Negotiating → Confirmed`. Two matching votes confirm
//!   directly; disagreeing votes open a chat room.
//!
//! - **Chat room** (`chat.rs`): `Active → Closed`, with an append-only
//!   message log and a read-time anonymised transcript.
//!
//! ## Design
//!
//! Each operation is one method returning `Result`. Callers apply it to an
//! owned copy of the stored record and discard the copy on error, so a
//! rejected operation never leaves a half-updated record behind.
//! Per-participant data (responses, votes, reviews) is keyed by `UserId`.

pub mod chat;
pub mod engagement;
pub mod meeting;
pub mod negotiation;

pub use chat::{
    ChatError, ChatMessage, ChatRoom, ChatRoomStatus, MessageAuthor, MessageSender, MessageView,
    COUNTERPART_PSEUDONYM,
};
pub use engagement::{
    Cancellation, Decision, Engagement, EngagementError, EngagementStatus, ParticipantResponse,
    StatusChange, TransitionRecord, DEFAULT_GRACE_PERIOD_DAYS,
};
pub use meeting::{MeetingDetails, MeetingDetailsUpdate, MeetingMode, Review};
pub use negotiation::{
    ChatInitiation, LocationNegotiation, NegotiationStatus, NegotiationView, VoteOutcome,
};

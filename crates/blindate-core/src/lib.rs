//! # blindate-core: Foundational Types
//!
//! The leaf of the workspace dependency graph. Defines the primitives every
//! other crate builds on:
//!
//! 1. **Newtype identifiers.** `UserId`, `EngagementId` and `ChatRoomId`
//!    wrap a UUID each, so an engagement id can never be passed where a
//!    user id is expected.
//!
//! 2. **`ParticipantPair`.** An unordered pair of two distinct users,
//!    normalised on construction. Per-pair lookups and uniqueness checks
//!    key on it, never on "first user in the array".
//!
//! 3. **UTC-only timestamps.** `Timestamp` is truncated to whole seconds
//!    and always rendered with a `Z` suffix.
//!
//! 4. **Meeting locations.** `Location` carries the exact-match rule used
//!    for automatic agreement between two votes.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `blindate-*` crates.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod location;
pub mod temporal;
pub mod validation;

pub use error::ValidationError;
pub use identity::{ChatRoomId, EngagementId, ParticipantPair, UserId};
pub use location::{Coordinates, Location};
pub use temporal::Timestamp;

//! # Identity Newtypes
//!
//! Newtype wrappers for every identifier namespace in the stack, plus the
//! unordered [`ParticipantPair`].
//!
//! The wrappers are `#[serde(transparent)]` so they serialize as bare UUID
//! strings, including when used as map keys.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Identifier of a user, as issued by the external profile store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of an engagement (one blind date between two users).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngagementId(Uuid);

/// Identifier of a negotiation chat room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatRoomId(Uuid);

impl UserId {
    /// Generate a new random user identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse a user identifier from its UUID string form.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        parse_uuid("user_id", s).map(Self)
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl EngagementId {
    /// Generate a new random engagement identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl ChatRoomId {
    /// Generate a new random chat room identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for EngagementId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ChatRoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

impl std::fmt::Display for EngagementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "engagement:{}", self.0)
    }
}

impl std::fmt::Display for ChatRoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chat:{}", self.0)
    }
}

fn parse_uuid(field: &str, s: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(s.trim())
        .map_err(|e| ValidationError::new(field, format!("not a valid UUID: {e}")))
}

// ─── Participant Pair ────────────────────────────────────────────────

/// An unordered pair of two distinct users.
///
/// The members are stored in sorted order, so `ParticipantPair::new(a, b)`
/// and `ParticipantPair::new(b, a)` compare equal and hash identically.
/// Neither member is privileged: there is no "player one".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair {
    low: UserId,
    high: UserId,
}

impl ParticipantPair {
    /// Build a pair from two users in any order.
    ///
    /// # Errors
    ///
    /// Rejects a pair whose members are the same user.
    pub fn new(a: UserId, b: UserId) -> Result<Self, ValidationError> {
        if a == b {
            return Err(ValidationError::new(
                "invitee_id",
                "a user cannot be paired with themselves",
            ));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }

    /// The member with the smaller identifier. Storage key only.
    pub fn low(&self) -> UserId {
        self.low
    }

    /// The member with the larger identifier. Storage key only.
    pub fn high(&self) -> UserId {
        self.high
    }

    /// Both members.
    pub fn members(&self) -> [UserId; 2] {
        [self.low, self.high]
    }

    /// Whether `user` belongs to this pair.
    pub fn contains(&self, user: &UserId) -> bool {
        self.low == *user || self.high == *user
    }

    /// The member that is not `user`, or `None` if `user` is not a member.
    pub fn other(&self, user: &UserId) -> Option<UserId> {
        if self.low == *user {
            Some(self.high)
        } else if self.high == *user {
            Some(self.low)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_order_independent() {
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(
            ParticipantPair::new(a, b).unwrap(),
            ParticipantPair::new(b, a).unwrap()
        );
    }

    #[test]
    fn pair_rejects_self() {
        let a = UserId::new();
        let err = ParticipantPair::new(a, a).unwrap_err();
        assert_eq!(err.field, "invitee_id");
    }

    #[test]
    fn other_returns_counterpart() {
        let a = UserId::new();
        let b = UserId::new();
        let pair = ParticipantPair::new(a, b).unwrap();
        assert_eq!(pair.other(&a), Some(b));
        assert_eq!(pair.other(&b), Some(a));
        assert_eq!(pair.other(&UserId::new()), None);
    }

    #[test]
    fn low_is_smaller_member() {
        let a = UserId::new();
        let b = UserId::new();
        let pair = ParticipantPair::new(a, b).unwrap();
        assert!(pair.low() < pair.high());
        assert!(pair.contains(&a) && pair.contains(&b));
    }

    #[test]
    fn user_id_parse_rejects_garbage() {
        assert!(UserId::parse("not-a-uuid").is_err());
        let id = UserId::new();
        assert_eq!(UserId::parse(&id.as_uuid().to_string()).unwrap(), id);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = EngagementId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }

    #[test]
    fn user_id_works_as_json_map_key() {
        let mut map = std::collections::BTreeMap::new();
        let id = UserId::new();
        map.insert(id, 1u8);
        let json = serde_json::to_string(&map).unwrap();
        let back: std::collections::BTreeMap<UserId, u8> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&id), Some(&1));
    }

    #[test]
    fn display_carries_namespace() {
        let id = ChatRoomId::new();
        assert!(id.to_string().starts_with("chat:"));
    }
}

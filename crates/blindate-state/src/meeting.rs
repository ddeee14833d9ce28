//! # Meeting Details and Reviews
//!
//! The scheduling half of an accepted engagement. Updates are partial:
//! fields absent from a [`MeetingDetailsUpdate`] keep their stored value,
//! but the merged result must still describe a complete, future date.

use serde::{Deserialize, Serialize};

use blindate_core::validation;
use blindate_core::{Location, Timestamp, UserId, ValidationError};

/// Duration used until the pair chooses one.
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

const MAX_DURATION_MINUTES: u32 = 24 * 60;
const MAX_COMMENT_CHARS: usize = 1000;

/// Whether the date happens in person or over video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingMode {
    /// Video call; a link can be provisioned.
    Online,
    /// In person; a location is required.
    #[default]
    Offline,
}

impl MeetingMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            other => Err(ValidationError::new(
                "mode",
                format!("must be 'online' or 'offline', got '{other}'"),
            )),
        }
    }
}

impl std::fmt::Display for MeetingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where, when and how the pair meets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub mode: MeetingMode,
    /// Start of the date. `None` until scheduled.
    pub scheduled_for: Option<Timestamp>,
    /// Always positive.
    pub duration_minutes: u32,
    /// Venue; mirrors the confirmed negotiation location once confirmed.
    pub location: Option<Location>,
    /// Provisioned video link for online dates.
    pub video_call_link: Option<String>,
}

impl Default for MeetingDetails {
    fn default() -> Self {
        Self {
            mode: MeetingMode::default(),
            scheduled_for: None,
            duration_minutes: DEFAULT_DURATION_MINUTES,
            location: None,
            video_call_link: None,
        }
    }
}

/// A partial update to [`MeetingDetails`]. `scheduled_for` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingDetailsUpdate {
    pub mode: Option<MeetingMode>,
    pub scheduled_for: Option<Timestamp>,
    pub duration_minutes: Option<u32>,
    pub location: Option<Location>,
}

impl MeetingDetails {
    /// Validate `update` against `now` and merge it over `self`.
    ///
    /// # Errors
    ///
    /// - `scheduled_for` missing, or not strictly after `now`.
    /// - `duration_minutes` of zero or longer than a day.
    /// - a malformed location.
    /// - an offline date whose merged details carry no location.
    pub fn merged_with(
        &self,
        update: &MeetingDetailsUpdate,
        now: Timestamp,
    ) -> Result<MeetingDetails, ValidationError> {
        let scheduled_for = *validation::required("scheduled_for", &update.scheduled_for)?;
        if scheduled_for <= now {
            return Err(ValidationError::new("scheduled_for", "must be in the future"));
        }
        if let Some(minutes) = update.duration_minutes {
            validation::in_range("duration_minutes", minutes, 1, MAX_DURATION_MINUTES)?;
        }
        if let Some(location) = &update.location {
            location.validate()?;
        }

        let mut merged = self.clone();
        merged.scheduled_for = Some(scheduled_for);
        if let Some(mode) = update.mode {
            merged.mode = mode;
        }
        if let Some(minutes) = update.duration_minutes {
            merged.duration_minutes = minutes;
        }
        if let Some(location) = &update.location {
            merged.location = Some(location.clone());
        }

        if merged.mode == MeetingMode::Offline && merged.location.is_none() {
            return Err(ValidationError::new(
                "location.name",
                "an in-person date needs a location",
            ));
        }
        Ok(merged)
    }
}

/// One participant's review of the date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub reviewer: UserId,
    /// 1 to 5 inclusive.
    pub rating: u8,
    pub comment: String,
    pub submitted_at: Timestamp,
}

impl Review {
    /// Validate and build a review.
    pub fn new(
        reviewer: UserId,
        rating: u8,
        comment: &str,
        submitted_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        validation::in_range("rating", rating, 1, 5)?;
        let comment = comment.trim();
        validation::max_chars("comment", comment, MAX_COMMENT_CHARS)?;
        Ok(Self {
            reviewer,
            rating,
            comment: comment.to_string(),
            submitted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> Timestamp {
        Timestamp::parse("now", "2026-05-01T12:00:00Z").unwrap()
    }

    fn in_hours(h: i64) -> Option<Timestamp> {
        Some(now().shifted(Duration::hours(h)))
    }

    #[test]
    fn default_is_offline_sixty_minutes() {
        let d = MeetingDetails::default();
        assert_eq!(d.mode, MeetingMode::Offline);
        assert_eq!(d.duration_minutes, 60);
        assert!(d.scheduled_for.is_none());
    }

    #[test]
    fn scheduled_for_is_required() {
        let update = MeetingDetailsUpdate {
            mode: Some(MeetingMode::Online),
            ..Default::default()
        };
        let err = MeetingDetails::default().merged_with(&update, now()).unwrap_err();
        assert_eq!(err.field, "scheduled_for");
    }

    #[test]
    fn past_or_present_schedule_rejected() {
        for h in [0, -1] {
            let update = MeetingDetailsUpdate {
                mode: Some(MeetingMode::Online),
                scheduled_for: in_hours(h),
                ..Default::default()
            };
            assert!(MeetingDetails::default().merged_with(&update, now()).is_err());
        }
    }

    #[test]
    fn offline_needs_location() {
        let update = MeetingDetailsUpdate {
            scheduled_for: in_hours(24),
            ..Default::default()
        };
        let err = MeetingDetails::default().merged_with(&update, now()).unwrap_err();
        assert_eq!(err.field, "location.name");
    }

    #[test]
    fn partial_update_keeps_prior_values() {
        let first = MeetingDetailsUpdate {
            mode: Some(MeetingMode::Offline),
            scheduled_for: in_hours(24),
            duration_minutes: Some(90),
            location: Some(Location::new("Cafe X", "12 Main St")),
        };
        let details = MeetingDetails::default().merged_with(&first, now()).unwrap();

        let second = MeetingDetailsUpdate {
            scheduled_for: in_hours(48),
            ..Default::default()
        };
        let merged = details.merged_with(&second, now()).unwrap();
        assert_eq!(merged.duration_minutes, 90);
        assert_eq!(merged.location, Some(Location::new("Cafe X", "12 Main St")));
        assert_eq!(merged.scheduled_for, in_hours(48));
    }

    #[test]
    fn zero_duration_rejected() {
        let update = MeetingDetailsUpdate {
            mode: Some(MeetingMode::Online),
            scheduled_for: in_hours(2),
            duration_minutes: Some(0),
            ..Default::default()
        };
        let err = MeetingDetails::default().merged_with(&update, now()).unwrap_err();
        assert_eq!(err.field, "duration_minutes");
    }

    #[test]
    fn review_rating_bounds() {
        let who = UserId::new();
        assert!(Review::new(who, 0, "", now()).is_err());
        assert!(Review::new(who, 6, "", now()).is_err());
        let r = Review::new(who, 5, "  lovely evening ", now()).unwrap();
        assert_eq!(r.comment, "lovely evening");
    }

    #[test]
    fn mode_parse() {
        assert_eq!(MeetingMode::parse("online").unwrap(), MeetingMode::Online);
        assert!(MeetingMode::parse("hybrid").is_err());
    }
}

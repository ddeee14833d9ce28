//! # Engine Configuration
//!
//! Read from the environment once at startup. Unset variables take their
//! defaults; set-but-invalid variables fail with a [`ValidationError`]
//! naming the variable.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BLINDATE_GRACE_PERIOD_DAYS` | `7` |
//! | `BLINDATE_MAX_CONFLICT_RETRIES` | `5` |
//! | `BLINDATE_VIDEO_BASE_URL` | `https://meet.jit.si` |
//! | `BLINDATE_BLOCK_ON_REJECTION` | `true` |

use std::str::FromStr;

use chrono::Duration;

use blindate_core::ValidationError;
use blindate_state::DEFAULT_GRACE_PERIOD_DAYS;

/// Tunables of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Days after the scheduled start before one review suffices to complete.
    pub grace_period_days: i64,
    /// Extra attempts after an optimistic-concurrency conflict.
    pub max_conflict_retries: u32,
    /// Prefix of provisioned video links.
    pub video_base_url: String,
    /// Whether a rejection blocks the pair from each other.
    pub block_on_rejection: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_period_days: DEFAULT_GRACE_PERIOD_DAYS,
            max_conflict_retries: 5,
            video_base_url: "https://meet.jit.si".to_string(),
            block_on_rejection: true,
        }
    }
}

impl EngineConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ValidationError> {
        let defaults = Self::default();
        let grace_period_days = parse_var(
            &lookup,
            "BLINDATE_GRACE_PERIOD_DAYS",
            defaults.grace_period_days,
        )?;
        if grace_period_days < 0 {
            return Err(ValidationError::new(
                "BLINDATE_GRACE_PERIOD_DAYS",
                "must not be negative",
            ));
        }
        let max_conflict_retries = parse_var(
            &lookup,
            "BLINDATE_MAX_CONFLICT_RETRIES",
            defaults.max_conflict_retries,
        )?;
        let video_base_url = match lookup("BLINDATE_VIDEO_BASE_URL") {
            Some(url) if url.starts_with("https://") || url.starts_with("http://") => {
                url.trim_end_matches('/').to_string()
            }
            Some(_) => {
                return Err(ValidationError::new(
                    "BLINDATE_VIDEO_BASE_URL",
                    "must be an http(s) URL",
                ))
            }
            None => defaults.video_base_url,
        };
        let block_on_rejection = parse_var(
            &lookup,
            "BLINDATE_BLOCK_ON_REJECTION",
            defaults.block_on_rejection,
        )?;

        Ok(Self {
            grace_period_days,
            max_conflict_retries,
            video_base_url,
            block_on_rejection,
        })
    }

    pub fn grace_period(&self) -> Duration {
        Duration::days(self.grace_period_days)
    }
}

/// Parse `key` if set, else return `default`.
pub fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ValidationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ValidationError::new(key, format!("invalid value {raw:?}: {e}"))),
    }
}

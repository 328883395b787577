//! Session engine configuration.
//!
//! Tuning knobs are loaded from `SE_*` environment variables with defaults.
//! Session identity (room, member, level) is not configuration; it is passed
//! to [`crate::SessionActor::spawn`] as a [`crate::model::SessionIdentity`].

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default number of streams per page.
pub const DEFAULT_ITEM_PAGE_LIMIT: usize = 4;

/// Default number of streams per page while a screen share is active.
pub const DEFAULT_SCREEN_PAGE_LIMIT: usize = 4;

/// Default upper bound on grid cells considered by the estimate.
pub const DEFAULT_FIXED_PAGE_LIMIT: usize = 16;

/// Default stream count below which streams are laid out in a single strip.
pub const DEFAULT_STRIP_LAYOUT_LIMIT: usize = 4;

/// Default minimum time between two gated reorder passes.
pub const DEFAULT_REORDER_INTERVAL_MS: u64 = 30_000;

/// Default minimum time between gated reorder passes while a share is active.
pub const DEFAULT_FAST_REORDER_INTERVAL_MS: u64 = 10_000;

/// Default average loudness above which a participant counts as speaking.
pub const DEFAULT_LOUDNESS_THRESHOLD: f64 = 1.0;

/// Default deadline for transport creation and produce.
pub const DEFAULT_TRANSPORT_TIMEOUT_MS: u64 = 30_000;

/// Default deadline for signaling round-trips.
pub const DEFAULT_SIGNALING_TIMEOUT_MS: u64 = 10_000;

/// Default smallest card edge in pixels.
pub const DEFAULT_MIN_CELL_SIZE: u32 = 16;

/// Default spacing between cards in pixels.
pub const DEFAULT_CARD_SPACING: u32 = 3;

/// Default session actor mailbox capacity.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Session engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Streams per page (default: 4).
    pub item_page_limit: usize,

    /// Streams per page while a screen share is active (default: 4).
    pub screen_page_limit: usize,

    /// Cap on the grid estimate when no share is active (default: 16).
    pub fixed_page_limit: usize,

    /// Below this count the grid collapses to one row or column (default: 4).
    pub strip_layout_limit: usize,

    /// Gate interval for reorder passes (default: 30s).
    pub reorder_interval: Duration,

    /// Gate interval while a screen share is active (default: 10s).
    pub fast_reorder_interval: Duration,

    /// Rank visible streams by recent loudness (default: false).
    pub sort_audio_loudness: bool,

    /// Loudness above which a participant is "loud" (default: 1.0).
    pub loudness_threshold: f64,

    /// Deadline for transport creation and produce (default: 30s).
    pub transport_timeout: Duration,

    /// Deadline for signaling round-trips (default: 10s).
    pub signaling_timeout: Duration,

    /// Smallest card edge in pixels (default: 16).
    pub min_cell_size: u32,

    /// Gap between cards in pixels (default: 3, chat uses 0).
    pub card_spacing: u32,

    /// Session actor mailbox capacity (default: 256).
    pub mailbox_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            item_page_limit: DEFAULT_ITEM_PAGE_LIMIT,
            screen_page_limit: DEFAULT_SCREEN_PAGE_LIMIT,
            fixed_page_limit: DEFAULT_FIXED_PAGE_LIMIT,
            strip_layout_limit: DEFAULT_STRIP_LAYOUT_LIMIT,
            reorder_interval: Duration::from_millis(DEFAULT_REORDER_INTERVAL_MS),
            fast_reorder_interval: Duration::from_millis(DEFAULT_FAST_REORDER_INTERVAL_MS),
            sort_audio_loudness: false,
            loudness_threshold: DEFAULT_LOUDNESS_THRESHOLD,
            transport_timeout: Duration::from_millis(DEFAULT_TRANSPORT_TIMEOUT_MS),
            signaling_timeout: Duration::from_millis(DEFAULT_SIGNALING_TIMEOUT_MS),
            min_cell_size: DEFAULT_MIN_CELL_SIZE,
            card_spacing: DEFAULT_CARD_SPACING,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let item_page_limit = vars
            .get("SE_ITEM_PAGE_LIMIT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ITEM_PAGE_LIMIT);

        let screen_page_limit = vars
            .get("SE_SCREEN_PAGE_LIMIT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SCREEN_PAGE_LIMIT);

        let fixed_page_limit = vars
            .get("SE_FIXED_PAGE_LIMIT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_FIXED_PAGE_LIMIT);

        let strip_layout_limit = vars
            .get("SE_STRIP_LAYOUT_LIMIT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_STRIP_LAYOUT_LIMIT);

        for (name, value) in [
            ("SE_ITEM_PAGE_LIMIT", item_page_limit),
            ("SE_SCREEN_PAGE_LIMIT", screen_page_limit),
            ("SE_FIXED_PAGE_LIMIT", fixed_page_limit),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let reorder_interval = Duration::from_millis(
            vars.get("SE_REORDER_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REORDER_INTERVAL_MS),
        );

        let fast_reorder_interval = Duration::from_millis(
            vars.get("SE_FAST_REORDER_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FAST_REORDER_INTERVAL_MS),
        );

        if fast_reorder_interval > reorder_interval {
            return Err(ConfigError::InvalidValue(format!(
                "SE_FAST_REORDER_INTERVAL_MS ({}) must not exceed SE_REORDER_INTERVAL_MS ({})",
                fast_reorder_interval.as_millis(),
                reorder_interval.as_millis()
            )));
        }

        let sort_audio_loudness = vars
            .get("SE_SORT_AUDIO_LOUDNESS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);

        let loudness_threshold = vars
            .get("SE_LOUDNESS_THRESHOLD")
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(DEFAULT_LOUDNESS_THRESHOLD);

        let transport_timeout = Duration::from_millis(
            vars.get("SE_TRANSPORT_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TRANSPORT_TIMEOUT_MS),
        );

        let signaling_timeout = Duration::from_millis(
            vars.get("SE_SIGNALING_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SIGNALING_TIMEOUT_MS),
        );

        let min_cell_size = vars
            .get("SE_MIN_CELL_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MIN_CELL_SIZE);

        let card_spacing = vars
            .get("SE_CARD_SPACING")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CARD_SPACING);

        let mailbox_capacity = vars
            .get("SE_MAILBOX_CAPACITY")
            .and_then(|s| s.parse().ok())
            .filter(|v: &usize| *v > 0)
            .unwrap_or(DEFAULT_MAILBOX_CAPACITY);

        Ok(EngineConfig {
            item_page_limit,
            screen_page_limit,
            fixed_page_limit,
            strip_layout_limit,
            reorder_interval,
            fast_reorder_interval,
            sort_audio_loudness,
            loudness_threshold,
            transport_timeout,
            signaling_timeout,
            min_cell_size,
            card_spacing,
            mailbox_capacity,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_defaults() {
        let config = EngineConfig::from_vars(&HashMap::new()).unwrap();

        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.item_page_limit, 4);
        assert_eq!(config.reorder_interval, Duration::from_secs(30));
        assert_eq!(config.fast_reorder_interval, Duration::from_secs(10));
        assert!(!config.sort_audio_loudness);
    }

    #[test]
    fn test_from_vars_overrides() {
        let vars = HashMap::from([
            ("SE_ITEM_PAGE_LIMIT".to_string(), "6".to_string()),
            ("SE_SCREEN_PAGE_LIMIT".to_string(), "2".to_string()),
            ("SE_REORDER_INTERVAL_MS".to_string(), "5000".to_string()),
            ("SE_FAST_REORDER_INTERVAL_MS".to_string(), "1000".to_string()),
            ("SE_SORT_AUDIO_LOUDNESS".to_string(), "true".to_string()),
            ("SE_LOUDNESS_THRESHOLD".to_string(), "127.5".to_string()),
            ("SE_CARD_SPACING".to_string(), "0".to_string()),
        ]);

        let config = EngineConfig::from_vars(&vars).unwrap();

        assert_eq!(config.item_page_limit, 6);
        assert_eq!(config.screen_page_limit, 2);
        assert_eq!(config.reorder_interval, Duration::from_secs(5));
        assert_eq!(config.fast_reorder_interval, Duration::from_secs(1));
        assert!(config.sort_audio_loudness);
        assert!((config.loudness_threshold - 127.5).abs() < f64::EPSILON);
        assert_eq!(config.card_spacing, 0);
    }

    #[test]
    fn test_unparsable_values_fall_back_to_defaults() {
        let vars = HashMap::from([
            ("SE_ITEM_PAGE_LIMIT".to_string(), "four".to_string()),
            ("SE_LOUDNESS_THRESHOLD".to_string(), "NaN".to_string()),
            ("SE_MAILBOX_CAPACITY".to_string(), "0".to_string()),
        ]);

        let config = EngineConfig::from_vars(&vars).unwrap();

        assert_eq!(config.item_page_limit, DEFAULT_ITEM_PAGE_LIMIT);
        assert!((config.loudness_threshold - DEFAULT_LOUDNESS_THRESHOLD).abs() < f64::EPSILON);
        assert_eq!(config.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
    }

    #[test]
    fn test_zero_page_limit_rejected() {
        let vars = HashMap::from([("SE_SCREEN_PAGE_LIMIT".to_string(), "0".to_string())]);

        let err = EngineConfig::from_vars(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(msg) if msg.contains("SE_SCREEN_PAGE_LIMIT")));
    }

    #[test]
    fn test_fast_interval_longer_than_slow_rejected() {
        let vars = HashMap::from([
            ("SE_REORDER_INTERVAL_MS".to_string(), "1000".to_string()),
            ("SE_FAST_REORDER_INTERVAL_MS".to_string(), "2000".to_string()),
        ]);

        let err = EngineConfig::from_vars(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }
}

//! Session configuration parameters
//!
//! All tunable timing for the session core.  Values can be overridden via
//! the blob store (see [`ConfigPort`](crate::app::ports::ConfigPort)).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    // --- Liveness ---
    /// Interval between "is the link actually up" polls (milliseconds)
    pub liveness_interval_ms: u32,

    // --- Enrichment ---
    /// Upper bound on one geolocation attempt (milliseconds)
    pub enrichment_timeout_ms: u32,

    // --- Transmit ---
    /// Pause between consecutive replay writes (milliseconds)
    pub replay_gap_ms: u32,
    /// Auto-stop offered to the operator when none is given (milliseconds)
    pub default_auto_stop_ms: u32,
    /// Repeat interval offered to the operator when none is given (milliseconds)
    pub default_repeat_interval_ms: u32,
    /// Longest command string the LED characteristic accepts (bytes)
    pub max_command_len: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            liveness_interval_ms: 2000,
            enrichment_timeout_ms: 3000,
            replay_gap_ms: 300,
            default_auto_stop_ms: 5000,
            default_repeat_interval_ms: 100,
            max_command_len: 128,
        }
    }
}

/// Range-check every field.  Invalid values are rejected, never clamped.
pub fn validate_config(cfg: &SessionConfig) -> Result<(), ConfigError> {
    if !(250..=60_000).contains(&cfg.liveness_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "liveness_interval_ms must be 250–60000",
        ));
    }
    if !(100..=30_000).contains(&cfg.enrichment_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "enrichment_timeout_ms must be 100–30000",
        ));
    }
    if !(10..=10_000).contains(&cfg.replay_gap_ms) {
        return Err(ConfigError::ValidationFailed("replay_gap_ms must be 10–10000"));
    }
    if cfg.default_auto_stop_ms == 0 {
        return Err(ConfigError::ValidationFailed(
            "default_auto_stop_ms must be positive",
        ));
    }
    if cfg.default_repeat_interval_ms == 0 {
        return Err(ConfigError::ValidationFailed(
            "default_repeat_interval_ms must be positive",
        ));
    }
    if !(16..=512).contains(&cfg.max_command_len) {
        return Err(ConfigError::ValidationFailed("max_command_len must be 16–512"));
    }
    Ok(())
}

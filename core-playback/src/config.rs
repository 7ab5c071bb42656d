//! # Session Configuration
//!
//! Timing knobs for a player session.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PlaybackError, Result};

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(100);
const MAX_TICK_INTERVAL: Duration = Duration::from_millis(500);
const MIN_DRIFT_THRESHOLD_MS: u64 = 500;
const MAX_DRIFT_THRESHOLD_MS: u64 = 1000;

/// Player session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Period of the position ticker for players that do not report their
    /// own progress.
    ///
    /// Must lie within 100..=500 ms.
    ///
    /// Default: 250 ms.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: Duration,

    /// How far (ms) a cluster member may lag behind the cluster position
    /// before it is seeked forward.
    ///
    /// Must lie within 500..=1000 ms.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_drift_threshold_ms")]
    pub drift_threshold_ms: u64,

    /// Capacity of each player's event broadcast channel. Slow subscribers
    /// that fall further behind miss events.
    ///
    /// Default: 100.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            drift_threshold_ms: default_drift_threshold_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl SessionConfig {
    /// Tighter ticks and drift correction for interactive scrubbing.
    pub fn responsive() -> Self {
        Self {
            tick_interval: MIN_TICK_INTERVAL,
            drift_threshold_ms: MIN_DRIFT_THRESHOLD_MS,
            ..Default::default()
        }
    }

    /// Fewer wakeups and more tolerance for slow engines.
    pub fn relaxed() -> Self {
        Self {
            tick_interval: MAX_TICK_INTERVAL,
            drift_threshold_ms: MAX_DRIFT_THRESHOLD_MS,
            event_buffer: 256,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.tick_interval < MIN_TICK_INTERVAL || self.tick_interval > MAX_TICK_INTERVAL {
            return Err(format!(
                "tick_interval must be between {}ms and {}ms",
                MIN_TICK_INTERVAL.as_millis(),
                MAX_TICK_INTERVAL.as_millis()
            ));
        }

        if !(MIN_DRIFT_THRESHOLD_MS..=MAX_DRIFT_THRESHOLD_MS).contains(&self.drift_threshold_ms) {
            return Err(format!(
                "drift_threshold_ms must be between {} and {}",
                MIN_DRIFT_THRESHOLD_MS, MAX_DRIFT_THRESHOLD_MS
            ));
        }

        if self.event_buffer == 0 {
            return Err("event_buffer must be > 0".to_string());
        }

        Ok(())
    }

    pub(crate) fn validated(self) -> Result<Self> {
        self.validate().map_err(PlaybackError::InvalidConfig)?;
        Ok(self)
    }
}

// Default value functions for serde
fn default_tick_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_drift_threshold_ms() -> u64 {
    500
}

fn default_event_buffer() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.drift_threshold_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(SessionConfig::responsive().validate().is_ok());
        assert!(SessionConfig::relaxed().validate().is_ok());
        assert!(
            SessionConfig::responsive().tick_interval < SessionConfig::relaxed().tick_interval
        );
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let config = SessionConfig {
            tick_interval: Duration::from_millis(50),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("tick_interval"));

        let config = SessionConfig {
            drift_threshold_ms: 2000,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("drift_threshold_ms"));

        let config = SessionConfig {
            event_buffer: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validated(),
            Err(PlaybackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "drift_threshold_ms": 800 }"#).unwrap();
        assert_eq!(config.drift_threshold_ms, 800);
        assert_eq!(config.tick_interval, default_tick_interval());
        assert_eq!(config.event_buffer, 100);
    }
}

//! Core loop configuration parameters.
//!
//! Manages properties that affect every consumer of the engine:
//! - Tick cadence of the simulation loop
//! - Per-subscriber buffering on the observer bus
//! - Depth of the per-signal trend buffer

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Core loop configuration parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CoreConfig {
    /// Period of the simulation tick in milliseconds.
    #[serde(default = "default_tick_interval")]
    #[validate(range(min = 10, max = 60_000))]
    pub tick_interval_ms: u64,

    /// Number of unread batches buffered per subscriber before the oldest is dropped.
    #[serde(default = "default_observer_capacity")]
    #[validate(range(min = 1, max = 65_536))]
    pub observer_capacity: usize,

    /// Number of committed samples retained per signal for trend queries.
    #[serde(default = "default_trend_depth")]
    #[validate(range(min = 1, max = 100_000))]
    pub trend_depth: usize,
}

fn default_tick_interval() -> u64 {
    500
}

fn default_observer_capacity() -> usize {
    64
}

fn default_trend_depth() -> usize {
    120
}

impl CoreConfig {
    /// The tick interval as a `Duration`.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            observer_capacity: default_observer_capacity(),
            trend_depth: default_trend_depth(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_half_a_second() {
        let config = CoreConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(500));
        config.validate().expect("Default core config should be valid");
    }

    #[test]
    fn zero_capacity_is_invalid() {
        let config = CoreConfig {
            observer_capacity: 0,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Process model constants.
//!
//! Rates are expressed per second of simulated time and scaled by the
//! elapsed tick duration inside the models.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Tank fill process constants.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[serde(default)]
pub struct TankConfig {
    /// Level gain in percent per second with the flow valve fully open.
    #[validate(range(min = 0.01, max = 100.0))]
    pub fill_rate: f64,

    /// Level loss in percent per second with the drain open.
    #[validate(range(min = 0.01, max = 100.0))]
    pub drain_rate: f64,

    /// Level at which the pump interlock forces the pump off.
    #[validate(range(min = 1.0, max = 100.0))]
    pub cutoff_level: f64,

    /// Lowest flow fraction applied while the pump runs.
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_flow_fraction: f64,

    /// Pressure reading of an empty tank (bar).
    #[validate(range(min = 0.0, max = 1000.0))]
    pub pressure_base: f64,

    /// Pressure added between an empty and a full tank (bar).
    #[validate(range(min = 0.0, max = 1000.0))]
    pub pressure_span: f64,

    /// Half-width of the uniform pressure noise band (bar).
    #[validate(range(min = 0.0, max = 10.0))]
    pub pressure_noise: f64,

    /// Tank level the model starts from after every reset.
    #[validate(range(min = 0.0, max = 100.0))]
    pub initial_level: f64,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            fill_rate: 10.0,
            drain_rate: 5.0,
            cutoff_level: 90.0,
            min_flow_fraction: 0.1,
            pressure_base: 2.0,
            pressure_span: 6.0,
            pressure_noise: 0.05,
            initial_level: 0.0,
        }
    }
}

/// Conveyor belt process constants.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
#[serde(default)]
pub struct ConveyorConfig {
    /// Belt speed held once the ramp completes.
    #[validate(range(min = 0.1, max = 1000.0))]
    pub nominal_speed: f64,

    /// Ticks needed to ramp from standstill to nominal speed (and back).
    #[validate(range(min = 1, max = 10_000))]
    pub ramp_ticks: u32,

    /// Running ticks per cycle counter increment.
    #[validate(range(min = 1, max = 10_000))]
    pub cycle_period_ticks: u32,

    /// Per-tick probability that an object arrives at the sensor.
    #[validate(range(min = 0.0, max = 1.0))]
    pub detect_probability: f64,

    /// Per-tick probability that a held object is released.
    #[validate(range(min = 0.0, max = 1.0))]
    pub release_probability: f64,
}

impl Default for ConveyorConfig {
    fn default() -> Self {
        Self {
            nominal_speed: 50.0,
            ramp_ticks: 10,
            cycle_period_ticks: 4,
            detect_probability: 0.01,
            release_probability: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TankConfig::default().validate().expect("tank defaults");
        ConveyorConfig::default().validate().expect("conveyor defaults");
    }

    #[test]
    fn probability_above_one_is_rejected() {
        let config = ConveyorConfig {
            detect_probability: 1.5,
            ..ConveyorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

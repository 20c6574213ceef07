//! Randomness configuration.
//!
//! A fixed seed makes every run reproducible (sensor noise and object
//! detection replay identically). Leaving it unset draws from OS entropy.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Seed for deterministic runs; `None` selects the production entropy source.
    #[serde(default)]
    pub seed: Option<u64>,
}

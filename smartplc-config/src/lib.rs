//! # SmartPLC Configuration System
//!
//! Hierarchical configuration for the simulated controller. Everything the
//! engine needs at initialisation lives here: tick timing, process model
//! constants and the full signal catalogue.
//!
//! ## Features
//! - **Single source of truth**: one `PlcConfig` consumed by every crate
//! - **Fail-fast validation**: the catalogue is checked once, before any
//!   loop exists, and rejected as a whole if any entry is malformed
//! - **Layered loading**: defaults, YAML files, then `SMARTPLC_*` variables

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod core;
mod error;
mod process;
mod signals;
mod simulation;
mod telemetry;
pub mod validation;

pub use crate::core::CoreConfig;
pub use error::ConfigError;
pub use process::{ConveyorConfig, TankConfig};
pub use signals::{default_catalogue, tags, SignalKind, SignalSpec};
pub use simulation::SimulationConfig;
pub use telemetry::TelemetryConfig;

/// Top-level configuration container for the controller simulation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlcConfig {
    /// Loop timing and delivery parameters.
    #[validate(nested)]
    #[serde(default)]
    pub core: CoreConfig,

    /// Randomness source for sensor noise and object detection.
    #[validate(nested)]
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Tank fill process constants.
    #[validate(nested)]
    #[serde(default)]
    pub tank: TankConfig,

    /// Conveyor belt process constants.
    #[validate(nested)]
    #[serde(default)]
    pub conveyor: ConveyorConfig,

    /// Logging parameters.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// The signal catalogue. Replaced wholesale when given in a file.
    #[validate(custom(function = validation::validate_catalogue))]
    #[serde(default = "default_catalogue")]
    pub signals: Vec<SignalSpec>,
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            simulation: SimulationConfig::default(),
            tank: TankConfig::default(),
            conveyor: ConveyorConfig::default(),
            telemetry: TelemetryConfig::default(),
            signals: default_catalogue(),
        }
    }
}

impl PlcConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values (including the built-in catalogue)
    /// 2. `config/smartplc.yaml` if present
    /// 3. `config/<SMARTPLC_ENV>.yaml` if present
    /// 4. `SMARTPLC_*` environment variables, `__` separating sections
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(PlcConfig::default()));

        if Path::new("config/smartplc.yaml").exists() {
            figment = figment.merge(Yaml::file("config/smartplc.yaml"));
        }

        let env = std::env::var("SMARTPLC_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract_validated(figment.merge(Env::prefixed("SMARTPLC_").split("__")))
    }

    /// Load configuration from a specific YAML file layered over the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract_validated(
            Figment::from(Serialized::defaults(PlcConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed("SMARTPLC_").split("__")),
        )
    }

    /// Runs every field and catalogue check, returning the first failure set.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate().map_err(ConfigError::from)
    }

    fn extract_validated(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.check()?;
                Ok(config)
            })
    }
}

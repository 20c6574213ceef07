use smartplc_config::ConfigError;
use smartplc_core::events::BusError;
use smartplc_core::CoreError;
use smartplc_telemetry::metrics::PrometheusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Simulation loop is already running")]
    AlreadyRunning,

    #[error("Simulation loop is not running")]
    NotRunning,

    #[error("No Tokio runtime available to host the simulation loop")]
    NoRuntime,

    #[error("Tick aborted: {0}")]
    TickAborted(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Observer bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Run digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PrometheusError> for EngineError {
    fn from(err: PrometheusError) -> Self {
        EngineError::Telemetry(err.to_string())
    }
}

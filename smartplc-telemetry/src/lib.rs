//! # SmartPLC Telemetry
//!
//! Logging and metrics for the simulation engine.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;

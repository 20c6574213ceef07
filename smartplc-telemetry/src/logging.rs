//! ## smartplc-telemetry::logging
//! **Structured logging with tracing and OpenTelemetry attributes**
//!
//! `EventLogger::init` installs the global `fmt` subscriber. `RUST_LOG`
//! takes precedence over the configured level.
//!
//! Notable process events (alarm transitions, interlock trips, loop state
//! changes) go through `log_event` so they share one span shape.

use opentelemetry::KeyValue;
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Fails if one is already set.
    pub fn init(default_level: &str) -> Result<(), InitError> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))?;
        fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .try_init()
    }

    #[inline]
    pub fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!("plc_event", event_type = event_type, otel.kind = "INTERNAL");
        let _entered = span.enter();
        tracing::info!(metadata = ?metadata, "Process event recorded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_logging() {
        EventLogger::log_event(
            "alarm_transition",
            vec![
                KeyValue::new("signal", "AI_01_TankLevel"),
                KeyValue::new("to", "warning"),
            ],
        );
        assert!(logs_contain("Process event recorded"));
        assert!(logs_contain("AI_01_TankLevel"));
    }
}

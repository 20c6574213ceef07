/*!
# Run modes

Entry points shared by frontends:
- real-time mode: the loop ticks on the wall clock until a deadline or Ctrl-C
- deterministic mode: a fixed seed, a virtual clock and manual stepping,
  with an optional digest check that files a bug report on mismatch
*/

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{debug, error, info, instrument, Instrument};

use smartplc_config::PlcConfig;
use smartplc_core::alarm::AlarmState;
use smartplc_core::signal::{Signal, SignalValue};
use smartplc_core::time::VirtualClock;
use smartplc_core::CoreError;
use smartplc_simulator::NoiseSeed;
use smartplc_telemetry::{EventLogger, MetricsRecorder};

use crate::engine::{DiagnosticsSnapshot, EngineError, SimulationEngine};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub digest: String,
    pub diagnostics: DiagnosticsSnapshot,
    pub alarms: Vec<AlarmState>,
    pub signals: Vec<Signal>,
}

impl RunSummary {
    fn collect(engine: &SimulationEngine) -> Self {
        Self {
            ticks: engine.tick_count(),
            digest: engine.digest(),
            diagnostics: engine.diagnostics(),
            alarms: engine.alarms(),
            signals: engine.snapshot_all(),
        }
    }
}

/// Parses a textual setpoint for `signal`. Digital signals accept
/// `1/0`, `true/false` and `on/off`; analog signals accept any number.
pub fn parse_setpoint(signal: &Signal, raw: &str) -> Result<SignalValue, CoreError> {
    let raw = raw.trim();
    if signal.kind.is_digital() {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "on" => Ok(SignalValue::Digital(true)),
            "0" | "false" | "off" => Ok(SignalValue::Digital(false)),
            _ => Err(CoreError::InvalidValue {
                name: signal.name.clone(),
                reason: format!("'{raw}' is not a digital value"),
            }),
        }
    } else {
        raw.parse::<f64>()
            .map(SignalValue::Analog)
            .map_err(|e| CoreError::InvalidValue {
                name: signal.name.clone(),
                reason: format!("'{raw}': {e}"),
            })
    }
}

/// Queues `NAME=VALUE` style setpoints on the engine.
pub fn apply_setpoints(
    engine: &SimulationEngine,
    setpoints: &[(String, String)],
) -> Result<(), EngineError> {
    for (name, raw) in setpoints {
        let signal = engine.get(name)?;
        let value = parse_setpoint(&signal, raw)?;
        let applied = engine.set_actuator(name, value)?;
        info!(signal = %name, %applied, "Setpoint queued");
    }
    Ok(())
}

/// Runs the loop on the wall clock until `duration` elapses or Ctrl-C.
#[instrument(level = "info", name = "run_realtime_mode", skip(config, setpoints, metrics))]
pub async fn run_realtime_mode(
    config: PlcConfig,
    duration: Option<Duration>,
    setpoints: &[(String, String)],
    metrics: Option<Arc<MetricsRecorder>>,
) -> Result<RunSummary, EngineError> {
    let mut builder = SimulationEngine::builder(config);
    if let Some(metrics) = metrics {
        builder = builder.metrics(metrics);
    }
    let engine = builder.build()?;
    apply_setpoints(&engine, setpoints)?;

    let subscription = engine.subscribe();
    let observer = tokio::spawn(
        async move {
            while let Some(batch) = subscription.recv().await {
                for change in batch.signal_changes() {
                    debug!(tick = batch.tick, signal = %change.signal, value = %change.new, "Signal changed");
                }
                for transition in batch.alarm_transitions() {
                    info!(
                        tick = batch.tick,
                        signal = %transition.signal,
                        from = %transition.from,
                        to = %transition.to,
                        "Alarm transition"
                    );
                }
            }
        }
        .instrument(tracing::info_span!("observer_task")),
    );

    engine.start()?;
    match duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => info!("Run duration elapsed"),
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {e}");
            }
        }
    }
    engine.stop()?;
    observer.abort();

    let summary = RunSummary::collect(&engine);
    EventLogger::log_event(
        "run_complete",
        vec![
            KeyValue::new("ticks", summary.ticks as i64),
            KeyValue::new("digest", summary.digest.clone()),
        ],
    );
    Ok(summary)
}

/// Steps the loop `ticks` times with a fixed seed on a virtual clock.
///
/// With `validate_hash`, a digest mismatch writes a bug report into
/// `report_dir` and fails with `DigestMismatch`.
#[instrument(level = "info", name = "run_deterministic_mode", skip(config, setpoints, metrics))]
pub fn run_deterministic_mode(
    config: PlcConfig,
    ticks: u64,
    seed: u64,
    setpoints: &[(String, String)],
    validate_hash: Option<&str>,
    report_dir: &Path,
    metrics: Option<Arc<MetricsRecorder>>,
) -> Result<RunSummary, EngineError> {
    let mut builder = SimulationEngine::builder(config)
        .clock(Arc::new(VirtualClock::new(0)))
        .seed(NoiseSeed::Fixed(seed));
    if let Some(metrics) = metrics {
        builder = builder.metrics(metrics);
    }
    let engine = builder.build()?;
    apply_setpoints(&engine, setpoints)?;

    for _ in 0..ticks {
        engine.step()?;
    }
    let summary = RunSummary::collect(&engine);
    info!(ticks, digest = %summary.digest, "Deterministic run complete");

    if let Some(expected) = validate_hash {
        if summary.digest != expected {
            let report = format!(
                "kind: digest_mismatch\nseed: {seed}\nticks: {ticks}\nexpected: {expected}\nactual: {}\n",
                summary.digest
            );
            generate_bug_report(&engine, report_dir, &report)?;
            return Err(EngineError::DigestMismatch {
                expected: expected.to_string(),
                actual: summary.digest,
            });
        }
        info!("Run digest validated");
    }

    EventLogger::log_event(
        "simulation_complete",
        vec![
            KeyValue::new("ticks", ticks as i64),
            KeyValue::new("seed", seed.to_string()),
            KeyValue::new("digest", summary.digest.clone()),
        ],
    );
    Ok(summary)
}

/// Files a bug report through the engine's diagnostics and logs where it
/// went.
pub fn generate_bug_report(
    engine: &SimulationEngine,
    dir: &Path,
    report: &str,
) -> std::io::Result<PathBuf> {
    match engine.file_bug_report(dir, report) {
        Ok(path) => {
            error!("Bug report saved to: {}", path.display());
            Ok(path)
        }
        Err(e) => {
            error!("Failed to write bug report: {e}");
            Err(e)
        }
    }
}

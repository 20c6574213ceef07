use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use smartplc_config::{PlcConfig, SignalKind};
use smartplc_engine::{run_deterministic_mode, run_realtime_mode, RunSummary};
use smartplc_telemetry::MetricsRecorder;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// YAML configuration file layered over the defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the simulation loop in real time
    Run(RunArgs),
    /// Step a seeded simulation on a virtual clock and print its digest
    Simulate(SimulateArgs),
    /// List the signal catalogue
    Signals(SignalsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Stop after this many seconds (default: until Ctrl-C)
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Actuator setpoint applied before the first tick, e.g. DO_01_Pump=on
    #[arg(long = "set", value_parser = parse_key_val)]
    pub set: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of ticks to run
    #[arg(long, default_value_t = 120)]
    pub ticks: u64,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long = "set", value_parser = parse_key_val)]
    pub set: Vec<(String, String)>,

    /// Expected run digest; a mismatch writes a bug report and fails
    #[arg(long)]
    pub validate_hash: Option<String>,

    /// Directory for bug reports
    #[arg(long, default_value = ".")]
    pub report_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SignalsArgs {
    /// Only list signals of this kind (DI, DO, AI, AO)
    #[arg(short, long, value_parser = parse_kind)]
    pub kind: Option<SignalKind>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<PlcConfig> {
    match path {
        Some(path) => PlcConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display())),
        None => PlcConfig::load().context("loading configuration"),
    }
}

fn metrics_for(config: &PlcConfig) -> anyhow::Result<Option<Arc<MetricsRecorder>>> {
    if !config.telemetry.metrics {
        return Ok(None);
    }
    Ok(Some(Arc::new(
        MetricsRecorder::new().context("creating metrics registry")?,
    )))
}

pub async fn run(config: PlcConfig, args: RunArgs) -> anyhow::Result<()> {
    let metrics = metrics_for(&config)?;
    let duration = args.duration.map(Duration::from_secs);
    let summary = run_realtime_mode(config, duration, &args.set, metrics.clone()).await?;
    print_summary(&summary);
    print_metrics(metrics.as_deref())
}

pub fn simulate(config: PlcConfig, args: SimulateArgs) -> anyhow::Result<()> {
    let metrics = metrics_for(&config)?;
    let summary = run_deterministic_mode(
        config,
        args.ticks,
        args.seed,
        &args.set,
        args.validate_hash.as_deref(),
        &args.report_dir,
        metrics.clone(),
    )?;
    print_summary(&summary);
    println!("digest: {}", summary.digest);
    print_metrics(metrics.as_deref())
}

pub fn signals(config: &PlcConfig, args: SignalsArgs) -> anyhow::Result<()> {
    println!(
        "{:<22} {:<4} {:<8} {:<7} {:>16} {:>8} {:>8}",
        "NAME", "KIND", "ADDRESS", "UNIT", "RANGE", "WARN", "ALARM"
    );
    for spec in config
        .signals
        .iter()
        .filter(|spec| args.kind.map_or(true, |kind| spec.kind == kind))
    {
        let (min, max) = spec.range();
        println!(
            "{:<22} {:<4} {:<8} {:<7} {:>16} {:>8} {:>8}",
            spec.name,
            spec.kind.short_code(),
            spec.address,
            spec.unit.as_deref().unwrap_or("-"),
            format!("{min}..{max}"),
            optional(spec.warning_threshold),
            optional(spec.alarm_threshold),
        );
    }
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn print_summary(summary: &RunSummary) {
    info!(
        ticks = summary.ticks,
        faults = summary.diagnostics.model_faults,
        dropped = summary.diagnostics.batches_dropped,
        "Run finished"
    );
    println!("ticks: {}", summary.ticks);
    println!(
        "batches: {} published, {} dropped",
        summary.diagnostics.batches_published, summary.diagnostics.batches_dropped
    );
    for signal in &summary.signals {
        println!("  {:<22} {}", signal.name, signal.value);
    }
    for alarm in &summary.alarms {
        println!("  alarm {:<16} {}", alarm.signal, alarm.status);
    }
}

fn print_metrics(metrics: Option<&MetricsRecorder>) -> anyhow::Result<()> {
    if let Some(metrics) = metrics {
        print!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("missing signal name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

fn parse_kind(raw: &str) -> Result<SignalKind, String> {
    match raw.to_ascii_uppercase().as_str() {
        "DI" | "DIGITAL_INPUT" => Ok(SignalKind::DigitalInput),
        "DO" | "DIGITAL_OUTPUT" => Ok(SignalKind::DigitalOutput),
        "AI" | "ANALOG_INPUT" => Ok(SignalKind::AnalogInput),
        "AO" | "ANALOG_OUTPUT" => Ok(SignalKind::AnalogOutput),
        _ => Err(format!("unknown signal kind '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs() {
        assert_eq!(
            parse_key_val("DO_01_Pump=on"),
            Ok(("DO_01_Pump".to_string(), "on".to_string()))
        );
        assert!(parse_key_val("DO_01_Pump").is_err());
        assert!(parse_key_val("=1").is_err());
    }

    #[test]
    fn kind_codes() {
        assert_eq!(parse_kind("ai"), Ok(SignalKind::AnalogInput));
        assert!(parse_kind("xx").is_err());
    }

    #[test]
    fn cli_parses_simulate() {
        let cli = Cli::try_parse_from([
            "smartplc",
            "simulate",
            "--ticks",
            "10",
            "--seed",
            "3",
            "--set",
            "DO_03_Motor=1",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.ticks, 10);
                assert_eq!(args.set, vec![("DO_03_Motor".into(), "1".into())]);
            }
            _ => panic!("expected simulate"),
        }
    }
}

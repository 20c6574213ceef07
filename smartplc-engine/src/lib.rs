//! # smartplc-engine
//!
//! The simulation loop of the controller: a `SimulationEngine` that owns the
//! process models, ticks them on a Tokio task, evaluates alarms and
//! publishes each tick's changes on the observer bus.
//!
//! `runtime` holds the run modes shared by frontends.

pub mod engine;
pub mod runtime;

pub use engine::{EngineError, EngineState, SimulationEngine};
pub use runtime::{
    apply_setpoints, generate_bug_report, parse_setpoint, run_deterministic_mode,
    run_realtime_mode, RunSummary,
};

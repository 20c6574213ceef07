mod diagnostics;
mod digest;
mod error;
mod history;
mod runtime;

pub use self::{
    diagnostics::{DiagnosticsCollector, DiagnosticsSnapshot, FaultRecord},
    digest::RunDigest,
    error::EngineError,
    history::{HistorySink, MemoryHistory},
    runtime::{
        BoundModels, EngineBuilder, EngineState, ModelFactory, SignalTrend, SimulationEngine,
        TickReport,
    },
};

pub mod prelude {
    pub use super::{EngineError, EngineState, HistorySink, SimulationEngine, TickReport};
}

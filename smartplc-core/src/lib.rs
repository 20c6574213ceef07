//! # smartplc-core
//!
//! Foundation layer of the controller simulation: the signal data model,
//! the registry that owns live values, alarm evaluation, and the observer
//! bus that fans change-sets out to consumers.
//!
//! ### Key Submodules:
//! - `registry`: canonical signal store with a single `RegistryWriter`
//! - `alarm`: threshold evaluation with hysteresis
//! - `events`: immutable change records and the bounded observer bus
//! - `time`: wall and virtual clocks producing nanosecond timestamps

pub mod alarm;
pub mod error;
pub mod events;
pub mod registry;
pub mod signal;
pub mod time;

pub mod prelude {
    pub use crate::alarm::*;
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::registry::*;
    pub use crate::signal::*;
    pub use crate::time::*;
}

pub use error::CoreError;
pub use smartplc_config::{SignalKind, SignalSpec};

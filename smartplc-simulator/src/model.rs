//! The seam between the simulation loop and physical process models.
//!
//! Models implement [`Model`] as a pure step function. [`Process`] owns the
//! model state and noise source and exposes the object-safe
//! [`ProcessModel`] the engine drives.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use rand::rngs::SmallRng;
use smartplc_core::registry::ProcessImage;
use smartplc_core::signal::{SignalId, SignalValue};
use thiserror::Error;
use tracing::debug;

use crate::seed::NoiseSeed;

/// Why a model produced no usable output for a tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelFault {
    #[error("output for signal #{} is not finite", .0.index())]
    NonFinite(SignalId),

    #[error("model panicked: {0}")]
    Panicked(String),

    #[error("model step failed: {0}")]
    Failed(String),
}

/// Signal values written by one model step, in write order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOutput {
    writes: Vec<(SignalId, SignalValue)>,
}

impl ModelOutput {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            writes: Vec::with_capacity(capacity),
        }
    }

    pub fn set(&mut self, id: SignalId, value: impl Into<SignalValue>) -> &mut Self {
        self.writes.push((id, value.into()));
        self
    }

    pub fn writes(&self) -> &[(SignalId, SignalValue)] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<(SignalId, SignalValue)> {
        self.writes
    }

    /// Last value written for `id`, if any.
    pub fn get(&self, id: SignalId) -> Option<SignalValue> {
        self.writes
            .iter()
            .rev()
            .find(|(written, _)| *written == id)
            .map(|(_, value)| *value)
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// A physical process as a pure function of (state, inputs, dt).
pub trait Model {
    type State: Clone;

    fn name(&self) -> &str;

    fn initial_state(&self) -> Self::State;

    fn step(
        &self,
        state: &Self::State,
        inputs: &ProcessImage,
        dt: Duration,
        rng: &mut SmallRng,
    ) -> Result<(Self::State, ModelOutput), ModelFault>;
}

/// Object-safe handle the engine ticks.
pub trait ProcessModel: Send {
    fn name(&self) -> &str;

    /// Advances the process by `dt`. On error the internal state is left
    /// as it was before the call.
    fn tick(&mut self, inputs: &ProcessImage, dt: Duration) -> Result<ModelOutput, ModelFault>;

    /// Restores initial internal state and reseeds the noise source.
    fn reset(&mut self);
}

/// Owns a model's state and its private random stream.
pub struct Process<M: Model> {
    model: M,
    state: M::State,
    seed: NoiseSeed,
    stream: u64,
    rng: SmallRng,
}

impl<M: Model> Process<M> {
    pub fn new(model: M, seed: NoiseSeed, stream: u64) -> Self {
        let state = model.initial_state();
        let rng = seed.rng_for(stream);
        Self {
            model,
            state,
            seed,
            stream,
            rng,
        }
    }

    pub fn state(&self) -> &M::State {
        &self.state
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M> ProcessModel for Process<M>
where
    M: Model + Send,
    M::State: Send,
{
    fn name(&self) -> &str {
        self.model.name()
    }

    fn tick(&mut self, inputs: &ProcessImage, dt: Duration) -> Result<ModelOutput, ModelFault> {
        let Self {
            model, state, rng, ..
        } = self;
        let result = catch_unwind(AssertUnwindSafe(|| model.step(state, inputs, dt, rng)))
            .map_err(|payload| ModelFault::Panicked(panic_message(payload.as_ref())))?;
        let (next, output) = result?;

        if let Some((id, _)) = output.writes().iter().find(|(_, value)| !value.is_finite()) {
            return Err(ModelFault::NonFinite(*id));
        }
        self.state = next;
        Ok(output)
    }

    fn reset(&mut self) {
        self.state = self.model.initial_state();
        self.rng = self.seed.rng_for(self.stream);
        debug!(model = self.model.name(), stream = self.stream, "Model state reset");
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartplc_config::{default_catalogue, tags};
    use smartplc_core::registry::SignalRegistry;

    /// Counts ticks and writes `value` to the pressure signal.
    struct Scripted {
        target: SignalId,
        value: f64,
        panic: bool,
    }

    impl Model for Scripted {
        type State = u32;

        fn name(&self) -> &str {
            "scripted"
        }

        fn initial_state(&self) -> u32 {
            0
        }

        fn step(
            &self,
            state: &u32,
            _inputs: &ProcessImage,
            _dt: Duration,
            _rng: &mut SmallRng,
        ) -> Result<(u32, ModelOutput), ModelFault> {
            if self.panic {
                panic!("sensor exploded");
            }
            let mut output = ModelOutput::default();
            output.set(self.target, self.value);
            Ok((state + 1, output))
        }
    }

    fn fixture(value: f64, panic: bool) -> (Process<Scripted>, ProcessImage) {
        let (registry, writer) = SignalRegistry::new(&default_catalogue(), 4, 0).unwrap();
        let target = registry.id_of(tags::PRESSURE).unwrap();
        let model = Scripted {
            target,
            value,
            panic,
        };
        (Process::new(model, NoiseSeed::Fixed(1), 0), writer.image())
    }

    #[test]
    fn successful_step_adopts_state() {
        let (mut process, image) = fixture(3.0, false);
        let output = process.tick(&image, Duration::from_millis(500)).unwrap();
        assert_eq!(output.writes().len(), 1);
        assert_eq!(*process.state(), 1);
    }

    #[test]
    fn non_finite_output_keeps_previous_state() {
        let (mut process, image) = fixture(f64::INFINITY, false);
        let fault = process.tick(&image, Duration::from_millis(500)).unwrap_err();
        assert!(matches!(fault, ModelFault::NonFinite(_)));
        assert_eq!(*process.state(), 0);
    }

    #[test]
    fn panic_becomes_fault() {
        let (mut process, image) = fixture(1.0, true);
        let fault = process.tick(&image, Duration::from_millis(500)).unwrap_err();
        assert_eq!(fault, ModelFault::Panicked("sensor exploded".into()));
        assert_eq!(*process.state(), 0);
    }

    #[test]
    fn reset_restores_initial_state() {
        let (mut process, image) = fixture(3.0, false);
        process.tick(&image, Duration::from_millis(500)).unwrap();
        process.tick(&image, Duration::from_millis(500)).unwrap();
        process.reset();
        assert_eq!(*process.state(), 0);
    }

    #[test]
    fn output_get_returns_last_write() {
        let (registry, _) = SignalRegistry::new(&default_catalogue(), 4, 0).unwrap();
        let pump = registry.id_of(tags::PUMP).unwrap();
        let mut output = ModelOutput::default();
        output.set(pump, true).set(pump, false);
        assert_eq!(output.get(pump), Some(SignalValue::Digital(false)));
    }
}

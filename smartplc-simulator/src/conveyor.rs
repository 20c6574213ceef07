//! Conveyor belt with object sensor, limit switch and stopper.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::Rng;
use smartplc_config::{tags, ConveyorConfig};
use smartplc_core::registry::{ProcessImage, SignalRegistry};
use smartplc_core::signal::SignalId;
use smartplc_core::CoreError;

use crate::model::{Model, ModelFault, ModelOutput};

#[derive(Debug, Clone, Copy)]
struct Bindings {
    motor: SignalId,
    motor_speed: Option<SignalId>,
    stopper: SignalId,
    object_sensor: SignalId,
    limit_switch: SignalId,
    belt_speed: SignalId,
    cycle_counter: SignalId,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConveyorState {
    pub speed: f64,
    /// Ticks spent with the motor on since the last reset.
    pub running_ticks: u64,
    pub cycles: u64,
    pub object_present: bool,
}

#[derive(Debug, Clone)]
pub struct ConveyorModel {
    config: ConveyorConfig,
    io: Bindings,
}

impl ConveyorModel {
    pub fn bind(config: ConveyorConfig, registry: &SignalRegistry) -> Result<Self, CoreError> {
        let io = Bindings {
            motor: registry.id_of(tags::MOTOR)?,
            motor_speed: registry.id_of(tags::MOTOR_SPEED).ok(),
            stopper: registry.id_of(tags::STOPPER)?,
            object_sensor: registry.id_of(tags::OBJECT_SENSOR)?,
            limit_switch: registry.id_of(tags::LIMIT_SWITCH)?,
            belt_speed: registry.id_of(tags::BELT_SPEED)?,
            cycle_counter: registry.id_of(tags::CYCLE_COUNTER)?,
        };
        Ok(Self { config, io })
    }

    fn ramp_step(&self) -> f64 {
        self.config.nominal_speed / f64::from(self.config.ramp_ticks)
    }

    /// Belt speed the ramp heads for: the motor speed output when the
    /// catalogue has one, the nominal speed otherwise.
    fn target_speed(&self, inputs: &ProcessImage) -> f64 {
        self.io
            .motor_speed
            .map_or(self.config.nominal_speed, |id| inputs.analog(id).max(0.0))
    }
}

impl Model for ConveyorModel {
    type State = ConveyorState;

    fn name(&self) -> &str {
        "conveyor"
    }

    fn initial_state(&self) -> ConveyorState {
        ConveyorState::default()
    }

    fn step(
        &self,
        state: &ConveyorState,
        inputs: &ProcessImage,
        _dt: Duration,
        rng: &mut SmallRng,
    ) -> Result<(ConveyorState, ModelOutput), ModelFault> {
        let cfg = &self.config;
        let mut next = *state;

        if inputs.digital(self.io.motor) {
            let target = self.target_speed(inputs);
            next.speed = if state.speed < target {
                (state.speed + self.ramp_step()).min(target)
            } else {
                (state.speed - self.ramp_step()).max(target)
            };
            next.running_ticks += 1;
            if next.running_ticks % u64::from(cfg.cycle_period_ticks) == 0 {
                next.cycles += 1;
            }
            next.object_present = if state.object_present {
                !rng.random_bool(cfg.release_probability)
            } else {
                rng.random_bool(cfg.detect_probability)
            };
        } else {
            next.speed = (state.speed - self.ramp_step()).max(0.0);
            next.object_present = false;
        }

        let mut output = ModelOutput::with_capacity(5);
        output
            .set(self.io.belt_speed, next.speed)
            .set(self.io.cycle_counter, next.cycles as f64)
            .set(self.io.object_sensor, next.object_present)
            .set(self.io.limit_switch, next.object_present)
            .set(self.io.stopper, next.object_present);
        Ok((next, output))
    }
}

//! Fill tank with pump, drain and pressure sensor.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::Rng;
use smartplc_config::{tags, TankConfig};
use smartplc_core::registry::{ProcessImage, SignalRegistry};
use smartplc_core::signal::SignalId;
use smartplc_core::CoreError;

use crate::model::{Model, ModelFault, ModelOutput};

#[derive(Debug, Clone, Copy)]
struct Bindings {
    pump: SignalId,
    drain: SignalId,
    drain_valve: Option<SignalId>,
    flow: SignalId,
    level: SignalId,
    pressure: SignalId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankState {
    /// Fill level in percent.
    pub level: f64,
}

#[derive(Debug, Clone)]
pub struct TankModel {
    config: TankConfig,
    io: Bindings,
    pressure_range: (f64, f64),
}

impl TankModel {
    /// Resolves the tank's signals in `registry`.
    pub fn bind(config: TankConfig, registry: &SignalRegistry) -> Result<Self, CoreError> {
        let pressure = registry.get(tags::PRESSURE)?;
        let io = Bindings {
            pump: registry.id_of(tags::PUMP)?,
            drain: registry.id_of(tags::DRAIN)?,
            drain_valve: registry.id_of(tags::DRAIN_VALVE).ok(),
            flow: registry.id_of(tags::FLOW_CONTROL)?,
            level: registry.id_of(tags::TANK_LEVEL)?,
            pressure: pressure.id,
        };
        Ok(Self {
            config,
            io,
            pressure_range: (pressure.min, pressure.max),
        })
    }

    fn drain_open(&self, inputs: &ProcessImage) -> bool {
        inputs.digital(self.io.drain) || self.io.drain_valve.is_some_and(|id| inputs.digital(id))
    }
}

impl Model for TankModel {
    type State = TankState;

    fn name(&self) -> &str {
        "tank"
    }

    fn initial_state(&self) -> TankState {
        TankState {
            level: self.config.initial_level,
        }
    }

    fn step(
        &self,
        state: &TankState,
        inputs: &ProcessImage,
        dt: Duration,
        rng: &mut SmallRng,
    ) -> Result<(TankState, ModelOutput), ModelFault> {
        let cfg = &self.config;
        let dt = dt.as_secs_f64();
        let pump_on = inputs.digital(self.io.pump);

        let delta = if self.drain_open(inputs) {
            -cfg.drain_rate * dt
        } else if pump_on {
            let flow = inputs.analog(self.io.flow) / 100.0;
            cfg.fill_rate * flow.max(cfg.min_flow_fraction) * dt
        } else {
            0.0
        };
        let level = (state.level + delta).clamp(0.0, 100.0);

        let noise = if cfg.pressure_noise > 0.0 {
            rng.random_range(-cfg.pressure_noise..=cfg.pressure_noise)
        } else {
            0.0
        };
        let (p_min, p_max) = self.pressure_range;
        let pressure =
            (cfg.pressure_base + level / 100.0 * cfg.pressure_span + noise).clamp(p_min, p_max);

        let mut output = ModelOutput::with_capacity(3);
        output.set(self.io.level, level).set(self.io.pressure, pressure);
        if pump_on && level >= cfg.cutoff_level {
            output.set(self.io.pump, false);
        }
        Ok((TankState { level }, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Process, ProcessModel};
    use crate::seed::NoiseSeed;
    use smartplc_config::default_catalogue;
    use smartplc_core::registry::RegistryWriter;
    use smartplc_core::signal::SignalValue;

    const TICK: Duration = Duration::from_millis(500);

    fn setup() -> (SignalRegistry, RegistryWriter, Process<TankModel>) {
        let (registry, writer) = SignalRegistry::new(&default_catalogue(), 16, 0).unwrap();
        let model = TankModel::bind(TankConfig::default(), &registry).unwrap();
        (registry, writer, Process::new(model, NoiseSeed::Fixed(7), 0))
    }

    fn run_tick(writer: &mut RegistryWriter, tank: &mut Process<TankModel>, ts: u64) -> ModelOutput {
        writer.apply_pending(ts);
        let output = tank.tick(&writer.image(), TICK).unwrap();
        writer.commit(output.writes(), ts);
        output
    }

    #[test]
    fn pump_fills_until_interlock_trips() {
        let (registry, mut writer, mut tank) = setup();
        let pump = registry.id_of(tags::PUMP).unwrap();
        registry.set_actuator(tags::PUMP, true).unwrap();

        let mut previous = 0.0;
        for ts in 1..=200u64 {
            let output = run_tick(&mut writer, &mut tank, ts);
            let level = registry.value(tags::TANK_LEVEL).unwrap().as_f64();
            if level >= 90.0 {
                assert_eq!(output.get(pump), Some(SignalValue::Digital(false)));
                assert_eq!(registry.value(tags::PUMP), Ok(SignalValue::Digital(false)));
                return;
            }
            assert!(level > previous, "level must rise while pumping");
            assert_eq!(registry.value(tags::PUMP), Ok(SignalValue::Digital(true)));
            previous = level;
        }
        panic!("tank never reached the cutoff level");
    }

    #[test]
    fn minimum_flow_applies_with_closed_valve() {
        let (registry, mut writer, mut tank) = setup();
        registry.set_actuator(tags::FLOW_CONTROL, 0.0).unwrap();
        registry.set_actuator(tags::PUMP, true).unwrap();
        run_tick(&mut writer, &mut tank, 1);
        let level = tank.state().level;
        assert!((level - 10.0 * 0.1 * 0.5).abs() < 1e-9, "{level}");
    }

    #[test]
    fn drain_lowers_level_and_never_goes_negative() {
        let (registry, mut writer, mut tank) = setup();
        registry.set_actuator(tags::PUMP, true).unwrap();
        for ts in 1..=10 {
            run_tick(&mut writer, &mut tank, ts);
        }
        registry.set_actuator(tags::PUMP, false).unwrap();
        registry.set_actuator(tags::DRAIN, true).unwrap();

        let mut previous = tank.state().level;
        for ts in 11..=60 {
            run_tick(&mut writer, &mut tank, ts);
            let level = tank.state().level;
            assert!(level >= 0.0);
            assert!(level <= previous);
            previous = level;
        }
        assert_eq!(previous, 0.0);
    }

    #[test]
    fn drain_valve_alias_opens_drain() {
        let (registry, mut writer, mut tank) = setup();
        registry.set_actuator(tags::PUMP, true).unwrap();
        run_tick(&mut writer, &mut tank, 1);
        let filled = tank.state().level;
        registry.set_actuator(tags::DRAIN_VALVE, true).unwrap();
        run_tick(&mut writer, &mut tank, 2);
        assert!(tank.state().level < filled);
    }

    #[test]
    fn pressure_tracks_level_within_noise() {
        let (registry, mut writer, mut tank) = setup();
        registry.set_actuator(tags::PUMP, true).unwrap();
        for ts in 1..=20 {
            run_tick(&mut writer, &mut tank, ts);
            let level = tank.state().level;
            let pressure = registry.value(tags::PRESSURE).unwrap().as_f64();
            let expected = 2.0 + level / 100.0 * 6.0;
            assert!((pressure - expected).abs() <= 0.05 + 1e-9);
        }
    }

    #[test]
    fn idle_tank_holds_level() {
        let (_registry, mut writer, mut tank) = setup();
        run_tick(&mut writer, &mut tank, 1);
        assert_eq!(tank.state().level, 0.0);
    }
}

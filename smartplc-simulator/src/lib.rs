/*!
# SmartPLC Simulator

Physical process models for the simulated controller. Each model is a pure
step function over (internal state, actuator image, elapsed time) and is
wrapped in a [`Process`] that owns its state and random stream.

## Key Components:
- **Model seam:** [`Model`] for implementors, [`ProcessModel`] for the engine.
- **Tank:** pump/drain fill process with a pump cutoff interlock.
- **Conveyor:** belt speed ramp, cycle counter and object detection.
- **Noise:** [`NoiseSeed`] gives every model an independent, reseedable
  `SmallRng`.
*/

use smartplc_config::PlcConfig;
use smartplc_core::registry::SignalRegistry;
use smartplc_core::CoreError;

pub mod conveyor;
pub mod model;
pub mod seed;
pub mod tank;

pub use conveyor::{ConveyorModel, ConveyorState};
pub use model::{panic_message, Model, ModelFault, ModelOutput, Process, ProcessModel};
pub use seed::NoiseSeed;
pub use tank::{TankModel, TankState};

/// Builds the tank and conveyor processes bound to `registry`, in tick
/// order. Stream numbers follow that order.
pub fn standard_models(
    config: &PlcConfig,
    registry: &SignalRegistry,
    seed: NoiseSeed,
) -> Result<Vec<Box<dyn ProcessModel>>, CoreError> {
    let tank = TankModel::bind(config.tank.clone(), registry)?;
    let conveyor = ConveyorModel::bind(config.conveyor.clone(), registry)?;
    Ok(vec![
        Box::new(Process::new(tank, seed, 0)),
        Box::new(Process::new(conveyor, seed, 1)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartplc_config::tags;

    #[test]
    fn binds_default_catalogue() {
        let config = PlcConfig::default();
        let (registry, _) = SignalRegistry::new(&config.signals, 8, 0).unwrap();
        let models = standard_models(&config, &registry, NoiseSeed::Fixed(1)).unwrap();
        let names: Vec<&str> = models.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["tank", "conveyor"]);
    }

    #[test]
    fn missing_binding_is_reported() {
        let mut config = PlcConfig::default();
        config.signals.retain(|s| s.name != tags::BELT_SPEED);
        let (registry, _) = SignalRegistry::new(&config.signals, 8, 0).unwrap();
        let err = standard_models(&config, &registry, NoiseSeed::Entropy).err();
        assert_eq!(err, Some(CoreError::NotFound(tags::BELT_SPEED.into())));
    }
}

//! Signal catalogue definitions.
//!
//! A catalogue entry describes one I/O point of the simulated controller.
//! Entries are immutable once loaded; only the engine's registry holds the
//! live values.

use serde::{Deserialize, Serialize};

/// Direction and representation of an I/O point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    #[serde(alias = "DI")]
    DigitalInput,
    #[serde(alias = "DO")]
    DigitalOutput,
    #[serde(alias = "AI")]
    AnalogInput,
    #[serde(alias = "AO")]
    AnalogOutput,
}

impl SignalKind {
    pub fn is_digital(self) -> bool {
        matches!(self, SignalKind::DigitalInput | SignalKind::DigitalOutput)
    }

    pub fn is_analog(self) -> bool {
        !self.is_digital()
    }

    /// Outputs are actuators and the only signals external callers may write.
    pub fn is_output(self) -> bool {
        matches!(self, SignalKind::DigitalOutput | SignalKind::AnalogOutput)
    }

    pub fn short_code(self) -> &'static str {
        match self {
            SignalKind::DigitalInput => "DI",
            SignalKind::DigitalOutput => "DO",
            SignalKind::AnalogInput => "AI",
            SignalKind::AnalogOutput => "AO",
        }
    }
}

/// One catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSpec {
    /// Unique tag name.
    pub name: String,

    pub kind: SignalKind,

    /// IEC 61131-3 location such as `%IX0.0` or `%QW1`. Informational only.
    pub address: String,

    #[serde(default)]
    pub description: String,

    /// Engineering unit (analog only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_threshold: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_threshold: Option<f64>,

    /// Value the registry starts with. Digital signals treat non-zero as on.
    #[serde(default)]
    pub initial: f64,
}

impl SignalSpec {
    fn new(name: &str, kind: SignalKind, address: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            address: address.into(),
            description: description.into(),
            unit: None,
            range_min: None,
            range_max: None,
            warning_threshold: None,
            alarm_threshold: None,
            initial: 0.0,
        }
    }

    fn analog(mut self, unit: &str, min: f64, max: f64) -> Self {
        self.unit = Some(unit.into());
        self.range_min = Some(min);
        self.range_max = Some(max);
        self
    }

    fn thresholds(mut self, warning: Option<f64>, alarm: Option<f64>) -> Self {
        self.warning_threshold = warning;
        self.alarm_threshold = alarm;
        self
    }

    fn initial(mut self, value: f64) -> Self {
        self.initial = value;
        self
    }

    /// Effective `[min, max]`. Digital signals are `[0, 1]`; analog signals
    /// without an explicit range default to `[0, 100]`.
    pub fn range(&self) -> (f64, f64) {
        if self.kind.is_digital() {
            (0.0, 1.0)
        } else {
            (self.range_min.unwrap_or(0.0), self.range_max.unwrap_or(100.0))
        }
    }

    pub fn has_thresholds(&self) -> bool {
        self.warning_threshold.is_some() || self.alarm_threshold.is_some()
    }
}

/// Tag names the process models bind to.
pub mod tags {
    use super::SignalKind;

    pub const START_BUTTON: &str = "DI_01_StartButton";
    pub const STOP_BUTTON: &str = "DI_02_StopButton";
    pub const OBJECT_SENSOR: &str = "DI_03_ObjectSensor";
    pub const LIMIT_SWITCH: &str = "DI_04_LimitSwitch";
    pub const PUMP: &str = "DO_01_Pump";
    pub const DRAIN: &str = "DO_02_Drain";
    pub const DRAIN_VALVE: &str = "DO_02_DrainValve";
    pub const MOTOR: &str = "DO_03_Motor";
    pub const STOPPER: &str = "DO_04_Stopper";
    pub const TANK_LEVEL: &str = "AI_01_TankLevel";
    pub const PRESSURE: &str = "AI_02_PressureSensor";
    pub const BELT_SPEED: &str = "AI_03_BeltSpeed";
    pub const CYCLE_COUNTER: &str = "AI_04_CycleCounter";
    pub const FLOW_CONTROL: &str = "AO_01_FlowControl";
    pub const MOTOR_SPEED: &str = "AO_02_MotorSpeed";
    pub const HEATING_POWER: &str = "AO_03_HeatingPower";

    /// Signals that must exist, with the given kind, for the models to run.
    pub const REQUIRED: &[(&str, SignalKind)] = &[
        (PUMP, SignalKind::DigitalOutput),
        (DRAIN, SignalKind::DigitalOutput),
        (FLOW_CONTROL, SignalKind::AnalogOutput),
        (TANK_LEVEL, SignalKind::AnalogInput),
        (PRESSURE, SignalKind::AnalogInput),
        (MOTOR, SignalKind::DigitalOutput),
        (STOPPER, SignalKind::DigitalOutput),
        (OBJECT_SENSOR, SignalKind::DigitalInput),
        (LIMIT_SWITCH, SignalKind::DigitalInput),
        (BELT_SPEED, SignalKind::AnalogInput),
        (CYCLE_COUNTER, SignalKind::AnalogInput),
    ];

    /// Signals the models use when present: the drain valve alias and the
    /// conveyor speed setpoint.
    pub const OPTIONAL: &[(&str, SignalKind)] = &[
        (DRAIN_VALVE, SignalKind::DigitalOutput),
        (MOTOR_SPEED, SignalKind::AnalogOutput),
    ];
}

/// The built-in 16-point catalogue: 4 DI, 5 DO, 4 AI, 3 AO.
pub fn default_catalogue() -> Vec<SignalSpec> {
    use SignalKind::*;

    vec![
        SignalSpec::new(tags::START_BUTTON, DigitalInput, "%IX0.0", "Start button for process"),
        SignalSpec::new(tags::STOP_BUTTON, DigitalInput, "%IX0.1", "Stop button for process"),
        SignalSpec::new(
            tags::OBJECT_SENSOR,
            DigitalInput,
            "%IX0.2",
            "Object detection sensor on conveyor belt",
        ),
        SignalSpec::new(
            tags::LIMIT_SWITCH,
            DigitalInput,
            "%IX0.3",
            "Limit switch for position detection",
        ),
        SignalSpec::new(tags::PUMP, DigitalOutput, "%QX0.0", "Main tank filling pump"),
        SignalSpec::new(tags::DRAIN, DigitalOutput, "%QX0.1", "Tank drain valve"),
        SignalSpec::new(
            tags::DRAIN_VALVE,
            DigitalOutput,
            "%QX0.1",
            "Tank drain valve (alternative name)",
        ),
        SignalSpec::new(tags::MOTOR, DigitalOutput, "%QX0.2", "Conveyor belt motor"),
        SignalSpec::new(tags::STOPPER, DigitalOutput, "%QX0.3", "Conveyor belt stopper"),
        SignalSpec::new(tags::TANK_LEVEL, AnalogInput, "%IW0", "Tank fill level sensor")
            .analog("%", 0.0, 100.0)
            .thresholds(Some(90.0), Some(95.0)),
        SignalSpec::new(tags::PRESSURE, AnalogInput, "%IW1", "System pressure sensor")
            .analog("bar", 0.0, 10.0)
            .thresholds(Some(9.0), Some(9.5))
            .initial(2.0),
        SignalSpec::new(tags::BELT_SPEED, AnalogInput, "%IW2", "Conveyor belt speed sensor")
            .analog("m/min", 0.0, 100.0)
            .thresholds(None, Some(95.0)),
        SignalSpec::new(tags::CYCLE_COUNTER, AnalogInput, "%IW3", "Production cycle counter")
            .analog("cycles", 0.0, 99_999.0),
        SignalSpec::new(tags::FLOW_CONTROL, AnalogOutput, "%QW0", "Flow control valve position")
            .analog("%", 0.0, 100.0)
            .initial(50.0),
        SignalSpec::new(
            tags::MOTOR_SPEED,
            AnalogOutput,
            "%QW1",
            "Motor speed control (frequency converter)",
        )
        .analog("%", 0.0, 100.0)
        .initial(50.0),
        SignalSpec::new(
            tags::HEATING_POWER,
            AnalogOutput,
            "%QW2",
            "Heating element power control",
        )
        .analog("%", 0.0, 100.0),
    ]
}

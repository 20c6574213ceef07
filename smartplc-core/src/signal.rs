//! Signal values and point-in-time signal snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};
use smartplc_config::{SignalKind, SignalSpec};

use crate::error::CoreError;

/// Dead-band applied below a threshold before an alarm clears, as a fraction
/// of the signal's declared range.
pub const HYSTERESIS_FRACTION: f64 = 0.05;

/// Dense index of a signal inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SignalId(pub(crate) usize);

impl SignalId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Current value of a signal. Digital points carry a bool, analog points a
/// float; the variant always matches the signal kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Digital(bool),
    Analog(f64),
}

impl SignalValue {
    /// Numeric view used for history rows and trends (digital maps to 0/1).
    #[inline]
    pub fn as_f64(self) -> f64 {
        match self {
            SignalValue::Digital(on) => f64::from(u8::from(on)),
            SignalValue::Analog(value) => value,
        }
    }

    #[inline]
    pub fn as_bool(self) -> bool {
        match self {
            SignalValue::Digital(on) => on,
            SignalValue::Analog(value) => value != 0.0,
        }
    }

    pub fn is_finite(self) -> bool {
        match self {
            SignalValue::Digital(_) => true,
            SignalValue::Analog(value) => value.is_finite(),
        }
    }
}

impl From<bool> for SignalValue {
    fn from(value: bool) -> Self {
        SignalValue::Digital(value)
    }
}

impl From<f64> for SignalValue {
    fn from(value: f64) -> Self {
        SignalValue::Analog(value)
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Digital(on) => write!(f, "{}", u8::from(*on)),
            SignalValue::Analog(value) => write!(f, "{value:.3}"),
        }
    }
}

/// A copy of one signal's metadata and value at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub id: SignalId,
    pub name: String,
    pub kind: SignalKind,
    pub address: String,
    pub description: String,
    pub unit: Option<String>,
    pub min: f64,
    pub max: f64,
    pub warning_threshold: Option<f64>,
    pub alarm_threshold: Option<f64>,
    pub value: SignalValue,
    /// Nanoseconds since the clock epoch of the last committed value.
    pub updated_at: u64,
}

impl Signal {
    pub(crate) fn from_spec(id: SignalId, spec: &SignalSpec, timestamp: u64) -> Self {
        let (min, max) = spec.range();
        let value = if spec.kind.is_digital() {
            SignalValue::Digital(spec.initial != 0.0)
        } else {
            SignalValue::Analog(spec.initial.clamp(min, max))
        };
        Self {
            id,
            name: spec.name.clone(),
            kind: spec.kind,
            address: spec.address.clone(),
            description: spec.description.clone(),
            unit: spec.unit.clone(),
            min,
            max,
            warning_threshold: spec.warning_threshold,
            alarm_threshold: spec.alarm_threshold,
            value,
            updated_at: timestamp,
        }
    }

    pub fn has_thresholds(&self) -> bool {
        self.kind.is_analog() && (self.warning_threshold.is_some() || self.alarm_threshold.is_some())
    }

    /// Width of the alarm dead-band: 5% of the declared range.
    pub fn hysteresis_margin(&self) -> f64 {
        (self.max - self.min) * HYSTERESIS_FRACTION
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Checks that `value` fits this signal's representation, clamping
    /// analog values into range. Does not check direction.
    pub fn coerce(&self, value: SignalValue) -> Result<SignalValue, CoreError> {
        match (self.kind.is_digital(), value) {
            (true, SignalValue::Digital(_)) => Ok(value),
            (false, SignalValue::Analog(v)) if v.is_finite() => Ok(SignalValue::Analog(self.clamp(v))),
            (false, SignalValue::Analog(v)) => Err(CoreError::InvalidValue {
                name: self.name.clone(),
                reason: format!("{v} is not a finite number"),
            }),
            _ => Err(CoreError::InvalidKind {
                name: self.name.clone(),
                kind: self.kind,
            }),
        }
    }
}

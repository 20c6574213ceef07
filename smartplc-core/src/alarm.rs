//! Threshold alarms with hysteresis.
//!
//! A level is entered when the value reaches its threshold and held until
//! the value falls below `threshold - margin`. The alarm level is checked
//! before the warning level, so at most one status applies at a time and a
//! signal produces at most one transition per tick.

use serde::Serialize;

use crate::events::AlarmTransition;
use crate::registry::ProcessImage;
use crate::signal::{Signal, SignalId};

/// Alarm status ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AlarmStatus {
    Normal,
    Warning,
    Critical,
}

impl std::fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AlarmStatus::Normal => "normal",
            AlarmStatus::Warning => "warning",
            AlarmStatus::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmThresholds {
    pub warning: Option<f64>,
    pub alarm: Option<f64>,
    /// Dead-band below a threshold before the level clears.
    pub margin: f64,
}

impl AlarmThresholds {
    pub fn for_signal(signal: &Signal) -> Self {
        Self {
            warning: signal.warning_threshold,
            alarm: signal.alarm_threshold,
            margin: signal.hysteresis_margin(),
        }
    }
}

/// Computes the status for `value` given the status held before.
pub fn evaluate(previous: AlarmStatus, value: f64, thresholds: &AlarmThresholds) -> AlarmStatus {
    let holds = |threshold: Option<f64>, level: AlarmStatus| match threshold {
        Some(t) => value >= t || (previous >= level && value >= t - thresholds.margin),
        None => false,
    };

    if holds(thresholds.alarm, AlarmStatus::Critical) {
        AlarmStatus::Critical
    } else if holds(thresholds.warning, AlarmStatus::Warning) {
        AlarmStatus::Warning
    } else {
        AlarmStatus::Normal
    }
}

/// Current alarm status of one thresholded signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmState {
    pub signal: String,
    pub id: SignalId,
    pub status: AlarmStatus,
    /// Timestamp of the last transition, or of evaluator creation.
    pub since: u64,
}

#[derive(Debug)]
struct Tracked {
    state: AlarmState,
    thresholds: AlarmThresholds,
}

/// Tracks alarm status for every analog signal that declares a threshold.
#[derive(Debug, Default)]
pub struct AlarmEvaluator {
    tracked: Vec<Tracked>,
}

impl AlarmEvaluator {
    /// Starts every thresholded signal at `Normal`; the first evaluation
    /// picks up signals that begin above a threshold.
    pub fn new(signals: &[Signal]) -> Self {
        let tracked = signals
            .iter()
            .filter(|signal| signal.has_thresholds())
            .map(|signal| Tracked {
                state: AlarmState {
                    signal: signal.name.clone(),
                    id: signal.id,
                    status: AlarmStatus::Normal,
                    since: signal.updated_at,
                },
                thresholds: AlarmThresholds::for_signal(signal),
            })
            .collect();
        Self { tracked }
    }

    /// Evaluates every tracked signal against the committed image.
    pub fn evaluate(&mut self, image: &ProcessImage, timestamp: u64) -> Vec<AlarmTransition> {
        let mut transitions = Vec::new();
        for tracked in &mut self.tracked {
            let value = image.analog(tracked.state.id);
            let next = evaluate(tracked.state.status, value, &tracked.thresholds);
            if next != tracked.state.status {
                transitions.push(AlarmTransition {
                    signal: tracked.state.signal.clone(),
                    from: tracked.state.status,
                    to: next,
                    value,
                    timestamp,
                });
                tracked.state.status = next;
                tracked.state.since = timestamp;
            }
        }
        transitions
    }

    pub fn states(&self) -> Vec<AlarmState> {
        self.tracked.iter().map(|t| t.state.clone()).collect()
    }

    pub fn status_of(&self, name: &str) -> Option<AlarmStatus> {
        self.tracked
            .iter()
            .find(|t| t.state.signal == name)
            .map(|t| t.state.status)
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WARN_ONLY: AlarmThresholds = AlarmThresholds {
        warning: Some(80.0),
        alarm: None,
        margin: 5.0,
    };

    const BOTH: AlarmThresholds = AlarmThresholds {
        warning: Some(90.0),
        alarm: Some(95.0),
        margin: 5.0,
    };

    fn run(thresholds: &AlarmThresholds, values: &[f64]) -> Vec<(AlarmStatus, AlarmStatus)> {
        let mut status = AlarmStatus::Normal;
        let mut transitions = Vec::new();
        for &value in values {
            let next = evaluate(status, value, thresholds);
            if next != status {
                transitions.push((status, next));
                status = next;
            }
        }
        transitions
    }

    #[test]
    fn crossing_warning_emits_one_transition() {
        let transitions = run(&WARN_ONLY, &[70.0, 82.0]);
        assert_eq!(transitions, vec![(AlarmStatus::Normal, AlarmStatus::Warning)]);
    }

    #[test]
    fn oscillation_inside_dead_band_is_silent() {
        let transitions = run(&WARN_ONLY, &[70.0, 82.0, 78.0, 82.0, 78.0, 82.0, 76.0]);
        assert_eq!(transitions.len(), 1);
    }

    #[test]
    fn falling_below_dead_band_clears() {
        let transitions = run(&WARN_ONLY, &[82.0, 78.0, 74.0]);
        assert_eq!(
            transitions,
            vec![
                (AlarmStatus::Normal, AlarmStatus::Warning),
                (AlarmStatus::Warning, AlarmStatus::Normal),
            ]
        );
    }

    #[test]
    fn value_at_threshold_enters_level() {
        assert_eq!(evaluate(AlarmStatus::Normal, 80.0, &WARN_ONLY), AlarmStatus::Warning);
    }

    #[test]
    fn critical_drops_to_warning_inside_warning_band() {
        assert_eq!(evaluate(AlarmStatus::Normal, 96.0, &BOTH), AlarmStatus::Critical);
        assert_eq!(evaluate(AlarmStatus::Critical, 91.0, &BOTH), AlarmStatus::Critical);
        assert_eq!(evaluate(AlarmStatus::Critical, 89.0, &BOTH), AlarmStatus::Warning);
        assert_eq!(evaluate(AlarmStatus::Critical, 84.0, &BOTH), AlarmStatus::Normal);
    }

    #[test]
    fn normal_jumps_straight_to_critical() {
        let transitions = run(&BOTH, &[50.0, 99.0]);
        assert_eq!(transitions, vec![(AlarmStatus::Normal, AlarmStatus::Critical)]);
    }

    #[test]
    fn alarm_only_signal_never_warns() {
        let thresholds = AlarmThresholds {
            warning: None,
            alarm: Some(95.0),
            margin: 5.0,
        };
        assert_eq!(evaluate(AlarmStatus::Normal, 94.0, &thresholds), AlarmStatus::Normal);
        assert_eq!(evaluate(AlarmStatus::Critical, 92.0, &thresholds), AlarmStatus::Critical);
        assert_eq!(evaluate(AlarmStatus::Critical, 89.0, &thresholds), AlarmStatus::Normal);
    }

    proptest! {
        #[test]
        fn values_above_threshold_always_hold(previous in 0usize..3, value in 95.0f64..1000.0) {
            let previous = [AlarmStatus::Normal, AlarmStatus::Warning, AlarmStatus::Critical][previous];
            prop_assert_eq!(evaluate(previous, value, &BOTH), AlarmStatus::Critical);
        }

        #[test]
        fn from_normal_status_follows_raw_thresholds(value in -100.0f64..200.0) {
            let expected = if value >= 95.0 {
                AlarmStatus::Critical
            } else if value >= 90.0 {
                AlarmStatus::Warning
            } else {
                AlarmStatus::Normal
            };
            prop_assert_eq!(evaluate(AlarmStatus::Normal, value, &BOTH), expected);
        }
    }
}

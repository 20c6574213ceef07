//! ## smartplc-core::events
//! **Immutable change records and their delivery**
//!
//! A tick produces at most one `EventBatch`. Batches are shared behind an
//! `Arc` so fan-out to many subscribers never copies the event list.

pub mod bus;

pub use bus::{BusError, ObserverBus, PublishReport, Subscription};

use serde::Serialize;

use crate::alarm::AlarmStatus;
use crate::signal::SignalValue;

/// A committed value change of one signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalChanged {
    pub signal: String,
    pub old: SignalValue,
    pub new: SignalValue,
    pub timestamp: u64,
}

/// A change of one signal's alarm status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmTransition {
    pub signal: String,
    pub from: AlarmStatus,
    pub to: AlarmStatus,
    /// Signal value that caused the transition.
    pub value: f64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    SignalChanged(SignalChanged),
    AlarmTransition(AlarmTransition),
}

impl Event {
    pub fn signal(&self) -> &str {
        match self {
            Event::SignalChanged(change) => &change.signal,
            Event::AlarmTransition(transition) => &transition.signal,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            Event::SignalChanged(change) => change.timestamp,
            Event::AlarmTransition(transition) => transition.timestamp,
        }
    }
}

/// One (signal, value, timestamp) row for time-series persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySample {
    pub signal: String,
    pub value: f64,
    pub timestamp: u64,
}

/// All events of one committed tick, in commit order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventBatch {
    /// Publication sequence number, assigned by the bus. Strictly increasing.
    pub sequence: u64,
    /// Tick that produced the batch.
    pub tick: u64,
    pub timestamp: u64,
    pub events: Vec<Event>,
}

impl EventBatch {
    pub fn new(tick: u64, timestamp: u64, events: Vec<Event>) -> Self {
        Self {
            sequence: 0,
            tick,
            timestamp,
            events,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn signal_changes(&self) -> impl Iterator<Item = &SignalChanged> {
        self.events.iter().filter_map(|event| match event {
            Event::SignalChanged(change) => Some(change),
            Event::AlarmTransition(_) => None,
        })
    }

    pub fn alarm_transitions(&self) -> impl Iterator<Item = &AlarmTransition> {
        self.events.iter().filter_map(|event| match event {
            Event::AlarmTransition(transition) => Some(transition),
            Event::SignalChanged(_) => None,
        })
    }

    /// Rows suitable for time-series append, ordered as committed.
    pub fn history_samples(&self) -> Vec<HistorySample> {
        self.signal_changes()
            .map(|change| HistorySample {
                signal: change.signal.clone(),
                value: change.new.as_f64(),
                timestamp: change.timestamp,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_samples_skip_alarm_transitions() {
        let batch = EventBatch::new(
            3,
            30,
            vec![
                Event::SignalChanged(SignalChanged {
                    signal: "DO_01_Pump".into(),
                    old: SignalValue::Digital(false),
                    new: SignalValue::Digital(true),
                    timestamp: 30,
                }),
                Event::AlarmTransition(AlarmTransition {
                    signal: "AI_01_TankLevel".into(),
                    from: AlarmStatus::Normal,
                    to: AlarmStatus::Warning,
                    value: 91.0,
                    timestamp: 30,
                }),
                Event::SignalChanged(SignalChanged {
                    signal: "AI_01_TankLevel".into(),
                    old: SignalValue::Analog(89.0),
                    new: SignalValue::Analog(91.0),
                    timestamp: 30,
                }),
            ],
        );

        let samples = batch.history_samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].signal, "DO_01_Pump");
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(samples[1].value, 91.0);
        assert_eq!(batch.alarm_transitions().count(), 1);
    }
}

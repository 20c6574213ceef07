//! Canonical store of live signal values.
//!
//! The registry is split into a cloneable read handle (`SignalRegistry`) and
//! a single `RegistryWriter` owned by the simulation loop. External actuator
//! writes never touch the table directly: they are validated, queued, and
//! applied by the writer at the start of the next tick. A tick's commit
//! happens under one write lock, so readers see either the previous tick or
//! the new one, never a mix.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use parking_lot::RwLock;
use serde::Serialize;
use smartplc_config::{validation, SignalSpec};
use tracing::{debug, error, warn};

use crate::error::CoreError;
use crate::events::SignalChanged;
use crate::signal::{Signal, SignalId, SignalValue};

/// One retained (value, timestamp) pair of a signal's recent history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSample {
    pub value: f64,
    pub timestamp: u64,
}

#[derive(Debug)]
struct PendingWrite {
    id: SignalId,
    value: SignalValue,
}

#[derive(Debug)]
struct Table {
    signals: Vec<Signal>,
    trends: Vec<VecDeque<TrendSample>>,
}

#[derive(Debug)]
struct Shared {
    index: HashMap<String, SignalId>,
    table: RwLock<Table>,
    pending: SegQueue<PendingWrite>,
    trend_depth: usize,
}

/// Read handle and actuator write queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SignalRegistry {
    shared: Arc<Shared>,
}

/// The only handle allowed to commit values. Not cloneable.
#[derive(Debug)]
pub struct RegistryWriter {
    shared: Arc<Shared>,
}

/// Values of every signal at one instant, indexed by `SignalId`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessImage {
    values: Vec<SignalValue>,
}

impl ProcessImage {
    pub fn value(&self, id: SignalId) -> SignalValue {
        self.values[id.index()]
    }

    pub fn digital(&self, id: SignalId) -> bool {
        self.value(id).as_bool()
    }

    pub fn analog(&self, id: SignalId) -> f64 {
        self.value(id).as_f64()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SignalRegistry {
    /// Builds the registry from a catalogue. Every entry is validated and
    /// names must be unique; any failure rejects the catalogue as a whole.
    pub fn new(
        catalogue: &[SignalSpec],
        trend_depth: usize,
        timestamp: u64,
    ) -> Result<(SignalRegistry, RegistryWriter), CoreError> {
        let trend_depth = trend_depth.max(1);
        let mut index = HashMap::with_capacity(catalogue.len());
        let mut signals = Vec::with_capacity(catalogue.len());
        let mut trends = Vec::with_capacity(catalogue.len());

        for spec in catalogue {
            validation::validate_signal(spec)
                .map_err(|e| CoreError::InvalidCatalogue(e.to_string()))?;
            let id = SignalId(signals.len());
            if index.insert(spec.name.clone(), id).is_some() {
                return Err(CoreError::InvalidCatalogue(format!(
                    "duplicate signal name {}",
                    spec.name
                )));
            }
            let signal = Signal::from_spec(id, spec, timestamp);
            let mut trend = VecDeque::with_capacity(trend_depth);
            trend.push_back(TrendSample {
                value: signal.value.as_f64(),
                timestamp,
            });
            signals.push(signal);
            trends.push(trend);
        }

        debug!(signals = signals.len(), "Signal registry initialised");
        let shared = Arc::new(Shared {
            index,
            table: RwLock::new(Table { signals, trends }),
            pending: SegQueue::new(),
            trend_depth,
        });
        Ok((
            SignalRegistry {
                shared: Arc::clone(&shared),
            },
            RegistryWriter { shared },
        ))
    }

    pub fn id_of(&self, name: &str) -> Result<SignalId, CoreError> {
        self.shared
            .index
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::NotFound(name.to_string()))
    }

    /// Snapshot of one signal.
    pub fn get(&self, name: &str) -> Result<Signal, CoreError> {
        let id = self.id_of(name)?;
        Ok(self.shared.table.read().signals[id.index()].clone())
    }

    pub fn value(&self, name: &str) -> Result<SignalValue, CoreError> {
        let id = self.id_of(name)?;
        Ok(self.shared.table.read().signals[id.index()].value)
    }

    /// Snapshot of every signal in catalogue order, taken under one lock.
    pub fn snapshot_all(&self) -> Vec<Signal> {
        self.shared.table.read().signals.clone()
    }

    /// Queues an actuator write for the next tick and returns the value that
    /// will be applied. Analog values are clamped into range.
    pub fn set_actuator(
        &self,
        name: &str,
        value: impl Into<SignalValue>,
    ) -> Result<SignalValue, CoreError> {
        let id = self.id_of(name)?;
        let value = {
            let table = self.shared.table.read();
            let signal = &table.signals[id.index()];
            if !signal.kind.is_output() {
                return Err(CoreError::InvalidKind {
                    name: signal.name.clone(),
                    kind: signal.kind,
                });
            }
            signal.coerce(value.into())?
        };
        self.shared.pending.push(PendingWrite { id, value });
        debug!(signal = name, %value, "Actuator write queued");
        Ok(value)
    }

    /// Last `n` committed samples of a signal, oldest first.
    pub fn trend(&self, name: &str, n: usize) -> Result<Vec<TrendSample>, CoreError> {
        let id = self.id_of(name)?;
        let table = self.shared.table.read();
        let trend = &table.trends[id.index()];
        let skip = trend.len().saturating_sub(n);
        Ok(trend.iter().skip(skip).copied().collect())
    }

    pub fn names(&self) -> Vec<String> {
        self.shared
            .table
            .read()
            .signals
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.index.is_empty()
    }

    /// Actuator writes waiting for the next tick.
    pub fn pending_writes(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn trend_depth(&self) -> usize {
        self.shared.trend_depth
    }
}

impl RegistryWriter {
    /// A read handle onto the same registry.
    pub fn registry(&self) -> SignalRegistry {
        SignalRegistry {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Applies queued actuator writes. Repeated writes to one signal
    /// collapse to the last one, so a value written and written back before
    /// the tick reports no change.
    pub fn apply_pending(&mut self, timestamp: u64) -> Vec<SignalChanged> {
        let mut writes: Vec<(SignalId, SignalValue)> =
            Vec::with_capacity(self.shared.pending.len());
        let mut slots: HashMap<SignalId, usize> = HashMap::new();
        while let Some(write) = self.shared.pending.pop() {
            match slots.get(&write.id) {
                Some(&slot) => writes[slot].1 = write.value,
                None => {
                    slots.insert(write.id, writes.len());
                    writes.push((write.id, write.value));
                }
            }
        }
        if writes.is_empty() {
            return Vec::new();
        }
        self.commit(&writes, timestamp)
    }

    /// Current values of every signal.
    pub fn image(&self) -> ProcessImage {
        let table = self.shared.table.read();
        ProcessImage {
            values: table.signals.iter().map(|s| s.value).collect(),
        }
    }

    /// Commits a set of values atomically and reports the ones that changed.
    ///
    /// Finite out-of-range analog values are clamped with a warning. Values
    /// of the wrong representation, or non-finite ones, are skipped.
    pub fn commit(
        &mut self,
        writes: &[(SignalId, SignalValue)],
        timestamp: u64,
    ) -> Vec<SignalChanged> {
        let mut changes = Vec::new();
        let mut table = self.shared.table.write();
        let Table { signals, trends } = &mut *table;

        for &(id, value) in writes {
            let Some(signal) = signals.get_mut(id.index()) else {
                error!(index = id.index(), "Commit for unknown signal id skipped");
                continue;
            };
            let value = match (value, signal.kind.is_digital()) {
                (SignalValue::Digital(_), true) => value,
                (SignalValue::Analog(v), false) if v.is_finite() => {
                    let clamped = signal.clamp(v);
                    if clamped != v {
                        warn!(
                            signal = %signal.name,
                            value = v,
                            min = signal.min,
                            max = signal.max,
                            "Value out of range, clamped"
                        );
                    }
                    SignalValue::Analog(clamped)
                }
                _ => {
                    error!(signal = %signal.name, %value, "Rejected value for signal");
                    continue;
                }
            };

            if value == signal.value {
                continue;
            }
            let old = signal.value;
            signal.value = value;
            signal.updated_at = timestamp;

            let trend = &mut trends[id.index()];
            if trend.len() == self.shared.trend_depth {
                trend.pop_front();
            }
            trend.push_back(TrendSample {
                value: value.as_f64(),
                timestamp,
            });

            changes.push(SignalChanged {
                signal: signal.name.clone(),
                old,
                new: value,
                timestamp,
            });
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use smartplc_config::{default_catalogue, tags, SignalKind};
    use tracing_test::traced_test;

    fn registry() -> (SignalRegistry, RegistryWriter) {
        SignalRegistry::new(&default_catalogue(), 4, 0).unwrap()
    }

    #[test]
    fn lookup_unknown_name() {
        let (registry, _) = registry();
        assert_eq!(
            registry.get("AI_99_Missing"),
            Err(CoreError::NotFound("AI_99_Missing".into()))
        );
    }

    #[test]
    fn actuator_write_is_deferred_until_applied() {
        let (registry, mut writer) = registry();
        registry.set_actuator(tags::PUMP, true).unwrap();
        assert_eq!(registry.value(tags::PUMP), Ok(SignalValue::Digital(false)));
        assert_eq!(registry.pending_writes(), 1);

        let changes = writer.apply_pending(10);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].signal, tags::PUMP);
        assert_eq!(registry.value(tags::PUMP), Ok(SignalValue::Digital(true)));
        assert_eq!(registry.get(tags::PUMP).unwrap().updated_at, 10);
    }

    #[test]
    fn repeated_writes_collapse_to_the_last() {
        let (registry, mut writer) = registry();
        registry.set_actuator(tags::PUMP, true).unwrap();
        registry.set_actuator(tags::PUMP, false).unwrap();
        assert!(writer.apply_pending(10).is_empty());
        assert_eq!(registry.value(tags::PUMP), Ok(SignalValue::Digital(false)));
        assert_eq!(registry.trend(tags::PUMP, 10).unwrap().len(), 1);

        registry.set_actuator(tags::FLOW_CONTROL, 10.0).unwrap();
        registry.set_actuator(tags::MOTOR, true).unwrap();
        registry.set_actuator(tags::FLOW_CONTROL, 80.0).unwrap();
        let changes = writer.apply_pending(11);
        let names: Vec<&str> = changes.iter().map(|c| c.signal.as_str()).collect();
        assert_eq!(names, vec![tags::FLOW_CONTROL, tags::MOTOR]);
        assert_eq!(changes[0].new, SignalValue::Analog(80.0));
    }

    #[test]
    fn writes_to_inputs_are_rejected() {
        let (registry, _) = registry();
        let err = registry.set_actuator(tags::TANK_LEVEL, 50.0).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidKind {
                name: tags::TANK_LEVEL.into(),
                kind: SignalKind::AnalogInput,
            }
        );
        assert_eq!(registry.pending_writes(), 0);
    }

    #[test]
    fn analog_actuator_writes_are_clamped() {
        let (registry, _) = registry();
        let applied = registry.set_actuator(tags::FLOW_CONTROL, 250.0).unwrap();
        assert_eq!(applied, SignalValue::Analog(100.0));
    }

    #[test]
    fn unchanged_commit_emits_nothing() {
        let (registry, mut writer) = registry();
        let id = registry.id_of(tags::FLOW_CONTROL).unwrap();
        assert!(writer.commit(&[(id, 50.0.into())], 5).is_empty());
        assert_eq!(registry.trend(tags::FLOW_CONTROL, 10).unwrap().len(), 1);
    }

    #[traced_test]
    #[test]
    fn out_of_range_commit_is_clamped_with_warning() {
        let (registry, mut writer) = registry();
        let id = registry.id_of(tags::TANK_LEVEL).unwrap();
        let changes = writer.commit(&[(id, 120.0.into())], 5);
        assert_eq!(changes[0].new, SignalValue::Analog(100.0));
        assert!(logs_contain("Value out of range, clamped"));
    }

    #[test]
    fn non_finite_commit_is_skipped() {
        let (registry, mut writer) = registry();
        let id = registry.id_of(tags::TANK_LEVEL).unwrap();
        assert!(writer.commit(&[(id, f64::NAN.into())], 5).is_empty());
        assert_eq!(registry.value(tags::TANK_LEVEL), Ok(SignalValue::Analog(0.0)));
    }

    #[test]
    fn trend_keeps_most_recent_samples() {
        let (registry, mut writer) = registry();
        let id = registry.id_of(tags::TANK_LEVEL).unwrap();
        for step in 1..=6u64 {
            writer.commit(&[(id, (step as f64).into())], step);
        }
        let trend = registry.trend(tags::TANK_LEVEL, 10).unwrap();
        let values: Vec<f64> = trend.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0, 6.0]);
        let last_two = registry.trend(tags::TANK_LEVEL, 2).unwrap();
        assert_eq!(last_two[1].timestamp, 6);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut catalogue = default_catalogue();
        catalogue.push(catalogue[0].clone());
        assert!(matches!(
            SignalRegistry::new(&catalogue, 4, 0),
            Err(CoreError::InvalidCatalogue(_))
        ));
    }

    #[test]
    fn malformed_entry_rejects_catalogue() {
        let mut catalogue = default_catalogue();
        catalogue[0].address = "IX0.0".into();
        assert!(matches!(
            SignalRegistry::new(&catalogue, 4, 0),
            Err(CoreError::InvalidCatalogue(_))
        ));
    }

    #[test]
    fn image_reflects_commits() {
        let (registry, mut writer) = registry();
        let pump = registry.id_of(tags::PUMP).unwrap();
        writer.commit(&[(pump, true.into())], 1);
        assert!(writer.image().digital(pump));
    }

    proptest! {
        #[test]
        fn committed_analog_values_stay_in_range(value in proptest::num::f64::ANY) {
            let (registry, mut writer) = registry();
            let id = registry.id_of(tags::PRESSURE).unwrap();
            writer.commit(&[(id, value.into())], 1);
            let stored = registry.value(tags::PRESSURE).unwrap().as_f64();
            prop_assert!(stored.is_finite());
            prop_assert!((0.0..=10.0).contains(&stored));
        }
    }
}

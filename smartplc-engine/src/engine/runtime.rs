//! Simulation loop: lifecycle state machine and the tick pipeline.
//!
//! Locking discipline: the core mutex (models, registry writer, alarm
//! evaluator) is always taken before the control mutex (loop state, task
//! handle). A tick checks its generation under both locks before touching
//! anything, and `stop` bumps the generation under both, so once `stop`
//! returns no further batch can be published.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, trace, warn};

use smartplc_config::{tags, PlcConfig};
use smartplc_core::alarm::{AlarmEvaluator, AlarmState, AlarmStatus};
use smartplc_core::events::{Event, EventBatch, ObserverBus, Subscription};
use smartplc_core::registry::{RegistryWriter, SignalRegistry, TrendSample};
use smartplc_core::signal::{Signal, SignalValue};
use smartplc_core::time::{Clock, SystemClock};
use smartplc_core::CoreError;
use smartplc_simulator::{panic_message, standard_models, NoiseSeed, ProcessModel};
use smartplc_telemetry::{EventLogger, MetricsRecorder};

use super::diagnostics::{DiagnosticsCollector, DiagnosticsSnapshot};
use super::digest::RunDigest;
use super::error::EngineError;
use super::history::{spawn_history_task, HistorySink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    Stopped,
    Running,
    Paused,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub timestamp: u64,
    pub signal_changes: usize,
    pub alarm_transitions: usize,
    pub model_faults: usize,
    /// Bus sequence number, if a batch was published.
    pub sequence: Option<u64>,
}

/// Current snapshot and recent history of one signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalTrend {
    pub signal: Signal,
    pub samples: Vec<TrendSample>,
    pub alarm: Option<AlarmStatus>,
}

struct CoreState {
    models: Vec<Box<dyn ProcessModel>>,
    writer: RegistryWriter,
    evaluator: AlarmEvaluator,
    tick: u64,
}

struct Control {
    state: EngineState,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    registry: SignalRegistry,
    bus: ObserverBus,
    clock: Arc<dyn Clock>,
    interval: Duration,
    metrics: Option<Arc<MetricsRecorder>>,
    core: Mutex<CoreState>,
    control: Mutex<Control>,
    alarms: RwLock<Vec<AlarmState>>,
    diagnostics: Mutex<DiagnosticsCollector>,
    digest: Mutex<RunDigest>,
}

/// Outcome of binding process models to a registry.
pub type BoundModels = Result<Vec<Box<dyn ProcessModel>>, CoreError>;

/// Binds process models to a freshly built registry.
pub type ModelFactory = Box<dyn FnOnce(&PlcConfig, &SignalRegistry, NoiseSeed) -> BoundModels + Send>;

/// Builder for [`SimulationEngine`].
pub struct EngineBuilder {
    config: PlcConfig,
    clock: Option<Arc<dyn Clock>>,
    seed: Option<NoiseSeed>,
    metrics: Option<Arc<MetricsRecorder>>,
    models: Option<ModelFactory>,
}

impl EngineBuilder {
    /// Overrides the wall clock, e.g. with a `VirtualClock`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides `simulation.seed` from the configuration.
    pub fn seed(mut self, seed: NoiseSeed) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replaces the tank and conveyor with the processes `factory` builds.
    /// Models tick in the returned order.
    pub fn models<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(&PlcConfig, &SignalRegistry, NoiseSeed) -> BoundModels + Send + 'static,
    {
        self.models = Some(Box::new(factory));
        self
    }

    /// Validates the configuration and builds a stopped engine.
    pub fn build(self) -> Result<SimulationEngine, EngineError> {
        let config = self.config;
        config.check()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let seed = self
            .seed
            .unwrap_or_else(|| NoiseSeed::from(config.simulation.seed));
        let (registry, writer) =
            SignalRegistry::new(&config.signals, config.core.trend_depth, clock.now_ns())?;
        let models = match self.models {
            Some(factory) => factory(&config, &registry, seed)?,
            None => standard_models(&config, &registry, seed)?,
        };
        let evaluator = AlarmEvaluator::new(&registry.snapshot_all());
        let bus = ObserverBus::with_capacity(config.core.observer_capacity)?;

        info!(
            signals = registry.len(),
            models = models.len(),
            interval_ms = config.core.tick_interval_ms,
            deterministic = seed.is_deterministic(),
            "Simulation engine initialised"
        );

        let alarms = evaluator.states();
        Ok(SimulationEngine {
            inner: Arc::new(Inner {
                registry,
                bus,
                clock,
                interval: config.core.tick_interval(),
                metrics: self.metrics,
                core: Mutex::new(CoreState {
                    models,
                    writer,
                    evaluator,
                    tick: 0,
                }),
                control: Mutex::new(Control {
                    state: EngineState::Stopped,
                    generation: 0,
                    task: None,
                }),
                alarms: RwLock::new(alarms),
                diagnostics: Mutex::new(DiagnosticsCollector::new()),
                digest: Mutex::new(RunDigest::new()),
            }),
        })
    }
}

/// Owns the process models and drives them on a periodic Tokio task.
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct SimulationEngine {
    inner: Arc<Inner>,
}

impl SimulationEngine {
    pub fn builder(config: PlcConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            clock: None,
            seed: None,
            metrics: None,
            models: None,
        }
    }

    pub fn new(config: PlcConfig) -> Result<Self, EngineError> {
        Self::builder(config).build()
    }

    pub fn state(&self) -> EngineState {
        self.inner.control.lock().state
    }

    pub fn tick_interval(&self) -> Duration {
        self.inner.interval
    }

    /// Stopped/Paused → Running. Must be called inside a Tokio runtime.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<(), EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let mut control = self.inner.control.lock();
        match control.state {
            EngineState::Running => return Err(EngineError::AlreadyRunning),
            EngineState::Stopped | EngineState::Paused => {}
        }
        let previous = control.state;
        self.launch(&mut control, &runtime);
        drop(control);
        log_state_change(previous, EngineState::Running);
        Ok(())
    }

    /// Running/Paused → Stopped. Resets every process model; signal values
    /// keep their last readings.
    #[instrument(skip(self))]
    pub fn stop(&self) -> Result<(), EngineError> {
        let mut core = self.inner.core.lock();
        let mut control = self.inner.control.lock();
        let previous = control.state;
        if previous == EngineState::Stopped {
            return Err(EngineError::NotRunning);
        }
        control.state = EngineState::Stopped;
        control.generation += 1;
        if let Some(task) = control.task.take() {
            task.abort();
        }
        for model in core.models.iter_mut() {
            model.reset();
        }
        drop(control);
        drop(core);
        log_state_change(previous, EngineState::Stopped);
        Ok(())
    }

    /// Running → Paused, keeping model state.
    #[instrument(skip(self))]
    pub fn pause(&self) -> Result<(), EngineError> {
        let _core = self.inner.core.lock();
        let mut control = self.inner.control.lock();
        if control.state != EngineState::Running {
            return Err(EngineError::NotRunning);
        }
        control.state = EngineState::Paused;
        control.generation += 1;
        if let Some(task) = control.task.take() {
            task.abort();
        }
        drop(control);
        log_state_change(EngineState::Running, EngineState::Paused);
        Ok(())
    }

    /// Paused → Running.
    #[instrument(skip(self))]
    pub fn resume(&self) -> Result<(), EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let mut control = self.inner.control.lock();
        match control.state {
            EngineState::Running => return Err(EngineError::AlreadyRunning),
            EngineState::Stopped => return Err(EngineError::NotRunning),
            EngineState::Paused => {}
        }
        self.launch(&mut control, &runtime);
        drop(control);
        log_state_change(EngineState::Paused, EngineState::Running);
        Ok(())
    }

    /// Runs one tick synchronously. Only allowed while the loop is not
    /// running; used for deterministic stepping.
    pub fn step(&self) -> Result<TickReport, EngineError> {
        let mut core = self.inner.core.lock();
        if self.inner.control.lock().state == EngineState::Running {
            return Err(EngineError::AlreadyRunning);
        }
        self.inner.guarded_tick(&mut core)
    }

    fn launch(&self, control: &mut Control, runtime: &Handle) {
        control.state = EngineState::Running;
        control.generation += 1;
        let generation = control.generation;
        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;
        control.task = Some(runtime.spawn(tick_loop(weak, generation, interval)));
    }

    pub fn registry(&self) -> &SignalRegistry {
        &self.inner.registry
    }

    pub fn get(&self, name: &str) -> Result<Signal, EngineError> {
        Ok(self.inner.registry.get(name)?)
    }

    pub fn snapshot_all(&self) -> Vec<Signal> {
        self.inner.registry.snapshot_all()
    }

    /// Queues an actuator write; it becomes visible at the next tick.
    pub fn set_actuator(
        &self,
        name: &str,
        value: impl Into<SignalValue>,
    ) -> Result<SignalValue, EngineError> {
        Ok(self.inner.registry.set_actuator(name, value)?)
    }

    pub fn subscribe(&self) -> Subscription {
        self.inner.bus.subscribe()
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inner.bus.unsubscribe(subscription)
    }

    pub fn bus(&self) -> &ObserverBus {
        &self.inner.bus
    }

    /// Current value of `name` plus up to `n` recent committed samples.
    pub fn trend(&self, name: &str, n: usize) -> Result<SignalTrend, EngineError> {
        let signal = self.inner.registry.get(name)?;
        let samples = self.inner.registry.trend(name, n)?;
        let alarm = self
            .inner
            .alarms
            .read()
            .iter()
            .find(|state| state.signal == name)
            .map(|state| state.status);
        Ok(SignalTrend {
            signal,
            samples,
            alarm,
        })
    }

    /// Alarm status of every thresholded signal.
    pub fn alarms(&self) -> Vec<AlarmState> {
        self.inner.alarms.read().clone()
    }

    /// Subscribes `sink` to the bus and feeds it on a separate task.
    pub fn attach_history_sink(
        &self,
        sink: Arc<dyn HistorySink>,
    ) -> Result<JoinHandle<()>, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        Ok(spawn_history_task(&runtime, self.subscribe(), sink))
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.inner.diagnostics.lock().snapshot()
    }

    /// Hex BLAKE3 digest of every batch published so far.
    pub fn digest(&self) -> String {
        self.inner.digest.lock().hex()
    }

    pub fn tick_count(&self) -> u64 {
        self.inner.core.lock().tick
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsRecorder>> {
        self.inner.metrics.as_ref()
    }

    /// Writes `report` into `dir` and lists it in the diagnostics.
    pub fn file_bug_report(&self, dir: &Path, report: &str) -> std::io::Result<PathBuf> {
        self.inner.diagnostics.lock().record_bug_report(dir, report)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.control.get_mut().task.take() {
            task.abort();
        }
    }
}

async fn tick_loop(engine: Weak<Inner>, generation: u64, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    debug!(generation, "Tick loop started");

    loop {
        ticker.tick().await;
        let Some(inner) = engine.upgrade() else {
            break;
        };
        let mut core = inner.core.lock();
        {
            let control = inner.control.lock();
            if control.state != EngineState::Running || control.generation != generation {
                break;
            }
        }
        if inner.guarded_tick(&mut core).is_err() {
            warn!(generation, "Tick loop continues after an aborted tick");
        }
    }
    debug!(generation, "Tick loop finished");
}

impl Inner {
    /// Runs one tick, turning a panic outside the models into an error so
    /// the loop keeps its schedule.
    fn guarded_tick(&self, core: &mut CoreState) -> Result<TickReport, EngineError> {
        catch_unwind(AssertUnwindSafe(|| self.run_tick(core))).map_err(|payload| {
            let reason = panic_message(payload.as_ref());
            error!(tick = core.tick, "Tick aborted: {reason}");
            self.diagnostics
                .lock()
                .record_fault(core.tick, "engine", reason.clone());
            EngineError::TickAborted(reason)
        })
    }

    /// The tick pipeline. Caller holds the core lock.
    fn run_tick(&self, core: &mut CoreState) -> TickReport {
        let started = Instant::now();
        self.clock.advance(self.interval);
        let timestamp = self.clock.now_ns();
        core.tick += 1;
        let tick = core.tick;

        let mut changes = core.writer.apply_pending(timestamp);

        let inputs = core.writer.image();
        let mut writes = Vec::new();
        let mut faults = 0;
        for model in core.models.iter_mut() {
            match model.tick(&inputs, self.interval) {
                Ok(output) => writes.extend(output.into_writes()),
                Err(fault) => {
                    faults += 1;
                    error!(tick, model = model.name(), "Model step abandoned: {fault}");
                    self.diagnostics
                        .lock()
                        .record_fault(tick, model.name(), fault.to_string());
                    if let Some(metrics) = &self.metrics {
                        metrics.record_model_fault(model.name());
                    }
                }
            }
        }

        let model_changes = core.writer.commit(&writes, timestamp);
        for change in &model_changes {
            if change.signal == tags::PUMP && change.old.as_bool() && !change.new.as_bool() {
                EventLogger::log_event(
                    "pump_interlock",
                    vec![
                        KeyValue::new("tick", tick as i64),
                        KeyValue::new("level", tank_level(&self.registry)),
                    ],
                );
            }
        }
        changes.extend(model_changes);

        let transitions = core.evaluator.evaluate(&core.writer.image(), timestamp);
        if !transitions.is_empty() {
            *self.alarms.write() = core.evaluator.states();
            for transition in &transitions {
                EventLogger::log_event(
                    "alarm_transition",
                    vec![
                        KeyValue::new("signal", transition.signal.clone()),
                        KeyValue::new("from", transition.from.to_string()),
                        KeyValue::new("to", transition.to.to_string()),
                        KeyValue::new("value", transition.value),
                    ],
                );
            }
        }

        let mut report = TickReport {
            tick,
            timestamp,
            signal_changes: changes.len(),
            alarm_transitions: transitions.len(),
            model_faults: faults,
            sequence: None,
        };

        let events: Vec<Event> = changes
            .into_iter()
            .map(Event::SignalChanged)
            .chain(transitions.into_iter().map(Event::AlarmTransition))
            .collect();

        let mut diagnostics = self.diagnostics.lock();
        diagnostics.record_tick();
        if !events.is_empty() {
            let batch = EventBatch::new(tick, timestamp, events);
            self.digest.lock().update(&batch);
            let published = self.bus.publish(batch);
            diagnostics.record_publish(published.dropped);
            report.sequence = Some(published.sequence);
            if let Some(metrics) = &self.metrics {
                metrics.record_publish(published.dropped);
            }
        }
        drop(diagnostics);

        if let Some(metrics) = &self.metrics {
            metrics.record_tick(started.elapsed());
            metrics.record_alarm_transitions(report.alarm_transitions);
        }
        trace!(
            tick,
            changes = report.signal_changes,
            alarms = report.alarm_transitions,
            "Tick committed"
        );
        report
    }
}

fn tank_level(registry: &SignalRegistry) -> f64 {
    registry
        .value(tags::TANK_LEVEL)
        .map(SignalValue::as_f64)
        .unwrap_or_default()
}

fn log_state_change(from: EngineState, to: EngineState) {
    info!(?from, ?to, "Simulation loop state changed");
    EventLogger::log_event(
        "loop_state",
        vec![
            KeyValue::new("from", format!("{from:?}")),
            KeyValue::new("to", format!("{to:?}")),
        ],
    );
}

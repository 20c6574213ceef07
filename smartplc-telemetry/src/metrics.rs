//! ## smartplc-telemetry::metrics
//! **Prometheus counters and histograms for the simulation loop**

use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

pub use prometheus::Error as PrometheusError;

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub ticks: IntCounter,
    pub tick_duration: Histogram,
    pub model_faults: IntCounterVec,
    pub alarm_transitions: IntCounter,
    pub batches_published: IntCounter,
    pub batches_dropped: IntCounter,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, PrometheusError> {
        let registry = Registry::new();
        let ticks = IntCounter::new("smartplc_ticks_total", "Completed simulation ticks")?;
        let tick_duration = Histogram::with_opts(
            HistogramOpts::new("smartplc_tick_duration_seconds", "Time spent inside one tick")
                .buckets(vec![0.000_01, 0.000_1, 0.001, 0.01, 0.1]),
        )?;
        let model_faults = IntCounterVec::new(
            Opts::new("smartplc_model_faults_total", "Abandoned model steps"),
            &["model"],
        )?;
        let alarm_transitions =
            IntCounter::new("smartplc_alarm_transitions_total", "Alarm status changes")?;
        let batches_published =
            IntCounter::new("smartplc_batches_published_total", "Event batches published")?;
        let batches_dropped = IntCounter::new(
            "smartplc_batches_dropped_total",
            "Unread batches displaced from lagging subscribers",
        )?;

        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(tick_duration.clone()))?;
        registry.register(Box::new(model_faults.clone()))?;
        registry.register(Box::new(alarm_transitions.clone()))?;
        registry.register(Box::new(batches_published.clone()))?;
        registry.register(Box::new(batches_dropped.clone()))?;

        Ok(Self {
            registry,
            ticks,
            tick_duration,
            model_faults,
            alarm_transitions,
            batches_published,
            batches_dropped,
        })
    }

    pub fn record_tick(&self, elapsed: Duration) {
        self.ticks.inc();
        self.tick_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_model_fault(&self, model: &str) {
        self.model_faults.with_label_values(&[model]).inc();
    }

    pub fn record_alarm_transitions(&self, count: usize) {
        self.alarm_transitions.inc_by(count as u64);
    }

    pub fn record_publish(&self, dropped: usize) {
        self.batches_published.inc();
        self.batches_dropped.inc_by(dropped as u64);
    }

    pub fn gather_metrics(&self) -> Result<String, PrometheusError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| PrometheusError::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_recorded_values() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.record_tick(Duration::from_micros(40));
        metrics.record_model_fault("tank");
        metrics.record_publish(2);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("smartplc_ticks_total 1"));
        assert!(text.contains("smartplc_model_faults_total{model=\"tank\"} 1"));
        assert!(text.contains("smartplc_batches_dropped_total 2"));
    }
}

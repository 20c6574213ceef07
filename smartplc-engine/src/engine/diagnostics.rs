use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Number of model faults retained for inspection.
const RECENT_FAULTS: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultRecord {
    pub tick: u64,
    pub model: String,
    pub reason: String,
}

/// Loop health counters, copied out by `SimulationEngine::diagnostics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub ticks: u64,
    pub model_faults: u64,
    pub batches_published: u64,
    pub batches_dropped: u64,
    pub recent_faults: Vec<FaultRecord>,
    pub bug_reports: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct DiagnosticsCollector {
    ticks: u64,
    model_faults: u64,
    batches_published: u64,
    batches_dropped: u64,
    recent_faults: VecDeque<FaultRecord>,
    bug_reports: Vec<PathBuf>,
}

impl DiagnosticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self) {
        self.ticks += 1;
    }

    pub fn record_fault(&mut self, tick: u64, model: &str, reason: String) {
        self.model_faults += 1;
        if self.recent_faults.len() == RECENT_FAULTS {
            self.recent_faults.pop_front();
        }
        self.recent_faults.push_back(FaultRecord {
            tick,
            model: model.to_string(),
            reason,
        });
    }

    pub fn record_publish(&mut self, dropped: usize) {
        self.batches_published += 1;
        self.batches_dropped += dropped as u64;
    }

    /// Writes `report` to a timestamped file in `dir` and remembers its path.
    pub fn record_bug_report(&mut self, dir: &Path, report: &str) -> std::io::Result<PathBuf> {
        let path = write_bug_report(dir, report)?;
        self.bug_reports.push(path.clone());
        Ok(path)
    }

    pub fn bug_reports(&self) -> &[PathBuf] {
        &self.bug_reports
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            ticks: self.ticks,
            model_faults: self.model_faults,
            batches_published: self.batches_published,
            batches_dropped: self.batches_dropped,
            recent_faults: self.recent_faults.iter().cloned().collect(),
            bug_reports: self.bug_reports.clone(),
        }
    }
}

fn write_bug_report(dir: &Path, report: &str) -> std::io::Result<PathBuf> {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
    let path = dir.join(format!("bug_report_{stamp}.yaml"));
    fs::write(&path, report)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_recent_faults() {
        let mut diagnostics = DiagnosticsCollector::new();
        for tick in 0..40 {
            diagnostics.record_fault(tick, "tank", "non-finite".into());
        }
        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.model_faults, 40);
        assert_eq!(snapshot.recent_faults.len(), RECENT_FAULTS);
        assert_eq!(snapshot.recent_faults[0].tick, 8);
    }

    #[test]
    fn bug_report_is_written() {
        let dir = std::env::temp_dir();
        let mut diagnostics = DiagnosticsCollector::new();
        let path = diagnostics
            .record_bug_report(&dir, "expected: a\nactual: b\n")
            .unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("actual: b"));
        assert_eq!(diagnostics.bug_reports(), [path.clone()]);
        fs::remove_file(path).unwrap();
    }
}

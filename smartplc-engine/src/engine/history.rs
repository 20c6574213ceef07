//! Fire-and-forget hand-off of committed values to a persistence layer.

use std::sync::Arc;

use parking_lot::Mutex;
use smartplc_core::events::{HistorySample, Subscription};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receives (signal, value, timestamp) rows in commit order. Failures are
/// logged and never reach the simulation loop.
pub trait HistorySink: Send + Sync {
    fn append(&self, rows: &[HistorySample]) -> anyhow::Result<()>;
}

/// Keeps every row in memory. Handy for tests and short CLI runs.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    rows: Mutex<Vec<HistorySample>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<HistorySample> {
        self.rows.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

impl HistorySink for MemoryHistory {
    fn append(&self, rows: &[HistorySample]) -> anyhow::Result<()> {
        self.rows.lock().extend_from_slice(rows);
        Ok(())
    }
}

/// Drains `subscription` on the current runtime until it is closed.
pub(crate) fn spawn_history_task(
    runtime: &tokio::runtime::Handle,
    subscription: Subscription,
    sink: Arc<dyn HistorySink>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        debug!(subscriber = subscription.id(), "History sink attached");
        while let Some(batch) = subscription.recv().await {
            let rows = batch.history_samples();
            if rows.is_empty() {
                continue;
            }
            if let Err(e) = sink.append(&rows) {
                warn!(tick = batch.tick, rows = rows.len(), "History append failed: {e:#}");
            }
        }
        debug!("History sink detached");
    })
}

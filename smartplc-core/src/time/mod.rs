//! ## smartplc-core::time
//! **Timestamp sources**
//!
//! Every event carries nanoseconds since the clock's epoch. The engine reads
//! the clock once per tick so all events of a batch share one timestamp.
//! `VirtualClock` only moves when advanced, which makes seeded runs
//! reproducible.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync + Debug {
    fn now_ns(&self) -> u64;

    /// Called once per tick with the tick interval. Wall clocks ignore it.
    fn advance(&self, _elapsed: Duration) {}
}

/// Wall clock, nanoseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    offset: Arc<AtomicU64>, // Nanoseconds
}

impl VirtualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            offset: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    pub fn advance_ns(&self, ns: u64) {
        self.offset.fetch_add(ns, Ordering::Release);
    }
}

impl Clock for VirtualClock {
    fn now_ns(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }

    fn advance(&self, elapsed: Duration) {
        self.advance_ns(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_moves_only_when_advanced() {
        let clock = VirtualClock::new(1_000);
        assert_eq!(clock.now_ns(), 1_000);
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now_ns(), 500_001_000);
        let shared = clock.clone();
        shared.advance_ns(1);
        assert_eq!(clock.now_ns(), 500_001_001);
    }

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(SystemClock.now_ns() > 0);
    }
}

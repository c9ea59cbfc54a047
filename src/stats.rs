//! Health statistics for the collector loops.
//!
//! Each collector counts its ticks, failed ticks and counter regressions and
//! keeps the fastest, mean, slowest and last time a sample took.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

/// Timing of the samples one collector has taken.
///
/// Works on [`Duration`] rather than float milliseconds, so a sample can never
/// poison the mean with NaN and the total saturates instead of overflowing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SampleTiming {
    count: u32,
    total: Duration,
    fastest: Duration,
    slowest: Duration,
    last: Duration,
}

impl SampleTiming {
    pub fn record(&mut self, elapsed: Duration) {
        if self.count == 0 {
            self.fastest = elapsed;
            self.slowest = elapsed;
        } else {
            self.fastest = self.fastest.min(elapsed);
            self.slowest = self.slowest.max(elapsed);
        }
        self.count = self.count.saturating_add(1);
        self.total = self.total.saturating_add(elapsed);
        self.last = elapsed;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Zero before the first sample.
    pub fn mean(&self) -> Duration {
        self.total.checked_div(self.count).unwrap_or_default()
    }

    pub fn mean_ms(&self) -> f64 {
        self.mean().as_secs_f64() * 1000.0
    }

    pub fn fastest(&self) -> Duration {
        self.fastest
    }

    pub fn slowest(&self) -> Duration {
        self.slowest
    }

    pub fn last(&self) -> Duration {
        self.last
    }
}

/// Live counters of one collector loop.
#[derive(Debug, Default)]
pub struct CollectorStats {
    ticks: AtomicU64,
    failures: AtomicU64,
    regressions: AtomicU64,
    timing: Mutex<SampleTiming>,
}

/// Point-in-time copy of [`CollectorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CollectorStatsSnapshot {
    pub ticks: u64,
    pub failures: u64,
    pub regressions: u64,
    pub timing: SampleTiming,
}

impl CollectorStats {
    pub fn record_success(&self, elapsed: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.timing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(elapsed);
    }

    pub fn record_failure(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_regressions(&self, count: usize) {
        if count > 0 {
            self.regressions.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CollectorStatsSnapshot {
        CollectorStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            regressions: self.regressions.load(Ordering::Relaxed),
            timing: *self.timing.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

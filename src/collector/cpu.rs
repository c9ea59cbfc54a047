//! Aggregate CPU busy percent.

use chrono::{DateTime, Utc};

use super::MetricFamily;
use crate::error::SourceError;
use crate::history::HistoryBuffer;
use crate::rate::{compute_rate, CounterSet, Snapshot};
use crate::source::{CpuTimes, ProcFs};

/// Published aggregate CPU usage.
#[derive(Debug, Clone)]
pub struct CpuSummary {
    /// Busy percent over the last interval, in `[0, 100]`.
    pub percent: f64,
    pub updated_at: Option<DateTime<Utc>>,
    history: HistoryBuffer,
}

impl CpuSummary {
    pub fn new(history_len: usize) -> Self {
        Self {
            percent: 0.0,
            updated_at: None,
            history: HistoryBuffer::new(history_len),
        }
    }

    /// Busy percent samples, oldest first.
    pub fn history(&self) -> Vec<f64> {
        self.history.snapshot()
    }
}

pub struct CpuFamily {
    procfs: ProcFs,
    history_len: usize,
}

impl CpuFamily {
    pub fn new(procfs: ProcFs, history_len: usize) -> Self {
        Self {
            procfs,
            history_len,
        }
    }
}

impl MetricFamily for CpuFamily {
    type Counters = CpuTimes;
    type Update = (f64, DateTime<Utc>);
    type Summary = CpuSummary;

    const NAME: &'static str = "cpu";

    fn initial_summary(&self) -> CpuSummary {
        CpuSummary::new(self.history_len)
    }

    fn sample(&mut self) -> Result<CpuTimes, SourceError> {
        self.procfs.read_aggregate_cpu()
    }

    fn regressions(&self, prev: &CpuTimes, curr: &CpuTimes) -> usize {
        curr.regressions_since(prev)
    }

    fn derive(
        &mut self,
        prev: Option<&Snapshot<CpuTimes>>,
        curr: &Snapshot<CpuTimes>,
    ) -> Self::Update {
        let percent = prev.map_or(0.0, |p| compute_rate(p, curr).busy_percent);
        (percent, curr.captured_at)
    }

    fn apply((percent, at): Self::Update, summary: &mut CpuSummary) {
        summary.percent = percent;
        summary.updated_at = Some(at);
        summary.history.push(percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Cadence, Collector, TickOutcome};
    use std::fs;
    use std::time::Duration;

    #[test]
    fn test_cpu_family_half_busy() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let stat = dir.path().join("stat");
        fs::write(&stat, "cpu  200 0 0 800 0 0 0 0\n").unwrap();

        let mut collector = Collector::new(
            CpuFamily::new(ProcFs::new(dir.path()), 4),
            Cadence::Fixed(Duration::from_millis(1)),
        );
        let reader = collector.published();
        assert_eq!(collector.tick(), TickOutcome::Baseline);

        std::thread::sleep(Duration::from_millis(2));
        fs::write(&stat, "cpu  250 0 0 850 0 0 0 0\n").unwrap();
        assert_eq!(collector.tick(), TickOutcome::Published);

        let summary = reader.get();
        assert!((summary.percent - 50.0).abs() < 1e-9);
        assert_eq!(summary.history(), vec![summary.percent]);
        assert!(summary.updated_at.is_some());
    }

    #[test]
    fn test_cpu_family_missing_stat_is_skipped() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut collector = Collector::new(
            CpuFamily::new(ProcFs::new(dir.path()), 4),
            Cadence::Fixed(Duration::from_millis(1)),
        );
        assert_eq!(collector.tick(), TickOutcome::Skipped);
        assert_eq!(collector.published().get().history().len(), 0);
    }
}

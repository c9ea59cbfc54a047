//! Per-core CPU busy percent.
//!
//! `stat` is read once per tick and every `cpuN` line is differenced against
//! the same core's previous reading.

use chrono::{DateTime, Utc};

use super::MetricFamily;
use crate::error::SourceError;
use crate::rate::{busy_percent, CounterSet, Snapshot};
use crate::source::{CpuTimes, ProcFs};

/// Default upper bound on the per-core fan-out.
pub const DEFAULT_MAX_CORES: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreUsage {
    pub index: usize,
    pub percent: f64,
}

/// Published per-core usage, ordered by core index.
#[derive(Debug, Clone, Default)]
pub struct PerCoreSummary {
    pub cores: Vec<CoreUsage>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct CoresFamily {
    procfs: ProcFs,
    max_cores: usize,
}

impl CoresFamily {
    pub fn new(procfs: ProcFs, max_cores: usize) -> Self {
        Self {
            procfs,
            max_cores: max_cores.clamp(1, DEFAULT_MAX_CORES),
        }
    }
}

impl MetricFamily for CoresFamily {
    type Counters = Vec<CpuTimes>;
    type Update = PerCoreSummary;
    type Summary = PerCoreSummary;

    const NAME: &'static str = "cores";

    fn initial_summary(&self) -> PerCoreSummary {
        PerCoreSummary::default()
    }

    fn sample(&mut self) -> Result<Vec<CpuTimes>, SourceError> {
        self.procfs.read_per_core_cpus(self.max_cores)
    }

    fn regressions(&self, prev: &Vec<CpuTimes>, curr: &Vec<CpuTimes>) -> usize {
        curr.iter()
            .zip(prev)
            .map(|(c, p)| c.regressions_since(p))
            .sum()
    }

    fn derive(
        &mut self,
        prev: Option<&Snapshot<Vec<CpuTimes>>>,
        curr: &Snapshot<Vec<CpuTimes>>,
    ) -> PerCoreSummary {
        let elapsed_ok = prev.is_some_and(|p| curr.seconds_since(p) > 0.0);
        let cores = curr
            .counters
            .iter()
            .enumerate()
            .map(|(index, now)| {
                // a core that just came online has no baseline yet
                let percent = match prev.and_then(|p| p.counters.get(index)) {
                    Some(before) if elapsed_ok => busy_percent(before, now),
                    _ => 0.0,
                };
                CoreUsage { index, percent }
            })
            .collect();

        PerCoreSummary {
            cores,
            updated_at: Some(curr.captured_at),
        }
    }

    fn apply(update: PerCoreSummary, summary: &mut PerCoreSummary) {
        *summary = update;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Cadence, Collector};
    use std::fs;
    use std::time::Duration;

    #[test]
    fn test_cores_family_aligned_by_index() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let stat = dir.path().join("stat");
        fs::write(
            &stat,
            "cpu 0 0 0 0\ncpu0 100 0 0 100 0 0 0 0\ncpu1 100 0 0 100 0 0 0 0\n",
        )
        .unwrap();

        let mut collector = Collector::new(
            CoresFamily::new(ProcFs::new(dir.path()), 128),
            Cadence::Fixed(Duration::from_millis(1)),
        );
        collector.tick();
        std::thread::sleep(Duration::from_millis(2));
        fs::write(
            &stat,
            "cpu 0 0 0 0\ncpu0 200 0 0 100 0 0 0 0\ncpu1 100 0 0 200 0 0 0 0\ncpu2 5 0 0 5 0 0 0 0\n",
        )
        .unwrap();
        collector.tick();

        let summary = collector.published().get();
        let percents: Vec<f64> = summary.cores.iter().map(|c| c.percent).collect();
        assert_eq!(percents, vec![100.0, 0.0, 0.0]);
        assert_eq!(summary.cores[2].index, 2);
    }

    #[test]
    fn test_cores_family_bounded() {
        let family = CoresFamily::new(ProcFs::default(), 100_000);
        assert_eq!(family.max_cores, DEFAULT_MAX_CORES);
        let family = CoresFamily::new(ProcFs::default(), 0);
        assert_eq!(family.max_cores, 1);
    }
}

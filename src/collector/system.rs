//! Host identity, load averages, uptime and process count (slow cadence).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::MetricFamily;
use crate::error::SourceError;
use crate::history::HistoryBuffer;
use crate::process::scanner::list_pids;
use crate::rate::Snapshot;
use crate::source::system::format_uptime;
use crate::source::{LoadAverage, ProcFs, SystemIdentity};

/// Default location of the OS release description.
pub const DEFAULT_OS_RELEASE: &str = "/etc/os-release";

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCounters {
    pub load: LoadAverage,
    pub uptime_secs: f64,
    pub process_count: usize,
}

#[derive(Debug, Clone)]
pub struct SystemSummary {
    pub identity: SystemIdentity,
    pub load: LoadAverage,
    pub process_count: usize,
    pub uptime_secs: f64,
    /// e.g. "3d 4h 12m"
    pub uptime: String,
    pub updated_at: Option<DateTime<Utc>>,
    load_history: HistoryBuffer,
}

impl SystemSummary {
    pub fn new(identity: SystemIdentity, history_len: usize) -> Self {
        Self {
            identity,
            load: LoadAverage::default(),
            process_count: 0,
            uptime_secs: 0.0,
            uptime: format_uptime(0.0),
            updated_at: None,
            load_history: HistoryBuffer::new(history_len),
        }
    }

    /// One-minute load average samples, oldest first.
    pub fn load_history(&self) -> Vec<f64> {
        self.load_history.snapshot()
    }
}

pub struct SystemFamily {
    procfs: ProcFs,
    identity: SystemIdentity,
    history_len: usize,
}

impl SystemFamily {
    /// Reads the host identity once; it does not change while running.
    pub fn new(procfs: ProcFs, os_release: impl Into<PathBuf>, history_len: usize) -> Self {
        let identity = procfs.read_system_identity(&os_release.into());
        Self {
            procfs,
            identity,
            history_len,
        }
    }

    pub fn identity(&self) -> &SystemIdentity {
        &self.identity
    }
}

impl MetricFamily for SystemFamily {
    type Counters = SystemCounters;
    type Update = (SystemCounters, DateTime<Utc>);
    type Summary = SystemSummary;

    const NAME: &'static str = "system";

    fn initial_summary(&self) -> SystemSummary {
        SystemSummary::new(self.identity.clone(), self.history_len)
    }

    fn needs_baseline(&self) -> bool {
        false
    }

    fn sample(&mut self) -> Result<SystemCounters, SourceError> {
        let load = self.procfs.read_load_average()?;
        let uptime_secs = self.procfs.read_uptime()?;
        let process_count = match list_pids(&self.procfs) {
            Ok(pids) => pids.len(),
            Err(e) => {
                debug!("Process count unavailable: {}", e);
                0
            }
        };
        Ok(SystemCounters {
            load,
            uptime_secs,
            process_count,
        })
    }

    fn derive(
        &mut self,
        _prev: Option<&Snapshot<SystemCounters>>,
        curr: &Snapshot<SystemCounters>,
    ) -> Self::Update {
        (curr.counters, curr.captured_at)
    }

    fn apply((c, at): Self::Update, s: &mut SystemSummary) {
        s.load = c.load;
        s.process_count = c.process_count;
        s.uptime_secs = c.uptime_secs;
        s.uptime = format_uptime(c.uptime_secs);
        s.updated_at = Some(at);
        s.load_history.push(c.load.one_min);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Cadence, Collector, TickOutcome};
    use std::fs;
    use std::time::Duration;

    #[test]
    fn test_system_family() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(dir.path().join("loadavg"), "0.75 0.50 0.25 2/300 4242\n").unwrap();
        fs::write(dir.path().join("uptime"), "93784.00 1000.00\n").unwrap();
        for pid in ["1", "42", "1000"] {
            fs::create_dir_all(dir.path().join(pid)).unwrap();
        }
        fs::create_dir_all(dir.path().join("net")).unwrap();

        let family = SystemFamily::new(ProcFs::new(dir.path()), dir.path().join("os-release"), 5);
        assert_eq!(family.identity().os_name, "unknown");

        let mut collector = Collector::new(family, Cadence::Fixed(Duration::from_millis(1)));
        assert_eq!(collector.tick(), TickOutcome::Published);

        let s = collector.published().get();
        assert_eq!(s.process_count, 3);
        assert_eq!(s.load.total, 300);
        assert_eq!(s.uptime, "1d 2h 3m");
        assert_eq!(s.load_history(), vec![0.75]);
    }

    #[test]
    fn test_system_family_missing_loadavg_skips() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let family = SystemFamily::new(ProcFs::new(dir.path()), DEFAULT_OS_RELEASE, 5);
        let mut collector = Collector::new(family, Cadence::Fixed(Duration::from_millis(1)));
        assert_eq!(collector.tick(), TickOutcome::Skipped);
    }
}

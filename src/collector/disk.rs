//! Disk space of one mount point plus block device throughput.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::{bytes_to_gb, percent_of, MetricFamily};
use crate::error::SourceError;
use crate::history::HistoryBuffer;
use crate::rate::{CounterSet, DiskRates, Snapshot};
use crate::source::disk::is_whole_disk;
use crate::source::{DiskIoCounters, ProcFs, SpaceCounters};

/// One disk reading: space of the mount point and I/O of every device.
#[derive(Debug, Clone, Default)]
pub struct DiskCounters {
    pub space: SpaceCounters,
    pub io: HashMap<String, DiskIoCounters>,
}

#[derive(Debug, Clone)]
pub struct DiskSummary {
    pub mount_path: PathBuf,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub used_percent: f64,
    /// Aggregate over the selected devices.
    pub read_kbs: f64,
    pub write_kbs: f64,
    pub devices: BTreeMap<String, DiskRates>,
    pub updated_at: Option<DateTime<Utc>>,
    used_history: HistoryBuffer,
    read_history: HistoryBuffer,
    write_history: HistoryBuffer,
}

impl DiskSummary {
    pub fn new(mount_path: PathBuf, history_len: usize) -> Self {
        Self {
            mount_path,
            total_gb: 0.0,
            used_gb: 0.0,
            free_gb: 0.0,
            used_percent: 0.0,
            read_kbs: 0.0,
            write_kbs: 0.0,
            devices: BTreeMap::new(),
            updated_at: None,
            used_history: HistoryBuffer::new(history_len),
            read_history: HistoryBuffer::new(history_len),
            write_history: HistoryBuffer::new(history_len),
        }
    }

    pub fn used_history(&self) -> Vec<f64> {
        self.used_history.snapshot()
    }

    pub fn read_history(&self) -> Vec<f64> {
        self.read_history.snapshot()
    }

    pub fn write_history(&self) -> Vec<f64> {
        self.write_history.snapshot()
    }
}

pub struct DiskUpdate {
    space: SpaceCounters,
    devices: BTreeMap<String, DiskRates>,
    at: DateTime<Utc>,
}

pub struct DiskFamily {
    procfs: ProcFs,
    mount_path: PathBuf,
    devices: Option<Vec<String>>,
    history_len: usize,
}

impl DiskFamily {
    /// `devices` restricts I/O accounting to the named block devices;
    /// `None` means every whole disk.
    pub fn new(
        procfs: ProcFs,
        mount_path: impl Into<PathBuf>,
        devices: Option<Vec<String>>,
        history_len: usize,
    ) -> Self {
        Self {
            procfs,
            mount_path: mount_path.into(),
            devices,
            history_len,
        }
    }

    fn selected(&self, device: &str) -> bool {
        match &self.devices {
            Some(list) => list.iter().any(|d| d == device),
            None => is_whole_disk(device),
        }
    }
}

impl MetricFamily for DiskFamily {
    type Counters = DiskCounters;
    type Update = DiskUpdate;
    type Summary = DiskSummary;

    const NAME: &'static str = "disk";

    fn initial_summary(&self) -> DiskSummary {
        DiskSummary::new(self.mount_path.clone(), self.history_len)
    }

    fn sample(&mut self) -> Result<DiskCounters, SourceError> {
        let space = self.procfs.read_disk_space(&self.mount_path)?;
        let mut io = self.procfs.read_disk_io();
        io.retain(|name, _| self.selected(name));
        Ok(DiskCounters { space, io })
    }

    fn regressions(&self, prev: &DiskCounters, curr: &DiskCounters) -> usize {
        curr.io
            .iter()
            .filter_map(|(name, now)| prev.io.get(name).map(|before| now.regressions_since(before)))
            .sum()
    }

    fn derive(
        &mut self,
        prev: Option<&Snapshot<DiskCounters>>,
        curr: &Snapshot<DiskCounters>,
    ) -> DiskUpdate {
        let elapsed = prev.map_or(0.0, |p| curr.seconds_since(p));
        let mut devices = BTreeMap::new();
        if let Some(prev) = prev.filter(|_| elapsed > 0.0) {
            for (name, now) in &curr.counters.io {
                // a device missing from the previous reading has no baseline
                let Some(before) = prev.counters.io.get(name) else {
                    continue;
                };
                devices.insert(name.clone(), now.rates_since(before, elapsed));
            }
        }

        DiskUpdate {
            space: curr.counters.space,
            devices,
            at: curr.captured_at,
        }
    }

    fn apply(update: DiskUpdate, s: &mut DiskSummary) {
        let space = update.space;
        s.total_gb = bytes_to_gb(space.total_bytes);
        s.used_gb = bytes_to_gb(space.used_bytes());
        s.free_gb = bytes_to_gb(space.free_bytes);
        s.used_percent = percent_of(space.used_bytes() as f64, space.total_bytes as f64);
        s.read_kbs = update.devices.values().map(|r| r.read_kbs).sum();
        s.write_kbs = update.devices.values().map(|r| r.write_kbs).sum();
        s.devices = update.devices;
        s.updated_at = Some(update.at);

        s.used_history.push(s.used_percent);
        s.read_history.push(s.read_kbs);
        s.write_history.push(s.write_kbs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Cadence, Collector, TickOutcome};
    use std::fs;
    use std::time::Duration;

    fn write_diskstats(dir: &std::path::Path, sda_read: u64, sda_written: u64) {
        fs::write(
            dir.join("diskstats"),
            format!(
                "   8 0 sda 10 0 {} 0 10 0 {} 0 0 0 0\n   8 1 sda1 10 0 {} 0 10 0 {} 0 0 0 0\n   7 0 loop0 1 0 999 0 0 0 0 0 0 0 0\n",
                sda_read, sda_written, sda_read, sda_written
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_disk_family_aggregates_whole_disks() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_diskstats(dir.path(), 0, 0);

        let mut collector = Collector::new(
            DiskFamily::new(ProcFs::new(dir.path()), "/", None, 8),
            Cadence::Fixed(Duration::from_millis(1)),
        );
        assert_eq!(collector.tick(), TickOutcome::Baseline);
        std::thread::sleep(Duration::from_millis(5));
        write_diskstats(dir.path(), 2048, 4096);
        assert_eq!(collector.tick(), TickOutcome::Published);

        let s = collector.published().get();
        assert_eq!(s.devices.keys().collect::<Vec<_>>(), vec!["sda"]);
        assert!(s.read_kbs > 0.0);
        assert!((s.write_kbs / s.read_kbs - 2.0).abs() < 1e-6);
        assert!(s.total_gb > 0.0);
        assert!((0.0..=100.0).contains(&s.used_percent));
        assert_eq!(s.read_history().len(), 1);
        assert_eq!(s.used_history().len(), 1);
    }

    #[test]
    fn test_disk_family_explicit_devices() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_diskstats(dir.path(), 0, 0);
        let family = DiskFamily::new(
            ProcFs::new(dir.path()),
            "/",
            Some(vec!["sda1".to_string()]),
            8,
        );
        assert!(family.selected("sda1"));
        assert!(!family.selected("sda"));
    }

    #[test]
    fn test_disk_family_bad_mount_skips_tick() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut collector = Collector::new(
            DiskFamily::new(ProcFs::new(dir.path()), "/no/such/mount", None, 8),
            Cadence::Fixed(Duration::from_millis(1)),
        );
        assert_eq!(collector.tick(), TickOutcome::Skipped);
    }
}

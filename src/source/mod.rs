//! Stateless readers for kernel-exposed counter files.
//!
//! Every reader is a single point-in-time read of one small text file under
//! the proc root. Files are opened, read and closed within the call, so no
//! handle outlives a read regardless of the outcome.
//!
//! - `cpu`: aggregate and per-core tick counters from `stat`
//! - `memory`: `meminfo`
//! - `disk`: `diskstats` and `statvfs` space
//! - `net`: per-interface counters from `net/dev`, link state and IPv4
//! - `process`: `<pid>/stat`, `<pid>/status`, `<pid>/cmdline`, ownership
//! - `system`: uptime, load averages, identity strings

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod net;
pub mod process;
pub mod system;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SourceError;

pub use cpu::CpuTimes;
pub use disk::{DiskIoCounters, SpaceCounters, SECTOR_BYTES};
pub use memory::MemoryCounters;
pub use net::{InterfaceInfo, NetCounters, DEFAULT_SYS_ROOT};
pub use process::{ProcessStatFields, ProcessStatus};
pub use system::{LoadAverage, SystemIdentity};

/// Default location of the proc filesystem.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Handle on a proc filesystem root.
///
/// Tests point this at a temporary directory populated with fixture files.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a file relative to the proc root.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Directory of a single process.
    pub fn pid_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    /// Reads a whole file relative to the proc root.
    pub(crate) fn read(&self, relative: impl AsRef<Path>) -> Result<String, SourceError> {
        let path = self.path(relative);
        fs::read_to_string(&path).map_err(|e| SourceError::unavailable(path, e))
    }
}

/// Parses a counter field, treating anything non-numeric as zero.
pub(crate) fn parse_counter(field: Option<&str>) -> u64 {
    field.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0)
}

/// Parses the leading number of a `Key:   1234 kB` value.
pub(crate) fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kb_value() {
        assert_eq!(parse_kb_value("       1234 kB"), Some(1234));
        assert_eq!(parse_kb_value("0 kB"), Some(0));
        assert_eq!(parse_kb_value("  42  "), Some(42));
        assert_eq!(parse_kb_value(""), None);
        assert_eq!(parse_kb_value("kB"), None);
        assert_eq!(parse_kb_value("-1 kB"), None);
        assert_eq!(parse_kb_value("1.5 kB"), None);
    }

    #[test]
    fn test_parse_counter_zero_fills() {
        assert_eq!(parse_counter(Some("17")), 17);
        assert_eq!(parse_counter(Some("garbage")), 0);
        assert_eq!(parse_counter(None), 0);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let fs = ProcFs::new(dir.path());
        let err = fs.read("stat").unwrap_err();
        assert!(err.is_not_found());
    }
}

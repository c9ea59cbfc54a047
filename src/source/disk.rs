//! Disk space (statvfs) and block-device I/O counters (`<proc>/diskstats`).

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use super::{parse_counter, ProcFs};
use crate::error::SourceError;

/// Size of the sector unit used by diskstats, independent of the device.
pub const SECTOR_BYTES: u64 = 512;

/// Space counters for one mounted filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpaceCounters {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
}

impl SpaceCounters {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

/// Cumulative I/O counters for one block device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskIoCounters {
    pub reads_completed: u64,
    pub sectors_read: u64,
    pub writes_completed: u64,
    pub sectors_written: u64,
}

/// Reads space usage of the filesystem mounted at `mount_path` via statvfs.
pub fn read_disk_space(mount_path: &Path) -> Result<SpaceCounters, SourceError> {
    use std::ffi::CString;
    use std::mem;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(mount_path.as_os_str().as_bytes()).map_err(|e| {
        SourceError::incomplete(mount_path, format!("invalid mount path: {}", e))
    })?;

    // SAFETY: statvfs is a plain C struct valid when zeroed, and c_path is a
    // NUL-terminated string that outlives the call.
    let stat = unsafe {
        let mut stat: libc::statvfs = mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(SourceError::unavailable(
                mount_path,
                std::io::Error::last_os_error(),
            ));
        }
        stat
    };

    let block_size = stat.f_frsize as u64;
    Ok(SpaceCounters {
        total_bytes: block_size.saturating_mul(stat.f_blocks as u64),
        free_bytes: block_size.saturating_mul(stat.f_bfree as u64),
        available_bytes: block_size.saturating_mul(stat.f_bavail as u64),
    })
}

/// True for whole block devices worth aggregating: loop and ram devices and
/// partitions of sd/vd/xvd/hd/nvme/mmcblk disks are excluded.
pub fn is_whole_disk(device: &str) -> bool {
    if device.starts_with("loop") || device.starts_with("ram") {
        return false;
    }

    // nvme0n1p2, mmcblk0p1
    if device.starts_with("nvme") || device.starts_with("mmcblk") {
        if let Some(pos) = device.rfind('p') {
            let (head, tail) = device.split_at(pos);
            let digits = &tail[1..];
            if !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_digit())
                && head.ends_with(|c: char| c.is_ascii_digit())
            {
                return false;
            }
        }
        return true;
    }

    // sda1, vdb2, xvda1, hda3
    let prefixed = ["sd", "vd", "xvd", "hd"]
        .iter()
        .any(|p| device.starts_with(p));
    if prefixed && device.ends_with(|c: char| c.is_ascii_digit()) {
        return false;
    }

    true
}

/// Parses diskstats content into per-device counters.
///
/// Lines with fewer than three fields carry no device name and are skipped;
/// missing counters are zero-filled.
pub fn parse_diskstats(content: &str) -> HashMap<String, DiskIoCounters> {
    let mut stats = HashMap::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }

        let counters = DiskIoCounters {
            reads_completed: parse_counter(parts.get(3).copied()),
            sectors_read: parse_counter(parts.get(5).copied()),
            writes_completed: parse_counter(parts.get(7).copied()),
            sectors_written: parse_counter(parts.get(9).copied()),
        };
        stats.insert(parts[2].to_string(), counters);
    }

    stats
}

impl ProcFs {
    /// Space usage of a mount point. The mount path is absolute, not relative
    /// to the proc root.
    pub fn read_disk_space(&self, mount_path: &Path) -> Result<SpaceCounters, SourceError> {
        read_disk_space(mount_path)
    }

    /// Per-device I/O counters. An unreadable diskstats yields an empty map.
    pub fn read_disk_io(&self) -> HashMap<String, DiskIoCounters> {
        match self.read("diskstats") {
            Ok(content) => parse_diskstats(&content),
            Err(e) => {
                debug!("Failed to read diskstats: {}", e);
                HashMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISKSTATS: &str = "   8       0 sda 1000 10 20000 500 2000 20 40000 900 0 1200 1400\n\
   8       1 sda1 900 10 18000 450 1900 20 38000 850 0 1100 1300\n\
   7       0 loop0 5 0 10 0 0 0 0 0 0 0 0\n\
 259       0 nvme0n1 300 0 6000 100 400 0 8000 200 0 300 300\n\
 259       1 nvme0n1p1 300 0 6000 100 400 0 8000 200 0 300 300\n\
 short\n";

    #[test]
    fn test_parse_diskstats() {
        let stats = parse_diskstats(DISKSTATS);
        assert_eq!(stats.len(), 5);
        let sda = &stats["sda"];
        assert_eq!(sda.reads_completed, 1000);
        assert_eq!(sda.sectors_read, 20000);
        assert_eq!(sda.writes_completed, 2000);
        assert_eq!(sda.sectors_written, 40000);
    }

    #[test]
    fn test_parse_diskstats_short_line_zero_filled() {
        let stats = parse_diskstats("8 0 sdb 12\n");
        let sdb = &stats["sdb"];
        assert_eq!(sdb.reads_completed, 12);
        assert_eq!(sdb.sectors_read, 0);
        assert_eq!(sdb.sectors_written, 0);
    }

    #[test]
    fn test_is_whole_disk() {
        assert!(is_whole_disk("sda"));
        assert!(!is_whole_disk("sda1"));
        assert!(is_whole_disk("nvme0n1"));
        assert!(!is_whole_disk("nvme0n1p1"));
        assert!(is_whole_disk("mmcblk0"));
        assert!(!is_whole_disk("mmcblk0p2"));
        assert!(!is_whole_disk("loop0"));
        assert!(!is_whole_disk("ram1"));
        assert!(is_whole_disk("dm-0"));
        assert!(!is_whole_disk("xvda1"));
    }

    #[test]
    fn test_read_disk_space_root() {
        let space = read_disk_space(Path::new("/")).expect("statvfs on / failed");
        assert!(space.total_bytes > 0);
        assert!(space.used_bytes() <= space.total_bytes);
    }

    #[test]
    fn test_read_disk_space_missing_mount() {
        let err = read_disk_space(Path::new("/definitely/not/a/mount/point")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_disk_io_missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let procfs = ProcFs::new(dir.path());
        assert!(procfs.read_disk_io().is_empty());
    }
}

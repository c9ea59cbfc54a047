//! Process discovery and per-process record assembly.

use std::fs;

use tracing::debug;

use super::cpu::lifetime_cpu_percent;
use super::table::Process;
use super::users::UserResolver;
use crate::error::{ScanError, SourceError};
use crate::source::ProcFs;

/// Lists every numeric entry under the proc root, ascending.
pub fn list_pids(procfs: &ProcFs) -> Result<Vec<u32>, ScanError> {
    let entries = fs::read_dir(procfs.root()).map_err(|e| ScanError::EnumerationFailure {
        root: procfs.root().to_path_buf(),
        source: e,
    })?;

    let mut pids: Vec<u32> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            name.parse().ok()
        })
        .collect();
    pids.sort_unstable();
    Ok(pids)
}

/// Reads one process.
///
/// The status file is the primary read: without it (or without a name) the
/// process is skipped. Everything else is best effort and zero-filled, since
/// the process may exit between any two reads.
pub fn scan_process(
    procfs: &ProcFs,
    pid: u32,
    uptime_secs: f64,
    clk_tck: f64,
    users: &UserResolver,
) -> Result<Process, SourceError> {
    let status = procfs.read_process_status(pid)?;

    let stat = match procfs.read_process_stat(pid) {
        Ok(stat) => Some(stat),
        Err(e) => {
            debug!("Process {}: stat unreadable, zero-filling: {}", pid, e);
            None
        }
    };

    let cpu_percent = stat.as_ref().map_or(0.0, |s| {
        lifetime_cpu_percent(s.utime, s.stime, s.start_time_ticks, uptime_secs, clk_tck)
    });
    let ppid = stat
        .as_ref()
        .map(|s| s.ppid)
        .or(status.ppid)
        .unwrap_or(0);
    let threads = if status.thread_count > 0 {
        status.thread_count
    } else {
        stat.as_ref()
            .map_or(0, |s| u32::try_from(s.num_threads).unwrap_or(u32::MAX))
    };

    let user = match procfs.read_process_owner_uid(pid).ok().or(status.uid) {
        Some(uid) => users.resolve(uid),
        None => "?".to_string(),
    };

    Ok(Process {
        pid,
        name: status.name,
        user,
        command: procfs.read_process_cmdline(pid),
        memory_kb: status.memory_kb,
        cpu_percent,
        threads,
        ppid,
        parent: None,
        children: Vec::new(),
    })
}

//! Per-process readers: `<pid>/stat`, `<pid>/status`, `<pid>/cmdline` and
//! directory ownership.

use std::fs;
use std::os::unix::fs::MetadataExt;

use super::{parse_counter, parse_kb_value, ProcFs};
use crate::error::SourceError;

/// Fields of `/proc/<pid>/stat` needed for CPU share and hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStatFields {
    pub comm: String,
    pub ppid: u32,
    pub utime: u64,
    pub stime: u64,
    pub num_threads: u64,
    pub start_time_ticks: u64,
}

/// Fields of `/proc/<pid>/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStatus {
    pub name: String,
    /// Resident set size (VmRSS). Zero for kernel threads.
    pub memory_kb: u64,
    pub thread_count: u32,
    pub ppid: Option<u32>,
    pub uid: Option<u32>,
}

/// Parses stat content.
///
/// The comm field may itself contain spaces and parentheses, so fields are
/// counted from the last `)`. Missing trailing fields are zero-filled.
pub fn parse_process_stat(content: &str) -> Option<ProcessStatFields> {
    let open = content.find('(')?;
    let close = content.rfind(')')?;
    if close < open {
        return None;
    }

    let comm = content[open + 1..close].to_string();
    // state(0) ppid(1) ... utime(11) stime(12) ... num_threads(17) itrealvalue(18) starttime(19)
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    let field = |i: usize| parse_counter(fields.get(i).copied());

    Some(ProcessStatFields {
        comm,
        ppid: u32::try_from(field(1)).unwrap_or(0),
        utime: field(11),
        stime: field(12),
        num_threads: field(17),
        start_time_ticks: field(19),
    })
}

/// Parses status content. `None` when there is no `Name:` line.
pub fn parse_process_status(content: &str) -> Option<ProcessStatus> {
    let mut name: Option<String> = None;
    let mut status = ProcessStatus::default();

    for line in content.lines() {
        if let Some(v) = line.strip_prefix("Name:") {
            let v = v.trim();
            if !v.is_empty() {
                name = Some(v.to_string());
            }
        } else if let Some(v) = line.strip_prefix("VmRSS:") {
            status.memory_kb = parse_kb_value(v).unwrap_or(0);
        } else if let Some(v) = line.strip_prefix("Threads:") {
            status.thread_count = v.trim().parse().unwrap_or(0);
        } else if let Some(v) = line.strip_prefix("PPid:") {
            status.ppid = v.trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("Uid:") {
            // real, effective, saved, filesystem
            status.uid = v.split_whitespace().next().and_then(|u| u.parse().ok());
        }
    }

    status.name = name?;
    Some(status)
}

/// Turns a NUL-separated argv into a space-separated command line.
pub fn parse_cmdline(raw: &[u8]) -> String {
    raw.split(|&b| b == 0u8)
        .filter(|arg| !arg.is_empty())
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

impl ProcFs {
    pub fn read_process_stat(&self, pid: u32) -> Result<ProcessStatFields, SourceError> {
        let relative = format!("{}/stat", pid);
        let content = self.read(&relative)?;
        parse_process_stat(&content)
            .ok_or_else(|| SourceError::incomplete(self.path(&relative), "malformed stat line"))
    }

    pub fn read_process_status(&self, pid: u32) -> Result<ProcessStatus, SourceError> {
        let relative = format!("{}/status", pid);
        let content = self.read(&relative)?;
        parse_process_status(&content)
            .ok_or_else(|| SourceError::incomplete(self.path(&relative), "no Name field"))
    }

    /// Command line of a process; empty for kernel threads or when unreadable.
    pub fn read_process_cmdline(&self, pid: u32) -> String {
        let path = self.pid_dir(pid).join("cmdline");
        match fs::read(path) {
            Ok(raw) => parse_cmdline(&raw),
            Err(_) => String::new(),
        }
    }

    /// Uid owning the process directory.
    pub fn read_process_owner_uid(&self, pid: u32) -> Result<u32, SourceError> {
        let dir = self.pid_dir(pid);
        fs::metadata(&dir)
            .map(|m| m.uid())
            .map_err(|e| SourceError::unavailable(dir, e))
    }

    /// User name owning the process, or the numeric uid when it has no
    /// passwd entry, or `"?"` when the process is gone.
    pub fn read_process_owner(&self, pid: u32) -> String {
        match self.read_process_owner_uid(pid) {
            Ok(uid) => crate::process::users::lookup_user_name(uid),
            Err(_) => "?".to_string(),
        }
    }
}

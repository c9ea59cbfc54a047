//! CPU tick counters from `<proc>/stat`.

use super::{parse_counter, ProcFs};
use crate::error::SourceError;

/// Cumulative CPU ticks for one `cpu*` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Calculate total CPU time (all accounted states).
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.nice)
            .saturating_add(self.system)
            .saturating_add(self.idle)
            .saturating_add(self.iowait)
            .saturating_add(self.irq)
            .saturating_add(self.softirq)
            .saturating_add(self.steal)
    }

    /// Non-busy time: true idle plus time waiting on I/O.
    pub fn idle_total(&self) -> u64 {
        self.idle.saturating_add(self.iowait)
    }
}

/// Splits a `cpu*` line into its label and tick counters.
///
/// Short lines and non-numeric fields are zero-filled.
pub fn parse_cpu_line(line: &str) -> Option<(&str, CpuTimes)> {
    let mut parts = line.split_whitespace();
    let label = parts.next()?;
    if !label.starts_with("cpu") {
        return None;
    }

    let times = CpuTimes {
        user: parse_counter(parts.next()),
        nice: parse_counter(parts.next()),
        system: parse_counter(parts.next()),
        idle: parse_counter(parts.next()),
        iowait: parse_counter(parts.next()),
        irq: parse_counter(parts.next()),
        softirq: parse_counter(parts.next()),
        steal: parse_counter(parts.next()),
    };
    Some((label, times))
}

/// Core index of a `cpuN` label; `None` for the aggregate `cpu` line.
fn core_index(label: &str) -> Option<usize> {
    label.strip_prefix("cpu")?.parse().ok()
}

/// Extracts per-core counters ordered by core index, at most `max` entries.
pub fn parse_per_core(content: &str, max: usize) -> Vec<CpuTimes> {
    let mut cores: Vec<(usize, CpuTimes)> = content
        .lines()
        .filter_map(parse_cpu_line)
        .filter_map(|(label, times)| core_index(label).map(|idx| (idx, times)))
        .collect();
    cores.sort_by_key(|(idx, _)| *idx);
    cores.into_iter().take(max).map(|(_, t)| t).collect()
}

impl ProcFs {
    /// Reads the aggregate `cpu` line.
    pub fn read_aggregate_cpu(&self) -> Result<CpuTimes, SourceError> {
        let content = self.read("stat")?;
        content
            .lines()
            .filter_map(parse_cpu_line)
            .find(|(label, _)| *label == "cpu")
            .map(|(_, times)| times)
            .ok_or_else(|| SourceError::incomplete(self.path("stat"), "no aggregate cpu line"))
    }

    /// Reads the `cpuN` line for a single core.
    pub fn read_per_core_cpu(&self, core: usize) -> Result<CpuTimes, SourceError> {
        let content = self.read("stat")?;
        content
            .lines()
            .filter_map(parse_cpu_line)
            .find(|(label, _)| core_index(label) == Some(core))
            .map(|(_, times)| times)
            .ok_or_else(|| {
                SourceError::incomplete(self.path("stat"), format!("no line for cpu{}", core))
            })
    }

    /// Reads all per-core lines in one pass, ordered by core index.
    pub fn read_per_core_cpus(&self, max: usize) -> Result<Vec<CpuTimes>, SourceError> {
        let content = self.read("stat")?;
        let cores = parse_per_core(&content, max);
        if cores.is_empty() {
            return Err(SourceError::incomplete(self.path("stat"), "no per-core cpu lines"));
        }
        Ok(cores)
    }

    /// Number of logical cores listed in `stat`, falling back to the
    /// scheduler's view when the file cannot be read.
    pub fn logical_core_count(&self) -> usize {
        match self.read("stat") {
            Ok(content) => content
                .lines()
                .filter_map(parse_cpu_line)
                .filter(|(label, _)| core_index(label).is_some())
                .count(),
            Err(_) => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

//! Memory counters from `<proc>/meminfo`.

use super::{parse_kb_value, ProcFs};
use crate::error::SourceError;

/// Memory counters in kB, as the kernel reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    pub total_kb: u64,
    pub free_kb: u64,
    pub available_kb: u64,
    pub buffers_kb: u64,
    pub cached_kb: u64,
    pub active_kb: u64,
    pub inactive_kb: u64,
    pub swap_total_kb: u64,
    pub swap_free_kb: u64,
}

impl MemoryCounters {
    /// Memory in use by applications: total minus free, buffers and page cache.
    pub fn used_kb(&self) -> u64 {
        self.total_kb.saturating_sub(
            self.free_kb
                .saturating_add(self.buffers_kb)
                .saturating_add(self.cached_kb),
        )
    }

    pub fn swap_used_kb(&self) -> u64 {
        self.swap_total_kb.saturating_sub(self.swap_free_kb)
    }
}

/// Parses meminfo content. Unknown keys are ignored and missing keys stay zero.
pub fn parse_meminfo(content: &str) -> MemoryCounters {
    let mut m = MemoryCounters::default();

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "MemTotal" => &mut m.total_kb,
            "MemFree" => &mut m.free_kb,
            "MemAvailable" => &mut m.available_kb,
            "Buffers" => &mut m.buffers_kb,
            "Cached" => &mut m.cached_kb,
            "Active" => &mut m.active_kb,
            "Inactive" => &mut m.inactive_kb,
            "SwapTotal" => &mut m.swap_total_kb,
            "SwapFree" => &mut m.swap_free_kb,
            _ => continue,
        };
        *slot = parse_kb_value(value).unwrap_or(0);
    }

    m
}

impl ProcFs {
    /// Reads `meminfo`. Fails only when the total is missing, since nothing
    /// derived from the other fields is meaningful without it.
    pub fn read_memory(&self) -> Result<MemoryCounters, SourceError> {
        let content = self.read("meminfo")?;
        let counters = parse_meminfo(&content);
        if counters.total_kb == 0 {
            return Err(SourceError::incomplete(
                self.path("meminfo"),
                "MemTotal missing or zero",
            ));
        }
        Ok(counters)
    }
}

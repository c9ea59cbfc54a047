//! Memory usage in GB, published on every reading.

use chrono::{DateTime, Utc};

use super::{kb_to_gb, percent_of, MetricFamily};
use crate::error::SourceError;
use crate::history::HistoryBuffer;
use crate::rate::Snapshot;
use crate::source::{MemoryCounters, ProcFs};

#[derive(Debug, Clone)]
pub struct MemorySummary {
    pub total_gb: f64,
    /// Total minus free, buffers and page cache.
    pub used_gb: f64,
    pub free_gb: f64,
    pub available_gb: f64,
    pub buffers_gb: f64,
    pub cached_gb: f64,
    pub active_gb: f64,
    pub inactive_gb: f64,
    pub swap_total_gb: f64,
    pub swap_used_gb: f64,
    pub used_percent: f64,
    pub updated_at: Option<DateTime<Utc>>,
    history: HistoryBuffer,
}

impl MemorySummary {
    pub fn new(history_len: usize) -> Self {
        Self {
            total_gb: 0.0,
            used_gb: 0.0,
            free_gb: 0.0,
            available_gb: 0.0,
            buffers_gb: 0.0,
            cached_gb: 0.0,
            active_gb: 0.0,
            inactive_gb: 0.0,
            swap_total_gb: 0.0,
            swap_used_gb: 0.0,
            used_percent: 0.0,
            updated_at: None,
            history: HistoryBuffer::new(history_len),
        }
    }

    /// Used percent samples, oldest first.
    pub fn history(&self) -> Vec<f64> {
        self.history.snapshot()
    }
}

pub struct MemoryFamily {
    procfs: ProcFs,
    history_len: usize,
}

impl MemoryFamily {
    pub fn new(procfs: ProcFs, history_len: usize) -> Self {
        Self {
            procfs,
            history_len,
        }
    }
}

impl MetricFamily for MemoryFamily {
    type Counters = MemoryCounters;
    type Update = (MemoryCounters, DateTime<Utc>);
    type Summary = MemorySummary;

    const NAME: &'static str = "memory";

    fn initial_summary(&self) -> MemorySummary {
        MemorySummary::new(self.history_len)
    }

    fn needs_baseline(&self) -> bool {
        false
    }

    fn sample(&mut self) -> Result<MemoryCounters, SourceError> {
        self.procfs.read_memory()
    }

    fn derive(
        &mut self,
        _prev: Option<&Snapshot<MemoryCounters>>,
        curr: &Snapshot<MemoryCounters>,
    ) -> Self::Update {
        (curr.counters, curr.captured_at)
    }

    fn apply((m, at): Self::Update, s: &mut MemorySummary) {
        s.total_gb = kb_to_gb(m.total_kb);
        s.used_gb = kb_to_gb(m.used_kb());
        s.free_gb = kb_to_gb(m.free_kb);
        s.available_gb = kb_to_gb(m.available_kb);
        s.buffers_gb = kb_to_gb(m.buffers_kb);
        s.cached_gb = kb_to_gb(m.cached_kb);
        s.active_gb = kb_to_gb(m.active_kb);
        s.inactive_gb = kb_to_gb(m.inactive_kb);
        s.swap_total_gb = kb_to_gb(m.swap_total_kb);
        s.swap_used_gb = kb_to_gb(m.swap_used_kb());
        s.used_percent = percent_of(m.used_kb() as f64, m.total_kb as f64);
        s.updated_at = Some(at);
        s.history.push(s.used_percent);
    }
}

//! Generic periodic sampling engine.
//!
//! A [`Collector`] drives one [`MetricFamily`]: every tick it reads the
//! family's counters, differences them against the previous snapshot, and
//! swaps the result into the family's [`Published`] slot. Reading and
//! deriving happen outside the lock; only [`MetricFamily::apply`] runs under
//! it.
//!
//! Families:
//! - `cpu`: aggregate busy percent
//! - `cores`: per-core busy percent
//! - `memory`: meminfo in GB
//! - `disk`: mount space plus block device throughput
//! - `network`: per-interface throughput
//! - `system`: identity, load averages, uptime, process count

pub mod cores;
pub mod cpu;
pub mod disk;
pub mod memory;
pub mod network;
pub mod shutdown;
pub mod system;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::published::{Published, RefreshInterval};
use crate::rate::Snapshot;
use crate::stats::CollectorStats;

pub use cores::{CoreUsage, CoresFamily, PerCoreSummary};
pub use cpu::{CpuFamily, CpuSummary};
pub use disk::{DiskFamily, DiskSummary};
pub use memory::{MemoryFamily, MemorySummary};
pub use network::{NetworkFamily, NetworkSummary};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
pub use system::{SystemFamily, SystemSummary};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const KB_PER_GB: f64 = 1024.0 * 1024.0;

pub(crate) fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

pub(crate) fn kb_to_gb(kb: u64) -> f64 {
    kb as f64 / KB_PER_GB
}

/// `part / whole` as a percentage, `0.0` when `whole` is zero.
pub(crate) fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        (100.0 * part / whole).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// One metric family: how to read it, how to derive rates, how to publish.
pub trait MetricFamily: Send + 'static {
    /// Raw counters read on every tick.
    type Counters: Send + 'static;
    /// Values derived from a pair of snapshots, computed outside the lock.
    type Update;
    /// Published value, including its history.
    type Summary: Clone + Send + Sync + 'static;

    const NAME: &'static str;

    fn initial_summary(&self) -> Self::Summary;

    /// Whether the first reading only seeds the baseline. Families that
    /// publish absolute values return `false` and publish immediately.
    fn needs_baseline(&self) -> bool {
        true
    }

    /// Reads the counters. Plain blocking file reads.
    fn sample(&mut self) -> Result<Self::Counters, SourceError>;

    /// Number of counters that went backwards between two readings.
    fn regressions(&self, _prev: &Self::Counters, _curr: &Self::Counters) -> usize {
        0
    }

    /// Derives the next published values. `prev` is `None` only when
    /// [`needs_baseline`](Self::needs_baseline) is `false`.
    fn derive(
        &mut self,
        prev: Option<&Snapshot<Self::Counters>>,
        curr: &Snapshot<Self::Counters>,
    ) -> Self::Update;

    /// Writes an update into the published summary. Runs under the lock.
    fn apply(update: Self::Update, summary: &mut Self::Summary);
}

/// How often a collector ticks.
#[derive(Debug, Clone)]
pub enum Cadence {
    /// Follows the consumer-adjustable refresh interval.
    Shared(RefreshInterval),
    Fixed(Duration),
}

impl Cadence {
    pub fn duration(&self) -> Duration {
        match self {
            Cadence::Shared(interval) => interval.duration(),
            Cadence::Fixed(d) => *d,
        }
    }
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// First reading stored; nothing published yet.
    Baseline,
    Published,
    /// The read failed; the previous value stays visible.
    Skipped,
}

/// Periodic sampler for one metric family.
pub struct Collector<F: MetricFamily> {
    family: F,
    state: Published<F::Summary>,
    cadence: Cadence,
    stats: Arc<CollectorStats>,
    previous: Option<Snapshot<F::Counters>>,
}

impl<F: MetricFamily> Collector<F> {
    pub fn new(family: F, cadence: Cadence) -> Self {
        let state = Published::new(family.initial_summary());
        Self {
            family,
            state,
            cadence,
            stats: Arc::new(CollectorStats::default()),
            previous: None,
        }
    }

    pub fn name(&self) -> &'static str {
        F::NAME
    }

    /// Reader handle on the published summary.
    pub fn published(&self) -> Published<F::Summary> {
        self.state.clone()
    }

    pub fn stats(&self) -> Arc<CollectorStats> {
        Arc::clone(&self.stats)
    }

    /// Performs one read/derive/publish step.
    pub fn tick(&mut self) -> TickOutcome {
        let started = Instant::now();

        let counters = match self.family.sample() {
            Ok(counters) => counters,
            Err(e) => {
                warn!("{} collector: skipping tick: {}", F::NAME, e);
                self.stats.record_failure();
                return TickOutcome::Skipped;
            }
        };
        let curr = Snapshot::capture(counters);

        let update = if let Some(prev) = self.previous.as_ref() {
            let regressions = self.family.regressions(&prev.counters, &curr.counters);
            if regressions > 0 {
                debug!(
                    "{} collector: {} counter(s) regressed, reporting 0 for them",
                    F::NAME,
                    regressions
                );
            }
            self.stats.record_regressions(regressions);
            self.family.derive(Some(prev), &curr)
        } else if self.family.needs_baseline() {
            debug!("{} collector: baseline captured", F::NAME);
            self.previous = Some(curr);
            self.stats
                .record_success(started.elapsed());
            return TickOutcome::Baseline;
        } else {
            self.family.derive(None, &curr)
        };

        self.state.update(|summary| F::apply(update, summary));
        self.previous = Some(curr);
        self.stats
            .record_success(started.elapsed());
        TickOutcome::Published
    }

    /// Runs the sampling loop until shutdown.
    ///
    /// The first tick only seeds the baseline; differencing starts one
    /// interval later. Failed ticks are logged and retried next interval.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        info!(
            "{} collector started (interval {:?})",
            F::NAME,
            self.cadence.duration()
        );

        while !shutdown.is_triggered() {
            self.tick();
            if shutdown.sleep(self.cadence.duration()).await {
                break;
            }
        }

        info!("{} collector stopped", F::NAME);
    }
}

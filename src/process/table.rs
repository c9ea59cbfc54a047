//! Process table: snapshot building, hierarchy, sort, filter and pins.
//!
//! Every rebuild produces a fresh [`ProcessSnapshot`]; nothing carries over
//! from the previous one except the set of pinned PIDs. Processes live in a
//! flat arena ordered by PID and the hierarchy is stored as index lists, so
//! sorting and filtering return index views and never reorder the arena.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use super::cpu::CLK_TCK;
use super::kill;
use super::scanner::{list_pids, scan_process};
use super::users::UserResolver;
use crate::collector::ShutdownSignal;
use crate::error::{KillError, ScanError};
use crate::published::Published;
use crate::source::ProcFs;
use crate::stats::CollectorStats;

/// One process as seen by a single scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    pub pid: u32,
    pub name: String,
    pub user: String,
    /// Space-separated argv; empty for kernel threads.
    pub command: String,
    /// Resident set size.
    pub memory_kb: u64,
    /// Lifetime average CPU share.
    pub cpu_percent: f64,
    pub threads: u32,
    pub ppid: u32,
    /// Arena index of the parent, if it is part of the same snapshot.
    pub parent: Option<usize>,
    /// Arena indices of the children.
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Arena (PID) order.
    #[default]
    None,
    /// Byte order: uppercase sorts before lowercase.
    Name,
    Pid,
    Memory,
    Cpu,
    Threads,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    pub fn ascending(key: SortKey) -> Self {
        Self::new(key, SortOrder::Ascending)
    }

    pub fn descending(key: SortKey) -> Self {
        Self::new(key, SortOrder::Descending)
    }

    fn compare(&self, a: &Process, b: &Process) -> Ordering {
        let ord = match self.key {
            SortKey::None => Ordering::Equal,
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Pid => a.pid.cmp(&b.pid),
            SortKey::Memory => a.memory_kb.cmp(&b.memory_kb),
            SortKey::Cpu => a.cpu_percent.total_cmp(&b.cpu_percent),
            SortKey::Threads => a.threads.cmp(&b.threads),
        };
        match self.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }
}

/// Immutable result of one full scan.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    processes: Vec<Process>,
    by_pid: HashMap<u32, usize>,
    roots: Vec<usize>,
    pub built_at: DateTime<Utc>,
    pub scan_duration: Duration,
    /// Entities dropped because their primary read failed.
    pub skipped: usize,
}

impl Default for ProcessSnapshot {
    fn default() -> Self {
        Self::build(Vec::new(), 0, Duration::ZERO)
    }
}

impl ProcessSnapshot {
    /// Builds the PID index and the parent/child hierarchy.
    ///
    /// A parent that is not part of `processes` (including PID 0) makes the
    /// child a root. Resolution does not depend on arena order.
    pub fn build(mut processes: Vec<Process>, skipped: usize, scan_duration: Duration) -> Self {
        let by_pid: HashMap<u32, usize> = processes
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.pid, idx))
            .collect();

        for p in processes.iter_mut() {
            p.parent = None;
            p.children.clear();
        }

        let mut roots = Vec::new();
        for idx in 0..processes.len() {
            let (pid, ppid) = (processes[idx].pid, processes[idx].ppid);
            match by_pid.get(&ppid).copied().filter(|_| ppid != pid) {
                Some(parent) => {
                    processes[idx].parent = Some(parent);
                    processes[parent].children.push(idx);
                }
                None => roots.push(idx),
            }
        }

        Self {
            processes,
            by_pid,
            roots,
            built_at: Utc::now(),
            scan_duration,
            skipped,
        }
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// The arena, ordered by PID.
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn get(&self, idx: usize) -> Option<&Process> {
        self.processes.get(idx)
    }

    pub fn index_of(&self, pid: u32) -> Option<usize> {
        self.by_pid.get(&pid).copied()
    }

    pub fn by_pid(&self, pid: u32) -> Option<&Process> {
        self.index_of(pid).and_then(|idx| self.get(idx))
    }

    /// Processes without a parent in this snapshot.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        self.processes
            .get(idx)
            .map(|p| p.children.as_slice())
            .unwrap_or(&[])
    }

    /// Distance from a root. Walks at most `len()` parents, so malformed
    /// parent chains cannot loop forever.
    pub fn depth(&self, idx: usize) -> usize {
        let mut depth = 0;
        let mut current = self.get(idx).and_then(|p| p.parent);
        while let Some(parent) = current {
            depth += 1;
            if depth >= self.processes.len() {
                break;
            }
            current = self.processes[parent].parent;
        }
        depth
    }

    /// Arena indices in sorted order. The sort is stable.
    pub fn sorted(&self, spec: SortSpec) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.processes.len()).collect();
        self.sort_indices(&mut order, spec);
        order
    }

    fn sort_indices(&self, indices: &mut [usize], spec: SortSpec) {
        if spec.key == SortKey::None {
            return;
        }
        indices.sort_by(|&a, &b| spec.compare(&self.processes[a], &self.processes[b]));
    }

    /// Arena indices whose name, PID or command contains `query`
    /// (case-sensitive). An empty query matches everything.
    pub fn filter(&self, query: &str) -> Vec<usize> {
        self.processes
            .iter()
            .enumerate()
            .filter(|(_, p)| matches_query(p, query))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Filtered and sorted view with pinned processes first.
    ///
    /// Matching pinned processes keep their arena order and precede the
    /// sorted remainder.
    pub fn view(&self, spec: SortSpec, query: &str, pinned: &DashSet<u32>) -> Vec<usize> {
        let (mut front, mut rest): (Vec<usize>, Vec<usize>) = self
            .filter(query)
            .into_iter()
            .partition(|&idx| pinned.contains(&self.processes[idx].pid));
        self.sort_indices(&mut rest, spec);
        front.append(&mut rest);
        front
    }
}

fn matches_query(p: &Process, query: &str) -> bool {
    query.is_empty()
        || p.name.contains(query)
        || p.pid.to_string().contains(query)
        || p.command.contains(query)
}

/// Rebuilds and publishes process snapshots.
///
/// Cheap to clone; clones share the published snapshot and the pin set.
#[derive(Clone)]
pub struct ProcessTable {
    procfs: ProcFs,
    current: Published<Arc<ProcessSnapshot>>,
    pinned: Arc<DashSet<u32>>,
    users: Arc<UserResolver>,
    pool: Option<Arc<rayon::ThreadPool>>,
    stats: Arc<CollectorStats>,
}

impl ProcessTable {
    /// `parallelism` sizes a dedicated rayon pool for the scan; `None` uses
    /// the global pool.
    pub fn new(procfs: ProcFs, parallelism: Option<usize>) -> Self {
        let pool = parallelism.and_then(|threads| {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("procpulse-scan-{}", i))
                .build()
            {
                Ok(pool) => Some(Arc::new(pool)),
                Err(e) => {
                    warn!("Failed to build scan thread pool ({} threads): {}", threads, e);
                    None
                }
            }
        });

        Self {
            procfs,
            current: Published::new(Arc::new(ProcessSnapshot::default())),
            pinned: Arc::new(DashSet::new()),
            users: Arc::new(UserResolver::new()),
            pool,
            stats: Arc::new(CollectorStats::default()),
        }
    }

    /// Scans every process and swaps the result in.
    ///
    /// On [`ScanError`] the previous snapshot stays published. Processes that
    /// vanish mid-scan are skipped, never reported as errors.
    #[instrument(skip(self), fields(root = %self.procfs.root().display()))]
    pub fn rebuild(&self) -> Result<Arc<ProcessSnapshot>, ScanError> {
        let started = Instant::now();

        let pids = match list_pids(&self.procfs) {
            Ok(pids) => pids,
            Err(e) => {
                self.stats.record_failure();
                return Err(e);
            }
        };

        let uptime = self.procfs.read_uptime().unwrap_or_else(|e| {
            debug!("Uptime unavailable, process CPU shares will be 0: {}", e);
            0.0
        });
        let clk_tck = *CLK_TCK;

        let scan = || -> Vec<_> {
            pids.par_iter()
                .map(|&pid| scan_process(&self.procfs, pid, uptime, clk_tck, &self.users))
                .collect()
        };
        let results = match &self.pool {
            Some(pool) => pool.install(scan),
            None => scan(),
        };

        let mut processes = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for (pid, result) in pids.iter().zip(results) {
            match result {
                Ok(p) => processes.push(p),
                Err(e) => {
                    debug!("Skipping process {}: {}", pid, e);
                    skipped += 1;
                }
            }
        }

        let snapshot = Arc::new(ProcessSnapshot::build(processes, skipped, started.elapsed()));
        self.current.replace(Arc::clone(&snapshot));
        self.cleanup_pins(&snapshot);

        self.stats
            .record_success(snapshot.scan_duration);
        debug!(
            "Process table rebuilt: {} processes, {} skipped in {:?} ({} users cached)",
            snapshot.len(),
            snapshot.skipped,
            snapshot.scan_duration,
            self.users.cached()
        );
        Ok(snapshot)
    }

    /// Runs [`rebuild`](Self::rebuild) on the blocking thread pool.
    pub async fn rebuild_async(&self) -> Result<Arc<ProcessSnapshot>, ScanError> {
        let table = self.clone();
        tokio::task::spawn_blocking(move || table.rebuild())
            .await
            .map_err(|e| ScanError::Join(e.to_string()))?
    }

    /// Rebuild loop, independent of the metric collectors.
    pub async fn run(self, interval: Duration, mut shutdown: ShutdownSignal) {
        info!("process table started (interval {:?})", interval);

        while !shutdown.is_triggered() {
            if let Err(e) = self.rebuild_async().await {
                warn!("Process table rebuild failed, keeping previous snapshot: {}", e);
            }
            if shutdown.sleep(interval).await {
                break;
            }
        }

        info!("process table stopped");
    }

    /// Current snapshot. Readers keep it alive independently of later swaps.
    pub fn snapshot(&self) -> Arc<ProcessSnapshot> {
        self.current.get()
    }

    /// Filtered, sorted copy of the current snapshot, pinned processes first.
    pub fn query(&self, spec: SortSpec, query: &str) -> Vec<Process> {
        let snapshot = self.snapshot();
        snapshot
            .view(spec, query, &self.pinned)
            .into_iter()
            .filter_map(|idx| snapshot.get(idx).cloned())
            .collect()
    }

    pub fn pin(&self, pid: u32) {
        self.pinned.insert(pid);
    }

    pub fn unpin(&self, pid: u32) {
        self.pinned.remove(&pid);
    }

    /// Flips the pin state; returns whether the PID is now pinned.
    pub fn toggle_pin(&self, pid: u32) -> bool {
        if self.pinned.remove(&pid).is_some() {
            false
        } else {
            self.pinned.insert(pid);
            true
        }
    }

    pub fn is_pinned(&self, pid: u32) -> bool {
        self.pinned.contains(&pid)
    }

    pub fn pinned(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.pinned.iter().map(|p| *p).collect();
        pids.sort_unstable();
        pids
    }

    /// Drops pins whose process is no longer present.
    fn cleanup_pins(&self, snapshot: &ProcessSnapshot) {
        self.pinned.retain(|pid| {
            let alive = snapshot.index_of(*pid).is_some();
            if !alive {
                debug!("Unpinning exited process {}", pid);
            }
            alive
        });
    }

    /// Sends SIGTERM to `target`.
    pub fn kill(&self, target: &str) -> Result<(), KillError> {
        kill::kill_process(target)
    }

    pub fn stats(&self) -> Arc<CollectorStats> {
        Arc::clone(&self.stats)
    }
}

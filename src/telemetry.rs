//! Telemetry context shared with the display layer.
//!
//! `Telemetry` owns one collector per metric family plus the process table.
//! Readers get cheap copies of the latest published values; collectors run as
//! independent tokio tasks, each behind its own lock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::collector::shutdown::{self, ShutdownTrigger};
use crate::collector::{
    Cadence, Collector, CoreUsage, CoresFamily, CpuFamily, CpuSummary, DiskFamily, DiskSummary,
    MemoryFamily, MemorySummary, NetworkFamily, NetworkSummary, PerCoreSummary, SystemFamily,
    SystemSummary,
};
use crate::config::Config;
use crate::error::{ConfigError, KillError};
use crate::process::{Process, ProcessSnapshot, ProcessTable, SortSpec};
use crate::published::{Published, RefreshInterval};
use crate::source::ProcFs;
use crate::stats::{CollectorStats, CollectorStatsSnapshot};

/// Collectors built but not yet spawned.
struct Pending {
    cpu: Collector<CpuFamily>,
    cores: Collector<CoresFamily>,
    memory: Collector<MemoryFamily>,
    disk: Collector<DiskFamily>,
    network: Collector<NetworkFamily>,
    system: Collector<SystemFamily>,
}

pub struct Telemetry {
    refresh: RefreshInterval,
    process_interval: Duration,

    cpu: Published<CpuSummary>,
    cores: Published<PerCoreSummary>,
    memory: Published<MemorySummary>,
    disk: Published<DiskSummary>,
    network: Published<NetworkSummary>,
    system: Published<SystemSummary>,
    processes: ProcessTable,

    stats: BTreeMap<&'static str, Arc<CollectorStats>>,
    pending: Option<Pending>,
    tasks: Vec<JoinHandle<()>>,
    shutdown: ShutdownTrigger,
}

impl Telemetry {
    /// Builds every collector from `config`. Nothing is sampled until
    /// [`start`](Self::start). Fails when `config` does not validate.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let system_interval = config.system_interval()?;
        let process_interval = config.process_interval()?;

        let procfs = ProcFs::new(&config.proc_root);
        let refresh = RefreshInterval::from_seconds(config.effective_refresh_secs());
        let shared = Cadence::Shared(refresh.clone());
        let history_len = config.history_len;

        let pending = Pending {
            cpu: Collector::new(CpuFamily::new(procfs.clone(), history_len), shared.clone()),
            cores: Collector::new(
                CoresFamily::new(procfs.clone(), config.max_cores),
                shared.clone(),
            ),
            memory: Collector::new(
                MemoryFamily::new(procfs.clone(), history_len),
                shared.clone(),
            ),
            disk: Collector::new(
                DiskFamily::new(
                    procfs.clone(),
                    config.mount_path.clone(),
                    config.disk_devices.clone(),
                    history_len,
                ),
                shared.clone(),
            ),
            network: Collector::new(
                NetworkFamily::new(procfs.clone(), config.network_interface.clone(), history_len)
                    .with_sys_root(&config.sys_root),
                shared,
            ),
            system: Collector::new(
                SystemFamily::new(procfs.clone(), config.os_release_path.clone(), history_len),
                Cadence::Fixed(system_interval),
            ),
        };

        let processes = ProcessTable::new(procfs, config.parallelism);

        let mut stats = BTreeMap::new();
        stats.insert(pending.cpu.name(), pending.cpu.stats());
        stats.insert(pending.cores.name(), pending.cores.stats());
        stats.insert(pending.memory.name(), pending.memory.stats());
        stats.insert(pending.disk.name(), pending.disk.stats());
        stats.insert(pending.network.name(), pending.network.stats());
        stats.insert(pending.system.name(), pending.system.stats());
        stats.insert("processes", processes.stats());

        let (shutdown, _) = shutdown::channel();

        Ok(Self {
            refresh,
            process_interval,
            cpu: pending.cpu.published(),
            cores: pending.cores.published(),
            memory: pending.memory.published(),
            disk: pending.disk.published(),
            network: pending.network.published(),
            system: pending.system.published(),
            processes,
            stats,
            pending: Some(pending),
            tasks: Vec::new(),
            shutdown,
        })
    }

    /// Spawns every collector loop and the process table loop on the current
    /// tokio runtime. Calling it again is a no-op.
    pub fn start(&mut self) {
        let Some(pending) = self.pending.take() else {
            warn!("Telemetry already started");
            return;
        };

        let signal = self.shutdown.signal();
        self.tasks = vec![
            tokio::spawn(pending.cpu.run(signal.clone())),
            tokio::spawn(pending.cores.run(signal.clone())),
            tokio::spawn(pending.memory.run(signal.clone())),
            tokio::spawn(pending.disk.run(signal.clone())),
            tokio::spawn(pending.network.run(signal.clone())),
            tokio::spawn(pending.system.run(signal.clone())),
            tokio::spawn(self.processes.clone().run(self.process_interval, signal)),
        ];
        info!(
            "Telemetry started: {} tasks, refresh every {:.1}s",
            self.tasks.len(),
            self.refresh.seconds()
        );
    }

    /// Signals every loop to stop and waits for them to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.trigger();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Collector task ended abnormally: {}", e);
            }
        }
        info!("Telemetry stopped");
    }

    pub fn get_cpu_summary(&self) -> CpuSummary {
        self.cpu.get()
    }

    pub fn get_per_core_cpu(&self) -> Vec<CoreUsage> {
        self.cores.read(|s| s.cores.clone())
    }

    pub fn get_memory_summary(&self) -> MemorySummary {
        self.memory.get()
    }

    pub fn get_disk_summary(&self) -> DiskSummary {
        self.disk.get()
    }

    pub fn get_network_summary(&self) -> NetworkSummary {
        self.network.get()
    }

    pub fn get_system_summary(&self) -> SystemSummary {
        self.system.get()
    }

    /// Filtered and sorted process list; pinned matches come first.
    pub fn get_process_snapshot(&self, spec: SortSpec, query: &str) -> Vec<Process> {
        self.processes.query(spec, query)
    }

    /// The raw arena snapshot, with hierarchy and build metadata.
    pub fn process_snapshot(&self) -> Arc<ProcessSnapshot> {
        self.processes.snapshot()
    }

    pub fn kill_process(&self, target: &str) -> Result<(), KillError> {
        self.processes.kill(target)
    }

    /// Applies a new refresh interval to the fast families, clamped to
    /// [0.5, 5.0] seconds. Returns the value applied.
    pub fn set_refresh_interval(&self, seconds: f64) -> f64 {
        let applied = self.refresh.set_seconds(seconds);
        info!("Refresh interval set to {:.2}s", applied);
        applied
    }

    pub fn refresh_interval(&self) -> f64 {
        self.refresh.seconds()
    }

    pub fn pin(&self, pid: u32) {
        self.processes.pin(pid);
    }

    pub fn unpin(&self, pid: u32) {
        self.processes.unpin(pid);
    }

    pub fn toggle_pin(&self, pid: u32) -> bool {
        self.processes.toggle_pin(pid)
    }

    pub fn is_pinned(&self, pid: u32) -> bool {
        self.processes.is_pinned(pid)
    }

    pub fn collector_stats(&self) -> BTreeMap<&'static str, CollectorStatsSnapshot> {
        self.stats
            .iter()
            .map(|(name, stats)| (*name, stats.snapshot()))
            .collect()
    }
}

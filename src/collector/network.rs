//! Network throughput per interface and in aggregate.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::MetricFamily;
use crate::error::SourceError;
use crate::history::HistoryBuffer;
use crate::rate::{CounterSet, NetRates, Snapshot};
use crate::source::net::{ipv4_addresses, primary_interface, read_operstate};
use crate::source::{InterfaceInfo, NetCounters, ProcFs, DEFAULT_SYS_ROOT};

#[derive(Debug, Clone)]
pub struct NetworkSummary {
    /// Aggregate over the configured interface, or every non-loopback one.
    pub rx_kbs: f64,
    pub tx_kbs: f64,
    pub rx_packets_per_sec: f64,
    pub tx_packets_per_sec: f64,
    pub errors_per_sec: f64,
    pub primary_interface: Option<String>,
    pub interfaces: BTreeMap<String, NetRates>,
    /// Link state and IPv4 address of every interface in `net/dev`.
    pub details: BTreeMap<String, InterfaceInfo>,
    pub updated_at: Option<DateTime<Utc>>,
    rx_history: HistoryBuffer,
    tx_history: HistoryBuffer,
}

impl NetworkSummary {
    pub fn new(history_len: usize) -> Self {
        Self {
            rx_kbs: 0.0,
            tx_kbs: 0.0,
            rx_packets_per_sec: 0.0,
            tx_packets_per_sec: 0.0,
            errors_per_sec: 0.0,
            primary_interface: None,
            interfaces: BTreeMap::new(),
            details: BTreeMap::new(),
            updated_at: None,
            rx_history: HistoryBuffer::new(history_len),
            tx_history: HistoryBuffer::new(history_len),
        }
    }

    pub fn rx_history(&self) -> Vec<f64> {
        self.rx_history.snapshot()
    }

    pub fn tx_history(&self) -> Vec<f64> {
        self.tx_history.snapshot()
    }
}

pub struct NetworkUpdate {
    interfaces: BTreeMap<String, NetRates>,
    details: BTreeMap<String, InterfaceInfo>,
    total: NetRates,
    primary: Option<String>,
    at: DateTime<Utc>,
}

pub struct NetworkFamily {
    procfs: ProcFs,
    sys_root: PathBuf,
    interface: Option<String>,
    history_len: usize,
}

impl NetworkFamily {
    /// With `interface` set, only that interface is read and aggregated.
    pub fn new(procfs: ProcFs, interface: Option<String>, history_len: usize) -> Self {
        Self {
            procfs,
            sys_root: PathBuf::from(DEFAULT_SYS_ROOT),
            interface,
            history_len,
        }
    }

    /// Reads link state below `sys_root` instead of `/sys`.
    pub fn with_sys_root(mut self, sys_root: impl Into<PathBuf>) -> Self {
        self.sys_root = sys_root.into();
        self
    }

    fn interface_details(
        &self,
        names: impl Iterator<Item = String>,
    ) -> BTreeMap<String, InterfaceInfo> {
        let mut addrs = ipv4_addresses();
        names
            .map(|name| {
                let info = InterfaceInfo {
                    operstate: read_operstate(&self.sys_root, &name),
                    ipv4: addrs.remove(&name),
                };
                (name, info)
            })
            .collect()
    }

    fn counts_toward_total(&self, name: &str) -> bool {
        match &self.interface {
            Some(wanted) => wanted == name,
            None => name != "lo",
        }
    }
}

impl MetricFamily for NetworkFamily {
    type Counters = HashMap<String, NetCounters>;
    type Update = NetworkUpdate;
    type Summary = NetworkSummary;

    const NAME: &'static str = "network";

    fn initial_summary(&self) -> NetworkSummary {
        NetworkSummary::new(self.history_len)
    }

    fn sample(&mut self) -> Result<HashMap<String, NetCounters>, SourceError> {
        match &self.interface {
            Some(name) => {
                let counters = self.procfs.read_network_interface(name)?;
                Ok(HashMap::from([(name.clone(), counters)]))
            }
            None => self.procfs.read_network_all(),
        }
    }

    fn regressions(
        &self,
        prev: &HashMap<String, NetCounters>,
        curr: &HashMap<String, NetCounters>,
    ) -> usize {
        curr.iter()
            .filter_map(|(name, now)| prev.get(name).map(|before| now.regressions_since(before)))
            .sum()
    }

    fn derive(
        &mut self,
        prev: Option<&Snapshot<HashMap<String, NetCounters>>>,
        curr: &Snapshot<HashMap<String, NetCounters>>,
    ) -> NetworkUpdate {
        let elapsed = prev.map_or(0.0, |p| curr.seconds_since(p));
        let mut interfaces = BTreeMap::new();
        let mut total = NetRates::default();

        if let Some(prev) = prev.filter(|_| elapsed > 0.0) {
            for (name, now) in &curr.counters {
                let Some(before) = prev.counters.get(name) else {
                    continue;
                };
                let rates = now.rates_since(before, elapsed);
                if self.counts_toward_total(name) {
                    total.rx_kbs += rates.rx_kbs;
                    total.tx_kbs += rates.tx_kbs;
                    total.rx_packets_per_sec += rates.rx_packets_per_sec;
                    total.tx_packets_per_sec += rates.tx_packets_per_sec;
                    total.errors_per_sec += rates.errors_per_sec;
                }
                interfaces.insert(name.clone(), rates);
            }
        }

        NetworkUpdate {
            interfaces,
            details: self.interface_details(curr.counters.keys().cloned()),
            total,
            primary: primary_interface(&curr.counters),
            at: curr.captured_at,
        }
    }

    fn apply(update: NetworkUpdate, s: &mut NetworkSummary) {
        s.rx_kbs = update.total.rx_kbs;
        s.tx_kbs = update.total.tx_kbs;
        s.rx_packets_per_sec = update.total.rx_packets_per_sec;
        s.tx_packets_per_sec = update.total.tx_packets_per_sec;
        s.errors_per_sec = update.total.errors_per_sec;
        s.primary_interface = update.primary;
        s.interfaces = update.interfaces;
        s.details = update.details;
        s.updated_at = Some(update.at);

        s.rx_history.push(s.rx_kbs);
        s.tx_history.push(s.tx_kbs);
    }
}

//! Finite-difference rates between two timestamped counter snapshots.
//!
//! Kernel counters only ever grow during normal operation. When a current
//! value is smaller than the previous one (interface reset, wraparound,
//! device hot-swap) the delta is unknown and the rate for that tick is `0.0`,
//! never negative.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::source::{CpuTimes, DiskIoCounters, NetCounters, SECTOR_BYTES};

/// An immutable set of counters stamped with the instant it was read.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub counters: T,
    /// Monotonic clock, used for elapsed time.
    pub taken_at: Instant,
    /// Wall clock, for display.
    pub captured_at: DateTime<Utc>,
}

impl<T> Snapshot<T> {
    pub fn capture(counters: T) -> Self {
        Self {
            counters,
            taken_at: Instant::now(),
            captured_at: Utc::now(),
        }
    }

    /// Seconds between `earlier` and this snapshot; zero if out of order.
    pub fn seconds_since(&self, earlier: &Snapshot<T>) -> f64 {
        self.taken_at
            .saturating_duration_since(earlier.taken_at)
            .as_secs_f64()
    }
}

/// A family of monotonic counters that can be turned into rates.
pub trait CounterSet {
    type Rates: Default;

    /// Every counter in a fixed order, for regression detection.
    fn values(&self) -> Vec<u64>;

    /// Rates between `prev` and `self` over `elapsed` seconds.
    fn rates_since(&self, prev: &Self, elapsed: f64) -> Self::Rates;

    /// Number of counters that went backwards since `prev`.
    fn regressions_since(&self, prev: &Self) -> usize {
        self.values()
            .iter()
            .zip(prev.values())
            .filter(|(curr, prev)| **curr < *prev)
            .count()
    }
}

/// Computes the rates between two snapshots using their own timestamps.
///
/// A non-positive elapsed time yields all-zero rates.
pub fn compute_rate<T: CounterSet>(prev: &Snapshot<T>, curr: &Snapshot<T>) -> T::Rates {
    let elapsed = curr.seconds_since(prev);
    if elapsed <= 0.0 {
        return T::Rates::default();
    }
    curr.counters.rates_since(&prev.counters, elapsed)
}

/// Difference `curr - prev`, or `None` when the counter regressed.
pub fn counter_delta(prev: u64, curr: u64) -> Option<u64> {
    curr.checked_sub(prev)
}

/// Counter change per second; `0.0` on regression or non-positive elapsed.
pub fn per_second(prev: u64, curr: u64, elapsed: f64) -> f64 {
    if elapsed.is_nan() || elapsed <= 0.0 {
        return 0.0;
    }
    match counter_delta(prev, curr) {
        Some(delta) => delta as f64 / elapsed,
        None => {
            debug!("Counter regressed ({} -> {}), reporting 0", prev, curr);
            0.0
        }
    }
}

/// Byte counter change in KB/s.
pub fn kb_per_second(prev_bytes: u64, curr_bytes: u64, elapsed: f64) -> f64 {
    per_second(prev_bytes, curr_bytes, elapsed) / 1024.0
}

/// Percentage of non-idle ticks between two CPU readings, in `[0, 100]`.
///
/// Idle covers both idle and iowait. No elapsed ticks, or any counter going
/// backwards, yields `0.0`.
pub fn busy_percent(prev: &CpuTimes, curr: &CpuTimes) -> f64 {
    let regressed = curr.regressions_since(prev);
    if regressed > 0 {
        debug!("{} CPU tick counter(s) regressed, reporting 0", regressed);
        return 0.0;
    }
    let (Some(total_diff), Some(idle_diff)) = (
        counter_delta(prev.total(), curr.total()),
        counter_delta(prev.idle_total(), curr.idle_total()),
    ) else {
        return 0.0;
    };
    if total_diff == 0 {
        return 0.0;
    }
    let busy = total_diff.saturating_sub(idle_diff);

    (100.0 * busy as f64 / total_diff as f64).clamp(0.0, 100.0)
}

/// CPU busy share between two readings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuRates {
    pub busy_percent: f64,
}

impl CounterSet for CpuTimes {
    type Rates = CpuRates;

    fn values(&self) -> Vec<u64> {
        vec![
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
        ]
    }

    // Tick ratios are already normalized; elapsed wall time only gates validity.
    fn rates_since(&self, prev: &Self, _elapsed: f64) -> CpuRates {
        CpuRates {
            busy_percent: busy_percent(prev, self),
        }
    }
}

/// Disk throughput between two readings of one device (or an aggregate).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskRates {
    pub read_kbs: f64,
    pub write_kbs: f64,
    pub reads_per_sec: f64,
    pub writes_per_sec: f64,
}

impl CounterSet for DiskIoCounters {
    type Rates = DiskRates;

    fn values(&self) -> Vec<u64> {
        vec![
            self.reads_completed,
            self.sectors_read,
            self.writes_completed,
            self.sectors_written,
        ]
    }

    fn rates_since(&self, prev: &Self, elapsed: f64) -> DiskRates {
        let sector_kb = SECTOR_BYTES as f64 / 1024.0;
        DiskRates {
            read_kbs: per_second(prev.sectors_read, self.sectors_read, elapsed) * sector_kb,
            write_kbs: per_second(prev.sectors_written, self.sectors_written, elapsed) * sector_kb,
            reads_per_sec: per_second(prev.reads_completed, self.reads_completed, elapsed),
            writes_per_sec: per_second(prev.writes_completed, self.writes_completed, elapsed),
        }
    }
}

/// Network throughput between two readings of one interface (or an aggregate).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetRates {
    pub rx_kbs: f64,
    pub tx_kbs: f64,
    pub rx_packets_per_sec: f64,
    pub tx_packets_per_sec: f64,
    pub errors_per_sec: f64,
}

impl CounterSet for NetCounters {
    type Rates = NetRates;

    fn values(&self) -> Vec<u64> {
        vec![
            self.rx_bytes,
            self.rx_packets,
            self.rx_errors,
            self.tx_bytes,
            self.tx_packets,
            self.tx_errors,
        ]
    }

    fn rates_since(&self, prev: &Self, elapsed: f64) -> NetRates {
        NetRates {
            rx_kbs: kb_per_second(prev.rx_bytes, self.rx_bytes, elapsed),
            tx_kbs: kb_per_second(prev.tx_bytes, self.tx_bytes, elapsed),
            rx_packets_per_sec: per_second(prev.rx_packets, self.rx_packets, elapsed),
            tx_packets_per_sec: per_second(prev.tx_packets, self.tx_packets, elapsed),
            errors_per_sec: per_second(prev.errors(), self.errors(), elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cpu(busy: u64, idle: u64) -> CpuTimes {
        CpuTimes {
            user: busy,
            idle,
            ..Default::default()
        }
    }

    #[test]
    fn test_busy_percent_half() {
        // total 1000 -> 1100, idle 800 -> 850
        let prev = cpu(200, 800);
        let curr = cpu(250, 850);
        assert!((busy_percent(&prev, &curr) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_busy_percent_iowait_counts_as_idle() {
        let prev = CpuTimes {
            user: 100,
            idle: 100,
            iowait: 0,
            ..Default::default()
        };
        let curr = CpuTimes {
            user: 125,
            idle: 150,
            iowait: 25,
            ..Default::default()
        };
        assert!((busy_percent(&prev, &curr) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_busy_percent_no_elapsed_ticks() {
        let t = cpu(10, 10);
        assert_eq!(busy_percent(&t, &t), 0.0);
    }

    #[test]
    fn test_busy_percent_regression_is_zero() {
        assert_eq!(busy_percent(&cpu(500, 500), &cpu(100, 100)), 0.0);
        // idle went backwards while the total still grew
        assert_eq!(busy_percent(&cpu(100, 500), &cpu(700, 400)), 0.0);

        let prev = CpuTimes {
            user: 100,
            idle: 100,
            iowait: 50,
            ..Default::default()
        };
        let curr = CpuTimes {
            user: 300,
            idle: 200,
            iowait: 10,
            ..Default::default()
        };
        assert_eq!(busy_percent(&prev, &curr), 0.0);
    }

    #[test]
    fn test_busy_percent_always_in_range() {
        let samples = [
            (cpu(0, 0), cpu(1, 0)),
            (cpu(0, 0), cpu(0, 1)),
            (cpu(5, 7), cpu(5, 1_000_000)),
            (cpu(5, 7), cpu(u64::MAX / 4, 7)),
            (cpu(1, 1), cpu(3, 2)),
        ];
        for (prev, curr) in samples {
            let v = busy_percent(&prev, &curr);
            assert!((0.0..=100.0).contains(&v), "{} out of range", v);
        }
    }

    #[test]
    fn test_kb_per_second() {
        assert!((kb_per_second(1_048_576, 2_097_152, 1.0) - 1024.0).abs() < 1e-9);
        assert!((kb_per_second(0, 2048, 2.0) - 1.0).abs() < 1e-9);
        assert_eq!(kb_per_second(2_097_152, 1_048_576, 1.0), 0.0);
        assert_eq!(kb_per_second(0, 1024, 0.0), 0.0);
    }

    #[test]
    fn test_counter_delta() {
        assert_eq!(counter_delta(10, 15), Some(5));
        assert_eq!(counter_delta(10, 10), Some(0));
        assert_eq!(counter_delta(15, 10), None);
    }

    #[test]
    fn test_net_rates_regression_only_zeroes_that_counter() {
        let prev = NetCounters {
            rx_bytes: 1_048_576,
            tx_bytes: 5_000,
            ..Default::default()
        };
        let curr = NetCounters {
            rx_bytes: 2_097_152,
            tx_bytes: 10,
            ..Default::default()
        };
        let rates = curr.rates_since(&prev, 1.0);
        assert!((rates.rx_kbs - 1024.0).abs() < 1e-9);
        assert_eq!(rates.tx_kbs, 0.0);
        assert_eq!(curr.regressions_since(&prev), 1);
    }

    #[test]
    fn test_disk_rates_sectors_to_kb() {
        let prev = DiskIoCounters::default();
        let curr = DiskIoCounters {
            reads_completed: 10,
            sectors_read: 2048,
            writes_completed: 4,
            sectors_written: 1024,
        };
        let rates = curr.rates_since(&prev, 2.0);
        assert!((rates.read_kbs - 512.0).abs() < 1e-9);
        assert!((rates.write_kbs - 256.0).abs() < 1e-9);
        assert!((rates.reads_per_sec - 5.0).abs() < 1e-9);
        assert!((rates.writes_per_sec - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_rate_uses_snapshot_clock() {
        let prev = Snapshot::capture(NetCounters::default());
        let mut curr = Snapshot::capture(NetCounters {
            rx_bytes: 4096,
            ..Default::default()
        });
        curr.taken_at = prev.taken_at + Duration::from_secs(2);
        let rates = compute_rate(&prev, &curr);
        assert!((rates.rx_kbs - 2.0).abs() < 1e-9);

        // out-of-order snapshots never produce a rate
        let rates = compute_rate(&curr, &prev);
        assert_eq!(rates, NetRates::default());
    }
}

//! Per-process CPU share.
//!
//! The share is a lifetime average: total CPU time consumed divided by how
//! long the process has existed, not an interval difference.

use once_cell::sync::Lazy;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    // SAFETY: sysconf is safe to call with _SC_CLK_TCK
    // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
    unsafe {
        let tck = libc::sysconf(libc::_SC_CLK_TCK);
        if tck > 0 {
            return tck as f64;
        }
    }
    100.0
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// `100 * cpu_seconds / age_seconds`, where age is system uptime minus the
/// process start time.
///
/// Returns `0.0` when the age is not positive, which happens when a process
/// started between the uptime read and its own stat read.
pub fn lifetime_cpu_percent(
    utime: u64,
    stime: u64,
    start_time_ticks: u64,
    uptime_secs: f64,
    clk_tck: f64,
) -> f64 {
    if clk_tck.is_nan() || clk_tck <= 0.0 {
        return 0.0;
    }
    let cpu_secs = utime.saturating_add(stime) as f64 / clk_tck;
    let age_secs = uptime_secs - start_time_ticks as f64 / clk_tck;
    if age_secs.is_nan() || age_secs <= 0.0 {
        return 0.0;
    }
    100.0 * cpu_secs / age_secs
}

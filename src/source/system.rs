//! System-wide readers: uptime, load averages and identity strings.

use std::fs;
use std::path::Path;

use super::ProcFs;
use crate::error::SourceError;

/// System load averages plus the scheduler entity counts from `loadavg`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAverage {
    pub one_min: f64,
    pub five_min: f64,
    pub fifteen_min: f64,
    pub running: u64,
    pub total: u64,
}

/// Static description of the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemIdentity {
    pub hostname: String,
    /// `sysname release`, e.g. `Linux 6.8.0-45-generic`.
    pub kernel: String,
    pub arch: String,
    pub os_name: String,
    pub cpu_model: String,
    pub cpu_mhz: f64,
    pub logical_cores: usize,
}

/// Fields of the uname syscall.
#[derive(Debug, Clone, Default)]
pub struct UnameInfo {
    pub sysname: String,
    pub nodename: String,
    pub release: String,
    pub machine: String,
}

const UNKNOWN: &str = "unknown";

/// Parses loadavg content.
///
/// Format: "0.00 0.01 0.05 1/234 5678". The three averages are required;
/// the running/total pair is zero-filled when absent.
pub fn parse_load_average(content: &str) -> Option<LoadAverage> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }

    let (running, total) = parts
        .get(3)
        .and_then(|p| p.split_once('/'))
        .map(|(r, t)| (r.parse().unwrap_or(0), t.parse().unwrap_or(0)))
        .unwrap_or((0, 0));

    Some(LoadAverage {
        one_min: parts[0].parse().ok()?,
        five_min: parts[1].parse().ok()?,
        fifteen_min: parts[2].parse().ok()?,
        running,
        total,
    })
}

/// Model name and clock speed of the first processor in cpuinfo.
pub fn parse_cpuinfo(content: &str) -> (Option<String>, Option<f64>) {
    let mut model = None;
    let mut mhz = None;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "model name" if model.is_none() => model = Some(value.trim().to_string()),
            "cpu MHz" if mhz.is_none() => mhz = value.trim().parse().ok(),
            _ => {}
        }
        if model.is_some() && mhz.is_some() {
            break;
        }
    }

    (model, mhz)
}

/// `PRETTY_NAME` of an os-release file, falling back to `NAME`.
pub fn parse_os_release(content: &str) -> Option<String> {
    let mut name = None;
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim() {
            "PRETTY_NAME" if !value.is_empty() => return Some(value),
            "NAME" if !value.is_empty() => name = Some(value),
            _ => {}
        }
    }
    name
}

/// Formats uptime as "{d}d {h}h {m}m", omitting leading zero units.
pub fn format_uptime(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Reads system information from the uname syscall.
pub fn read_uname() -> Option<UnameInfo> {
    use std::ffi::CStr;
    use std::mem;

    // SAFETY: libc::utsname only holds c_char arrays, which are valid when
    // zeroed, and uname NUL-terminates every field it fills.
    unsafe {
        let mut utsname: libc::utsname = mem::zeroed();
        if libc::uname(&mut utsname) != 0 {
            return None;
        }
        let field = |ptr: *const libc::c_char| CStr::from_ptr(ptr).to_string_lossy().into_owned();
        Some(UnameInfo {
            sysname: field(utsname.sysname.as_ptr()),
            nodename: field(utsname.nodename.as_ptr()),
            release: field(utsname.release.as_ptr()),
            machine: field(utsname.machine.as_ptr()),
        })
    }
}

impl ProcFs {
    /// Seconds since boot, from `uptime`.
    pub fn read_uptime(&self) -> Result<f64, SourceError> {
        let content = self.read("uptime")?;
        content
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| SourceError::incomplete(self.path("uptime"), "no uptime field"))
    }

    pub fn read_load_average(&self) -> Result<LoadAverage, SourceError> {
        let content = self.read("loadavg")?;
        parse_load_average(&content).ok_or_else(|| {
            SourceError::incomplete(self.path("loadavg"), "expected at least 3 numeric fields")
        })
    }

    fn read_trimmed(&self, relative: &str) -> Option<String> {
        self.read(relative)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Collects host identity strings. Never fails: anything unreadable is
    /// reported as "unknown".
    pub fn read_system_identity(&self, os_release: &Path) -> SystemIdentity {
        let uname = read_uname().unwrap_or_default();
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

        let hostname = self
            .read_trimmed("sys/kernel/hostname")
            .or_else(|| non_empty(uname.nodename.clone()))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let kernel = match (
            self.read_trimmed("sys/kernel/ostype"),
            self.read_trimmed("sys/kernel/osrelease"),
        ) {
            (Some(ostype), Some(release)) => format!("{} {}", ostype, release),
            _ if !uname.sysname.is_empty() => format!("{} {}", uname.sysname, uname.release),
            _ => UNKNOWN.to_string(),
        };

        let arch = non_empty(uname.machine).unwrap_or_else(|| std::env::consts::ARCH.to_string());

        let os_name = fs::read_to_string(os_release)
            .ok()
            .and_then(|c| parse_os_release(&c))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let (cpu_model, cpu_mhz) = self
            .read("cpuinfo")
            .map(|c| parse_cpuinfo(&c))
            .unwrap_or((None, None));

        SystemIdentity {
            hostname,
            kernel,
            arch,
            os_name,
            cpu_model: cpu_model.unwrap_or_else(|| UNKNOWN.to_string()),
            cpu_mhz: cpu_mhz.unwrap_or(0.0),
            logical_cores: self.logical_core_count(),
        }
    }
}

//! Configuration management for procpulse.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats. Configuration
//! is only ever read, never written back.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cli::{Args, ConfigFormat};
use crate::collector::cores::DEFAULT_MAX_CORES;
use crate::collector::system::DEFAULT_OS_RELEASE;
use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_LEN;
use crate::published::{MAX_REFRESH_SECS, MIN_REFRESH_SECS};
use crate::source::{DEFAULT_PROC_ROOT, DEFAULT_SYS_ROOT};

/// Locations tried when no config file is given, in order.
pub const DEFAULT_CONFIG_PATHS: [&str; 4] = [
    "/etc/procpulse/procpulse.yaml",
    "/etc/procpulse/procpulse.yml",
    "./procpulse.yaml",
    "./procpulse.yml",
];

/// Longest cadence accepted for any collector.
pub const MAX_INTERVAL_SECS: f64 = 3600.0;

/// Sampler configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the kernel counter files.
    pub proc_root: PathBuf,

    /// Root of sysfs, read for interface link state.
    pub sys_root: PathBuf,

    /// Cadence of the fast families (cpu, cores, memory, disk, network).
    /// Clamped to [0.5, 5.0] seconds when applied.
    pub refresh_interval_secs: f64,

    /// Cadence of the identity/load family.
    pub system_interval_secs: f64,

    /// Cadence of the process table rebuild.
    pub process_interval_secs: f64,

    /// Samples retained per history.
    pub history_len: usize,

    /// Filesystem measured by the disk family.
    pub mount_path: PathBuf,

    /// Restrict network totals to one interface.
    pub network_interface: Option<String>,

    /// Restrict disk I/O to these block devices.
    pub disk_devices: Option<Vec<String>>,

    pub max_cores: usize,

    /// Threads for the process scan; unset uses the global rayon pool.
    pub parallelism: Option<usize>,

    pub os_release_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            sys_root: PathBuf::from(DEFAULT_SYS_ROOT),
            refresh_interval_secs: 1.0,
            system_interval_secs: 5.0,
            process_interval_secs: 2.0,
            history_len: DEFAULT_HISTORY_LEN,
            mount_path: PathBuf::from("/"),
            network_interface: None,
            disk_devices: None,
            max_cores: DEFAULT_MAX_CORES,
            parallelism: None,
            os_release_path: PathBuf::from(DEFAULT_OS_RELEASE),
        }
    }
}

fn check_interval(name: &str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value <= 0.0 || value > MAX_INTERVAL_SECS {
        return Err(ConfigError::Invalid(format!(
            "{} must be between 0 and {} seconds, got {}",
            name, MAX_INTERVAL_SECS, value
        )));
    }
    Duration::try_from_secs_f64(value).map_err(|e| {
        ConfigError::Invalid(format!("{} is not a valid duration: {}", name, e))
    })
}

impl Config {
    /// Rejects values no collector can run with. Out-of-range refresh
    /// intervals are not errors; they are clamped when applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proc_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("proc_root must not be empty".into()));
        }
        check_interval("refresh_interval_secs", self.refresh_interval_secs)?;
        check_interval("system_interval_secs", self.system_interval_secs)?;
        check_interval("process_interval_secs", self.process_interval_secs)?;

        if self.history_len == 0 {
            return Err(ConfigError::Invalid("history_len must be at least 1".into()));
        }
        if self.max_cores == 0 {
            return Err(ConfigError::Invalid("max_cores must be at least 1".into()));
        }
        if self.parallelism == Some(0) {
            return Err(ConfigError::Invalid(
                "parallelism must be at least 1 when set".into(),
            ));
        }
        if self.network_interface.as_deref() == Some("") {
            return Err(ConfigError::Invalid(
                "network_interface must not be empty when set".into(),
            ));
        }
        if self
            .disk_devices
            .as_ref()
            .is_some_and(|d| d.is_empty() || d.iter().any(|n| n.is_empty()))
        {
            return Err(ConfigError::Invalid(
                "disk_devices must list at least one non-empty device name".into(),
            ));
        }
        Ok(())
    }

    /// Refresh interval after clamping to the supported range.
    pub fn effective_refresh_secs(&self) -> f64 {
        self.refresh_interval_secs
            .clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS)
    }

    /// Cadence of the identity/load family, checked.
    pub fn system_interval(&self) -> Result<Duration, ConfigError> {
        check_interval("system_interval_secs", self.system_interval_secs)
    }

    /// Cadence of the process table rebuild, checked.
    pub fn process_interval(&self) -> Result<Duration, ConfigError> {
        check_interval("process_interval_secs", self.process_interval_secs)
    }
}

/// Loads configuration from `path`, or from the first existing default
/// location, or falls back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
        {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
        path: path.clone(),
        source: e,
    })?;
    let parse_err = |detail: String| ConfigError::Parse {
        path: path.clone(),
        detail,
    };

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        // Default to YAML
        _ => serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
    };
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, ConfigError> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(root) = &args.proc_root {
        config.proc_root = root.clone();
    }
    if let Some(root) = &args.sys_root {
        config.sys_root = root.clone();
    }
    if let Some(secs) = args.refresh_interval {
        config.refresh_interval_secs = secs;
    }
    if let Some(n) = args.history_len {
        config.history_len = n;
    }
    if let Some(mount) = &args.mount_path {
        config.mount_path = mount.clone();
    }
    if let Some(iface) = &args.interface {
        config.network_interface = Some(iface.clone());
    }
    if let Some(devices) = &args.disk_devices {
        config.disk_devices = Some(
            devices
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }
    if let Some(threads) = args.parallelism {
        config.parallelism = Some(threads);
    }

    config.validate()?;
    Ok(config)
}

/// Renders configuration in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, ConfigError> {
    let rendered = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|e| e.to_string()),
    };
    rendered.map_err(ConfigError::Invalid)
}

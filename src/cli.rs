//! CLI arguments for the procpulse headless driver.
//!
//! This module defines the command-line interface structure using the clap library.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "procpulse",
    about = "Live Linux telemetry sampler for CPU, memory, disk, network and processes",
    long_about = "Live Linux telemetry sampler.\n\n\
                  Samples kernel counters under /proc, turns them into rates and \
                  rolling histories, and logs a summary of every metric family plus \
                  the busiest processes on each refresh.",
    version,
    propagate_version = true
)]
pub struct Args {
    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Refresh interval in seconds for the fast metrics (clamped to 0.5..5)
    #[arg(short = 'r', long)]
    pub refresh_interval: Option<f64>,

    /// Number of summary rounds to log before exiting (0 = until Ctrl+C)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub iterations: u64,

    /// Number of processes listed per summary round
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Only list processes whose name, PID or command contains this text
    #[arg(long)]
    pub filter: Option<String>,

    /// Root of the proc filesystem
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Root of sysfs, used for interface link state
    #[arg(long)]
    pub sys_root: Option<PathBuf>,

    /// Samples retained per rolling history
    #[arg(long)]
    pub history_len: Option<usize>,

    /// Filesystem measured by the disk summary
    #[arg(long)]
    pub mount_path: Option<PathBuf>,

    /// Restrict network totals to one interface
    #[arg(short = 'i', long)]
    pub interface: Option<String>,

    /// Restrict disk I/O to these block devices (comma-separated)
    #[arg(long)]
    pub disk_devices: Option<String>,

    /// Parallel process scan threads
    #[arg(long)]
    pub parallelism: Option<usize>,
}

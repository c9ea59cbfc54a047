//! procpulse: live Linux telemetry from /proc counters.
//!
//! The library samples monotonically increasing kernel counters, derives
//! rates from consecutive snapshots, keeps bounded rolling histories, and
//! publishes the latest values behind one lock per metric family so a
//! display layer can read them at any time.
//!
//! # Usage
//!
//! ```no_run
//! use procpulse::config::Config;
//! use procpulse::process::{SortKey, SortSpec};
//! use procpulse::telemetry::Telemetry;
//!
//! # async fn demo() -> Result<(), procpulse::error::ConfigError> {
//! let mut telemetry = Telemetry::new(&Config::default())?;
//! telemetry.start();
//!
//! let cpu = telemetry.get_cpu_summary();
//! println!("cpu {:.1}%, history {:?}", cpu.percent, cpu.history());
//!
//! for p in telemetry
//!     .get_process_snapshot(SortSpec::descending(SortKey::Memory), "")
//!     .iter()
//!     .take(5)
//! {
//!     println!("{} {} {} KB", p.pid, p.name, p.memory_kb);
//! }
//!
//! telemetry.set_refresh_interval(2.0);
//! telemetry.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod history;
pub mod process;
pub mod published;
pub mod rate;
pub mod source;
pub mod stats;
pub mod telemetry;

// Re-export main types for convenience
pub use config::Config;
pub use error::{ConfigError, KillError, ScanError, SourceError};
pub use history::HistoryBuffer;
pub use process::{Process, ProcessSnapshot, ProcessTable, SortKey, SortOrder, SortSpec};
pub use published::{Published, RefreshInterval};
pub use telemetry::Telemetry;

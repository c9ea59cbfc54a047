//! Process table modules.
//!
//! This module provides:
//! - `scanner`: process discovery and per-process record assembly
//! - `cpu`: clock ticks and lifetime CPU share
//! - `users`: uid to user name resolution
//! - `table`: snapshots, hierarchy, sort, filter and pins
//! - `kill`: signal delivery

pub mod cpu;
pub mod kill;
pub mod scanner;
pub mod table;
pub mod users;

pub use cpu::CLK_TCK;
pub use kill::{kill_process, kill_with_signal};
pub use table::{Process, ProcessSnapshot, ProcessTable, SortKey, SortOrder, SortSpec};
pub use users::UserResolver;

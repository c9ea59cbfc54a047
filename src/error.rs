//! Error taxonomy for the sampler.
//!
//! Per-entity and per-tick failures are absorbed by the collectors and the
//! process table; only caller-invoked actions (kill, config loading) hand an
//! error back to the caller.

use std::io;
use std::path::PathBuf;

/// Failure to read or parse a kernel counter file.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The file vanished, is not readable, or could not be opened.
    #[error("{path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file was read but carried nothing usable.
    #[error("{path}: {detail}")]
    Incomplete { path: PathBuf, detail: String },
}

impl SourceError {
    pub fn unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SourceError::Unavailable {
            path: path.into(),
            source,
        }
    }

    pub fn incomplete(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        SourceError::Incomplete {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// True when the underlying file does not exist (typically an exited process).
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::Unavailable { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// True when the file exists but the caller may not read it.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SourceError::Unavailable { source, .. } if source.kind() == io::ErrorKind::PermissionDenied)
    }
}

/// The process root itself could not be listed.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to enumerate processes under {root}: {source}")]
    EnumerationFailure {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("process scan task failed: {0}")]
    Join(String),
}

/// Failure to deliver a signal to a process.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KillError {
    /// Not a positive numeric PID.
    #[error("invalid process id '{0}'")]
    InvalidTarget(String),

    #[error("permission denied to signal process {0}")]
    PermissionDenied(i32),

    #[error("no such process {0}")]
    NoSuchProcess(i32),

    #[error("failed to signal process {pid}: {errno}")]
    Signal { pid: i32, errno: nix::errno::Errno },
}

/// Configuration could not be loaded or is not usable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_classification() {
        let missing = SourceError::unavailable(
            "/proc/42/status",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(missing.is_not_found());
        assert!(!missing.is_permission_denied());

        let denied = SourceError::unavailable(
            "/proc/1/status",
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(denied.is_permission_denied());

        let short = SourceError::incomplete("/proc/stat", "no cpu lines");
        assert!(!short.is_not_found());
        assert_eq!(short.to_string(), "/proc/stat: no cpu lines");
    }

    #[test]
    fn test_kill_error_messages() {
        assert_eq!(
            KillError::InvalidTarget("abc".into()).to_string(),
            "invalid process id 'abc'"
        );
        assert_eq!(
            KillError::PermissionDenied(1).to_string(),
            "permission denied to signal process 1"
        );
    }
}

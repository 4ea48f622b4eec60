//! Error types for push, queue and lookup operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while pushing files or maintaining the queue
#[derive(Debug, Error)]
pub enum PushError {
    /// Authentication, network or timeout failure while opening the session
    #[error("connection to {endpoint} failed: {message}")]
    Connection {
        /// `host:port` that was dialed
        endpoint: String,
        /// Underlying error text, verbatim
        message: String,
    },

    /// Failure while copying data after the session was established
    #[error("transfer of {} failed: {message}", .path.display())]
    Transfer {
        /// Local path being pushed or remote path being pulled
        path: PathBuf,
        /// Underlying error text, verbatim
        message: String,
    },

    /// Queued file is in neither the source nor the archive tree
    #[error("{name} not found in source or archive directory")]
    NotFound { name: String },

    /// Queue entry does not follow the station naming convention
    #[error("{name} does not match the station naming convention")]
    NamingMismatch { name: String },

    /// Queue directory cannot be read or written
    #[error("queue directory {} unavailable: {source}", .path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another queued run holds the lock
    #[error("queue is locked by another run ({})", .path.display())]
    QueueLocked { path: PathBuf },

    /// Dry-run mode: nothing was sent
    #[error("dry run: transfer not attempted")]
    DryRun,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl PushError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PushError::StorageUnavailable {
            path: path.into(),
            source,
        }
    }

    /// True for errors that must abort the current invocation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PushError::StorageUnavailable { .. }
                | PushError::QueueLocked { .. }
                | PushError::Config(_)
                | PushError::Pattern(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PushError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_fatal() {
        let err = PushError::storage("/q", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("/q"));
    }

    #[test]
    fn per_entry_errors_are_not_fatal() {
        let err = PushError::NotFound {
            name: "RDLm_BFCV_2012_01_17_0900.ruv".into(),
        };
        assert!(!err.is_fatal());
        assert!(!PushError::DryRun.is_fatal());
        let err = PushError::Connection {
            endpoint: "codar:22".into(),
            message: "timed out".into(),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "connection to codar:22 failed: timed out");
    }
}

//! Ingest Error Types
//!
//! This module defines every error a write task can end with.
//!
//! ## Error Categories
//!
//! ### Terminal (never retried)
//! - `PathEscape`: Nested path resolved outside its storage root (security event)
//! - `FileSizeExceeded`: Destination file already exceeds the size ceiling
//! - `StorageUnavailable`: No usable storage root, including the default
//! - `InvalidIdentifier`: Identifier was empty after sanitization
//!
//! ### Transient (retried up to the attempt budget)
//! - `TransientIo`: Any other filesystem error
//! - `TaskTimeout`: A write attempt ran past the per-attempt ceiling. Only
//!   the last attempt's timeout reaches the caller.
//!
//! ### Queue Errors
//! - `QueueClosed`: Queue is shutting down, or the task was dropped at shutdown
//! - `QueueFull`: Optional admission limit reached
//!
//! ## Usage
//!
//! All core operations return `Result<T>` which is aliased to
//! `Result<T, Error>`. The worker moves the error value through to the
//! original caller, so the variant seen by the caller is the one produced
//! by the failing component.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Path escape: {path} resolves outside storage root {root}")]
    PathEscape { root: PathBuf, path: PathBuf },

    #[error("File size limit exceeded: {path} is {size} bytes (limit {limit})")]
    FileSizeExceeded { path: PathBuf, size: u64, limit: u64 },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("I/O error at {path}: {source}")]
    TransientIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Task timed out after {timeout_ms}ms")]
    TaskTimeout { timeout_ms: u64 },

    #[error("Invalid identifier: {0:?} is empty after sanitization")]
    InvalidIdentifier(String),

    #[error("Ingest queue is closed")]
    QueueClosed,

    #[error("Ingest queue is full ({limit} tasks)")]
    QueueFull { limit: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a raw filesystem error. Everything the filesystem reports is
    /// treated as transient; the terminal kinds are raised explicitly by the
    /// components that detect them.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::TransientIo {
            path: path.into(),
            source,
        }
    }

    /// Transient I/O failures and timed-out attempts are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientIo { .. } | Error::TaskTimeout { .. })
    }

    /// Stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::PathEscape { .. } => "path_escape",
            Error::FileSizeExceeded { .. } => "file_size_exceeded",
            Error::StorageUnavailable(_) => "storage_unavailable",
            Error::TransientIo { .. } => "transient_io",
            Error::TaskTimeout { .. } => "task_timeout",
            Error::InvalidIdentifier(_) => "invalid_identifier",
            Error::QueueClosed => "queue_closed",
            Error::QueueFull { .. } => "queue_full",
            Error::Config(_) => "config",
        }
    }
}

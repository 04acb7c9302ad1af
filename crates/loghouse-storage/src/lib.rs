//! Loghouse Storage Layer
//!
//! This crate implements the ingestion queue and storage placement for
//! loghouse: the component that takes small text payloads tagged by a
//! request identifier and appends them to files on local disk.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌────────────────────┐
//! │  HTTP handlers     │  (many, concurrent)
//! └─────────┬──────────┘
//!           │ submit(identifier, payload, nested_path?)
//!           ▼
//! ┌────────────────────┐
//! │  LogService        │  one call == one task, one result
//! └─────────┬──────────┘
//!           │ enqueue
//!           ▼
//! ┌────────────────────┐
//! │  IngestQueue       │  single worker, FIFO, retry in place
//! └─────────┬──────────┘
//!           │ one task at a time
//!           ▼
//! ┌────────────────────┐
//! │  DiskWriter        │
//! │  1. sanitize       │  strip unsafe characters
//! │  2. select_root    │  first root with > 100MB free, else default
//! │  3. resolve dir    │  join + normalize + containment check + mkdir -p
//! │  4. append_line    │  size ceiling check, then append payload + '\n'
//! └─────────┬──────────┘
//!           ▼
//!     <root>/<nested>/<identifier>
//! ```
//!
//! ## On-Disk Format
//!
//! One plain-text file per sanitized identifier, optionally under sanitized
//! subdirectories. Each file is a sequence of newline-terminated payload
//! lines with no header or framing.
//!
//! ## Concurrency
//!
//! Callers run concurrently, but every filesystem write funnels through one
//! worker. Two tasks for the same file are safe because they never overlap;
//! there are no per-file locks.
//!
//! ## Error Handling
//!
//! Components classify failures into the [`Error`] taxonomy. `TransientIo`
//! and timed-out attempts are retried (3 attempts, 1s apart by default).
//! Terminal errors reach the caller with their variant intact.

pub mod appender;
pub mod config;
pub mod error;
pub mod placement;
pub mod queue;
pub mod sanitize;
pub mod service;

pub use appender::append_line;
pub use config::IngestConfig;
pub use error::{Error, Result};
pub use placement::{FsSpaceProbe, RootSelection, SpaceProbe, StorageRoots};
pub use queue::{
    DiskWriter, IngestQueue, QueueStats, TaskCompletion, TaskHandler, TaskTicket, WriteTask,
};
pub use sanitize::{sanitize_identifier, sanitize_nested_path};
pub use service::{AppendReceipt, LogService};

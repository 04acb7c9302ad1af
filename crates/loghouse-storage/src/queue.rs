//! Ingest Queue - Single-Writer Serialized Task Runner
//!
//! This module implements `IngestQueue`, which turns many concurrent append
//! requests into one ordered stream of filesystem writes.
//!
//! ## Task Lifecycle
//!
//! ```text
//!            enqueue()
//!                │
//!                ▼
//!          ┌──────────┐
//!          │ Pending  │ ◄─────────────────────────┐
//!          └────┬─────┘                           │ (same slot, after retry_delay)
//!               │ worker picks next (FIFO)        │
//!               ▼                                 │
//!          ┌──────────┐   TransientIo/Timeout,    │
//!          │ Running  │ ──attempt < max_attempts──┘
//!          └────┬─────┘
//!               │
//!       ┌───────┴────────┐
//!       ▼                ▼
//!  ┌──────────┐    ┌──────────────────┐
//!  │Succeeded │    │ Failed(terminal) │
//!  └──────────┘    └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **One writer**: exactly one task is `Running` at any instant. The
//!   appender's size-check-then-write sequence relies on this instead of
//!   per-file locks.
//! - **FIFO**: tasks complete in submission order. A retried task retries in
//!   place; the next task does not start until it has finished.
//! - **Bounded attempts**: `TransientIo` and timed-out attempts are retried,
//!   up to `max_attempts` total, with a fixed `retry_delay` between attempts.
//! - **Per-attempt ceiling**: an attempt running past `task_timeout` is
//!   abandoned and counts against the attempt budget. The task fails with
//!   `TaskTimeout` only when its last attempt times out.
//! - **Pacing**: `task_pacing` elapses between the end of one task and the
//!   start of the next.
//!
//! ## Backlog
//!
//! The queue is unbounded unless `admission_limit` is configured, in which
//! case `enqueue` fails fast with `QueueFull`. A background monitor samples
//! the depth and warns near `nominal_capacity`.
//!
//! ## Shutdown
//!
//! `shutdown()` stops accepting, lets the running task finish, and fails
//! every still-pending task with `QueueClosed`. Nothing is persisted across
//! restarts.
//!
//! ## Example Usage
//!
//! ```ignore
//! use loghouse_storage::{DiskWriter, IngestConfig, IngestQueue};
//!
//! let config = IngestConfig::default();
//! let handler = Arc::new(DiskWriter::from_config(&config));
//! let queue = Arc::new(IngestQueue::start(&config, handler));
//!
//! let ticket = queue.enqueue("req-1".into(), "hello".into(), None)?;
//! let completion = ticket.wait().await?;
//! println!("wrote {}", completion.destination.display());
//!
//! queue.shutdown().await;
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use loghouse_observability::metrics;

use crate::appender::append_line;
use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::placement::{resolve_nested_dir, verify_root, StorageRoots};
use crate::sanitize::{sanitize_identifier, sanitize_nested_path};

/// One unit of work. Immutable once enqueued.
#[derive(Debug, Clone)]
pub struct WriteTask {
    /// Monotonic id assigned at acceptance
    pub id: u64,
    pub identifier: String,
    pub payload: String,
    pub nested_path: Option<String>,
    pub accepted_at: Instant,
}

/// What the worker does with a task on each attempt.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Perform one attempt and return the file written.
    async fn handle(&self, task: &WriteTask) -> Result<PathBuf>;
}

/// Production handler: select a root, resolve the nested directory, append.
#[derive(Debug)]
pub struct DiskWriter {
    roots: Arc<StorageRoots>,
    max_file_bytes: u64,
}

impl DiskWriter {
    pub fn new(roots: StorageRoots, max_file_bytes: u64) -> Self {
        Self {
            roots: Arc::new(roots),
            max_file_bytes,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(StorageRoots::from_config(config), config.max_file_bytes)
    }

    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }
}

#[async_trait]
impl TaskHandler for DiskWriter {
    async fn handle(&self, task: &WriteTask) -> Result<PathBuf> {
        let file_name = sanitize_identifier(&task.identifier);
        if file_name.is_empty() {
            return Err(Error::InvalidIdentifier(task.identifier.clone()));
        }

        let selection = Arc::clone(&self.roots).select_root_blocking().await?;
        verify_root(&selection.root).await?;

        let nested = task
            .nested_path
            .as_deref()
            .map(sanitize_nested_path)
            .unwrap_or_default();
        let dir = resolve_nested_dir(&selection.root, &nested).await?;

        let destination = dir.join(&file_name);
        let written = append_line(&destination, &task.payload, self.max_file_bytes).await?;
        metrics::INGEST_BYTES_TOTAL.inc_by(written);

        Ok(destination)
    }
}

/// Successful end of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCompletion {
    pub task_id: u64,
    pub destination: PathBuf,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// Handle to a single enqueued task's result.
#[derive(Debug)]
pub struct TaskTicket {
    task_id: u64,
    receiver: oneshot::Receiver<Result<TaskCompletion>>,
}

impl TaskTicket {
    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    /// Wait for the task to succeed or fail terminally.
    ///
    /// Resolves exactly once. A task dropped before it ran yields `QueueClosed`.
    pub async fn wait(self) -> Result<TaskCompletion> {
        self.receiver.await.unwrap_or(Err(Error::QueueClosed))
    }
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub accepted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub retries: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    /// pending + running
    depth: AtomicUsize,
    running: AtomicUsize,
    accepted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn release_slot(&self) {
        let depth = self.depth.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::QUEUE_DEPTH.set(depth as i64);
    }
}

#[derive(Debug, Clone, Copy)]
struct WorkerSettings {
    max_attempts: u32,
    retry_delay: Duration,
    task_timeout: Duration,
    task_pacing: Duration,
}

struct QueuedTask {
    task: WriteTask,
    reply: oneshot::Sender<Result<TaskCompletion>>,
}

/// Serialized single-worker ingest queue.
pub struct IngestQueue {
    sender: mpsc::UnboundedSender<QueuedTask>,
    accepting: AtomicBool,
    next_id: AtomicU64,
    counters: Arc<Counters>,
    admission_limit: Option<usize>,
    depth_warning_threshold: usize,
    monitor_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IngestQueue {
    /// Spawn the worker and return a queue ready to accept tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &IngestConfig, handler: Arc<dyn TaskHandler>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());

        let settings = WorkerSettings {
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
            task_timeout: config.task_timeout(),
            task_pacing: config.task_pacing(),
        };

        let worker = tokio::spawn(run_worker(
            receiver,
            handler,
            Arc::clone(&counters),
            settings,
            shutdown_rx,
        ));

        tracing::info!(
            max_attempts = settings.max_attempts,
            retry_delay_ms = config.retry_delay_ms,
            task_timeout_ms = config.task_timeout_ms,
            task_pacing_ms = config.task_pacing_ms,
            admission_limit = ?config.admission_limit,
            "Ingest queue started"
        );

        Self {
            sender,
            accepting: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            counters,
            admission_limit: config.admission_limit,
            depth_warning_threshold: config.depth_warning_threshold(),
            monitor_interval: config.monitor_interval(),
            shutdown_tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Accept a task. Returns a ticket that resolves when the task ends.
    ///
    /// Fails with `QueueClosed` after shutdown, or `QueueFull` when an
    /// admission limit is configured and reached.
    pub fn enqueue(
        &self,
        identifier: String,
        payload: String,
        nested_path: Option<String>,
    ) -> Result<TaskTicket> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::QueueClosed);
        }

        let previous = self.counters.depth.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.admission_limit {
            if previous >= limit {
                self.counters.release_slot();
                tracing::warn!(limit, "Ingest queue full, rejecting task");
                return Err(Error::QueueFull { limit });
            }
        }
        metrics::QUEUE_DEPTH.set((previous + 1) as i64);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (reply, receiver) = oneshot::channel();
        let task = WriteTask {
            id,
            identifier,
            payload,
            nested_path,
            accepted_at: Instant::now(),
        };

        tracing::debug!(task_id = id, identifier = %task.identifier, "Task accepted");

        if self.sender.send(QueuedTask { task, reply }).is_err() {
            self.counters.release_slot();
            return Err(Error::QueueClosed);
        }
        self.counters.accepted.fetch_add(1, Ordering::SeqCst);

        Ok(TaskTicket {
            task_id: id,
            receiver,
        })
    }

    /// Pending plus running tasks.
    pub fn depth(&self) -> usize {
        self.counters.depth.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        let depth = self.counters.depth.load(Ordering::SeqCst);
        let running = self.counters.running.load(Ordering::SeqCst);
        QueueStats {
            pending: depth.saturating_sub(running),
            running,
            accepted: self.counters.accepted.load(Ordering::SeqCst),
            succeeded: self.counters.succeeded.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            retries: self.counters.retries.load(Ordering::SeqCst),
            dropped: self.counters.dropped.load(Ordering::SeqCst),
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Start the background depth monitor.
    ///
    /// Samples depth every `monitor_interval`, publishes it as a gauge, and
    /// warns above `depth_warning_ratio * nominal_capacity`. Exits once the
    /// queue stops accepting.
    pub fn spawn_depth_monitor(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.monitor_interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if !self.is_accepting() {
                    break;
                }

                let depth = self.depth();
                metrics::QUEUE_DEPTH.set(depth as i64);
                if depth > self.depth_warning_threshold {
                    tracing::warn!(
                        depth,
                        threshold = self.depth_warning_threshold,
                        "Ingest queue size warning"
                    );
                } else {
                    tracing::trace!(depth, "Ingest queue depth sample");
                }
            }
        })
    }

    /// Stop accepting, finish the running task, drop the pending ones.
    ///
    /// Idempotent; later calls return once the worker has exited.
    pub async fn shutdown(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            tracing::info!(depth = self.depth(), "Shutting down ingest queue");
        }
        let _ = self.shutdown_tx.send(true);

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Ingest worker terminated abnormally");
            }
            tracing::info!("Ingest queue shutdown complete");
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<QueuedTask>,
    handler: Arc<dyn TaskHandler>,
    counters: Arc<Counters>,
    settings: WorkerSettings,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let queued = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            next = receiver.recv() => match next {
                Some(queued) => queued,
                None => break,
            },
        };

        counters.running.store(1, Ordering::SeqCst);
        let result = execute(handler.as_ref(), &queued.task, settings, &counters).await;
        record_outcome(&queued.task, &result, &counters);
        counters.running.store(0, Ordering::SeqCst);
        counters.release_slot();

        if queued.reply.send(result).is_err() {
            tracing::debug!(task_id = queued.task.id, "Caller went away before completion");
        }

        if !settings.task_pacing.is_zero() {
            time::sleep(settings.task_pacing).await;
        }
    }

    // Nothing new can arrive once the receiver is closed
    receiver.close();
    let mut dropped = 0u64;
    while let Ok(queued) = receiver.try_recv() {
        dropped += 1;
        counters.release_slot();
        let _ = queued.reply.send(Err(Error::QueueClosed));
    }
    if dropped > 0 {
        counters.dropped.fetch_add(dropped, Ordering::SeqCst);
        metrics::INGEST_FAILURES_TOTAL
            .with_label_values(&["queue_closed"])
            .inc_by(dropped);
        tracing::warn!(dropped, "Dropped pending tasks at shutdown");
    }
}

async fn execute(
    handler: &dyn TaskHandler,
    task: &WriteTask,
    settings: WorkerSettings,
    counters: &Counters,
) -> Result<TaskCompletion> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;

        // Dropping a timed-out attempt does not cancel `tokio::fs` work already
        // handed to the blocking pool. An abandoned append may still land
        // after the next attempt or task has started.
        let result = match time::timeout(settings.task_timeout, handler.handle(task)).await {
            Ok(result) => result,
            Err(_) => Err(Error::TaskTimeout {
                timeout_ms: settings.task_timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(destination) => {
                return Ok(TaskCompletion {
                    task_id: task.id,
                    destination,
                    attempts: attempt,
                })
            }
            Err(e) if e.is_retryable() && attempt < settings.max_attempts => {
                counters.retries.fetch_add(1, Ordering::SeqCst);
                metrics::INGEST_RETRIES_TOTAL.inc();
                tracing::warn!(
                    task_id = task.id,
                    identifier = %task.identifier,
                    attempt,
                    max_attempts = settings.max_attempts,
                    error = %e,
                    "Write attempt failed, retrying"
                );
                time::sleep(settings.retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn record_outcome(task: &WriteTask, result: &Result<TaskCompletion>, counters: &Counters) {
    let elapsed = task.accepted_at.elapsed().as_secs_f64();
    metrics::INGEST_TASK_SECONDS.observe(elapsed);

    match result {
        Ok(completion) => {
            counters.succeeded.fetch_add(1, Ordering::SeqCst);
            metrics::INGEST_TASKS_TOTAL
                .with_label_values(&["succeeded"])
                .inc();
            tracing::debug!(
                task_id = task.id,
                destination = %completion.destination.display(),
                attempts = completion.attempts,
                "Task succeeded"
            );
        }
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            metrics::INGEST_TASKS_TOTAL
                .with_label_values(&["failed"])
                .inc();
            metrics::INGEST_FAILURES_TOTAL
                .with_label_values(&[e.kind()])
                .inc();
            if matches!(e, Error::PathEscape { .. }) {
                tracing::error!(
                    task_id = task.id,
                    identifier = %task.identifier,
                    nested_path = ?task.nested_path,
                    error = %e,
                    security = true,
                    "Rejected write outside storage root"
                );
            } else {
                tracing::error!(
                    task_id = task.id,
                    identifier = %task.identifier,
                    kind = e.kind(),
                    error = %e,
                    "Task failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Records the order in which tasks ran.
    #[derive(Default)]
    struct RecordingHandler {
        seen: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl TaskHandler for RecordingHandler {
        async fn handle(&self, task: &WriteTask) -> Result<PathBuf> {
            self.seen.lock().unwrap().push(task.identifier.clone());
            Ok(PathBuf::from("/virtual").join(&task.identifier))
        }
    }

    fn fast_config() -> IngestConfig {
        IngestConfig {
            retry_delay_ms: 1,
            task_pacing_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_complete() {
        let handler = Arc::new(RecordingHandler::default());
        let queue = IngestQueue::start(&fast_config(), handler.clone());

        let ticket = queue.enqueue("a".into(), "x".into(), None).unwrap();
        let id = ticket.task_id();
        let completion = ticket.wait().await.unwrap();

        assert_eq!(completion.task_id, id);
        assert_eq!(completion.destination, PathBuf::from("/virtual/a"));
        assert_eq!(completion.attempts, 1);

        let stats = queue.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.pending + stats.running, 0);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_task_ids_are_monotonic() {
        let queue = IngestQueue::start(&fast_config(), Arc::new(RecordingHandler::default()));
        let first = queue.enqueue("a".into(), "x".into(), None).unwrap();
        let second = queue.enqueue("b".into(), "x".into(), None).unwrap();
        assert!(second.task_id() > first.task_id());
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_rejected() {
        let queue = IngestQueue::start(&fast_config(), Arc::new(RecordingHandler::default()));
        queue.shutdown().await;

        let err = queue.enqueue("a".into(), "x".into(), None).unwrap_err();
        assert!(matches!(err, Error::QueueClosed));
        assert!(!queue.is_accepting());

        // Second shutdown is a no-op
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_admission_limit() {
        struct Blocking(tokio::sync::Notify);

        #[async_trait]
        impl TaskHandler for Blocking {
            async fn handle(&self, _task: &WriteTask) -> Result<PathBuf> {
                self.0.notified().await;
                Ok(PathBuf::from("/virtual"))
            }
        }

        let handler = Arc::new(Blocking(tokio::sync::Notify::new()));
        let config = IngestConfig {
            admission_limit: Some(2),
            ..fast_config()
        };
        let queue = IngestQueue::start(&config, handler.clone());

        let first = queue.enqueue("a".into(), "x".into(), None).unwrap();
        let second = queue.enqueue("b".into(), "x".into(), None).unwrap();
        let err = queue.enqueue("c".into(), "x".into(), None).unwrap_err();
        assert!(matches!(err, Error::QueueFull { limit: 2 }));
        assert_eq!(queue.depth(), 2);

        handler.0.notify_one();
        first.wait().await.unwrap();
        handler.0.notify_one();
        second.wait().await.unwrap();
        assert_eq!(queue.depth(), 0);

        queue.shutdown().await;
    }
}

//! Log Append Service
//!
//! This module implements `LogService`, the only entry point surrounding
//! layers call. It turns one queue task's full lifecycle, retries included,
//! into a single awaited result.
//!
//! ## Lifecycle
//!
//! ```text
//! LogService::new(config)          validate config
//!        │
//!        ▼
//! initialize_storage_roots()       create missing roots (idempotent)
//!        │
//!        ▼
//! start()                          spawn worker + depth monitor
//!        │
//!        ▼
//! submit(id, payload, nested)*     one call == one WriteTask
//!        │
//!        ▼
//! shutdown()                       finish running task, drop pending
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use loghouse_storage::{IngestConfig, LogService};
//!
//! let service = LogService::new(IngestConfig::from_env()?)?;
//! service.initialize_storage_roots().await?;
//! service.start()?;
//!
//! let receipt = service.submit("req-1", "hello", None).await?;
//! println!("appended to {}", receipt.destination.display());
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::task::JoinHandle;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::queue::{DiskWriter, IngestQueue, QueueStats, TaskHandler};

/// Success descriptor for one submitted append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    pub task_id: u64,
    /// File the payload was appended to
    pub destination: PathBuf,
    pub attempts: u32,
}

/// Facade over the ingest queue.
pub struct LogService {
    config: IngestConfig,
    handler: Arc<dyn TaskHandler>,
    /// Present only when backed by the disk writer
    disk: Option<Arc<DiskWriter>>,
    roots_ready: AtomicBool,
    queue: OnceLock<Arc<IngestQueue>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl LogService {
    /// Disk-backed service. Storage roots must be initialized before `start`.
    pub fn new(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        let disk = Arc::new(DiskWriter::from_config(&config));
        Ok(Self {
            handler: disk.clone(),
            disk: Some(disk),
            config,
            roots_ready: AtomicBool::new(false),
            queue: OnceLock::new(),
            monitor: Mutex::new(None),
        })
    }

    /// Service with a custom task handler, e.g. for fault injection.
    pub fn with_handler(config: IngestConfig, handler: Arc<dyn TaskHandler>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            handler,
            disk: None,
            roots_ready: AtomicBool::new(true),
            queue: OnceLock::new(),
            monitor: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Create missing storage root directories.
    pub async fn initialize_storage_roots(&self) -> Result<()> {
        if let Some(disk) = &self.disk {
            disk.roots().initialize().await?;
        }
        self.roots_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Start the worker and the depth monitor. Calling twice is a no-op.
    pub fn start(&self) -> Result<()> {
        if !self.roots_ready.load(Ordering::SeqCst) {
            return Err(Error::StorageUnavailable(
                "storage roots have not been initialized".into(),
            ));
        }
        if self.queue.get().is_some() {
            return Ok(());
        }

        let queue = Arc::new(IngestQueue::start(&self.config, Arc::clone(&self.handler)));
        if self.queue.set(Arc::clone(&queue)).is_err() {
            // Lost a concurrent start; the winner owns the worker
            tokio::spawn(async move { queue.shutdown().await });
            return Ok(());
        }

        let monitor = Arc::clone(&queue).spawn_depth_monitor();
        if let Ok(mut slot) = self.monitor.lock() {
            *slot = Some(monitor);
        }
        Ok(())
    }

    /// Append `payload` to the file for `identifier`, optionally under
    /// `nested_path`, and wait for the outcome.
    ///
    /// Resolves with the destination once written, or with the task's
    /// terminal error. Fails with `QueueClosed` if the service is not
    /// running.
    pub async fn submit(
        &self,
        identifier: impl Into<String>,
        payload: impl Into<String>,
        nested_path: Option<String>,
    ) -> Result<AppendReceipt> {
        let queue = self.queue.get().ok_or(Error::QueueClosed)?;
        let ticket = queue.enqueue(identifier.into(), payload.into(), nested_path)?;
        let completion = ticket.wait().await?;
        Ok(AppendReceipt {
            task_id: completion.task_id,
            destination: completion.destination,
            attempts: completion.attempts,
        })
    }

    /// Pending plus running tasks.
    pub fn queue_depth(&self) -> usize {
        self.queue.get().map(|q| q.depth()).unwrap_or(0)
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.get().map(|q| q.stats()).unwrap_or_default()
    }

    pub fn is_accepting(&self) -> bool {
        self.queue.get().map(|q| q.is_accepting()).unwrap_or(false)
    }

    /// Drain and stop. The running task finishes; pending tasks fail with
    /// `QueueClosed`.
    pub async fn shutdown(&self) {
        if let Some(queue) = self.queue.get() {
            queue.shutdown().await;
        }
        let monitor = self.monitor.lock().ok().and_then(|mut slot| slot.take());
        if let Some(monitor) = monitor {
            monitor.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_for(root: &std::path::Path) -> IngestConfig {
        IngestConfig {
            storage_roots: vec![root.join("primary")],
            default_root: root.join("fallback"),
            min_free_bytes: 0,
            retry_delay_ms: 1,
            task_pacing_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_requires_initialized_roots() {
        let temp = TempDir::new().unwrap();
        let service = LogService::new(config_for(temp.path())).unwrap();

        assert!(matches!(
            service.start(),
            Err(Error::StorageUnavailable(_))
        ));

        service.initialize_storage_roots().await.unwrap();
        service.start().unwrap();
        service.start().unwrap();
        assert!(service.is_accepting());
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_before_start_is_closed() {
        let temp = TempDir::new().unwrap();
        let service = LogService::new(config_for(temp.path())).unwrap();
        let err = service.submit("req-1", "x", None).await.unwrap_err();
        assert!(matches!(err, Error::QueueClosed));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = IngestConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(LogService::new(config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_submit_writes_under_nested_path() {
        let temp = TempDir::new().unwrap();
        let service = LogService::new(config_for(temp.path())).unwrap();
        service.initialize_storage_roots().await.unwrap();
        service.start().unwrap();

        let receipt = service
            .submit("dev-7", "boot ok", Some("site/rack-2".to_string()))
            .await
            .unwrap();

        let expected = temp.path().join("primary/site/rack-2/dev-7");
        assert_eq!(receipt.destination, expected);
        assert_eq!(receipt.attempts, 1);
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "boot ok\n");

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_sanitizes_identifier() {
        let temp = TempDir::new().unwrap();
        let service = LogService::new(config_for(temp.path())).unwrap();
        service.initialize_storage_roots().await.unwrap();
        service.start().unwrap();

        let receipt = service.submit("../../evil id", "x", None).await.unwrap();
        assert_eq!(receipt.destination, temp.path().join("primary/evilid"));

        let err = service.submit("../..", "x", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));

        service.shutdown().await;
    }
}

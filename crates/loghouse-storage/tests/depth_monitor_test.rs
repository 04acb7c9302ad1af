//! Queue depth monitor, on a paused clock.
//!
//! Kept in its own test binary: `QUEUE_DEPTH` is a process-wide gauge.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use loghouse_observability::metrics::QUEUE_DEPTH;
use loghouse_storage::{IngestConfig, IngestQueue, Result, TaskHandler, WriteTask};

/// Holds the first task until released.
#[derive(Default)]
struct GatedHandler {
    started: Notify,
    release: Notify,
    calls: AtomicU32,
}

#[async_trait]
impl TaskHandler for GatedHandler {
    async fn handle(&self, task: &WriteTask) -> Result<PathBuf> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            self.release.notified().await;
        }
        Ok(PathBuf::from(&task.identifier))
    }
}

#[tokio::test(start_paused = true)]
async fn test_monitor_samples_depth_and_stops_after_shutdown() {
    let handler = Arc::new(GatedHandler::default());
    let config = IngestConfig {
        nominal_capacity: 2,
        monitor_interval_secs: 1,
        task_pacing_ms: 0,
        ..Default::default()
    };
    assert_eq!(config.depth_warning_threshold(), 1);

    let queue = Arc::new(IngestQueue::start(&config, handler.clone()));
    let mut tickets = Vec::new();
    tickets.push(queue.enqueue("a".into(), "x".into(), None).unwrap());
    handler.started.notified().await;
    tickets.push(queue.enqueue("b".into(), "x".into(), None).unwrap());
    tickets.push(queue.enqueue("c".into(), "x".into(), None).unwrap());

    // Only the monitor can put the depth back
    QUEUE_DEPTH.set(0);
    let monitor = Arc::clone(&queue).spawn_depth_monitor();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(QUEUE_DEPTH.get(), 3);
    assert!(queue.depth() > config.depth_warning_threshold());

    handler.release.notify_one();
    for ticket in tickets {
        ticket.wait().await.unwrap();
    }
    queue.shutdown().await;

    tokio::time::timeout(Duration::from_secs(5), monitor)
        .await
        .expect("monitor exits once the queue stops accepting")
        .unwrap();
    assert_eq!(QUEUE_DEPTH.get(), 0);
}

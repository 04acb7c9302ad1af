//! End-to-end appends through `LogService` against a real filesystem.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use loghouse_storage::{Error, IngestConfig, LogService};

fn config_for(root: &Path) -> IngestConfig {
    IngestConfig {
        storage_roots: vec![root.join("primary")],
        default_root: root.join("fallback"),
        min_free_bytes: 0,
        retry_delay_ms: 1,
        task_pacing_ms: 0,
        ..Default::default()
    }
}

async fn started(config: IngestConfig) -> LogService {
    let service = LogService::new(config).unwrap();
    service.initialize_storage_roots().await.unwrap();
    service.start().unwrap();
    service
}

#[tokio::test]
async fn test_lines_append_in_submission_order() {
    let temp = TempDir::new().unwrap();
    let service = started(config_for(temp.path())).await;

    let first = service.submit("req-1", "hello", None).await.unwrap();
    let second = service.submit("req-1", "world", None).await.unwrap();

    assert_eq!(first.destination, temp.path().join("primary/req-1"));
    assert_eq!(first.destination, second.destination);
    assert!(first.task_id < second.task_id);
    assert_eq!(
        fs::read_to_string(&first.destination).unwrap(),
        "hello\nworld\n"
    );

    service.shutdown().await;
}

#[tokio::test]
async fn test_roots_are_created_on_initialize() {
    let temp = TempDir::new().unwrap();
    let service = LogService::new(config_for(temp.path())).unwrap();

    service.initialize_storage_roots().await.unwrap();
    service.initialize_storage_roots().await.unwrap();

    assert!(temp.path().join("primary").is_dir());
    assert!(temp.path().join("fallback").is_dir());
}

#[tokio::test]
async fn test_falls_back_to_default_root_without_free_space() {
    let temp = TempDir::new().unwrap();
    let config = IngestConfig {
        min_free_bytes: u64::MAX,
        ..config_for(temp.path())
    };
    let service = started(config).await;

    let receipt = service.submit("req-2", "line", None).await.unwrap();
    assert_eq!(receipt.destination, temp.path().join("fallback/req-2"));

    service.shutdown().await;
}

#[tokio::test]
async fn test_traversal_in_nested_path_stays_under_root() {
    let temp = TempDir::new().unwrap();
    let service = started(config_for(temp.path())).await;

    let receipt = service
        .submit("req-3", "line", Some("../../outside//logs".to_string()))
        .await
        .unwrap();

    assert_eq!(
        receipt.destination,
        temp.path().join("primary/outside/logs/req-3")
    );
    assert!(!temp.path().join("outside").exists());

    service.shutdown().await;
}

#[tokio::test]
async fn test_size_ceiling_rejects_once_reached() {
    let temp = TempDir::new().unwrap();
    let config = IngestConfig {
        max_file_bytes: 8,
        ..config_for(temp.path())
    };
    let service = started(config).await;

    // 6 bytes, then 12: the second append starts under the ceiling
    service.submit("capped", "12345", None).await.unwrap();
    service.submit("capped", "abcde", None).await.unwrap();

    let err = service.submit("capped", "more", None).await.unwrap_err();
    assert!(matches!(err, Error::FileSizeExceeded { size: 12, limit: 8, .. }));
    assert_eq!(
        fs::read_to_string(temp.path().join("primary/capped")).unwrap(),
        "12345\nabcde\n"
    );

    // Other files are unaffected
    service.submit("other", "ok", None).await.unwrap();

    service.shutdown().await;
}

#[tokio::test]
async fn test_missing_root_is_unavailable_and_not_retried() {
    let temp = TempDir::new().unwrap();
    let config = IngestConfig {
        min_free_bytes: u64::MAX,
        ..config_for(temp.path())
    };
    let service = started(config).await;
    fs::remove_dir(temp.path().join("fallback")).unwrap();

    let err = service.submit("req-4", "line", None).await.unwrap_err();
    assert!(matches!(err, Error::StorageUnavailable(_)));
    assert_eq!(service.queue_stats().retries, 0);

    service.shutdown().await;
}

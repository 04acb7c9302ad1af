//! Line appender with a pre-write size ceiling.
//!
//! The size check and the append are two separate filesystem operations.
//! They are race-free only because the ingest queue never runs two tasks at
//! once; nothing here locks the file.

use std::io;
use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Append `payload` plus a newline to `path`, creating the file if needed.
///
/// Fails with `FileSizeExceeded` when the file already exceeds `max_bytes`.
/// A file sitting exactly at the ceiling still accepts one more line. The
/// ceiling is checked before writing, so the append that crosses it
/// succeeds and the *next* one fails. Returns the number of
/// bytes written.
pub async fn append_line(path: &Path, payload: &str, max_bytes: u64) -> Result<u64> {
    let size = current_size(path).await?;
    if size > max_bytes {
        return Err(Error::FileSizeExceeded {
            path: path.to_path_buf(),
            size,
            limit: max_bytes,
        });
    }

    let mut line = String::with_capacity(payload.len() + 1);
    line.push_str(payload);
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| Error::io(path, e))?;
    file.flush().await.map_err(|e| Error::io(path, e))?;

    Ok(line.len() as u64)
}

async fn current_size(path: &Path) -> Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(Error::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_creates_and_appends() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("req-1");

        assert_eq!(append_line(&path, "hello", 1024).await.unwrap(), 6);
        append_line(&path, "world", 1024).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_ceiling_checked_before_write() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big");
        let limit = 64;
        std::fs::write(&path, vec![b'x'; (limit - 1) as usize]).unwrap();

        // One byte under the ceiling: accepted, and pushes the file over it
        append_line(&path, "tail", limit).await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), limit - 1 + 5);

        // Next call is refused and the file is left alone
        match append_line(&path, "more", limit).await {
            Err(Error::FileSizeExceeded { size, limit: l, .. }) => {
                assert_eq!(size, limit + 4);
                assert_eq!(l, limit);
            }
            other => panic!("expected FileSizeExceeded, got {other:?}"),
        }
        assert_eq!(std::fs::metadata(&path).unwrap().len(), limit + 4);
    }

    #[tokio::test]
    async fn test_file_exactly_at_ceiling_is_accepted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("full");
        std::fs::write(&path, vec![b'x'; 32]).unwrap();

        append_line(&path, "x", 32).await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 34);

        let err = append_line(&path, "x", 32).await.unwrap_err();
        assert!(matches!(err, Error::FileSizeExceeded { size: 34, .. }));
    }

    #[tokio::test]
    async fn test_missing_parent_is_transient() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("no-such-dir").join("file");

        let err = append_line(&path, "x", 1024).await.unwrap_err();
        assert!(err.is_retryable());
    }
}

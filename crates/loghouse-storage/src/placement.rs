//! Storage Placement
//!
//! This module decides *where* a write lands: which storage root receives it,
//! and which directory under that root.
//!
//! ## Root Selection
//!
//! ```text
//! storage_roots = [A, B, C]      default_root = D
//!
//!   A: statvfs -> 5MB free        skip (below threshold)
//!   B: statvfs -> EACCES          skip (logged, not fatal)
//!   C: statvfs -> 500MB free      ◄── selected
//!
//!   nothing qualified?            ──► D, unconditionally
//! ```
//!
//! Free space is read on demand for every task on the blocking pool, never
//! cached and never retried. The default root absorbs overflow when every candidate looks
//! full; operators are expected to watch it.
//!
//! ## Nested Directories
//!
//! A sanitized nested fragment is joined onto the selected root and
//! normalized lexically (`.`, `..` and repeated separators resolved). The
//! result must stay inside the root, otherwise the task fails with
//! `PathEscape`. The check is never "fixed up" by clamping.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::IngestConfig;
use crate::error::{Error, Result};

/// Source of free-space figures for a filesystem path.
pub trait SpaceProbe: Send + Sync {
    /// Bytes available to unprivileged writers on the filesystem holding `path`.
    fn available_space(&self, path: &Path) -> io::Result<u64>;
}

/// `statvfs`-backed probe.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSpaceProbe;

impl SpaceProbe for FsSpaceProbe {
    fn available_space(&self, path: &Path) -> io::Result<u64> {
        fs2::available_space(path)
    }
}

/// Outcome of a root selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSelection {
    pub root: PathBuf,
    /// `true` when no candidate qualified and the default root was used
    pub fallback: bool,
}

/// The configured set of storage roots.
pub struct StorageRoots {
    roots: Vec<PathBuf>,
    default_root: PathBuf,
    min_free_bytes: u64,
    probe: Arc<dyn SpaceProbe>,
}

impl std::fmt::Debug for StorageRoots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageRoots")
            .field("roots", &self.roots)
            .field("default_root", &self.default_root)
            .field("min_free_bytes", &self.min_free_bytes)
            .finish_non_exhaustive()
    }
}

impl StorageRoots {
    pub fn new(
        roots: Vec<PathBuf>,
        default_root: PathBuf,
        min_free_bytes: u64,
        probe: Arc<dyn SpaceProbe>,
    ) -> Self {
        Self {
            roots,
            default_root,
            min_free_bytes,
            probe,
        }
    }

    /// Roots from config with the `statvfs` probe.
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            config.storage_roots.clone(),
            config.default_root.clone(),
            config.min_free_bytes,
            Arc::new(FsSpaceProbe),
        )
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn default_root(&self) -> &Path {
        &self.default_root
    }

    /// Create every candidate root and the default root if missing.
    ///
    /// Idempotent. A candidate that cannot be created is logged and left
    /// for the selector to skip; the default root must succeed because it
    /// is the fallback of last resort.
    pub async fn initialize(&self) -> Result<()> {
        for root in &self.roots {
            if let Err(e) = ensure_root_dir(root).await {
                tracing::error!(
                    root = %root.display(),
                    error = %e,
                    "Failed to initialize storage root"
                );
            }
        }

        ensure_root_dir(&self.default_root).await?;

        tracing::info!(
            roots = self.roots.len(),
            default_root = %self.default_root.display(),
            "Storage roots initialized"
        );
        Ok(())
    }

    /// Pick the first candidate with more than `min_free_bytes` available,
    /// or the default root if none qualifies.
    pub fn select_root(&self) -> RootSelection {
        for root in &self.roots {
            match self.probe.available_space(root) {
                Ok(available) if available > self.min_free_bytes => {
                    tracing::trace!(
                        root = %root.display(),
                        available,
                        "Selected storage root"
                    );
                    loghouse_observability::metrics::ROOT_SELECTIONS_TOTAL
                        .with_label_values(&["candidate"])
                        .inc();
                    return RootSelection {
                        root: root.clone(),
                        fallback: false,
                    };
                }
                Ok(available) => {
                    tracing::debug!(
                        root = %root.display(),
                        available,
                        required = self.min_free_bytes,
                        "Storage root below free-space threshold"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        root = %root.display(),
                        error = %e,
                        "Storage root not accessible, skipping"
                    );
                }
            }
        }

        tracing::warn!(
            default_root = %self.default_root.display(),
            "No storage root has enough free space, using default root"
        );
        loghouse_observability::metrics::ROOT_SELECTIONS_TOTAL
            .with_label_values(&["fallback"])
            .inc();
        RootSelection {
            root: self.default_root.clone(),
            fallback: true,
        }
    }

    /// [`StorageRoots::select_root`] on the blocking pool, since the probe
    /// issues a `statvfs` per candidate.
    pub async fn select_root_blocking(self: Arc<Self>) -> Result<RootSelection> {
        tokio::task::spawn_blocking(move || self.select_root())
            .await
            .map_err(|e| Error::StorageUnavailable(format!("root selection failed: {e}")))
    }
}

/// Fail with `StorageUnavailable` unless `root` is an existing directory.
pub async fn verify_root(root: &Path) -> Result<()> {
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::StorageUnavailable(format!(
            "{} is not a directory",
            root.display()
        ))),
        Err(e) => Err(Error::StorageUnavailable(format!(
            "{}: {}",
            root.display(),
            e
        ))),
    }
}

async fn ensure_root_dir(root: &Path) -> Result<()> {
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::StorageUnavailable(format!(
            "{} exists and is not a directory",
            root.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(root = %root.display(), "Creating storage root");
            create_dir_all(root).await
        }
        Err(e) => Err(Error::io(root, e)),
    }
}

async fn create_dir_all(path: &Path) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(path).await.map_err(|e| Error::io(path, e))
}

/// Resolve `.` and `..` without touching the filesystem.
///
/// `..` directly under the filesystem root is dropped, matching how
/// `/../x` refers to `/x`. Leading `..` of a relative path is kept.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Join `fragment` onto `root` and normalize, failing with `PathEscape`
/// when the result is not `root` or below it. Relative roots are anchored
/// at the current working directory.
pub fn join_nested(root: &Path, fragment: &str) -> Result<PathBuf> {
    let anchored = if root.is_absolute() {
        root.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|e| Error::io(root, e))?;
        cwd.join(root)
    };
    let base = normalize_lexically(&anchored);

    let mut joined = base.clone();
    for segment in fragment.split('/').filter(|s| !s.is_empty()) {
        joined.push(segment);
    }
    let candidate = normalize_lexically(&joined);

    if !candidate.starts_with(&base) {
        tracing::error!(
            root = %base.display(),
            fragment = %fragment,
            resolved = %candidate.display(),
            "Nested path escapes storage root"
        );
        return Err(Error::PathEscape {
            root: base,
            path: candidate,
        });
    }
    Ok(candidate)
}

/// Resolve a nested directory under `root` and create it if absent.
///
/// Returns the absolute directory path. An empty fragment resolves to the
/// root itself.
pub async fn resolve_nested_dir(root: &Path, fragment: &str) -> Result<PathBuf> {
    let dir = join_nested(root, fragment)?;
    create_dir_all(&dir).await?;
    Ok(dir)
}

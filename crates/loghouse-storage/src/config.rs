//! Ingest Configuration
//!
//! This module defines the single configuration structure for the write path.
//! It is read once at startup and never re-read.
//!
//! ## IngestConfig
//!
//! - **storage_roots**: Candidate roots, tried in order (default: `api-logs`)
//! - **default_root**: Fallback root when no candidate has enough space (default: `api-logs`)
//! - **min_free_bytes**: Free space a candidate must exceed (default: 100MB)
//! - **max_file_bytes**: Size ceiling checked before each append (default: 10MB)
//! - **max_attempts**: Total attempts for transient failures (default: 3)
//! - **retry_delay_ms**: Fixed delay between attempts (default: 1s)
//! - **task_timeout_ms**: Per-attempt execution ceiling (default: 30s)
//! - **task_pacing_ms**: Delay between one task finishing and the next starting (default: 50ms)
//! - **nominal_capacity**: Queue size the depth monitor measures against (default: 1000)
//! - **admission_limit**: Optional hard cap on pending + running tasks (default: unbounded)
//!
//! ## Usage
//!
//! ```ignore
//! use loghouse_storage::IngestConfig;
//!
//! // From environment (STORAGE_PATHS, DEFAULT_STORAGE_PATH, LOGHOUSE_*)
//! let config = IngestConfig::from_env()?;
//! config.validate()?;
//!
//! // Explicit, e.g. in tests
//! let config = IngestConfig {
//!     storage_roots: vec!["/mnt/disk1/logs".into(), "/mnt/disk2/logs".into()],
//!     default_root: "/var/lib/loghouse".into(),
//!     retry_delay_ms: 10,
//!     ..Default::default()
//! };
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Candidate storage roots in priority order
    #[serde(default = "default_storage_roots")]
    pub storage_roots: Vec<PathBuf>,

    /// Root used when every candidate is low on space or unreadable
    #[serde(default = "default_root")]
    pub default_root: PathBuf,

    /// Minimum free space in bytes for a candidate root (default: 100MB)
    #[serde(default = "default_min_free_bytes")]
    pub min_free_bytes: u64,

    /// Per-file size ceiling in bytes (default: 10MB)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Total attempts per task, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds (default: 1s)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Ceiling for a single attempt in milliseconds (default: 30s)
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// Pause between consecutive tasks in milliseconds (default: 50ms)
    #[serde(default = "default_task_pacing_ms")]
    pub task_pacing_ms: u64,

    /// Nominal queue size used by the depth monitor (default: 1000)
    #[serde(default = "default_nominal_capacity")]
    pub nominal_capacity: usize,

    /// Fraction of `nominal_capacity` above which the monitor warns (default: 0.9)
    #[serde(default = "default_depth_warning_ratio")]
    pub depth_warning_ratio: f64,

    /// Depth monitor sampling interval in seconds (default: 60)
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,

    /// Hard cap on pending + running tasks. `None` accepts without limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_limit: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            storage_roots: default_storage_roots(),
            default_root: default_root(),
            min_free_bytes: default_min_free_bytes(),
            max_file_bytes: default_max_file_bytes(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            task_timeout_ms: default_task_timeout_ms(),
            task_pacing_ms: default_task_pacing_ms(),
            nominal_capacity: default_nominal_capacity(),
            depth_warning_ratio: default_depth_warning_ratio(),
            monitor_interval_secs: default_monitor_interval_secs(),
            admission_limit: None,
        }
    }
}

impl IngestConfig {
    /// Build a config from environment variables, falling back to defaults.
    ///
    /// ## Environment Variables
    ///
    /// - `STORAGE_PATHS`: Comma-separated candidate roots
    /// - `DEFAULT_STORAGE_PATH`: Fallback root
    /// - `LOGHOUSE_MIN_FREE_BYTES`, `LOGHOUSE_MAX_FILE_BYTES`
    /// - `LOGHOUSE_MAX_ATTEMPTS`, `LOGHOUSE_RETRY_DELAY_MS`
    /// - `LOGHOUSE_TASK_TIMEOUT_MS`, `LOGHOUSE_TASK_PACING_MS`
    /// - `LOGHOUSE_QUEUE_CAPACITY`, `LOGHOUSE_MONITOR_INTERVAL_SECS`
    /// - `LOGHOUSE_ADMISSION_LIMIT`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`IngestConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(paths) = lookup("STORAGE_PATHS") {
            config.storage_roots = paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        if let Some(root) = lookup("DEFAULT_STORAGE_PATH") {
            config.default_root = PathBuf::from(root.trim());
        }

        parse_into(&lookup, "LOGHOUSE_MIN_FREE_BYTES", &mut config.min_free_bytes)?;
        parse_into(&lookup, "LOGHOUSE_MAX_FILE_BYTES", &mut config.max_file_bytes)?;
        parse_into(&lookup, "LOGHOUSE_MAX_ATTEMPTS", &mut config.max_attempts)?;
        parse_into(&lookup, "LOGHOUSE_RETRY_DELAY_MS", &mut config.retry_delay_ms)?;
        parse_into(&lookup, "LOGHOUSE_TASK_TIMEOUT_MS", &mut config.task_timeout_ms)?;
        parse_into(&lookup, "LOGHOUSE_TASK_PACING_MS", &mut config.task_pacing_ms)?;
        parse_into(&lookup, "LOGHOUSE_QUEUE_CAPACITY", &mut config.nominal_capacity)?;
        parse_into(
            &lookup,
            "LOGHOUSE_MONITOR_INTERVAL_SECS",
            &mut config.monitor_interval_secs,
        )?;

        if let Some(raw) = lookup("LOGHOUSE_ADMISSION_LIMIT") {
            config.admission_limit = Some(parse_value("LOGHOUSE_ADMISSION_LIMIT", &raw)?);
        }

        Ok(config)
    }

    /// Check invariants once at startup.
    pub fn validate(&self) -> Result<()> {
        if self.storage_roots.is_empty() {
            return Err(Error::Config("at least one storage root is required".into()));
        }
        if self.default_root.as_os_str().is_empty() {
            return Err(Error::Config("default storage root must not be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".into()));
        }
        if self.max_file_bytes == 0 {
            return Err(Error::Config("max_file_bytes must be positive".into()));
        }
        if self.task_timeout_ms == 0 {
            return Err(Error::Config("task_timeout_ms must be positive".into()));
        }
        if !(self.depth_warning_ratio > 0.0 && self.depth_warning_ratio <= 1.0) {
            return Err(Error::Config(format!(
                "depth_warning_ratio must be in (0, 1], got {}",
                self.depth_warning_ratio
            )));
        }
        if self.monitor_interval_secs == 0 {
            return Err(Error::Config("monitor_interval_secs must be positive".into()));
        }
        if self.admission_limit == Some(0) {
            return Err(Error::Config("admission_limit must be at least 1".into()));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn task_pacing(&self) -> Duration {
        Duration::from_millis(self.task_pacing_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    /// Depth above which the monitor logs a warning.
    pub fn depth_warning_threshold(&self) -> usize {
        (self.nominal_capacity as f64 * self.depth_warning_ratio) as usize
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = parse_value(key, &raw)?;
    }
    Ok(())
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: cannot parse {raw:?}")))
}

fn default_storage_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("api-logs")]
}

fn default_root() -> PathBuf {
    PathBuf::from("api-logs")
}

fn default_min_free_bytes() -> u64 {
    100 * 1024 * 1024 // 100MB
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_task_timeout_ms() -> u64 {
    30_000
}

fn default_task_pacing_ms() -> u64 {
    50
}

fn default_nominal_capacity() -> usize {
    1000
}

fn default_depth_warning_ratio() -> f64 {
    0.9
}

fn default_monitor_interval_secs() -> u64 {
    60
}

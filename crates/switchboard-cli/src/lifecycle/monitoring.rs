//! Reads the worker's pid file and health snapshot.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use super::error::LifecycleError;

/// State reported in the worker's health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum WorkerStatus {
    /// Runtime files written; not yet accepting connections.
    Starting,
    /// Socket published and accepting connections.
    Ready,
    /// Shutdown in progress.
    Stopping,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
        })
    }
}

/// Contents of `switchboardd.health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct HealthSnapshot {
    pub(crate) status: WorkerStatus,
    pub(crate) pid: u32,
    /// Seconds since the Unix epoch when the snapshot was written.
    pub(crate) timestamp: u64,
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

/// Reads the health snapshot, returning `None` when the file is absent.
pub(crate) fn read_health(path: &Path) -> Result<Option<HealthSnapshot>, LifecycleError> {
    let Some(content) = read_optional(path).map_err(|source| LifecycleError::ReadHealth {
        path: path.to_path_buf(),
        source,
    })?
    else {
        return Ok(None);
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| LifecycleError::ParseHealth {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads the pid file, returning `None` when the file is absent or empty.
pub(crate) fn read_pid(path: &Path) -> Result<Option<u32>, LifecycleError> {
    let Some(content) = read_optional(path).map_err(|source| LifecycleError::ReadPid {
        path: path.to_path_buf(),
        source,
    })?
    else {
        return Ok(None);
    };
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|source| LifecycleError::ParsePid {
            path: path.to_path_buf(),
            source,
        })
}

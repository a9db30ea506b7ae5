//! Error types for worker lifecycle operations.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use switchboard_config::RuntimePathsError;
use thiserror::Error;

/// Errors raised while starting, stopping, or inspecting the worker.
#[derive(Debug, Error)]
pub(crate) enum LifecycleError {
    #[error("failed to check worker socket {endpoint}: {source}")]
    SocketCheck {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to open spawn lock {path:?}: {source}")]
    SpawnLockOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to acquire spawn lock {path:?}: {source}")]
    SpawnLockAcquire {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn worker binary {binary:?}: {source}")]
    LaunchWorker {
        binary: OsString,
        #[source]
        source: io::Error,
    },
    #[error("worker exited before listening (status: {exit_status:?})")]
    WorkerExited { exit_status: Option<i32> },
    #[error("failed to monitor worker launch: {source}")]
    MonitorWorker {
        #[source]
        source: io::Error,
    },
    #[error("timed out after {timeout_ms} ms waiting for the worker to listen on {endpoint}")]
    SpawnTimeout { endpoint: String, timeout_ms: u64 },
    #[error("failed to read health snapshot {path:?}: {source}")]
    ReadHealth {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse health snapshot {path:?}: {source}")]
    ParseHealth {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read pid file {path:?}: {source}")]
    ReadPid {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse pid file {path:?}: {source}")]
    ParsePid {
        path: PathBuf,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to signal worker pid {pid}: {source}")]
    SignalFailed {
        pid: u32,
        #[source]
        source: io::Error,
    },
    #[error("worker shutdown did not complete within {timeout_ms} ms; check {pid_path:?}")]
    ShutdownTimeout { pid_path: PathBuf, timeout_ms: u64 },
    #[error("failed to write lifecycle output: {0}")]
    Io(#[source] io::Error),
    #[error(transparent)]
    Paths(#[from] RuntimePathsError),
}

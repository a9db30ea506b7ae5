//! Error types for the client runtime.

use std::io;
use std::sync::Arc;

use switchboard_bus::RegistryError;
use switchboard_capabilities::ServicesError;
use switchboard_config::RuntimePathsError;
use thiserror::Error;

use crate::lifecycle::LifecycleError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("--data must be a JSON value: {0}")]
    InvalidData(#[source] serde_json::Error),
    #[error("failed to connect to worker at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("worker rejected the connection: {reason}")]
    Rejected { reason: String },
    #[error("worker closed the connection before authenticating")]
    ClosedBeforeAuthenticate,
    #[error("failed to read input: {0}")]
    ReadInput(#[source] io::Error),
    #[error("failed to send input to the worker: {0}")]
    SendRequest(#[source] io::Error),
    #[error("failed to read from the worker: {0}")]
    ReadResponse(#[source] io::Error),
    #[error("failed to parse worker reply: {0}")]
    ParseReply(#[source] serde_json::Error),
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] io::Error),
    #[error("input forwarding thread panicked")]
    InputThreadPanic,
    #[error(transparent)]
    Paths(#[from] RuntimePathsError),
    #[error("failed to assemble inline services: {0}")]
    Services(#[from] ServicesError),
    #[error("failed to build inline registry: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Returns `true` when a connect failure means nothing is listening.
///
/// A missing socket file or a refused connection both indicate the worker is
/// not running, including the window between its bind and rename.
pub(crate) fn is_daemon_not_running(error: &AppError) -> bool {
    match error {
        AppError::Connect { source, .. } => is_not_listening(source),
        _ => false,
    }
}

pub(crate) fn is_not_listening(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound | io::ErrorKind::AddrNotAvailable
    )
}

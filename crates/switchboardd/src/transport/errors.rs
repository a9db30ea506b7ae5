//! Error types for socket listener operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while binding, publishing, or running the listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// A leftover staging socket could not be removed.
    #[error("failed to remove stale socket '{path}': {source}")]
    StaleCleanup {
        /// Socket path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Binding the staging socket failed.
    #[error("failed to bind unix listener at '{path}': {source}")]
    Bind {
        /// Socket path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Restricting the socket's permissions failed.
    #[error("failed to restrict permissions on '{path}': {source}")]
    Permissions {
        /// Socket path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be spawned.
    #[error("failed to spawn the accept thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Renaming the staging socket onto the canonical path failed.
    #[error("failed to publish socket '{staging}' as '{socket}': {source}")]
    Publish {
        /// Staging path.
        staging: PathBuf,
        /// Canonical socket path.
        socket: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}

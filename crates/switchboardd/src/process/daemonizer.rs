//! Detaches the worker from the spawning client.

use std::ffi::OsStr;

use daemonize_me::Daemon;
use switchboard_config::RuntimePaths;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over daemonisation strategies.
pub trait Daemonizer: Send + Sync {
    /// Detaches the process into the background.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonizeError`] when the fork or session setup fails.
    fn daemonize(&self, paths: &RuntimePaths) -> Result<(), DaemonizeError>;
}

/// Errors surfaced by the daemonisation backend.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// System-level daemonisation failed.
    #[error("{0}")]
    System(#[from] daemonize_me::DaemonError),
}

/// Daemoniser that delegates to `daemonize-me`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDaemonizer;

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        info!(
            target: PROCESS_TARGET,
            runtime = %paths.runtime_dir().display(),
            "detaching worker"
        );
        Daemon::new()
            .work_dir(paths.runtime_dir())
            .name(OsStr::new(env!("CARGO_PKG_NAME")))
            .start()?;
        info!(target: PROCESS_TARGET, "worker detached; continuing in child");
        Ok(())
    }
}


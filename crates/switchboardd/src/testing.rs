//! In-process worker for integration tests.
//!
//! Runs the full launch sequence on a background thread in foreground mode,
//! with a [`Lifecycle`] subscription standing in for termination signals.

use std::os::unix::net::UnixStream;
use std::panic::resume_unwind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use switchboard_config::Config;

use crate::bootstrap::StaticConfigLoader;
use crate::health::StructuredHealthReporter;
use crate::lifecycle::Lifecycle;
use crate::process::LaunchError;
use crate::process::daemonizer::SystemDaemonizer;
use crate::process::launch::{
    LaunchMode, LaunchPlan, ProcessControl, ServiceDeps, run_worker_with,
};

const READY_POLL: Duration = Duration::from_millis(10);

/// Worker running on a thread of the current process.
#[derive(Debug)]
pub struct InProcessWorker {
    lifecycle: Lifecycle,
    socket: PathBuf,
    handle: Option<JoinHandle<Result<(), LaunchError>>>,
}

impl InProcessWorker {
    /// Starts a worker for `config` without waiting for it to listen.
    #[must_use]
    pub fn start(config: Config) -> Self {
        let lifecycle = Lifecycle::new();
        let socket = config.daemon_socket().path().as_std_path().to_path_buf();
        let plan = LaunchPlan {
            process: ProcessControl {
                mode: LaunchMode::Foreground,
                daemonizer: SystemDaemonizer,
                shutdown: lifecycle.subscribe(),
                lifecycle: lifecycle.clone(),
            },
            services: ServiceDeps {
                loader: StaticConfigLoader::new(config),
                reporter: Arc::new(StructuredHealthReporter::new()),
            },
        };
        let handle = thread::spawn(move || run_worker_with(plan));
        Self {
            lifecycle,
            socket,
            handle: Some(handle),
        }
    }

    /// Canonical socket path the worker publishes.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket
    }

    /// Polls until the socket accepts connections or `timeout` elapses.
    #[must_use]
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if UnixStream::connect(&self.socket).is_ok() {
                return true;
            }
            if self.handle.as_ref().is_none_or(JoinHandle::is_finished) {
                return false;
            }
            thread::sleep(READY_POLL);
        }
        false
    }

    /// Signals shutdown and waits for the launch sequence to finish.
    ///
    /// # Errors
    ///
    /// Returns the worker's [`LaunchError`]. A panic on the worker thread is
    /// resumed on the caller's.
    pub fn stop(mut self) -> Result<(), LaunchError> {
        self.lifecycle.signal();
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|panic| resume_unwind(panic)),
            None => Ok(()),
        }
    }
}

impl Drop for InProcessWorker {
    fn drop(&mut self) {
        self.lifecycle.signal();
        if let Some(handle) = self.handle.take() {
            drop(handle.join());
        }
    }
}

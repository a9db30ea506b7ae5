//! Supervises worker launch sequencing and runtime orchestration.

use std::env;
use std::sync::Arc;

use switchboard_config::RuntimePaths;
use tracing::info;

use crate::bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::lifecycle::Lifecycle;
use crate::transport::{BusConnectionHandler, SocketListener};

use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{FOREGROUND_ENV_VAR, PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// Launch mode for the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Remain attached to the terminal; used for debugging and tests.
    Foreground,
}

impl LaunchMode {
    fn detect() -> Self {
        if env::var_os(FOREGROUND_ENV_VAR).is_some() {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

/// Process-level collaborators controlling the worker lifecycle.
pub(crate) struct ProcessControl<D, S> {
    pub(crate) mode: LaunchMode,
    pub(crate) daemonizer: D,
    pub(crate) shutdown: S,
    pub(crate) lifecycle: Lifecycle,
}

/// Service dependencies required to construct the worker runtime.
pub(crate) struct ServiceDeps<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
}

/// Collaborators required to launch the worker runtime.
pub(crate) struct LaunchPlan<L, D, S> {
    pub(crate) process: ProcessControl<D, S>,
    pub(crate) services: ServiceDeps<L>,
}

/// Runs the worker using the production collaborators.
///
/// # Errors
///
/// Returns a [`LaunchError`] when any startup step fails or the shutdown
/// sequence cannot complete.
pub fn run_worker() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        process: ProcessControl {
            mode: LaunchMode::detect(),
            daemonizer: SystemDaemonizer,
            shutdown: SystemShutdownSignal::new(SHUTDOWN_TIMEOUT),
            lifecycle: Lifecycle::new(),
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
        },
    };
    run_worker_with(plan)
}

/// Runs the worker with injected collaborators.
pub(crate) fn run_worker_with<L, D, S>(plan: LaunchPlan<L, D, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    D: Daemonizer,
    S: ShutdownSignal,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        mode,
        daemonizer,
        shutdown,
        lifecycle,
    } = process;
    let ServiceDeps { loader, reporter } = services;

    info!(
        target: PROCESS_TARGET,
        ?mode,
        "starting worker runtime"
    );
    let config = loader.load()?;
    let paths = RuntimePaths::from_config(&config)?;
    if matches!(mode, LaunchMode::Background) {
        daemonizer.daemonize(&paths)?;
    }
    let mut guard = ProcessGuard::acquire(paths)?;
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;

    let worker = bootstrap_with(
        &StaticConfigLoader::new(config),
        reporter.as_ref(),
        guard.paths(),
    )?;
    let handler = Arc::new(BusConnectionHandler::new(worker.registry(), reporter));
    let listener = SocketListener::bind(guard.paths())?;
    let listener_handle = listener.start(handler, lifecycle)?;
    guard.write_health(HealthState::Ready)?;

    shutdown.wait()?;
    guard.write_health(HealthState::Stopping)?;
    listener_handle.shutdown();
    listener_handle.join()?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}

//! The switchboard worker.
//!
//! `switchboardd` is the long-lived half of the switchboard: it owns the
//! capability registry and serves it over a Unix socket to any number of
//! `switchboard` clients. The launch sequence is:
//!
//! 1. load configuration and derive the runtime directory;
//! 2. detach from the terminal unless `SWITCHBOARD_FOREGROUND` is set;
//! 3. take the instance lock, blocking while another worker holds it;
//! 4. write the pid file and a `starting` health snapshot;
//! 5. bootstrap telemetry, services, and the registry;
//! 6. bind the staging socket, start accepting, and rename it into place;
//! 7. report `ready` and wait for a termination signal.
//!
//! Connections must open with an `Authenticate` command. After that, each
//! line is routed in order and answered on the same connection.

mod bootstrap;
mod health;
mod lifecycle;
mod process;
mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
mod transport;

use std::io::Write;
use std::process::ExitCode;

pub use bootstrap::{
    BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, Worker, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use lifecycle::{Lifecycle, Subscription};
pub use process::daemonizer::{DaemonizeError, Daemonizer, SystemDaemonizer};
pub use process::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use process::{FOREGROUND_ENV_VAR, LaunchError, LaunchMode, run_worker};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

/// Runs the worker and maps the outcome to an exit code.
///
/// Startup failures are written to `stderr`; once detached, that stream is
/// no longer attached to anything.
pub fn run<E>(stderr: &mut E) -> ExitCode
where
    E: Write,
{
    match run_worker() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(stderr, "switchboardd: {error}"));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests;

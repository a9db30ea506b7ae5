//! Process supervision: instance locking, daemonisation, and the launch
//! sequence that ties bootstrap, the listener, and shutdown together.

use std::time::Duration;

pub(crate) mod daemonizer;
mod errors;
mod guard;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::{LaunchMode, run_worker};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable that keeps the worker attached to its terminal.
pub const FOREGROUND_ENV_VAR: &str = "SWITCHBOARD_FOREGROUND";

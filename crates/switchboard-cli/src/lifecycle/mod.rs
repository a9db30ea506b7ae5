//! Worker lifecycle management for the client.
//!
//! - [`spawning`] starts the worker on demand under the spawn lock.
//! - [`monitoring`] reads the pid file and health snapshot.
//! - [`shutdown`] signals the worker and waits for it to exit.
//! - [`controller`] implements the `daemon` subcommands.

mod controller;
mod error;
mod monitoring;
mod shutdown;
mod spawning;

pub(crate) use controller::handle;
pub(crate) use error::LifecycleError;
pub(crate) use spawning::{SpawnContext, connect_or_spawn};

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

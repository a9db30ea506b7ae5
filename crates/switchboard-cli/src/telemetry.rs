//! Diagnostics for the client itself.
//!
//! Stdout carries replies only, so client events go to stderr in compact
//! form. The subscriber is installed for the calling thread rather than
//! globally, which keeps the library usable alongside an in-process worker.

use std::io::{self, IsTerminal};

use switchboard_config::{Config, DEFAULT_LOG_FILTER};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Installs the client subscriber until the returned guard is dropped.
#[must_use = "dropping the guard uninstalls the subscriber"]
pub(crate) fn install(config: &Config) -> DefaultGuard {
    let filter = EnvFilter::try_new(config.log_filter())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .without_time()
        .compact()
        .finish();
    tracing::subscriber::set_default(subscriber)
}

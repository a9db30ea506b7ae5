//! Structured health reporting for worker lifecycle events.

use std::sync::Arc;

use switchboard_config::Config;

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer for bootstrap and connection lifecycle events.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked once the registry is built.
    fn bootstrap_succeeded(&self, config: &Config, capabilities: usize);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked when a connection completes the prologue.
    fn connection_opened(&self, connection: u64);

    /// Invoked when a connection is dropped before any routing.
    fn connection_rejected(&self, connection: u64, reason: &str);

    /// Invoked when a connection's input ends.
    fn connection_closed(&self, connection: u64, messages: usize);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config, capabilities: usize) {
        (**self).bootstrap_succeeded(config, capabilities);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn connection_opened(&self, connection: u64) {
        (**self).connection_opened(connection);
    }

    fn connection_rejected(&self, connection: u64, reason: &str) {
        (**self).connection_rejected(connection, reason);
    }

    fn connection_closed(&self, connection: u64, messages: usize) {
        (**self).connection_closed(connection, messages);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting worker bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config, capabilities: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            capabilities,
            "worker bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "worker bootstrap failed"
        );
    }

    fn connection_opened(&self, connection: u64) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "connection_opened",
            connection,
            "client authenticated"
        );
    }

    fn connection_rejected(&self, connection: u64, reason: &str) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "connection_rejected",
            connection,
            reason,
            "connection rejected"
        );
    }

    fn connection_closed(&self, connection: u64, messages: usize) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "connection_closed",
            connection,
            messages,
            "connection closed"
        );
    }
}

//! Worker bootstrap orchestration.
//!
//! Bootstrap turns configuration into a ready-to-serve [`Worker`]: it
//! installs telemetry, assembles the capability services, and freezes the
//! default registry. Each step reports through the [`HealthReporter`] so a
//! failed start leaves a structured trail.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use switchboard_bus::{Registry, RegistryError};
use switchboard_capabilities::{Services, ServicesError, default_registry};
use switchboard_config::{Config, RuntimePaths};
use thiserror::Error;

use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Abstracts configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the worker configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no valid configuration is available.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a configuration resolved earlier.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already-resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The capability services could not be assembled.
    #[error("failed to prepare capability services: {source}")]
    Services {
        /// Underlying services error.
        #[source]
        source: ServicesError,
    },
    /// The registry rejected a built-in capability.
    #[error("failed to build the capability registry: {source}")]
    Registry {
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
}

/// Result of a successful bootstrap.
#[derive(Debug)]
pub struct Worker {
    config: Config,
    registry: Arc<Registry>,
    telemetry: TelemetryHandle,
}

impl Worker {
    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Shared, immutable capability registry.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Bootstraps the worker using the supplied collaborators.
///
/// # Errors
///
/// Returns a [`BootstrapError`] for the first step that fails; the reporter
/// sees the same error before it is returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
    paths: &RuntimePaths,
) -> Result<Worker, BootstrapError> {
    reporter.bootstrap_starting();
    let outcome = assemble(loader, paths);
    match &outcome {
        Ok(worker) => reporter.bootstrap_succeeded(&worker.config, worker.registry.len()),
        Err(error) => reporter.bootstrap_failed(error),
    }
    outcome
}

fn assemble(loader: &dyn ConfigLoader, paths: &RuntimePaths) -> Result<Worker, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let services = Services::from_config(&config, paths)
        .map_err(|source| BootstrapError::Services { source })?;
    let registry =
        default_registry(&services).map_err(|source| BootstrapError::Registry { source })?;
    Ok(Worker {
        config,
        registry: Arc::new(registry),
        telemetry,
    })
}

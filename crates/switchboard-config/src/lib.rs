//! Shared configuration for the switchboard binaries.
//!
//! Both the `switchboard` client and the `switchboardd` worker load the same
//! [`Config`] through `ortho_config`, layering defaults, an optional
//! configuration file, `SWITCHBOARD_*` environment variables, and command-line
//! flags. The helpers in [`runtime`] derive the lock, socket, pid, and health
//! paths from the configured socket so independently started processes agree
//! on where to rendezvous.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod mounts;
pub mod runtime;
mod socket;

pub use defaults::{
    DEFAULT_HTTP_PROGRAM, DEFAULT_LOG_FILTER, DEFAULT_SPAWN_TIMEOUT_MS, default_log_filter,
    default_log_format, default_socket_endpoint, default_vfs_root,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use mounts::{MountEntry, MountParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Configuration shared by the client and the worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SWITCHBOARD")]
#[serde(default)]
pub struct Config {
    /// Unix socket the worker listens on.
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter expression.
    pub log_filter: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// How long the client waits for a freshly spawned worker, in milliseconds.
    pub spawn_timeout_ms: u64,
    /// Anchor directory for virtual path resolution.
    pub vfs_root: Utf8PathBuf,
    /// Mount table entries in `name=/absolute/path` form.
    #[ortho_config(merge_strategy = "append")]
    pub vfs_mounts: Vec<String>,
    /// Backing file for the key-value store; defaults into the runtime directory.
    pub store_path: Option<Utf8PathBuf>,
    /// Program used by the `Http.Fetch` capability.
    pub http_program: String,
    /// Signing agent socket; falls back to `SSH_AUTH_SOCK`.
    pub agent_socket: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: default_log_filter().to_owned(),
            log_format: default_log_format(),
            spawn_timeout_ms: DEFAULT_SPAWN_TIMEOUT_MS,
            vfs_root: default_vfs_root(),
            vfs_mounts: Vec::new(),
            store_path: None,
            http_program: DEFAULT_HTTP_PROGRAM.to_owned(),
            agent_socket: None,
        }
    }
}

impl Config {
    /// Socket the worker binds and the client connects to.
    #[must_use]
    pub const fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Filter expression handed to `tracing-subscriber`.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Selected log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Spawn wait budget as a [`std::time::Duration`].
    #[must_use]
    pub const fn spawn_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.spawn_timeout_ms)
    }

    /// Parses the configured mount table.
    ///
    /// # Errors
    ///
    /// Returns [`MountParseError`] for the first malformed entry.
    pub fn mounts(&self) -> Result<Vec<MountEntry>, MountParseError> {
        self.vfs_mounts
            .iter()
            .map(|entry| entry.parse::<MountEntry>())
            .collect()
    }
}

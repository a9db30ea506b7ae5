//! Derives runtime artefact paths shared by the client and the worker.
//!
//! The runtime directory is the parent of the configured socket. It houses
//! the instance lock, the spawn lock, the pid and health files, and the
//! default key-value store, so every process configured with the same socket
//! agrees on the layout without further coordination.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{Config, SocketPreparationError};

/// Canonical paths for runtime artefacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    socket_path: PathBuf,
    lock_path: PathBuf,
    spawn_lock_path: PathBuf,
    pid_path: PathBuf,
    health_path: PathBuf,
    store_path: PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths and ensures the runtime directory exists.
    ///
    /// # Errors
    ///
    /// Fails when the socket has no parent or the directory cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        config.daemon_socket().prepare_filesystem()?;
        let paths = Self::from_config_readonly(config)?;
        fs::create_dir_all(&paths.runtime_dir).map_err(|source| {
            RuntimePathsError::RuntimeDirectory {
                path: paths.runtime_dir.clone(),
                source,
            }
        })?;
        Ok(paths)
    }

    /// Derives runtime paths without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Fails when the socket path has no parent directory.
    pub fn from_config_readonly(config: &Config) -> Result<Self, RuntimePathsError> {
        let endpoint = config.daemon_socket();
        let runtime_dir = endpoint
            .parent()
            .map(|parent| parent.as_std_path().to_path_buf())
            .ok_or_else(|| RuntimePathsError::MissingSocketParent {
                path: endpoint.path().to_string(),
            })?;
        let store_path = config.store_path.as_ref().map_or_else(
            || runtime_dir.join("store.json"),
            |path| path.as_std_path().to_path_buf(),
        );
        Ok(Self {
            socket_path: endpoint.path().as_std_path().to_path_buf(),
            lock_path: runtime_dir.join("switchboardd.lock"),
            spawn_lock_path: runtime_dir.join("switchboard-spawn.lock"),
            pid_path: runtime_dir.join("switchboardd.pid"),
            health_path: runtime_dir.join("switchboardd.health"),
            store_path,
            runtime_dir,
        })
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Canonical socket path.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        self.socket_path.as_path()
    }

    /// Lock file guarding the single worker instance.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Lock file serialising concurrent spawn attempts by clients.
    #[must_use]
    pub fn spawn_lock_path(&self) -> &Path {
        self.spawn_lock_path.as_path()
    }

    /// Path to the PID file.
    #[must_use]
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Path to the health snapshot.
    #[must_use]
    pub fn health_path(&self) -> &Path {
        self.health_path.as_path()
    }

    /// Path to the key-value store document.
    #[must_use]
    pub fn store_path(&self) -> &Path {
        self.store_path.as_path()
    }

    /// Temporary bind path used before the socket is renamed into place.
    #[must_use]
    pub fn staging_socket_path(&self, pid: u32) -> PathBuf {
        let mut name = self
            .socket_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{pid}.tmp"));
        self.runtime_dir.join(name)
    }
}

/// Errors raised while deriving runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// The socket path lacked a parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingSocketParent {
        /// Configured socket path.
        path: String,
    },
    /// Preparing the socket directory failed.
    #[error(transparent)]
    Socket(#[from] SocketPreparationError),
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

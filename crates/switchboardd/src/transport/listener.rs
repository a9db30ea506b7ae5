//! Staged bind, publish, and accept loop for the worker socket.

use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use switchboard_config::RuntimePaths;
use tracing::{debug, info, warn};

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};
use crate::lifecycle::Lifecycle;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to its staging path, not yet visible to clients.
#[derive(Debug)]
pub(crate) struct SocketListener {
    staging: PathBuf,
    socket: PathBuf,
    listener: UnixListener,
}

impl SocketListener {
    /// Binds `<socket>.<pid>.tmp` in the runtime directory.
    ///
    /// The caller must hold the instance lock, which makes any existing file
    /// at the staging or canonical path a leftover from a dead worker.
    pub(crate) fn bind(paths: &RuntimePaths) -> Result<Self, ListenerError> {
        let staging = paths.staging_socket_path(std::process::id());
        remove_if_present(&staging).map_err(|source| ListenerError::StaleCleanup {
            path: staging.clone(),
            source,
        })?;
        let listener = UnixListener::bind(&staging).map_err(|source| ListenerError::Bind {
            path: staging.clone(),
            source,
        })?;
        if let Err(source) = fs::set_permissions(&staging, Permissions::from_mode(0o600)) {
            remove_socket(&staging);
            return Err(ListenerError::Permissions {
                path: staging,
                source,
            });
        }
        Ok(Self {
            staging,
            socket: paths.socket_path().to_path_buf(),
            listener,
        })
    }

    /// Starts the accept thread, then renames the socket into place.
    ///
    /// The loop runs until `lifecycle` is signalled and removes the socket
    /// on exit.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        lifecycle: Lifecycle,
    ) -> Result<ListenerHandle, ListenerError> {
        let staging = self.staging.clone();
        let socket = self.socket.clone();
        if let Err(source) = self.listener.set_nonblocking(true) {
            remove_socket(&staging);
            return Err(ListenerError::NonBlocking { source });
        }

        let loop_lifecycle = lifecycle.clone();
        let spawned = thread::Builder::new()
            .name("switchboardd-accept".to_owned())
            .spawn(move || run_accept_loop(&self, &loop_lifecycle, &handler));
        let handle = match spawned {
            Ok(handle) => ListenerHandle {
                lifecycle,
                handle: Some(handle),
            },
            Err(source) => {
                remove_socket(&staging);
                return Err(ListenerError::Spawn { source });
            }
        };

        if let Err(source) = fs::rename(&staging, &socket) {
            handle.shutdown();
            handle.join()?;
            return Err(ListenerError::Publish {
                staging,
                socket,
                source,
            });
        }
        info!(
            target: LISTENER_TARGET,
            socket = %socket.display(),
            "socket published"
        );
        Ok(handle)
    }
}

/// Handle to the background accept thread.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    lifecycle: Lifecycle,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Signals the shared lifecycle, stopping the accept loop.
    pub(crate) fn shutdown(&self) {
        self.lifecycle.signal();
    }

    /// Waits for the accept loop to exit.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.lifecycle.signal();
        }
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    lifecycle: &Lifecycle,
    handler: &Arc<dyn ConnectionHandler>,
) {
    info!(
        target: LISTENER_TARGET,
        staging = %listener.staging.display(),
        "accept loop running"
    );
    let mut accepted: u64 = 0;
    let mut last_error = None::<io::ErrorKind>;
    while !lifecycle.is_signalled() {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                last_error = None;
                accepted += 1;
                spawn_connection(handler, accepted, stream);
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    info!(
        target: LISTENER_TARGET,
        connections = accepted,
        "accept loop stopped"
    );
    remove_socket(&listener.staging);
    remove_socket(&listener.socket);
}

fn accept_connection(listener: &UnixListener) -> io::Result<Option<UnixStream>> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn spawn_connection(handler: &Arc<dyn ConnectionHandler>, connection: u64, stream: UnixStream) {
    let owned = Arc::clone(handler);
    let spawned = thread::Builder::new()
        .name(format!("switchboardd-conn-{connection}"))
        .spawn(move || owned.handle(connection, stream));
    if let Err(error) = spawned {
        warn!(
            target: LISTENER_TARGET,
            connection,
            error = %error,
            "failed to spawn connection thread; dropping connection"
        );
    } else {
        debug!(target: LISTENER_TARGET, connection, "connection accepted");
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}

fn remove_socket(path: &Path) {
    if let Err(error) = remove_if_present(path) {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path.display(),
            "failed to remove unix socket file"
        );
    }
}

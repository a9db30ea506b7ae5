//! Socket transport helpers for the switchboard client.

use std::io;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use camino::Utf8Path;
use socket2::{Domain, SockAddr, Socket, Type};
use switchboard_config::SocketEndpoint;

use crate::errors::{AppError, is_not_listening};

pub(crate) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to the worker socket.
pub(crate) fn connect(endpoint: &SocketEndpoint) -> Result<UnixStream, AppError> {
    connect_unix(endpoint.path()).map_err(|source| AppError::Connect {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Connects if something is listening, returning `None` when nothing is.
///
/// # Errors
///
/// Propagates connect failures other than a missing or refusing socket.
pub(crate) fn connect_if_listening(endpoint: &SocketEndpoint) -> io::Result<Option<UnixStream>> {
    match connect_unix(endpoint.path()) {
        Ok(stream) => Ok(Some(stream)),
        Err(error) if is_not_listening(&error) => Ok(None),
        Err(error) => Err(error),
    }
}

fn connect_unix(path: &Utf8Path) -> io::Result<UnixStream> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path.as_std_path())?;
    socket.connect_timeout(&address, CONNECTION_TIMEOUT)?;
    Ok(socket.into())
}

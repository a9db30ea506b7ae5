//! Unix socket transport for the worker.
//!
//! The listener binds a per-process staging path, starts accepting, and only
//! then renames the socket onto the canonical path, so clients never observe
//! a socket that nobody is serving. Each accepted connection runs on its own
//! thread through a [`ConnectionHandler`].

mod connection;
mod errors;
mod listener;
#[cfg(test)]
mod tests;

use std::os::unix::net::UnixStream;

pub(crate) use self::connection::BusConnectionHandler;
pub use self::errors::ListenerError;
pub(crate) use self::listener::SocketListener;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Serves one connection to completion. Implementations should not panic.
    fn handle(&self, connection: u64, stream: UnixStream);
}

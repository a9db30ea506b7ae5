//! Per-connection protocol: the authentication prologue, then fan-out.
//!
//! After the prologue, the connection thread becomes the reader. Every decoded
//! line is sent over two channels: one to a routing thread that answers in
//! arrival order, and one to a logging thread. The two consumers never wait
//! on each other.

use std::io::{self, BufRead, BufReader, BufWriter, Read};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use switchboard_bus::protocol::{
    AUTHENTICATE_TYPE, decode_line, is_authenticate, is_blank, protocol_error, write_line,
};
use switchboard_bus::{BusError, Message, Registry, route};
use tracing::{debug, warn};

use super::ConnectionHandler;
use crate::health::HealthReporter;

const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

/// Longest accepted line, newline included.
pub(crate) const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Routes bus traffic for each accepted connection.
pub(crate) struct BusConnectionHandler {
    registry: Arc<Registry>,
    reporter: Arc<dyn HealthReporter>,
}

impl BusConnectionHandler {
    pub(crate) const fn new(registry: Arc<Registry>, reporter: Arc<dyn HealthReporter>) -> Self {
        Self { registry, reporter }
    }

    fn serve(&self, connection: u64, stream: UnixStream) -> io::Result<()> {
        let mut writer = BufWriter::new(stream.try_clone()?);
        let mut reader = BufReader::new(stream);

        match self.prologue(&mut reader, &mut writer)? {
            Prologue::Accepted => self.reporter.connection_opened(connection),
            Prologue::Closed => {
                self.reporter.connection_closed(connection, 0);
                return Ok(());
            }
            Prologue::Rejected(reason) => {
                self.reporter.connection_rejected(connection, &reason);
                return writer.get_ref().shutdown(Shutdown::Both);
            }
        }

        let messages = self.fan_out(connection, reader, writer)?;
        self.reporter.connection_closed(connection, messages);
        Ok(())
    }

    /// Reads the first message and answers it.
    ///
    /// Nothing reaches the registry unless that message is an authenticate
    /// command.
    fn prologue<R, W>(&self, reader: &mut R, writer: &mut W) -> io::Result<Prologue>
    where
        R: BufRead,
        W: io::Write,
    {
        let mut line = String::new();
        let first = loop {
            match read_bounded_line(reader, &mut line) {
                Ok(0) => return Ok(Prologue::Closed),
                Ok(_) if is_blank(&line) => {}
                Ok(_) => break decode_line(&line),
                Err(error) if error.kind() == io::ErrorKind::InvalidData => {
                    break Err(BusError::protocol(error.to_string()));
                }
                Err(error) => return Err(error),
            }
        };

        let message = match first {
            Ok(message) if is_authenticate(&message) => message,
            Ok(message) => {
                let error = BusError::protocol(format!(
                    "expected an {AUTHENTICATE_TYPE} command before '{}'",
                    message.message_type
                ));
                write_line(writer, &protocol_error(&error))?;
                return Ok(Prologue::Rejected(error.to_string()));
            }
            Err(error) => {
                write_line(writer, &protocol_error(&error))?;
                return Ok(Prologue::Rejected(error.to_string()));
            }
        };

        let reply = route(message, &self.registry);
        write_line(writer, &reply)?;
        Ok(match reply.error_message() {
            Some(reason) if reply.is_error() => Prologue::Rejected(reason.to_owned()),
            _ => Prologue::Accepted,
        })
    }

    fn fan_out<R>(
        &self,
        connection: u64,
        mut reader: R,
        writer: BufWriter<UnixStream>,
    ) -> io::Result<usize>
    where
        R: BufRead,
    {
        // Unbounded: a client may write its whole input before reading any
        // reply, so the reader must keep draining while the router is blocked
        // on a full socket. Queued memory is bounded by what that client sends.
        let (route_tx, route_rx) = mpsc::channel::<Inbound>();
        let (log_tx, log_rx) = mpsc::channel::<Message>();

        let registry = Arc::clone(&self.registry);
        let router = thread::Builder::new()
            .name(format!("switchboardd-route-{connection}"))
            .spawn(move || route_loop(&registry, &route_rx, writer))?;
        let logger = thread::Builder::new()
            .name(format!("switchboardd-log-{connection}"))
            .spawn(move || log_loop(connection, &log_rx))?;

        let mut messages = 0_usize;
        let mut line = String::new();
        loop {
            let inbound = match read_bounded_line(&mut reader, &mut line) {
                Ok(0) => break,
                Ok(_) if is_blank(&line) => continue,
                Ok(_) => match decode_line(&line) {
                    Ok(message) => Inbound::Message(message),
                    Err(error) => Inbound::Malformed(error),
                },
                Err(error) if error.kind() == io::ErrorKind::InvalidData => {
                    // The stream cannot be resynchronised; answer and stop.
                    let fatal = Inbound::Malformed(BusError::protocol(error.to_string()));
                    if route_tx.send(fatal).is_err() {
                        debug!(target: CONNECTION_TARGET, connection, "router already gone");
                    }
                    break;
                }
                Err(error) => {
                    warn!(
                        target: CONNECTION_TARGET,
                        connection,
                        error = %error,
                        "read failed"
                    );
                    break;
                }
            };

            if let Inbound::Message(message) = &inbound {
                messages += 1;
                if log_tx.send(message.clone()).is_err() {
                    debug!(target: CONNECTION_TARGET, connection, "logger already gone");
                }
            }
            if route_tx.send(inbound).is_err() {
                // The router only exits early when the client stopped reading.
                break;
            }
        }
        drop(route_tx);
        drop(log_tx);

        match router.join() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(
                target: CONNECTION_TARGET,
                connection,
                error = %error,
                "failed to write replies"
            ),
            Err(_) => warn!(target: CONNECTION_TARGET, connection, "routing thread panicked"),
        }
        if logger.join().is_err() {
            warn!(target: CONNECTION_TARGET, connection, "logging thread panicked");
        }
        Ok(messages)
    }
}

impl ConnectionHandler for BusConnectionHandler {
    fn handle(&self, connection: u64, stream: UnixStream) {
        if let Err(error) = self.serve(connection, stream) {
            warn!(
                target: CONNECTION_TARGET,
                connection,
                error = %error,
                "connection ended with an error"
            );
        }
    }
}

#[derive(Debug)]
enum Prologue {
    Accepted,
    Rejected(String),
    Closed,
}

#[derive(Debug)]
enum Inbound {
    Message(Message),
    Malformed(BusError),
}

fn route_loop(
    registry: &Registry,
    inbound: &Receiver<Inbound>,
    mut writer: BufWriter<UnixStream>,
) -> io::Result<()> {
    for item in inbound {
        let reply = match item {
            Inbound::Message(message) => route(message, registry),
            Inbound::Malformed(error) => protocol_error(&error),
        };
        write_line(&mut writer, &reply)?;
    }
    writer.get_ref().shutdown(Shutdown::Write)
}

fn log_loop(connection: u64, messages: &Receiver<Message>) {
    for message in messages {
        debug!(
            target: CONNECTION_TARGET,
            connection,
            id = %message.metadata.id,
            kind = ?message.kind,
            message_type = %message.message_type,
            correlation = ?message.metadata.correlation,
            "message received"
        );
    }
}

/// Reads one line of at most [`MAX_LINE_BYTES`] into `buffer`.
///
/// Longer lines and invalid UTF-8 fail with [`io::ErrorKind::InvalidData`].
fn read_bounded_line<R>(reader: &mut R, buffer: &mut String) -> io::Result<usize>
where
    R: BufRead,
{
    buffer.clear();
    let limit = u64::try_from(MAX_LINE_BYTES).unwrap_or(u64::MAX);
    let read = reader.by_ref().take(limit).read_line(buffer)?;
    if read == MAX_LINE_BYTES && !buffer.ends_with('\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message line exceeds {MAX_LINE_BYTES} bytes"),
        ));
    }
    Ok(read)
}

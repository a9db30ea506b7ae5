//! A conversation with the worker over its socket.
//!
//! The client opens with a synthetic `Authenticate` command and consumes the
//! reply. After that, input is forwarded on a separate thread while the
//! calling thread copies replies to the sink, so neither direction waits on
//! the other. The write half is shut down when input ends, which lets the
//! worker finish answering and close the stream.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::thread;

use switchboard_bus::Message;
use switchboard_bus::protocol::{authenticate_message, is_blank, write_line};
use tracing::{debug, dispatcher};

use crate::errors::AppError;
use crate::input::{Input, RawLines};
use crate::output::ReplySink;

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Authenticates, forwards `input`, and emits every reply.
pub(crate) fn run<R, W, E>(
    stream: UnixStream,
    input: Input<'_, R>,
    sink: &mut ReplySink<'_, W, E>,
) -> Result<(), AppError>
where
    R: Read + Send,
    W: Write,
    E: Write,
{
    let mut writer = stream.try_clone().map_err(AppError::SendRequest)?;
    let mut reader = BufReader::new(stream);
    authenticate(&mut writer, &mut reader)?;

    let dispatch = dispatcher::get_default(Clone::clone);
    thread::scope(|scope| {
        let forwarder = scope.spawn(move || {
            dispatcher::with_default(&dispatch, || forward(input, &mut writer))
        });
        let received = receive(&mut reader, sink);
        if received.is_err() {
            // Unblock the forwarder; the session is over either way.
            drop(reader.get_ref().shutdown(Shutdown::Both));
        }
        let forwarded = forwarder.join().map_err(|_| AppError::InputThreadPanic)?;
        received?;
        match forwarded {
            Err(AppError::SendRequest(error)) if is_closed_by_peer(&error) => {
                // The worker ended the session; its reason was among the replies.
                debug!(target: SESSION_TARGET, error = %error, "worker stopped reading");
                Ok(())
            }
            other => other,
        }
    })
}

fn authenticate<R: BufRead>(writer: &mut UnixStream, reader: &mut R) -> Result<(), AppError> {
    write_line(writer, &authenticate_message()).map_err(AppError::SendRequest)?;
    let Some(reply) = next_reply(reader)? else {
        return Err(AppError::ClosedBeforeAuthenticate);
    };
    if reply.is_error() {
        return Err(AppError::Rejected {
            reason: reply
                .error_message()
                .unwrap_or("authentication failed")
                .to_owned(),
        });
    }
    debug!(target: SESSION_TARGET, "authenticated");
    Ok(())
}

fn forward<R: Read>(input: Input<'_, R>, writer: &mut UnixStream) -> Result<(), AppError> {
    let sent = match input {
        Input::Single(message) => {
            write_line(writer, &message).map_err(AppError::SendRequest)?;
            1
        }
        Input::Stream(source) => {
            let mut lines = RawLines::new(BufReader::new(source));
            let mut sent = 0_usize;
            while let Some(line) = lines.next_line().map_err(AppError::ReadInput)? {
                writer.write_all(&line).map_err(AppError::SendRequest)?;
                sent += 1;
            }
            writer.flush().map_err(AppError::SendRequest)?;
            sent
        }
    };
    debug!(target: SESSION_TARGET, lines = sent, "input forwarded");
    writer
        .shutdown(Shutdown::Write)
        .map_err(AppError::SendRequest)
}

fn receive<R, W, E>(reader: &mut R, sink: &mut ReplySink<'_, W, E>) -> Result<(), AppError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    while let Some(reply) = next_reply(reader)? {
        sink.emit(&reply)?;
    }
    Ok(())
}

/// Reads the next reply, skipping blank lines.
///
/// A reset counts as end of stream: the worker may close with input unread.
fn next_reply<R: BufRead>(reader: &mut R) -> Result<Option<Message>, AppError> {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return Ok(None),
            Ok(_) if is_blank(&line) => {}
            Ok(_) => return serde_json::from_str(&line).map(Some).map_err(AppError::ParseReply),
            Err(error) if is_closed_by_peer(&error) => return Ok(None),
            Err(error) => return Err(AppError::ReadResponse(error)),
        }
    }
}

fn is_closed_by_peer(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}

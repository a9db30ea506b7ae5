//! Line framing and the connection prologue.
//!
//! Both the daemon and the client exchange one JSON-encoded [`Message`] per
//! line. The first message a client sends on a fresh connection must be a
//! command of type [`AUTHENTICATE_TYPE`]; anything else is answered with a
//! detached protocol error and the connection is closed.

use std::io::{self, Write};

use serde_json::json;

use crate::error::BusError;
use crate::message::{Message, MessageKind};

/// Type name of the mandatory first message on a connection.
pub const AUTHENTICATE_TYPE: &str = "Authenticate";

/// Type name used for errors that have no originating message.
pub const PROTOCOL_ERROR_TYPE: &str = "Protocol";

/// Returns `true` when `message` satisfies the connection prologue.
#[must_use]
pub fn is_authenticate(message: &Message) -> bool {
    message.kind == MessageKind::Command && message.message_type == AUTHENTICATE_TYPE
}

/// Builds the prologue message a client sends before its own traffic.
#[must_use]
pub fn authenticate_message() -> Message {
    Message::new(MessageKind::Command, AUTHENTICATE_TYPE, json!({}))
}

/// Builds an error message that is not linked to any request.
///
/// Used when a line cannot be decoded or the prologue is violated, where no
/// request id is available to link back to.
#[must_use]
pub fn protocol_error(error: &BusError) -> Message {
    Message::new(MessageKind::Error, PROTOCOL_ERROR_TYPE, error.to_data())
}

/// Decodes one line of the stream.
///
/// Surrounding whitespace, including the trailing newline, is ignored.
///
/// # Errors
///
/// Returns [`BusError::Protocol`] when the line is not a JSON message.
pub fn decode_line(line: &str) -> Result<Message, BusError> {
    serde_json::from_str(line.trim())
        .map_err(|error| BusError::protocol(format!("malformed message: {error}")))
}

/// Returns `true` for lines that carry no message.
#[must_use]
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Writes `message` as one newline-terminated JSON line and flushes.
///
/// # Errors
///
/// Returns any I/O error raised by the writer.
pub fn write_line<W>(writer: &mut W, message: &Message) -> io::Result<()>
where
    W: Write + ?Sized,
{
    serde_json::to_writer(&mut *writer, message).map_err(io::Error::other)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

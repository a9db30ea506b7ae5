//! Where outgoing messages come from: one built from arguments, or stdin.

use std::io::{self, BufRead, Read};

use serde_json::{Value, json};
use switchboard_bus::{Message, MessageIds, MessageKind, create_message};

use crate::cli::Cli;
use crate::errors::AppError;

/// Messages to send during one invocation.
pub(crate) enum Input<'a, R> {
    /// A single message assembled from `TYPE` and its flags.
    Single(Message),
    /// Newline-delimited JSON read until end of input.
    Stream(&'a mut R),
}

impl<'a, R: Read> Input<'a, R> {
    /// Builds the message named on the command line, or falls back to `stdin`.
    pub(crate) fn from_cli(cli: &Cli, stdin: &'a mut R) -> Result<Self, AppError> {
        let Some(message_type) = cli.message_type.as_deref() else {
            return Ok(Self::Stream(stdin));
        };
        let data = match cli.data.as_deref() {
            Some(raw) => serde_json::from_str::<Value>(raw).map_err(AppError::InvalidData)?,
            None => json!({}),
        };
        let kind = cli.kind.map_or(MessageKind::Command, MessageKind::from);
        let ids = MessageIds {
            correlation: cli.correlation.clone(),
            ..MessageIds::default()
        };
        Ok(Self::Single(create_message(kind, message_type, data, ids)))
    }
}

/// Reads raw lines, including their terminator, until end of input.
///
/// Lines are not required to be UTF-8; the receiver decides what to do with
/// them.
pub(crate) struct RawLines<R> {
    reader: R,
}

impl<R: BufRead> RawLines<R> {
    pub(crate) const fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Returns the next line, appending a newline when the input ends without one.
    pub(crate) fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }
        Ok(Some(line))
    }
}

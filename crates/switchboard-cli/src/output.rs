//! Writes replies to stdout and error summaries to stderr.

use std::io::Write;
use std::process::ExitCode;

use serde_json::Value;
use switchboard_bus::Message;
use switchboard_bus::protocol::write_line;

use crate::errors::AppError;

/// Destination for every reply the client prints.
///
/// Stdout receives one JSON line per reply. Each error-kind reply also gets
/// a one-line summary on stderr and turns the exit code into a failure.
pub(crate) struct ReplySink<'a, W: Write, E: Write> {
    stdout: &'a mut W,
    stderr: &'a mut E,
    errors: usize,
}

impl<'a, W: Write, E: Write> ReplySink<'a, W, E> {
    pub(crate) const fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self {
            stdout,
            stderr,
            errors: 0,
        }
    }

    pub(crate) fn emit(&mut self, message: &Message) -> Result<(), AppError> {
        write_line(self.stdout, message).map_err(AppError::WriteOutput)?;
        if message.is_error() {
            self.errors += 1;
            drop(writeln!(self.stderr, "{}", summarise(message)));
        }
        Ok(())
    }

    pub(crate) const fn errors(&self) -> usize {
        self.errors
    }

    pub(crate) const fn exit_code(&self) -> ExitCode {
        if self.errors == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Formats an error reply as `type: kind: message`.
fn summarise(message: &Message) -> String {
    let kind = message
        .data
        .pointer("/error/kind")
        .and_then(Value::as_str)
        .unwrap_or("error");
    let text = message.error_message().unwrap_or("no error message");
    format!("{}: {kind}: {text}", message.message_type)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use switchboard_bus::{BusError, MessageKind, create_error};

    use super::*;

    #[test]
    fn replies_are_written_as_lines() {
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        let mut sink = ReplySink::new(&mut stdout, &mut stderr);
        let reply = Message::new(MessageKind::Reply, "Ping", json!({"payload": 1}));

        sink.emit(&reply).expect("emit");

        assert_eq!(sink.exit_code(), ExitCode::SUCCESS);
        let line = String::from_utf8(stdout).expect("utf-8");
        assert_eq!(line.lines().count(), 1);
        assert!(stderr.is_empty());
    }

    #[test]
    fn errors_are_summarised_and_fail_the_run() {
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        let mut sink = ReplySink::new(&mut stdout, &mut stderr);
        let request = Message::new(MessageKind::Command, "Shell.Exec", json!({}));
        let error = create_error(&request, BusError::not_found("Shell.Exec").to_data());

        sink.emit(&error).expect("emit");

        assert_eq!(sink.errors(), 1);
        assert_eq!(sink.exit_code(), ExitCode::FAILURE);
        let summary = String::from_utf8(stderr).expect("utf-8");
        assert!(summary.starts_with("Shell.Exec: not_found: "), "{summary}");
    }
}

//! In-process routing for `switchboard --inline`.
//!
//! Builds the same registry the worker serves and routes each message
//! locally. No socket, lock, or authentication prologue is involved.

use std::io::{BufReader, Read, Write};

use switchboard_bus::protocol::{decode_line, is_blank, protocol_error};
use switchboard_bus::{BusError, Registry, route};
use switchboard_capabilities::{Services, default_registry};
use switchboard_config::{Config, RuntimePaths};
use tracing::debug;

use crate::errors::AppError;
use crate::input::{Input, RawLines};
use crate::output::ReplySink;

const INLINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::inline");

/// Builds the default registry from `config`.
pub(crate) fn build_registry(config: &Config) -> Result<Registry, AppError> {
    let paths = RuntimePaths::from_config(config)?;
    let services = Services::from_config(config, &paths)?;
    Ok(default_registry(&services)?)
}

/// Routes every input message against `registry`.
pub(crate) fn run<R, W, E>(
    registry: &Registry,
    input: Input<'_, R>,
    sink: &mut ReplySink<'_, W, E>,
) -> Result<(), AppError>
where
    R: Read,
    W: Write,
    E: Write,
{
    match input {
        Input::Single(message) => sink.emit(&route(message, registry)),
        Input::Stream(reader) => {
            let mut lines = RawLines::new(BufReader::new(reader));
            let mut routed = 0_usize;
            while let Some(line) = lines.next_line().map_err(AppError::ReadInput)? {
                let reply = match String::from_utf8(line) {
                    Ok(text) if is_blank(&text) => continue,
                    Ok(text) => match decode_line(&text) {
                        Ok(message) => route(message, registry),
                        Err(error) => protocol_error(&error),
                    },
                    Err(_) => {
                        protocol_error(&BusError::protocol("message line is not valid UTF-8"))
                    }
                };
                routed += 1;
                sink.emit(&reply)?;
            }
            debug!(target: INLINE_TARGET, routed, "input exhausted");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;
    use switchboard_bus::{Message, MessageKind};
    use switchboard_capabilities::meta::{AuthenticateCapability, PingCapability};

    use super::*;

    fn registry() -> Registry {
        Registry::builder()
            .register("Authenticate", AuthenticateCapability)
            .and_then(|builder| builder.register("Ping", PingCapability))
            .expect("registry")
            .build()
    }

    fn route_stream(input: &[u8]) -> (Vec<Message>, usize) {
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        let mut reader = Cursor::new(input.to_vec());
        let mut sink = ReplySink::new(&mut stdout, &mut stderr);
        run(&registry(), Input::Stream(&mut reader), &mut sink).expect("inline run");
        let errors = sink.errors();
        let replies = String::from_utf8(stdout)
            .expect("utf-8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("decode"))
            .collect();
        (replies, errors)
    }

    #[test]
    fn stream_lines_are_routed_in_order() {
        let first = Message::new(MessageKind::Query, "Ping", json!({"payload": 1}));
        let second = Message::new(MessageKind::Query, "Ping", json!({"payload": 2}));
        let input = format!(
            "{}\n\n{}",
            serde_json::to_string(&first).expect("encode"),
            serde_json::to_string(&second).expect("encode")
        );

        let (replies, errors) = route_stream(input.as_bytes());

        assert_eq!(errors, 0);
        let causes: Vec<_> = replies
            .iter()
            .map(|reply| reply.metadata.causation.clone())
            .collect();
        assert_eq!(
            causes,
            vec![Some(first.metadata.id), Some(second.metadata.id)]
        );
    }

    #[test]
    fn malformed_lines_become_protocol_errors() {
        let (replies, errors) = route_stream(b"{not json\n\xff\xfe\n");

        assert_eq!(errors, 2);
        assert!(replies.iter().all(|reply| reply.data["error"]["kind"] == "protocol"));
    }

    #[test]
    fn unknown_types_fail_without_side_effects() {
        let message = Message::new(MessageKind::Command, "Shell.Exec", json!({"cmd": "rm"}));
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        let mut sink = ReplySink::new(&mut stdout, &mut stderr);

        run(&registry(), Input::<Cursor<Vec<u8>>>::Single(message), &mut sink).expect("run");

        assert_eq!(sink.errors(), 1);
        let reply: Message = serde_json::from_slice(&stdout).expect("decode");
        assert_eq!(reply.data["error"]["kind"], "not_found");
    }
}

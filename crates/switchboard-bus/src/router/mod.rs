//! The routing engine.
//!
//! [`route`] is a total function from a message and a registry to a response
//! message. Events, replies, and errors pass through untouched; commands and
//! queries are validated, executed, and wrapped. Nothing escapes: lookup
//! misses, validator rejections, execution failures, and panics all come back
//! as error-kind messages whose causation points at the request.
//!
//! Unknown types are answered with a `not_found` error. The router never
//! interprets a type name as anything other than a registry key.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::{BusError, ErrorKind};
use crate::message::{Message, create_error, create_reply};
use crate::registry::Registry;

const ROUTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::router");

/// Dispatches `message` against `registry` and returns the response.
#[must_use]
pub fn route(message: Message, registry: &Registry) -> Message {
    if !message.kind.is_routable() {
        return message;
    }

    let name = message.message_type.as_str();
    let data = message.data.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| registry.dispatch(name, data)));

    match outcome {
        Ok(Ok(output)) => {
            debug!(
                target: ROUTER_TARGET,
                capability = name,
                id = %message.metadata.id,
                "capability dispatched"
            );
            create_reply(&message, output)
        }
        Ok(Err(error)) => reject(&message, &error),
        Err(payload) => {
            let error = BusError::execution(name, ErrorKind::Execution, panic_message(&*payload));
            reject(&message, &error)
        }
    }
}

fn reject(message: &Message, error: &BusError) -> Message {
    warn!(
        target: ROUTER_TARGET,
        capability = %message.message_type,
        id = %message.metadata.id,
        kind = error.kind().as_str(),
        error = %error,
        "capability dispatch failed"
    );
    create_error(message, error.to_data())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(
            || String::from("capability panicked"),
            |text| format!("capability panicked: {text}"),
        )
}

#[cfg(test)]
mod tests;

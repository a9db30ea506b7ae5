//! The message envelope exchanged on the bus.
//!
//! Messages are created per call and discarded once the response has been
//! emitted. Replies and errors always point back at the message that caused
//! them through `metadata.causation`, while `metadata.correlation` is copied
//! unchanged so a whole workflow can be grouped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// The role a message plays in an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Requests a state-changing operation.
    Command,
    /// Requests information without side effects.
    Query,
    /// Announces something that happened.
    Event,
    /// Successful response to a command or query.
    Reply,
    /// Failed response to a command or query.
    Error,
}

impl MessageKind {
    /// Returns `true` for the kinds the routing engine dispatches.
    #[must_use]
    pub const fn is_routable(self) -> bool {
        matches!(self, Self::Command | Self::Query)
    }
}

/// Identity and causal links attached to every message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Metadata {
    /// Unique message identifier.
    #[serde(default = "new_id")]
    pub id: String,
    /// Identifier grouping the messages of one workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
    /// Identifier of the message that triggered this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation: Option<String>,
    /// Creation time in RFC 3339 form.
    #[serde(default = "now")]
    pub timestamp: String,
}

impl Metadata {
    /// Metadata with a fresh id, the current time, and no causal links.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            id: new_id(),
            correlation: None,
            causation: None,
            timestamp: now(),
        }
    }
}

/// Envelope carrying a capability request or its outcome.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    /// Role of the message.
    pub kind: MessageKind,
    /// Dot-namespaced capability name.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Arbitrary payload.
    #[serde(default)]
    pub data: Value,
    /// Identity and causal links.
    #[serde(default = "Metadata::fresh")]
    pub metadata: Metadata,
}

impl Message {
    /// Builds a message with fresh metadata and no causal links.
    pub fn new(kind: MessageKind, message_type: impl Into<String>, data: Value) -> Self {
        create_message(kind, message_type, data, MessageIds::default())
    }

    /// Returns `true` when this message carries an error payload.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.kind, MessageKind::Error)
    }

    /// Human-readable message extracted from an error payload, if present.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.data
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
    }
}

/// Optional identifiers supplied when creating a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageIds {
    /// Explicit id; generated when absent.
    pub id: Option<String>,
    /// Workflow correlation id.
    pub correlation: Option<String>,
    /// Id of the triggering message.
    pub causation: Option<String>,
}

/// Creates a message, generating an id when none is supplied.
pub fn create_message(
    kind: MessageKind,
    message_type: impl Into<String>,
    data: Value,
    ids: MessageIds,
) -> Message {
    let MessageIds {
        id,
        correlation,
        causation,
    } = ids;
    Message {
        kind,
        message_type: message_type.into(),
        data,
        metadata: Metadata {
            id: id.unwrap_or_else(new_id),
            correlation,
            causation,
            timestamp: now(),
        },
    }
}

/// Creates the reply to `original` carrying `data`.
#[must_use]
pub fn create_reply(original: &Message, data: Value) -> Message {
    derived(original, MessageKind::Reply, data)
}

/// Creates the error response to `original` carrying `payload`.
#[must_use]
pub fn create_error(original: &Message, payload: Value) -> Message {
    derived(original, MessageKind::Error, payload)
}

fn derived(original: &Message, kind: MessageKind, data: Value) -> Message {
    create_message(
        kind,
        original.message_type.clone(),
        data,
        MessageIds {
            id: None,
            correlation: original.metadata.correlation.clone(),
            causation: Some(original.metadata.id.clone()),
        },
    )
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

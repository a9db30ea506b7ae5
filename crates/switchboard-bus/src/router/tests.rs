//! Unit tests for the routing engine.

use rstest::{fixture, rstest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::*;
use crate::capability::{Capability, CapabilityError, ExecutionUnit};
use crate::message::{MessageIds, MessageKind, create_message};

#[derive(Deserialize, Serialize)]
struct Echo {
    #[serde(default)]
    payload: Value,
}

struct EchoCapability;

impl Capability for EchoCapability {
    type Input = Echo;
    type Output = Echo;

    fn description(&self) -> &str {
        "Echoes the payload"
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<Echo, Echo>> {
        Box::new(|input: Echo| Ok::<_, CapabilityError>(input))
    }
}

struct Failing;

impl Capability for Failing {
    type Input = Value;
    type Output = Value;

    fn description(&self) -> &str {
        "Always fails"
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<Value, Value>> {
        Box::new(|_: Value| Err::<Value, _>(CapabilityError::io("disk on fire")))
    }
}

struct Panicking;

impl Capability for Panicking {
    type Input = Value;
    type Output = Value;

    fn description(&self) -> &str {
        "Panics"
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<Value, Value>> {
        Box::new(|_: Value| -> Result<Value, CapabilityError> { panic!("boom") })
    }
}

struct BadOutput;

impl Capability for BadOutput {
    type Input = Value;
    type Output = Value;

    fn description(&self) -> &str {
        "Produces output its own validator rejects"
    }

    fn validate_output(&self, _output: &Value) -> Result<(), String> {
        Err(String::from("output must be an object"))
    }

    fn instantiate(&self) -> Box<dyn ExecutionUnit<Value, Value>> {
        Box::new(|_: Value| Ok::<_, CapabilityError>(json!(7)))
    }
}

#[fixture]
fn registry() -> Registry {
    Registry::builder()
        .register("Ping", EchoCapability)
        .and_then(|builder| builder.register("Test.Fail", Failing))
        .and_then(|builder| builder.register("Test.Panic", Panicking))
        .and_then(|builder| builder.register("Test.BadOutput", BadOutput))
        .expect("register test capabilities")
        .build()
}

fn query(message_type: &str, data: Value) -> Message {
    create_message(
        MessageKind::Query,
        message_type,
        data,
        MessageIds {
            correlation: Some(String::from("flow-7")),
            ..MessageIds::default()
        },
    )
}

fn error_kind(message: &Message) -> &str {
    message.data["error"]["kind"].as_str().unwrap_or_default()
}

#[rstest]
fn ping_echoes_payload(registry: Registry) {
    let request = query("Ping", json!({"payload": "hi"}));
    let reply = route(request.clone(), &registry);

    assert_eq!(reply.kind, MessageKind::Reply);
    assert_eq!(reply.message_type, "Ping");
    assert_eq!(reply.data, json!({"payload": "hi"}));
    assert_eq!(
        reply.metadata.causation.as_deref(),
        Some(request.metadata.id.as_str())
    );
    assert_eq!(reply.metadata.correlation.as_deref(), Some("flow-7"));
}

#[rstest]
#[case::unknown("Nope.Nothing", json!({}), "not_found")]
#[case::invalid_input("Ping", json!("not an object"), "validation")]
#[case::execution_failure("Test.Fail", json!({}), "io")]
#[case::panic("Test.Panic", json!({}), "execution")]
#[case::bad_output("Test.BadOutput", json!({}), "output_validation")]
fn failures_become_error_messages(
    registry: Registry,
    #[case] message_type: &str,
    #[case] data: Value,
    #[case] kind: &str,
) {
    let request = query(message_type, data);
    let response = route(request.clone(), &registry);

    assert!(response.is_error());
    assert_eq!(error_kind(&response), kind);
    assert_eq!(
        response.metadata.causation.as_deref(),
        Some(request.metadata.id.as_str())
    );
    assert_eq!(response.metadata.correlation.as_deref(), Some("flow-7"));
}

#[rstest]
fn panic_message_is_reported(registry: Registry) {
    let response = route(query("Test.Panic", json!({})), &registry);
    let message = response.error_message().unwrap_or_default();
    assert!(message.contains("boom"), "{message}");
}

#[rstest]
#[case::event(MessageKind::Event)]
#[case::reply(MessageKind::Reply)]
#[case::error(MessageKind::Error)]
fn non_routable_kinds_pass_through(registry: Registry, #[case] kind: MessageKind) {
    let message = Message::new(kind, "Ping", json!({"payload": 1}));
    assert_eq!(route(message.clone(), &registry), message);
}

#[rstest]
fn commands_are_dispatched_like_queries(registry: Registry) {
    let request = Message::new(MessageKind::Command, "Ping", json!({}));
    let reply = route(request, &registry);
    assert_eq!(reply.kind, MessageKind::Reply);
    assert_eq!(reply.data, json!({"payload": null}));
}

//! Message contract, capability registry, and routing engine.
//!
//! Every request that crosses the bus is a [`Message`]: a `kind`, a
//! dot-namespaced `type` naming a capability, an arbitrary JSON `data`
//! payload, and [`Metadata`] carrying the message id together with its
//! correlation and causation links.
//!
//! Capabilities implement [`Capability`], which pairs typed input and output
//! validators with a factory producing a fresh [`ExecutionUnit`] per dispatch.
//! They are collected once into an immutable [`Registry`] and dispatched by
//! [`route`], which converts every failure, including a panicking capability,
//! into an error-kind reply.
//!
//! # Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//! use switchboard_bus::{
//!     Capability, CapabilityError, ExecutionUnit, Message, MessageKind, Registry, route,
//! };
//!
//! #[derive(Deserialize, Serialize)]
//! struct Echo {
//!     payload: serde_json::Value,
//! }
//!
//! struct EchoCapability;
//!
//! impl Capability for EchoCapability {
//!     type Input = Echo;
//!     type Output = Echo;
//!
//!     fn description(&self) -> &str {
//!         "Echoes the payload"
//!     }
//!
//!     fn instantiate(&self) -> Box<dyn ExecutionUnit<Echo, Echo>> {
//!         Box::new(|input: Echo| Ok::<_, CapabilityError>(input))
//!     }
//! }
//!
//! let registry = Registry::builder()
//!     .register("Ping", EchoCapability)
//!     .expect("valid registration")
//!     .build();
//! let request = Message::new(MessageKind::Query, "Ping", json!({"payload": "hi"}));
//! let reply = route(request.clone(), &registry);
//! assert_eq!(reply.kind, MessageKind::Reply);
//! assert_eq!(reply.metadata.causation.as_deref(), Some(request.metadata.id.as_str()));
//! ```

pub mod capability;
pub mod error;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod router;

pub use capability::{Capability, CapabilityError, ExecutionUnit};
pub use error::{BusError, ErrorKind};
pub use message::{
    Message, MessageIds, MessageKind, Metadata, create_error, create_message, create_reply,
};
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use router::route;

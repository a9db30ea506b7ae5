//! The contract every capability implements.
//!
//! A capability owns no per-request state. Each dispatch asks it for a new
//! [`ExecutionUnit`], which is consumed by running it, so nothing survives
//! between requests and a crashed unit cannot poison the next one.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::error::{BusError, ErrorKind};

/// A named, schema-validated unit of behaviour registered with the bus.
pub trait Capability: Send + Sync + 'static {
    /// Inbound payload; decoding into this type is the first validation gate.
    type Input: DeserializeOwned;
    /// Outbound payload; encoding from this type is the last validation gate.
    type Output: Serialize;

    /// One-line summary shown by capability listings.
    fn description(&self) -> &str;

    /// Semantic checks applied after the payload decodes.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the input is unacceptable.
    fn validate_input(&self, _input: &Self::Input) -> Result<(), String> {
        Ok(())
    }

    /// Semantic checks applied to the produced output.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the output is unacceptable.
    fn validate_output(&self, _output: &Self::Output) -> Result<(), String> {
        Ok(())
    }

    /// Produces a fresh execution unit for one dispatch.
    fn instantiate(&self) -> Box<dyn ExecutionUnit<Self::Input, Self::Output>>;
}

/// Single-use executor produced by [`Capability::instantiate`].
pub trait ExecutionUnit<I, O>: Send {
    /// Runs the unit, consuming it.
    ///
    /// # Errors
    ///
    /// Returns a [`CapabilityError`] describing the failure.
    fn execute(self: Box<Self>, input: I) -> Result<O, CapabilityError>;
}

impl<I, O, F> ExecutionUnit<I, O> for F
where
    F: FnOnce(I) -> Result<O, CapabilityError> + Send,
{
    fn execute(self: Box<Self>, input: I) -> Result<O, CapabilityError> {
        (*self)(input)
    }
}

/// Failure reported by an execution unit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CapabilityError {
    kind: ErrorKind,
    message: String,
}

impl CapabilityError {
    /// Creates an error with an explicit category.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a generic execution failure.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Execution, message)
    }

    /// Creates a validation failure detected during execution.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Creates an I/O failure.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// Creates a timeout failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Category of the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Object-safe view of a capability used by the registry.
pub(crate) trait ErasedCapability: Send + Sync {
    fn description(&self) -> &str;
    fn dispatch(&self, name: &str, data: Value) -> Result<Value, BusError>;
}

impl<C> ErasedCapability for C
where
    C: Capability,
{
    fn description(&self) -> &str {
        Capability::description(self)
    }

    fn dispatch(&self, name: &str, data: Value) -> Result<Value, BusError> {
        let input: C::Input = serde_json::from_value(data)
            .map_err(|error| BusError::validation(name, error.to_string()))?;
        self.validate_input(&input)
            .map_err(|message| BusError::validation(name, message))?;
        let output = self
            .instantiate()
            .execute(input)
            .map_err(|error| BusError::execution(name, error.kind(), error.message()))?;
        self.validate_output(&output)
            .map_err(|message| BusError::output_validation(name, message))?;
        serde_json::to_value(&output)
            .map_err(|error| BusError::output_validation(name, error.to_string()))
    }
}

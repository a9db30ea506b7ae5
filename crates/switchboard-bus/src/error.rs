//! Error taxonomy shared by the routing engine and the runtimes.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Stable, machine-readable error categories carried in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Inbound payload failed validation.
    Validation,
    /// No capability is registered under the requested type.
    NotFound,
    /// The capability failed while executing.
    Execution,
    /// The capability produced output that failed validation.
    OutputValidation,
    /// The transport prologue or line framing was violated.
    Protocol,
    /// Authenticated decryption failed.
    Integrity,
    /// A sealed token envelope was malformed.
    Format,
    /// A sealed token was produced under a different key.
    KeyMismatch,
    /// An I/O operation failed.
    Io,
    /// An operation exceeded its time budget.
    Timeout,
}

impl ErrorKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Execution => "execution",
            Self::OutputValidation => "output_validation",
            Self::Protocol => "protocol",
            Self::Integrity => "integrity",
            Self::Format => "format",
            Self::KeyMismatch => "key_mismatch",
            Self::Io => "io",
            Self::Timeout => "timeout",
        }
    }
}

/// Failures surfaced while dispatching a message.
///
/// The router never returns these to its caller directly; each one is turned
/// into an error-kind message through [`BusError::to_data`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// Inbound payload did not satisfy the capability's input validator.
    #[error("invalid input for '{capability}': {message}")]
    Validation {
        /// Capability that rejected the payload.
        capability: String,
        /// Validator message.
        message: String,
    },
    /// The requested capability is not registered.
    #[error("capability '{capability}' is not registered")]
    NotFound {
        /// Requested capability name.
        capability: String,
    },
    /// The capability reported a failure while executing.
    #[error("capability '{capability}' failed: {message}")]
    Execution {
        /// Capability that failed.
        capability: String,
        /// Category reported by the capability.
        kind: ErrorKind,
        /// Failure description.
        message: String,
    },
    /// The capability's output did not satisfy its output validator.
    #[error("capability '{capability}' produced invalid output: {message}")]
    OutputValidation {
        /// Capability that produced the output.
        capability: String,
        /// Validator message.
        message: String,
    },
    /// The transport protocol was violated.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },
}

impl BusError {
    /// Creates an input validation error.
    pub fn validation(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            capability: capability.into(),
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(capability: impl Into<String>) -> Self {
        Self::NotFound {
            capability: capability.into(),
        }
    }

    /// Creates an execution error with the given category.
    pub fn execution(
        capability: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Execution {
            capability: capability.into(),
            kind,
            message: message.into(),
        }
    }

    /// Creates an output validation error.
    pub fn output_validation(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OutputValidation {
            capability: capability.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Category used on the wire.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Execution { kind, .. } => *kind,
            Self::OutputValidation { .. } => ErrorKind::OutputValidation,
            Self::Protocol { .. } => ErrorKind::Protocol,
        }
    }

    /// Error payload placed in the `data` field of an error message.
    #[must_use]
    pub fn to_data(&self) -> Value {
        json!({
            "error": {
                "kind": self.kind().as_str(),
                "message": self.to_string(),
            }
        })
    }
}

//! Sealed secrets bound to an SSH agent identity.
//!
//! Secrets are encrypted with AES-256-GCM under a key that is never stored:
//! it is derived on demand by asking the user's SSH agent to sign a fixed
//! context string and expanding the signature with HKDF-SHA256. The result
//! is a self-describing `pwenc:v1:` token that can be written to disk or
//! configuration and opened again by any process with access to the same
//! agent identity.
//!
//! [`Sealer`] performs the agent round trip; [`seal_with_key`] and
//! [`open_with_key`] expose the token format directly.

pub mod agent;
mod error;
pub mod headers;
pub mod key;
mod sealer;
pub mod token;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use agent::{AgentClient, AgentConnector, Identity, SigningAgent, SshAgentConnector};
pub use error::{AgentError, AgentProtocolError, FormatError, SealError};
pub use headers::{HeaderError, unseal_headers};
pub use key::{SealingKey, derive_key};
pub use sealer::Sealer;
pub use token::{TOKEN_PREFIX, is_token, open_with_key, seal_with_key};

//! In-memory agents for tests.
//!
//! [`MemoryAgent`] signs by hashing the key blob together with the data, which
//! is deterministic and distinct per identity. That is all key derivation
//! relies on, so sealing round-trips behave as they would against a real
//! agent.

use sha2::{Digest, Sha256};

use crate::agent::codec::FrameBuilder;
use crate::agent::{AgentConnector, Identity, SSH_AGENT_RSA_SHA2_256, SigningAgent, key_type};
use crate::error::AgentError;

fn identity(key_type: &str, seed: u8) -> Identity {
    let key_blob = FrameBuilder::default()
        .string(key_type.as_bytes())
        .string(&[seed; 32])
        .finish();
    Identity {
        key_blob,
        comment: format!("{key_type}-{seed}"),
    }
}

/// An `ssh-ed25519` identity whose key material is `seed` repeated.
#[must_use]
pub fn ed25519_identity(seed: u8) -> Identity {
    identity("ssh-ed25519", seed)
}

/// An `ssh-rsa` identity whose key material is `seed` repeated.
#[must_use]
pub fn rsa_identity(seed: u8) -> Identity {
    identity("ssh-rsa", seed)
}

/// An ECDSA identity, which sealing must skip.
#[must_use]
pub fn ecdsa_identity(seed: u8) -> Identity {
    identity("ecdsa-sha2-nistp256", seed)
}

/// Builds the signature blob [`MemoryAgent`] returns for a request.
///
/// # Errors
///
/// Returns [`AgentError::Refused`] when `key_blob` is not a well-formed key.
pub fn fake_signature(key_blob: &[u8], data: &[u8], flags: u32) -> Result<Vec<u8>, AgentError> {
    let algorithm = match key_type(key_blob).map_err(|_| AgentError::Refused)? {
        "ssh-rsa" if flags & SSH_AGENT_RSA_SHA2_256 != 0 => "rsa-sha2-256",
        other => other,
    };
    let digest = Sha256::new()
        .chain_update(key_blob)
        .chain_update(data)
        .finalize();
    Ok(FrameBuilder::default()
        .string(algorithm.as_bytes())
        .string(&digest)
        .finish())
}

/// Agent holding a fixed list of identities.
#[derive(Debug, Clone, Default)]
pub struct MemoryAgent {
    identities: Vec<Identity>,
    last_flags: Option<u32>,
}

impl MemoryAgent {
    /// Creates an agent holding `identities`.
    #[must_use]
    pub const fn new(identities: Vec<Identity>) -> Self {
        Self {
            identities,
            last_flags: None,
        }
    }

    /// Flags passed with the most recent sign request.
    #[must_use]
    pub const fn last_flags(&self) -> Option<u32> {
        self.last_flags
    }
}

impl SigningAgent for MemoryAgent {
    fn identities(&mut self) -> Result<Vec<Identity>, AgentError> {
        Ok(self.identities.clone())
    }

    fn sign(&mut self, key_blob: &[u8], data: &[u8], flags: u32) -> Result<Vec<u8>, AgentError> {
        if !self.identities.iter().any(|held| held.key_blob == key_blob) {
            return Err(AgentError::Refused);
        }
        self.last_flags = Some(flags);
        fake_signature(key_blob, data, flags)
    }
}

/// Connector handing out [`MemoryAgent`]s over the same identities.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    identities: Vec<Identity>,
}

impl MemoryConnector {
    /// Creates a connector whose agents hold `identities`.
    #[must_use]
    pub const fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    /// Connector whose agent holds a single `ssh-ed25519` key.
    #[must_use]
    pub fn ed25519(seed: u8) -> Self {
        Self::new(vec![ed25519_identity(seed)])
    }
}

impl AgentConnector for MemoryConnector {
    type Agent = MemoryAgent;

    fn connect(&self) -> Result<Self::Agent, AgentError> {
        Ok(MemoryAgent::new(self.identities.clone()))
    }
}

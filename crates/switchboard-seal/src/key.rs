//! Derivation of the sealing key from an agent-held SSH identity.
//!
//! The agent signs a fixed context string with the first identity whose
//! signature scheme is deterministic. The signature never leaves this module;
//! it is expanded with HKDF-SHA256 into the AES key and then wiped. Because
//! the signature is deterministic the same identity always yields the same
//! key, which is what makes tokens reopenable across processes.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::agent::{SSH_AGENT_RSA_SHA2_256, SigningAgent, key_type, parse_signature};
use crate::error::{AgentError, AgentProtocolError, SealError};

const SIGN_CONTEXT: &[u8] = b"switchboard sealed secrets v1";
const HKDF_SALT: &[u8] = b"switchboard/seal/salt/v1";
const HKDF_INFO: &[u8] = b"switchboard/seal/aes-256-gcm/v1";

/// Signature schemes that produce the same bytes for the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Ed25519,
    RsaSha256,
}

impl Scheme {
    fn for_key_type(name: &str) -> Option<Self> {
        match name {
            "ssh-ed25519" => Some(Self::Ed25519),
            "ssh-rsa" => Some(Self::RsaSha256),
            _ => None,
        }
    }

    const fn flags(self) -> u32 {
        match self {
            Self::Ed25519 => 0,
            Self::RsaSha256 => SSH_AGENT_RSA_SHA2_256,
        }
    }

    const fn algorithm(self) -> &'static str {
        match self {
            Self::Ed25519 => "ssh-ed25519",
            Self::RsaSha256 => "rsa-sha2-256",
        }
    }
}

/// A 256-bit AES key together with the identifier of the SSH key behind it.
pub struct SealingKey {
    kid: String,
    secret: Zeroizing<[u8; 32]>,
}

impl SealingKey {
    /// Builds a key from raw parts.
    #[must_use]
    pub fn from_parts(kid: impl Into<String>, secret: [u8; 32]) -> Self {
        Self {
            kid: kid.into(),
            secret: Zeroizing::new(secret),
        }
    }

    /// Lowercase hex SHA-256 of the public key blob.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub(crate) fn secret(&self) -> &[u8; 32] {
        &self.secret
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SealingKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Returns the key identifier for a public key blob.
#[must_use]
pub fn key_id(key_blob: &[u8]) -> String {
    hex::encode(Sha256::digest(key_blob))
}

/// Derives the sealing key from the first usable identity held by `agent`.
///
/// # Errors
///
/// Returns [`AgentError::NoUsableIdentity`] when no `ssh-ed25519` or
/// `ssh-rsa` key is loaded, or any error raised while signing.
pub fn derive_key<A: SigningAgent + ?Sized>(agent: &mut A) -> Result<SealingKey, SealError> {
    let identities = agent.identities()?;
    let (identity, scheme) = identities
        .iter()
        .find_map(|identity| {
            key_type(&identity.key_blob)
                .ok()
                .and_then(Scheme::for_key_type)
                .map(|scheme| (identity, scheme))
        })
        .ok_or(AgentError::NoUsableIdentity)?;

    let blob = Zeroizing::new(agent.sign(&identity.key_blob, SIGN_CONTEXT, scheme.flags())?);
    let (algorithm, signature) = parse_signature(&blob).map_err(AgentError::from)?;
    if algorithm != scheme.algorithm() {
        return Err(AgentError::from(AgentProtocolError::UnexpectedAlgorithm {
            expected: scheme.algorithm().to_owned(),
            found: algorithm.to_owned(),
        })
        .into());
    }

    let expander = Hkdf::<Sha256>::new(Some(HKDF_SALT), signature);
    let mut secret = Zeroizing::new([0_u8; 32]);
    expander
        .expand(HKDF_INFO, secret.as_mut_slice())
        .map_err(|_| SealError::Crypto)?;
    Ok(SealingKey {
        kid: key_id(&identity.key_blob),
        secret,
    })
}

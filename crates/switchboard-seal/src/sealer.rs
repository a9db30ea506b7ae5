//! Agent-backed sealing.

use tracing::debug;
use zeroize::Zeroizing;

use crate::agent::AgentConnector;
use crate::error::SealError;
use crate::key::{SealingKey, derive_key};
use crate::token::{ParsedToken, seal_with_key};

const SEALER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::sealer");

/// Seals and opens tokens with a key derived through an SSH agent.
///
/// The key is derived afresh for every call, so removing the identity from
/// the agent immediately stops both operations.
#[derive(Debug, Clone)]
pub struct Sealer<C> {
    connector: C,
}

impl<C: AgentConnector> Sealer<C> {
    /// Creates a sealer using `connector` to reach the agent.
    pub const fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Derives the current sealing key.
    ///
    /// # Errors
    ///
    /// Returns a [`SealError::Agent`] when the agent is unreachable or holds
    /// no usable identity.
    pub fn sealing_key(&self) -> Result<SealingKey, SealError> {
        let mut agent = self.connector.connect()?;
        let key = derive_key(&mut agent)?;
        debug!(target: SEALER_TARGET, kid = key.kid(), "derived sealing key");
        Ok(key)
    }

    /// Seals `plaintext` into a `pwenc:v1:` token.
    ///
    /// # Errors
    ///
    /// Returns a [`SealError`] when key derivation or encryption fails.
    pub fn seal(&self, plaintext: &str) -> Result<String, SealError> {
        let key = self.sealing_key()?;
        seal_with_key(&key, plaintext)
    }

    /// Opens a token produced by [`Sealer::seal`].
    ///
    /// The token is fully decoded before the agent is contacted, so format
    /// errors are reported even when no agent is available.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a [`SealError`].
    pub fn open(&self, token: &str) -> Result<Zeroizing<String>, SealError> {
        let parsed = ParsedToken::parse(token)?;
        let key = self.sealing_key()?;
        parsed.decrypt(&key)
    }
}

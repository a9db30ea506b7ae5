//! Key-value vault over slash-delimited keys.
//!
//! Keys are absolute paths such as `/settings/theme`. Anything stored beneath
//! `/vault/` must already be a sealed token: plaintext is refused so secrets
//! never reach the backend in the clear.

mod backend;

use serde_json::Value;
use switchboard_seal::is_token;
use thiserror::Error;
use tracing::debug;

pub use backend::{FileBackend, KvBackend, MemoryBackend};

/// Prefix of the keys that only accept sealed tokens.
pub const VAULT_PREFIX: &str = "/vault/";

const STORE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::store");

/// Errors raised by the vault store and its backends.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The key is not an absolute slash path without empty segments.
    #[error("invalid key '{key}': keys are absolute paths without empty segments")]
    InvalidKey {
        /// Rejected key.
        key: String,
    },
    /// A `/vault/` key was given a value that is not a sealed token.
    #[error("key '{key}' only accepts sealed tokens")]
    PlaintextRejected {
        /// Key under the vault prefix.
        key: String,
    },
    /// The backing file could not be read or written.
    #[error("store file {path} could not be accessed")]
    Io {
        /// Backing file.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The backing file is not a JSON object.
    #[error("store file {path} is corrupt")]
    Corrupt {
        /// Backing file.
        path: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// Another thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Validated access to a [`KvBackend`].
#[derive(Debug)]
pub struct VaultStore<B> {
    backend: B,
}

impl<B: KvBackend> VaultStore<B> {
    /// Wraps `backend`.
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidKey`] for malformed keys,
    /// [`VaultError::PlaintextRejected`] for non-token values under
    /// `/vault/`, and backend failures.
    pub fn set(&self, key: &str, value: Value) -> Result<(), VaultError> {
        validate_key(key)?;
        if key.starts_with(VAULT_PREFIX) && !value.as_str().is_some_and(is_token) {
            return Err(VaultError::PlaintextRejected {
                key: key.to_owned(),
            });
        }
        self.backend.set(key, value)?;
        debug!(target: STORE_TARGET, key, "stored value");
        Ok(())
    }

    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidKey`] for malformed keys and backend
    /// failures.
    pub fn get(&self, key: &str) -> Result<Option<Value>, VaultError> {
        validate_key(key)?;
        self.backend.get(key)
    }

    /// Removes `key`, reporting whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidKey`] for malformed keys and backend
    /// failures.
    pub fn delete(&self, key: &str) -> Result<bool, VaultError> {
        validate_key(key)?;
        let removed = self.backend.delete(key)?;
        debug!(target: STORE_TARGET, key, removed, "deleted value");
        Ok(removed)
    }

    /// Lists keys at or beneath `prefix` in lexical order.
    ///
    /// `/` lists every key. A prefix matches whole segments only, so `/a`
    /// covers `/a` and `/a/b` but not `/ab`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidKey`] for malformed prefixes and backend
    /// failures.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, VaultError> {
        if prefix != "/" {
            validate_key(prefix)?;
        }
        let mut keys: Vec<String> = self
            .backend
            .keys()?
            .into_iter()
            .filter(|key| is_beneath(key, prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn is_beneath(key: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    key.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Checks that `key` is an absolute slash path without empty segments.
///
/// # Errors
///
/// Returns [`VaultError::InvalidKey`] when the key is malformed.
pub fn validate_key(key: &str) -> Result<(), VaultError> {
    let valid = key
        .strip_prefix('/')
        .is_some_and(|rest| !rest.is_empty() && rest.split('/').all(|segment| !segment.is_empty()));
    if valid {
        Ok(())
    } else {
        Err(VaultError::InvalidKey {
            key: key.to_owned(),
        })
    }
}

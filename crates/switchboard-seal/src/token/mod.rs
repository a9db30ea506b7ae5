//! The sealed token format.
//!
//! A token is `pwenc:v1:` followed by the base64url encoding of a JSON
//! envelope:
//!
//! ```json
//! {"v":1,"kid":"<hex sha256>","alg":"AES-256-GCM",
//!  "nonce":"<b64url>","ct":"<b64url>","ts":1700000000}
//! ```
//!
//! Base64 output is unpadded; padded input is accepted. The ciphertext carries
//! the GCM tag, so any modification is caught when the token is opened.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::error::{FormatError, SealError};
use crate::key::SealingKey;

/// Prefix identifying a sealed token.
pub const TOKEN_PREFIX: &str = "pwenc:v1:";

/// Envelope version written by [`seal_with_key`].
pub const ENVELOPE_VERSION: u64 = 1;

/// Cipher named in every envelope.
pub const ALGORITHM: &str = "AES-256-GCM";

const NONCE_BYTES: usize = 12;

const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Deserialize, Serialize)]
struct Envelope {
    v: u64,
    kid: String,
    alg: String,
    nonce: String,
    ct: String,
    ts: i64,
}

/// A token whose envelope has been decoded and checked, awaiting a key.
#[derive(Debug)]
pub struct ParsedToken {
    kid: String,
    nonce: [u8; NONCE_BYTES],
    ciphertext: Vec<u8>,
    sealed_at: i64,
}

impl ParsedToken {
    /// Decodes `token` without touching any key.
    ///
    /// Checks run in a fixed order: prefix, base64, JSON, version, algorithm,
    /// nonce. The ciphertext is decoded alongside the nonce.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a [`SealError`].
    pub fn parse(token: &str) -> Result<Self, SealError> {
        let encoded = token
            .strip_prefix(TOKEN_PREFIX)
            .ok_or(FormatError::MissingPrefix)?;
        let raw = TOKEN_ENGINE
            .decode(encoded)
            .map_err(FormatError::Base64)?;
        let envelope: Envelope = serde_json::from_slice(&raw).map_err(FormatError::Json)?;

        if envelope.v != ENVELOPE_VERSION {
            return Err(SealError::UnsupportedVersion {
                version: envelope.v,
            });
        }
        if envelope.alg != ALGORITHM {
            return Err(SealError::UnsupportedAlgorithm {
                algorithm: envelope.alg,
            });
        }
        let nonce = TOKEN_ENGINE
            .decode(&envelope.nonce)
            .ok()
            .and_then(|bytes| <[u8; NONCE_BYTES]>::try_from(bytes).ok())
            .ok_or(FormatError::Nonce)?;
        let ciphertext = TOKEN_ENGINE
            .decode(&envelope.ct)
            .map_err(FormatError::Base64)?;

        Ok(Self {
            kid: envelope.kid,
            nonce,
            ciphertext,
            sealed_at: envelope.ts,
        })
    }

    /// Identifier of the key the token was sealed under.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Unix time at which the token was sealed.
    #[must_use]
    pub const fn sealed_at(&self) -> i64 {
        self.sealed_at
    }

    /// Decrypts the token with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SealError::KeyMismatch`] when the token names another key
    /// and [`SealError::Integrity`] when authentication fails.
    pub fn decrypt(&self, key: &SealingKey) -> Result<Zeroizing<String>, SealError> {
        if self.kid != key.kid() {
            return Err(SealError::KeyMismatch {
                expected: key.kid().to_owned(),
                found: self.kid.clone(),
            });
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.secret()));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_slice())
            .map_err(|_| SealError::Integrity)?;
        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(|error| {
                drop(Zeroizing::new(error.into_bytes()));
                SealError::from(FormatError::Utf8)
            })
    }
}

/// Seals `plaintext` under `key` with a fresh random nonce.
///
/// # Errors
///
/// Returns [`SealError::Crypto`] if encryption fails.
pub fn seal_with_key(key: &SealingKey, plaintext: &str) -> Result<String, SealError> {
    let mut nonce = [0_u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.secret()));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| SealError::Crypto)?;

    let envelope = Envelope {
        v: ENVELOPE_VERSION,
        kid: key.kid().to_owned(),
        alg: ALGORITHM.to_owned(),
        nonce: TOKEN_ENGINE.encode(nonce),
        ct: TOKEN_ENGINE.encode(ciphertext),
        ts: OffsetDateTime::now_utc().unix_timestamp(),
    };
    let json = serde_json::to_vec(&envelope).map_err(|_| SealError::Crypto)?;
    Ok(format!("{TOKEN_PREFIX}{}", TOKEN_ENGINE.encode(json)))
}

/// Opens `token` with `key`.
///
/// # Errors
///
/// Returns the first failure in the order documented on
/// [`ParsedToken::parse`], then key mismatch, then integrity.
pub fn open_with_key(key: &SealingKey, token: &str) -> Result<Zeroizing<String>, SealError> {
    ParsedToken::parse(token)?.decrypt(key)
}

/// Returns `true` when `value` has the shape of a sealed token.
///
/// Only the prefix and alphabet are checked; nothing is decrypted.
#[must_use]
pub fn is_token(value: &str) -> bool {
    value
        .strip_prefix(TOKEN_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(is_token_byte))
}

/// Bytes that may follow the prefix inside a token.
pub(crate) const fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'=')
}

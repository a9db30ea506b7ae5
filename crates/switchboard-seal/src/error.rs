//! Error types for agent access, key derivation, and token handling.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// A reply from the SSH agent violated the wire format.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentProtocolError {
    /// The announced frame length exceeds the accepted maximum.
    #[error("agent frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Announced length.
        length: usize,
        /// Accepted maximum.
        limit: usize,
    },
    /// A frame carried no message number.
    #[error("agent sent an empty frame")]
    EmptyFrame,
    /// A field extends past the end of its frame.
    #[error("agent frame truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes required by the field.
        needed: usize,
        /// Bytes left in the frame.
        remaining: usize,
    },
    /// The frame carried bytes after its last field.
    #[error("agent frame has {count} trailing bytes")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },
    /// The reply had an unexpected message number.
    #[error("expected agent message {expected}, received {found}")]
    UnexpectedMessage {
        /// Message number the request calls for.
        expected: u8,
        /// Message number received.
        found: u8,
    },
    /// A signature used a different algorithm than requested.
    #[error("agent signed with '{found}' instead of '{expected}'")]
    UnexpectedAlgorithm {
        /// Requested algorithm.
        expected: String,
        /// Algorithm named in the signature.
        found: String,
    },
    /// A textual field was not valid UTF-8.
    #[error("agent frame contains a non UTF-8 name")]
    InvalidUtf8,
}

/// Failures while talking to the SSH agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Neither the configuration nor the environment names an agent socket.
    #[error("no SSH agent socket configured and SSH_AUTH_SOCK is unset")]
    NotConfigured,
    /// Connecting to the agent socket failed.
    #[error("failed to connect to SSH agent at {path}")]
    Connect {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Reading or writing a frame failed.
    #[error("SSH agent I/O failed")]
    Io(#[from] io::Error),
    /// The agent reply was malformed.
    #[error(transparent)]
    Protocol(#[from] AgentProtocolError),
    /// The agent answered with a failure message.
    #[error("SSH agent refused the request")]
    Refused,
    /// No loaded identity produces deterministic signatures.
    #[error("SSH agent holds no ssh-ed25519 or ssh-rsa identity")]
    NoUsableIdentity,
}

/// A token could not be decoded into an envelope.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The token does not start with the expected prefix.
    #[error("token does not start with 'pwenc:v1:'")]
    MissingPrefix,
    /// A base64url field failed to decode.
    #[error("token is not valid base64url")]
    Base64(#[source] base64::DecodeError),
    /// The decoded envelope is not the expected JSON document.
    #[error("token envelope is not valid JSON")]
    Json(#[source] serde_json::Error),
    /// The nonce is not twelve bytes of base64url.
    #[error("token nonce is malformed")]
    Nonce,
    /// The decrypted plaintext is not UTF-8.
    #[error("sealed plaintext is not UTF-8")]
    Utf8,
}

/// Failures while sealing or opening a token.
#[derive(Debug, Error)]
pub enum SealError {
    /// Deriving the key through the agent failed.
    #[error(transparent)]
    Agent(#[from] AgentError),
    /// The token is malformed.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// The envelope declares an unknown version.
    #[error("unsupported token version {version}")]
    UnsupportedVersion {
        /// Declared version.
        version: u64,
    },
    /// The envelope declares an unknown cipher.
    #[error("unsupported token algorithm '{algorithm}'")]
    UnsupportedAlgorithm {
        /// Declared algorithm.
        algorithm: String,
    },
    /// The token was sealed under a different key.
    #[error("token sealed for key {found}, but the agent key is {expected}")]
    KeyMismatch {
        /// Identifier of the key available now.
        expected: String,
        /// Identifier recorded in the token.
        found: String,
    },
    /// Authenticated decryption failed.
    #[error("token failed integrity verification")]
    Integrity,
    /// Key expansion or encryption failed.
    #[error("sealing failed")]
    Crypto,
}

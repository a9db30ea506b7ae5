//! Minimal SSH agent client.
//!
//! Only the two requests sealing needs are implemented: listing identities
//! and signing a blob. Connections are opened per derivation and dropped
//! afterwards.

pub(crate) mod codec;

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use self::codec::{
    FrameBuilder, FrameReader, SSH_AGENT_IDENTITIES_ANSWER, SSH_AGENT_SIGN_RESPONSE,
    SSH_AGENTC_REQUEST_IDENTITIES, SSH_AGENTC_SIGN_REQUEST, read_frame, write_frame,
};
use crate::error::{AgentError, AgentProtocolError};

pub use self::codec::MAX_FRAME_BYTES;
pub(crate) use self::codec::key_type;

/// Environment variable naming the agent socket.
pub const SSH_AUTH_SOCK_ENV: &str = "SSH_AUTH_SOCK";

/// Flag requesting an `rsa-sha2-256` signature from an RSA key.
pub const SSH_AGENT_RSA_SHA2_256: u32 = 2;

const AGENT_TIMEOUT: Duration = Duration::from_secs(5);
const AGENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::agent");

/// A public key held by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// SSH wire encoding of the public key.
    pub key_blob: Vec<u8>,
    /// Free-form comment, usually the key file name.
    pub comment: String,
}

/// Operations the sealer needs from an agent.
pub trait SigningAgent {
    /// Lists the identities the agent holds, in agent order.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] when the exchange fails.
    fn identities(&mut self) -> Result<Vec<Identity>, AgentError>;

    /// Signs `data` with the key identified by `key_blob`.
    ///
    /// Returns the SSH signature blob: the algorithm name followed by the raw
    /// signature bytes, both as SSH strings.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] when the exchange fails or the agent refuses.
    fn sign(&mut self, key_blob: &[u8], data: &[u8], flags: u32) -> Result<Vec<u8>, AgentError>;
}

impl<A: SigningAgent + ?Sized> SigningAgent for &mut A {
    fn identities(&mut self) -> Result<Vec<Identity>, AgentError> {
        (**self).identities()
    }

    fn sign(&mut self, key_blob: &[u8], data: &[u8], flags: u32) -> Result<Vec<u8>, AgentError> {
        (**self).sign(key_blob, data, flags)
    }
}

/// Agent client speaking the wire protocol over any byte stream.
#[derive(Debug)]
pub struct AgentClient<S> {
    stream: S,
}

impl<S: Read + Write> AgentClient<S> {
    /// Wraps an already connected stream.
    pub const fn new(stream: S) -> Self {
        Self { stream }
    }

    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, AgentError> {
        write_frame(&mut self.stream, request)?;
        read_frame(&mut self.stream)
    }
}

impl<S: Read + Write> SigningAgent for AgentClient<S> {
    fn identities(&mut self) -> Result<Vec<Identity>, AgentError> {
        let request = FrameBuilder::message(SSH_AGENTC_REQUEST_IDENTITIES).finish();
        let frame = self.exchange(&request)?;
        let mut reader = FrameReader::new(&frame);
        reader.expect_message(SSH_AGENT_IDENTITIES_ANSWER)?;
        let count = reader.u32()?;
        let mut identities = Vec::new();
        for _ in 0..count {
            let key_blob = reader.string()?.to_vec();
            let comment = String::from_utf8_lossy(reader.string()?).into_owned();
            identities.push(Identity { key_blob, comment });
        }
        reader.finish()?;
        debug!(target: AGENT_TARGET, count = identities.len(), "listed agent identities");
        Ok(identities)
    }

    fn sign(&mut self, key_blob: &[u8], data: &[u8], flags: u32) -> Result<Vec<u8>, AgentError> {
        let request = FrameBuilder::message(SSH_AGENTC_SIGN_REQUEST)
            .string(key_blob)
            .string(data)
            .u32(flags)
            .finish();
        let frame = self.exchange(&request)?;
        let mut reader = FrameReader::new(&frame);
        reader.expect_message(SSH_AGENT_SIGN_RESPONSE)?;
        let signature = reader.string()?.to_vec();
        reader.finish()?;
        Ok(signature)
    }
}

/// Splits an SSH signature blob into its algorithm name and raw bytes.
///
/// # Errors
///
/// Returns an [`AgentProtocolError`] when the blob is malformed.
pub fn parse_signature(blob: &[u8]) -> Result<(&str, &[u8]), AgentProtocolError> {
    let mut reader = FrameReader::new(blob);
    let algorithm = reader.utf8()?;
    let bytes = reader.string()?;
    reader.finish()?;
    Ok((algorithm, bytes))
}

/// Opens connections to a signing agent.
pub trait AgentConnector {
    /// Agent type produced by a connection.
    type Agent: SigningAgent;

    /// Opens a fresh agent connection.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] when no agent is reachable.
    fn connect(&self) -> Result<Self::Agent, AgentError>;
}

/// Connects to the agent listening on a Unix socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshAgentConnector {
    socket: Option<Utf8PathBuf>,
}

impl SshAgentConnector {
    /// Uses `configured` when present, otherwise `SSH_AUTH_SOCK` at connect
    /// time.
    #[must_use]
    pub fn new(configured: Option<&Utf8Path>) -> Self {
        Self {
            socket: configured.map(Utf8Path::to_path_buf),
        }
    }

    fn socket_path(&self) -> Result<Utf8PathBuf, AgentError> {
        if let Some(path) = &self.socket {
            return Ok(path.clone());
        }
        std::env::var(SSH_AUTH_SOCK_ENV)
            .ok()
            .filter(|value| !value.is_empty())
            .map(Utf8PathBuf::from)
            .ok_or(AgentError::NotConfigured)
    }
}

impl AgentConnector for SshAgentConnector {
    type Agent = AgentClient<UnixStream>;

    fn connect(&self) -> Result<Self::Agent, AgentError> {
        let path = self.socket_path()?;
        let stream = UnixStream::connect(path.as_std_path()).map_err(|source| AgentError::Connect {
            path: path.clone(),
            source,
        })?;
        stream.set_read_timeout(Some(AGENT_TIMEOUT))?;
        stream.set_write_timeout(Some(AGENT_TIMEOUT))?;
        debug!(target: AGENT_TARGET, socket = %path, "connected to SSH agent");
        Ok(AgentClient::new(stream))
    }
}

//! Framing and field codecs for the SSH agent protocol.
//!
//! Every frame is a big-endian `u32` length followed by that many bytes, the
//! first of which is the message number. Variable-length fields are `string`s
//! in the SSH sense: a `u32` length and the raw bytes.

use std::io::{Read, Write};

use crate::error::{AgentError, AgentProtocolError};

/// Largest frame accepted from an agent.
pub const MAX_FRAME_BYTES: usize = 256 * 1024;

pub(crate) const SSH_AGENT_FAILURE: u8 = 5;
pub(crate) const SSH_AGENTC_REQUEST_IDENTITIES: u8 = 11;
pub(crate) const SSH_AGENT_IDENTITIES_ANSWER: u8 = 12;
pub(crate) const SSH_AGENTC_SIGN_REQUEST: u8 = 13;
pub(crate) const SSH_AGENT_SIGN_RESPONSE: u8 = 14;

/// Writes one frame holding `payload`.
pub(crate) fn write_frame<W: Write + ?Sized>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), AgentError> {
    let length = u32::try_from(payload.len()).map_err(|_| AgentProtocolError::FrameTooLarge {
        length: payload.len(),
        limit: MAX_FRAME_BYTES,
    })?;
    writer.write_all(&length.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame, rejecting empty and oversized frames before allocating.
pub(crate) fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>, AgentError> {
    let mut prefix = [0_u8; 4];
    reader.read_exact(&mut prefix)?;
    let length = usize::try_from(u32::from_be_bytes(prefix)).unwrap_or(usize::MAX);
    if length == 0 {
        return Err(AgentProtocolError::EmptyFrame.into());
    }
    if length > MAX_FRAME_BYTES {
        return Err(AgentProtocolError::FrameTooLarge {
            length,
            limit: MAX_FRAME_BYTES,
        }
        .into());
    }
    let mut frame = vec![0_u8; length];
    reader.read_exact(&mut frame)?;
    Ok(frame)
}

/// Appends SSH wire fields to a buffer.
#[derive(Debug, Default)]
pub(crate) struct FrameBuilder {
    bytes: Vec<u8>,
}

impl FrameBuilder {
    pub(crate) fn message(number: u8) -> Self {
        Self {
            bytes: vec![number],
        }
    }

    pub(crate) fn u32(mut self, value: u32) -> Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn string(self, value: &[u8]) -> Self {
        // Frames are capped well below u32::MAX; saturate rather than wrap.
        let length = u32::try_from(value.len()).unwrap_or(u32::MAX);
        let mut builder = self.u32(length);
        builder.bytes.extend_from_slice(value);
        builder
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Bounds-checked cursor over a received frame.
#[derive(Debug)]
pub(crate) struct FrameReader<'a> {
    remaining: &'a [u8],
}

impl<'a> FrameReader<'a> {
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self { remaining: bytes }
    }

    /// Reads the message number and checks it against `expected`.
    ///
    /// An agent failure reply is reported as [`AgentError::Refused`].
    pub(crate) fn expect_message(&mut self, expected: u8) -> Result<(), AgentError> {
        let found = self.u8()?;
        if found == SSH_AGENT_FAILURE {
            return Err(AgentError::Refused);
        }
        if found != expected {
            return Err(AgentProtocolError::UnexpectedMessage { expected, found }.into());
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, AgentProtocolError> {
        let bytes = self.take(1)?;
        Ok(bytes.first().copied().unwrap_or_default())
    }

    pub(crate) fn u32(&mut self) -> Result<u32, AgentProtocolError> {
        let bytes = self.take(4)?;
        let mut array = [0_u8; 4];
        array.copy_from_slice(bytes);
        Ok(u32::from_be_bytes(array))
    }

    pub(crate) fn string(&mut self) -> Result<&'a [u8], AgentProtocolError> {
        let length = usize::try_from(self.u32()?).unwrap_or(usize::MAX);
        self.take(length)
    }

    pub(crate) fn utf8(&mut self) -> Result<&'a str, AgentProtocolError> {
        std::str::from_utf8(self.string()?).map_err(|_| AgentProtocolError::InvalidUtf8)
    }

    pub(crate) fn finish(self) -> Result<(), AgentProtocolError> {
        if self.remaining.is_empty() {
            Ok(())
        } else {
            Err(AgentProtocolError::TrailingBytes {
                count: self.remaining.len(),
            })
        }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], AgentProtocolError> {
        if count > self.remaining.len() {
            return Err(AgentProtocolError::Truncated {
                needed: count,
                remaining: self.remaining.len(),
            });
        }
        let (head, tail) = self.remaining.split_at(count);
        self.remaining = tail;
        Ok(head)
    }
}

/// Returns the key type named at the start of a public key blob.
pub(crate) fn key_type(blob: &[u8]) -> Result<&str, AgentProtocolError> {
    FrameReader::new(blob).utf8()
}

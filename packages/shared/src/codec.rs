//! Newline-delimited framing of envelopes for `tokio_util::codec`.
//!
//! Each frame is one line holding one JSON envelope. JSON escapes embedded
//! newlines, so the line break is an unambiguous delimiter.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{
    envelope::{self, Envelope},
    session::SessionError,
};

/// Maximum length of a single frame, in bytes
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Frames envelopes as JSON lines
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    lines: LinesCodec,
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_FRAME_LENGTH),
        }
    }

    /// Whether `envelope` encodes to a line within [`MAX_FRAME_LENGTH`].
    pub fn fits(envelope: &Envelope) -> bool {
        envelope::encode(envelope).is_ok_and(|line| line.len() <= MAX_FRAME_LENGTH)
    }

    fn decode_line(line: Option<String>) -> Result<Option<Envelope>, SessionError> {
        match line {
            Some(line) => Ok(Some(envelope::decode(&line)?)),
            None => Ok(None),
        }
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl From<LinesCodecError> for SessionError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::MaxLineLengthExceeded => SessionError::FrameTooLong {
                max: MAX_FRAME_LENGTH,
            },
            LinesCodecError::Io(e) => SessionError::Io(e),
        }
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = SessionError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.lines.decode(src)? {
                // blank keep-alive lines carry no envelope
                Some(line) if line.trim().is_empty() => continue,
                line => return Self::decode_line(line),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.lines.decode_eof(src)? {
                Some(line) if line.trim().is_empty() => continue,
                line => return Self::decode_line(line),
            }
        }
    }
}

impl Encoder<&Envelope> for EnvelopeCodec {
    type Error = SessionError;

    fn encode(&mut self, item: &Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = envelope::encode(item)?;
        // the peer's decoder would drop the whole connection on this line
        if line.len() > MAX_FRAME_LENGTH {
            return Err(SessionError::FrameTooLong {
                max: MAX_FRAME_LENGTH,
            });
        }
        self.lines.encode(line, dst)?;
        Ok(())
    }
}

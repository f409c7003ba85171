//! One TCP connection carrying envelopes in both directions.
//!
//! A `Session` is shared behind an `Arc`: the worker that owns the read loop
//! calls [`Session::receive`], while any task (roster broadcast, UI send loop)
//! may call [`Session::send`]. Writers are serialized by an async mutex so
//! frames never interleave on the wire.
//!
//! State machine:
//!
//! ```text
//! Connecting --mark_open--> Open --close / peer error--> Closing --> Closed
//! ```
//!
//! There is no way back to `Open` once `Closing` has been entered.

use std::{
    fmt,
    net::SocketAddr,
    sync::{Mutex, MutexGuard, PoisonError},
};

use futures_util::{SinkExt, StreamExt};
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    sync::CancellationToken,
};
use uuid::Uuid;

use crate::{
    codec::EnvelopeCodec,
    envelope::{DecodeError, EncodeError, Envelope},
};

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Socket read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer sent a frame that is not a valid envelope
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Envelope could not be serialized
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Peer sent a frame longer than the allowed maximum
    #[error("frame exceeds {max} bytes")]
    FrameTooLong { max: usize },

    /// Peer closed the connection
    #[error("peer disconnected")]
    Disconnected,

    /// Session was closed locally
    #[error("session is closed")]
    Closed,
}

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the first group is enough to tell sessions apart in logs
        let text = self.0.simple().to_string();
        f.write_str(&text[..8])
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// One live TCP connection
pub struct Session {
    id: SessionId,
    peer_addr: SocketAddr,
    state: Mutex<SessionState>,
    reader: tokio::sync::Mutex<FramedRead<OwnedReadHalf, EnvelopeCodec>>,
    writer: tokio::sync::Mutex<FramedWrite<OwnedWriteHalf, EnvelopeCodec>>,
    cancel: CancellationToken,
}

impl Session {
    /// Wrap a connected stream. The session starts in `Connecting`.
    pub fn new(stream: TcpStream) -> Result<Self, SessionError> {
        Self::with_cancel(stream, CancellationToken::new())
    }

    /// Wrap a connected stream whose pending reads and writes are also
    /// cancelled when `shutdown` is cancelled.
    pub fn with_shutdown(
        stream: TcpStream,
        shutdown: &CancellationToken,
    ) -> Result<Self, SessionError> {
        Self::with_cancel(stream, shutdown.child_token())
    }

    fn with_cancel(stream: TcpStream, cancel: CancellationToken) -> Result<Self, SessionError> {
        let peer_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            id: SessionId::generate(),
            peer_addr,
            state: Mutex::new(SessionState::Connecting),
            reader: tokio::sync::Mutex::new(FramedRead::new(read_half, EnvelopeCodec::new())),
            writer: tokio::sync::Mutex::new(FramedWrite::new(write_half, EnvelopeCodec::new())),
            cancel,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    /// Move `Connecting` to `Open` once the connection is established.
    ///
    /// Calling it on an open session is a no-op. A session that has started
    /// closing cannot be opened again.
    pub fn mark_open(&self) -> Result<(), SessionError> {
        let mut state = self.lock_state();
        match *state {
            SessionState::Connecting | SessionState::Open => {
                *state = SessionState::Open;
                Ok(())
            }
            SessionState::Closing | SessionState::Closed => Err(SessionError::Closed),
        }
    }

    /// Write one envelope. Concurrent callers are serialized.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), SessionError> {
        if self.state() != SessionState::Open {
            return Err(SessionError::Closed);
        }

        let mut writer = self.writer.lock().await;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(SessionError::Closed),
            result = writer.send(envelope) => result,
        }
    }

    /// Wait for the next envelope from the peer.
    ///
    /// Returns `SessionError::Disconnected` at end of stream and
    /// `SessionError::Closed` when the session is closed while waiting.
    pub async fn receive(&self) -> Result<Envelope, SessionError> {
        if matches!(
            self.state(),
            SessionState::Closing | SessionState::Closed
        ) {
            return Err(SessionError::Closed);
        }

        let mut reader = self.reader.lock().await;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(SessionError::Closed),
            frame = reader.next() => match frame {
                Some(result) => result,
                None => Err(SessionError::Disconnected),
            },
        }
    }

    /// Tear down the connection. Closing twice is a no-op.
    pub async fn close(&self) {
        {
            let mut state = self.lock_state();
            match *state {
                SessionState::Closing | SessionState::Closed => return,
                SessionState::Connecting | SessionState::Open => *state = SessionState::Closing,
            }
        }

        // wakes a blocked receive and any writer waiting on the peer
        self.cancel.cancel();

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.get_mut().shutdown().await {
                tracing::debug!("Session {} shutdown error: {}", self.id, e);
            }
        }

        *self.lock_state() = SessionState::Closed;
        tracing::debug!("Session {} ({}) closed", self.id, self.peer_addr);
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

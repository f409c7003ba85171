//! Shared building blocks for the lanchat server and client.
//!
//! This crate provides the wire envelope and its codec, the TCP session used
//! on both ends of a connection, connection parameters and the logging
//! collaborator the protocol engine reports through.

pub mod codec;
pub mod connection;
pub mod envelope;
pub mod event_log;
pub mod logger;
pub mod session;
pub mod time;
pub mod username;

pub use codec::{EnvelopeCodec, MAX_FRAME_LENGTH};
pub use connection::{ConnectError, ConnectionInfo, DEFAULT_PORT};
pub use envelope::{DecodeError, EncodeError, Envelope, EnvelopeKind, decode, encode};
pub use event_log::{EventLog, TracingLog};
pub use session::{Session, SessionError, SessionId, SessionState};
pub use username::{Username, UsernameError};

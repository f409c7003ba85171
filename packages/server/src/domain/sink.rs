//! Envelope sink trait.
//!
//! The roster never touches sockets directly. It writes through this trait,
//! which the infrastructure layer implements for `Session`.

use async_trait::async_trait;
use lanchat_shared::{Envelope, SessionError, SessionId};

/// Destination the roster can deliver envelopes to
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnvelopeSink: Send + Sync {
    /// Identity used as the roster key
    fn session_id(&self) -> SessionId;

    /// Write one envelope
    async fn deliver(&self, envelope: &Envelope) -> Result<(), SessionError>;

    /// Close the underlying connection. Must be idempotent.
    async fn shut(&self);
}

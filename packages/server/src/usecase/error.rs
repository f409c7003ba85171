//! UseCase 層のエラー型

use lanchat_shared::{EnvelopeKind, Username};
use thiserror::Error;

/// An inbound envelope the server refuses to act on
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// LOGIN on a session that already has a bound username
    #[error("session is already logged in as '{0}'")]
    AlreadyIdentified(Username),

    /// Anything but LOGIN before the session logged in
    #[error("{0} received before LOGIN")]
    NotIdentified(EnvelopeKind),

    /// Anything received after the session logged out
    #[error("{0} received after the session was closed")]
    SessionClosed(EnvelopeKind),

    /// MESSAGE whose relayed form would not fit in one frame
    #[error("MESSAGE from '{user}' exceeds {max} bytes once relayed")]
    MessageTooLong { user: Username, max: usize },
}

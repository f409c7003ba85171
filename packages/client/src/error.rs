//! Error types for the chat client.

use lanchat_shared::{ConnectError, SessionError};
use thiserror::Error;

use crate::queue::QueueClosed;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Server could not be reached, or the connection info is incomplete
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Session could not be opened
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Envelope submitted after the client stopped sending
    #[error(transparent)]
    Queue(#[from] QueueClosed),

    /// Chat line that would not fit in one frame
    #[error("Message is too long: more than {max} bytes once encoded")]
    MessageTooLong { max: usize },
}

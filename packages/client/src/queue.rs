//! Outbound queue of the client.
//!
//! Producers (the input loop, the client itself) submit envelopes without
//! blocking. A single sender loop drains the queue in FIFO order into the
//! session. The queue is unbounded; a chat client produces at typing speed.

use std::sync::Arc;

use lanchat_shared::{Envelope, EnvelopeKind, Session, SessionError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The consuming side of the queue is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("outbound queue is closed")]
pub struct QueueClosed;

/// Create a connected sender / receiver pair.
pub fn outbound_queue() -> (OutboundSender, OutboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundSender { tx }, OutboundReceiver { rx })
}

/// Producer handle. Cheap to clone; each clone keeps the queue alive.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl OutboundSender {
    /// Enqueue `envelope` without waiting.
    ///
    /// # Errors
    ///
    /// Returns `QueueClosed` once the receiver was closed or dropped.
    pub fn submit(&self, envelope: Envelope) -> Result<(), QueueClosed> {
        self.tx.send(envelope).map_err(|_| QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer handle, owned by the sender loop
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl OutboundReceiver {
    /// Next envelope in submission order.
    ///
    /// Waits while the queue is empty. Returns `None` when every sender is
    /// dropped, or after [`OutboundReceiver::close`] once the backlog is drained.
    pub async fn next(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Refuse further submissions. Already queued envelopes stay readable.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Drain `queue` into `session` until the queue ends, `stop` fires, or a
/// LOGOUT has been written.
///
/// Returns `true` when a LOGOUT went out. Writing the LOGOUT closes the queue
/// and the session. An envelope too long for one frame is dropped and the
/// loop goes on; any other write failure closes the session.
pub async fn run_sender_loop(
    mut queue: OutboundReceiver,
    session: Arc<Session>,
    stop: CancellationToken,
) -> Result<bool, SessionError> {
    loop {
        let envelope = tokio::select! {
            _ = stop.cancelled() => break,
            envelope = queue.next() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };

        match session.send(&envelope).await {
            Ok(()) => {}
            Err(e @ (SessionError::FrameTooLong { .. } | SessionError::Encode(_))) => {
                tracing::warn!("Dropped outbound {}: {}", envelope.kind(), e);
                continue;
            }
            Err(e) => {
                queue.close();
                session.close().await;
                return Err(e);
            }
        }

        if envelope.kind() == EnvelopeKind::Logout {
            tracing::debug!("LOGOUT sent, closing session {}", session.id());
            queue.close();
            session.close().await;
            return Ok(true);
        }
    }

    queue.close();
    Ok(false)
}

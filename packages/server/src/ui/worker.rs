//! Connection worker: one task per accepted TCP connection.
//!
//! Reads envelopes in order and hands each one to the dispatcher before
//! reading the next, so one peer's envelopes are processed sequentially. Any
//! read failure ends the loop and triggers the implicit logout.

use std::sync::Arc;

use lanchat_shared::{Session, SessionError};

use crate::usecase::{Flow, PeerContext, ServerDispatcher};

/// Drive `session` until it logs out, fails or is closed.
pub async fn run_session_worker(session: Arc<Session>, dispatcher: Arc<ServerDispatcher>) {
    let session_id = session.id();
    let peer_addr = session.peer_addr();

    if let Err(e) = session.mark_open() {
        tracing::debug!("Session {} closed before it opened: {}", session_id, e);
        return;
    }
    tracing::info!("Session {} opened for {}", session_id, peer_addr);

    let mut peer = PeerContext::new(session.clone());

    loop {
        let envelope = match session.receive().await {
            Ok(envelope) => envelope,
            Err(SessionError::Closed) => {
                tracing::debug!("Session {} closed locally", session_id);
                break;
            }
            Err(SessionError::Disconnected) => {
                tracing::info!("Peer {} disconnected", peer_addr);
                break;
            }
            Err(e) => {
                dispatcher
                    .log()
                    .log_error_message(&format!("Error reading from {}: {}", peer_addr, e));
                break;
            }
        };

        match dispatcher.dispatch(&mut peer, envelope).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Close) => break,
            Err(violation) => {
                dispatcher.log().log_error_message(&format!(
                    "Ignored envelope from {}: {}",
                    peer_addr, violation
                ));
            }
        }
    }

    dispatcher.disconnect(&mut peer).await;
    tracing::info!("Session {} for {} finished", session_id, peer_addr);
}

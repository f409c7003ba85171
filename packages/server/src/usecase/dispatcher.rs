//! UseCase: 受信エンベロープの処理（サーバー側プロトコルディスパッチャ）
//!
//! ## 状態遷移
//!
//! ```text
//! Anonymous --LOGIN--> Identified --LOGOUT / read failure--> Closed
//! ```
//!
//! - LOGIN: bind the username, register in the roster, broadcast LOGIN and the
//!   full WHOISIN list.
//! - WHOISIN: answer the requester only.
//! - MESSAGE: broadcast under the session's bound username.
//! - LOGOUT: unregister, broadcast LOGOUT then WHOISIN of the remaining users.
//! - Read failure: unregister and broadcast WHOISIN only. No LOGOUT is sent on
//!   behalf of a peer that never sent one.
//!
//! A LOGIN with a taken or invalid username is answered with a LOGOUT to the
//! requester alone, carrying the reason, and the connection is closed.

use std::sync::Arc;

use lanchat_shared::{
    Envelope, EnvelopeCodec, EnvelopeKind, EventLog, MAX_FRAME_LENGTH, SessionId, Username,
    envelope,
};

use crate::domain::{BroadcastReport, EnvelopeSink, Roster, RosterError};

use super::error::ProtocolViolation;

/// Logical state of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Anonymous,
    Identified(Username),
    Closed,
}

/// What the worker should do after a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Per-connection context owned by the worker
pub struct PeerContext {
    sink: Arc<dyn EnvelopeSink>,
    state: ConnectionState,
}

impl PeerContext {
    pub fn new(sink: Arc<dyn EnvelopeSink>) -> Self {
        Self {
            sink,
            state: ConnectionState::Anonymous,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.sink.session_id()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }
}

/// Server-side protocol dispatcher, shared by all connection workers
pub struct ServerDispatcher {
    roster: Arc<Roster>,
    log: Arc<dyn EventLog>,
}

impl ServerDispatcher {
    pub fn new(roster: Arc<Roster>, log: Arc<dyn EventLog>) -> Self {
        Self { roster, log }
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    /// Handle one inbound envelope for `peer`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` when the envelope is not allowed in the
    /// connection's current state, or when a MESSAGE would be too long to
    /// relay. The caller logs it and keeps reading.
    pub async fn dispatch(
        &self,
        peer: &mut PeerContext,
        envelope: Envelope,
    ) -> Result<Flow, ProtocolViolation> {
        tracing::debug!("Session {} received {}", peer.session_id(), envelope);

        let kind = envelope.kind();
        let user = match peer.state.clone() {
            ConnectionState::Closed => return Err(ProtocolViolation::SessionClosed(kind)),
            ConnectionState::Anonymous if kind == EnvelopeKind::Login => {
                return Ok(self.handle_login(peer, &envelope).await);
            }
            ConnectionState::Anonymous => return Err(ProtocolViolation::NotIdentified(kind)),
            ConnectionState::Identified(user) => user,
        };

        match kind {
            EnvelopeKind::Login => Err(ProtocolViolation::AlreadyIdentified(user)),
            EnvelopeKind::Whoisin => Ok(self.handle_whoisin(peer, &user).await),
            EnvelopeKind::Message => self.handle_message(&user, &envelope).await,
            EnvelopeKind::Logout => Ok(self.handle_logout(peer, &user, &envelope).await),
        }
    }

    /// Tear down `peer` after its read loop ended.
    ///
    /// For a session still registered this is the implicit logout: it is
    /// removed and the remaining users get a WHOISIN update, but no LOGOUT.
    pub async fn disconnect(&self, peer: &mut PeerContext) {
        let state = std::mem::replace(&mut peer.state, ConnectionState::Closed);

        if let ConnectionState::Identified(user) = state
            && let Some(removed) = self.roster.remove(peer.session_id()).await
        {
            self.log.log_error_message(&format!(
                "Connection to '{}' lost, removed from the roster",
                user
            ));
            let update = Envelope::whoisin(&removed, &self.roster.list_users().await);
            self.broadcast(&update).await;
        }

        peer.sink.shut().await;
    }

    async fn handle_login(&self, peer: &mut PeerContext, envelope: &Envelope) -> Flow {
        let user = match Username::new(envelope.user()) {
            Ok(user) => user,
            Err(e) => {
                return self
                    .reject_login(peer, envelope.user(), &format!("Invalid username: {}", e))
                    .await;
            }
        };

        if let Err(RosterError::DuplicateUser(user)) =
            self.roster.try_add(peer.sink.clone(), user.clone()).await
        {
            return self
                .reject_login(
                    peer,
                    user.as_str(),
                    &format!("Username '{}' is already logged in", user),
                )
                .await;
        }

        peer.state = ConnectionState::Identified(user.clone());
        self.log
            .log_message(&format!("{} : {}", user, envelope.payload()));

        self.broadcast(&Envelope::new(
            EnvelopeKind::Login,
            user.as_str(),
            envelope.payload(),
        ))
        .await;
        let users = self.roster.list_users().await;
        self.broadcast(&Envelope::whoisin(&user, &users)).await;

        Flow::Continue
    }

    async fn handle_whoisin(&self, peer: &PeerContext, user: &Username) -> Flow {
        let users = self.roster.list_users().await;
        tracing::debug!(
            "'{}' asked who is in: {}",
            user,
            envelope::roster_payload(&users)
        );

        let report = self
            .roster
            .send_to(peer.session_id(), &Envelope::whoisin(user, &users))
            .await;
        if report.evicted.is_empty() {
            Flow::Continue
        } else {
            self.follow_up_evictions(report).await;
            Flow::Close
        }
    }

    async fn handle_message(
        &self,
        user: &Username,
        envelope: &Envelope,
    ) -> Result<Flow, ProtocolViolation> {
        if envelope.user() != user.as_str() {
            tracing::warn!(
                "Session of '{}' sent a message as '{}', relaying under '{}'",
                user,
                envelope.user(),
                user
            );
        }

        // the relayed line carries the bound username and can outgrow the
        // inbound one; recipients would drop a frame over the limit
        let relayed = Envelope::message(user, envelope.payload());
        if !EnvelopeCodec::fits(&relayed) {
            return Err(ProtocolViolation::MessageTooLong {
                user: user.clone(),
                max: MAX_FRAME_LENGTH,
            });
        }

        self.broadcast(&relayed).await;
        Ok(Flow::Continue)
    }

    async fn handle_logout(
        &self,
        peer: &mut PeerContext,
        user: &Username,
        envelope: &Envelope,
    ) -> Flow {
        let removed = self.roster.remove(peer.session_id()).await;
        peer.state = ConnectionState::Closed;
        self.log
            .log_message(&format!("{} : {}", user, envelope.payload()));

        // already evicted by a failed write; the others were told then
        if removed.is_none() {
            return Flow::Close;
        }

        self.broadcast(&Envelope::new(
            EnvelopeKind::Logout,
            user.as_str(),
            envelope.payload(),
        ))
        .await;
        let users = self.roster.list_users().await;
        self.broadcast(&Envelope::whoisin(user, &users)).await;

        Flow::Close
    }

    async fn reject_login(&self, peer: &mut PeerContext, user: &str, reason: &str) -> Flow {
        self.log
            .log_error_message(&format!("Rejected login of '{}': {}", user, reason));

        let refusal = Envelope::new(EnvelopeKind::Logout, user, reason);
        if let Err(e) = peer.sink.deliver(&refusal).await {
            tracing::debug!("Could not send login refusal to '{}': {}", user, e);
        }

        peer.state = ConnectionState::Closed;
        Flow::Close
    }

    /// Broadcast and keep the remaining users' roster current when a write
    /// failure evicted someone.
    async fn broadcast(&self, envelope: &Envelope) {
        let report = self.roster.broadcast(envelope).await;
        self.follow_up_evictions(report).await;
    }

    async fn follow_up_evictions(&self, mut report: BroadcastReport) {
        // each round removes at least one entry, so this ends
        while let Some(user) = report.evicted.first().cloned() {
            for evicted in &report.evicted {
                self.log.log_error_message(&format!(
                    "Delivery to '{}' failed, removed from the roster",
                    evicted
                ));
            }
            let update = Envelope::whoisin(&user, &self.roster.list_users().await);
            report = self.roster.broadcast(&update).await;
        }
    }
}

//! Client-side handling of envelopes received from the server.
//!
//! Keeps a local copy of the roster: replaced on every WHOISIN, patched on
//! LOGIN and LOGOUT of other users. A LOGOUT naming this client before the
//! server acknowledged the login is a refusal.

use std::sync::Arc;

use lanchat_shared::{Envelope, EnvelopeKind, EventLog, Username, envelope::parse_roster_payload};

use crate::presentation::Presentation;

/// What the read loop should do after a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFlow {
    Continue,
    /// The server refused the login, with its reason
    Rejected(String),
}

pub struct ClientDispatcher {
    me: Username,
    accepted: bool,
    roster: Vec<Username>,
    presentation: Arc<dyn Presentation>,
    log: Arc<dyn EventLog>,
}

impl ClientDispatcher {
    pub fn new(me: Username, presentation: Arc<dyn Presentation>, log: Arc<dyn EventLog>) -> Self {
        Self {
            me,
            accepted: false,
            roster: Vec::new(),
            presentation,
            log,
        }
    }

    /// Last known roster, in login order
    pub fn roster(&self) -> &[Username] {
        &self.roster
    }

    /// Whether the server acknowledged the login
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn dispatch(&mut self, envelope: Envelope) -> ClientFlow {
        let is_me = envelope.user() == self.me.as_str();

        match envelope.kind() {
            EnvelopeKind::Login if is_me => {
                self.accepted = true;
                self.log.log_message(&format!("Logged in as '{}'", self.me));
            }
            EnvelopeKind::Login => {
                if let Ok(user) = Username::new(envelope.user())
                    && !self.roster.contains(&user)
                {
                    self.roster.push(user);
                }
                self.presentation.show_joined(envelope.user());
            }
            EnvelopeKind::Whoisin => {
                self.accepted = true;
                self.roster = parse_roster_payload(envelope.payload());
                self.presentation.show_roster(&self.roster);
            }
            EnvelopeKind::Message => {
                self.presentation
                    .show_chat(envelope.user(), envelope.payload());
            }
            EnvelopeKind::Logout if is_me && !self.accepted => {
                self.log
                    .log_error_message(&format!("Login refused: {}", envelope.payload()));
                return ClientFlow::Rejected(envelope.payload().to_string());
            }
            EnvelopeKind::Logout if is_me => {
                tracing::debug!("Ignoring LOGOUT echo for '{}'", self.me);
            }
            EnvelopeKind::Logout => {
                self.roster.retain(|user| user.as_str() != envelope.user());
                self.presentation.show_left(envelope.user());
            }
        }

        ClientFlow::Continue
    }
}

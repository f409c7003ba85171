//! LAN chat server.
//!
//! Accepts TCP connections, tracks who is logged in and relays chat envelopes
//! to every registered session.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub use domain::{BroadcastReport, EnvelopeSink, Roster, RosterError};
pub use ui::{ChatServer, ShutdownHandle};
pub use usecase::{ConnectionState, Flow, PeerContext, ProtocolViolation, ServerDispatcher};

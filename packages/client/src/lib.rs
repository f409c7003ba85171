//! LAN chat client.
//!
//! Connects to a chat server, logs in, keeps a local copy of the roster and
//! sends chat lines through an outbound queue drained by its own task.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod presentation;
pub mod queue;

pub use client::{ChatClient, ClientExit, ClientHandle};
pub use dispatcher::{ClientDispatcher, ClientFlow};
pub use error::ClientError;
pub use formatter::MessageFormatter;
pub use presentation::{Presentation, TerminalPresentation};
pub use queue::{OutboundReceiver, OutboundSender, QueueClosed, outbound_queue};

//! Connection parameters and connection-level errors.

use std::io;

use thiserror::Error;

use crate::username::Username;

/// Default TCP port of the chat service
pub const DEFAULT_PORT: u16 = 1500;

/// Errors raised while binding or connecting. Fatal to the attempt; never retried.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Server could not be reached
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Connection info lacks a value the caller needs
    #[error("connection info has no {0}")]
    Missing(&'static str),
}

/// Immutable connection parameters, built once before the service starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    user: Option<Username>,
    server_address: String,
    port: u16,
}

impl ConnectionInfo {
    /// Parameters for a server listening on `bind_address:port`
    pub fn server(bind_address: impl Into<String>, port: u16) -> Self {
        Self {
            user: None,
            server_address: bind_address.into(),
            port,
        }
    }

    /// Parameters for a client logging in as `user` at `server_address:port`
    pub fn client(user: Username, server_address: impl Into<String>, port: u16) -> Self {
        Self {
            user: Some(user),
            server_address: server_address.into(),
            port,
        }
    }

    pub fn user(&self) -> Option<&Username> {
        self.user.as_ref()
    }

    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form accepted by `TcpListener::bind` and `TcpStream::connect`
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.server_address, self.port)
    }
}

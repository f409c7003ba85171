//! Connection supervisor of the chat server.

use std::{io, net::SocketAddr, sync::Arc};

use lanchat_shared::{ConnectError, ConnectionInfo, EventLog, Session, TracingLog};
use tokio::{net::TcpListener, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{domain::Roster, usecase::ServerDispatcher};

use super::worker::run_session_worker;

/// TCP chat server
///
/// Owns the listening socket and the shared roster. Every accepted
/// connection gets its own worker task.
///
/// # Example
///
/// ```ignore
/// let server = ChatServer::bind(&ConnectionInfo::server("0.0.0.0", 1500)).await?;
/// let handle = server.shutdown_handle();
/// tokio::spawn(async move {
///     shutdown_signal().await;
///     handle.stop();
/// });
/// server.run().await;
/// ```
pub struct ChatServer {
    listener: TcpListener,
    dispatcher: Arc<ServerDispatcher>,
    shutdown: CancellationToken,
}

/// Stops a running [`ChatServer`] from another task
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Ask the server to stop. Calling it more than once is harmless.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Server stop requested");
        }
        self.token.cancel();
    }
}

impl ChatServer {
    /// Bind the listening socket, reporting protocol events through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectError::Bind` if the address cannot be bound.
    pub async fn bind(info: &ConnectionInfo) -> Result<Self, ConnectError> {
        Self::bind_with_log(info, Arc::new(TracingLog)).await
    }

    /// Bind the listening socket with a custom event log.
    pub async fn bind_with_log(
        info: &ConnectionInfo,
        log: Arc<dyn EventLog>,
    ) -> Result<Self, ConnectError> {
        let addr = info.socket_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ConnectError::Bind {
                addr: addr.clone(),
                source,
            })?;

        let roster = Arc::new(Roster::new());
        Ok(Self {
            listener,
            dispatcher: Arc::new(ServerDispatcher::new(roster, log)),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn roster(&self) -> Arc<Roster> {
        self.dispatcher.roster().clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
        }
    }

    /// Accept connections until [`ShutdownHandle::stop`] is called, then close
    /// every session and wait for the workers.
    pub async fn run(self) {
        let log = self.dispatcher.log().clone();
        match self.listener.local_addr() {
            Ok(addr) => log.log_message(&format!("Server waiting for clients on {}", addr)),
            Err(e) => log.log_error_message(&format!(
                "Server waiting for clients on an unknown address: {}",
                e
            )),
        }

        let mut workers = JoinSet::new();

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => match Session::with_shutdown(stream, &self.shutdown) {
                    Ok(session) => {
                        tracing::debug!("Accepted connection from {}", addr);
                        workers.spawn(run_session_worker(
                            Arc::new(session),
                            self.dispatcher.clone(),
                        ));
                    }
                    Err(e) => tracing::warn!("Could not set up session for {}: {}", addr, e),
                },
                Err(e) => log.log_error_message(&format!("Failed to accept connection: {}", e)),
            }

            // reap finished workers so the set does not grow with every connection
            while let Some(result) = workers.try_join_next() {
                if let Err(e) = result {
                    tracing::error!("Connection worker failed: {}", e);
                }
            }
        }

        log.log_message("Server will shut down.");
        let sinks = self.dispatcher.roster().drain().await;
        tracing::info!("Closing {} logged-in session(s)", sinks.len());
        for sink in sinks {
            sink.shut().await;
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("Connection worker failed: {}", e);
            }
        }

        tracing::info!("Server shutdown complete");
    }
}

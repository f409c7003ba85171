//! Client connection supervisor.
//!
//! `ChatClient::connect` opens the session, queues LOGIN and a first
//! WHOISIN, then runs two tasks: the read loop feeding the
//! [`ClientDispatcher`] and the sender loop draining the outbound queue.

use std::sync::Arc;

use lanchat_shared::{
    ConnectError, ConnectionInfo, Envelope, EnvelopeCodec, EventLog, MAX_FRAME_LENGTH, Session,
    SessionError, SessionState, Username,
};
use tokio::{net::TcpStream, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    dispatcher::{ClientDispatcher, ClientFlow},
    error::ClientError,
    presentation::Presentation,
    queue::{OutboundSender, QueueClosed, outbound_queue, run_sender_loop},
};

/// How a client session ended
#[derive(Debug)]
pub enum ClientExit {
    /// LOGOUT was sent and the session closed
    LoggedOut,
    /// The connection was closed locally without a LOGOUT
    Closed,
    /// The server refused the login
    Rejected(String),
    /// The connection failed without a LOGOUT from this side
    ConnectionLost(SessionError),
}

enum ReadEnd {
    ClosedLocally,
    Rejected(String),
    Failed(SessionError),
}

/// Producer side of a [`ChatClient`], usable from any task
#[derive(Debug, Clone)]
pub struct ClientHandle {
    user: Username,
    outbound: OutboundSender,
}

impl ClientHandle {
    pub fn user(&self) -> &Username {
        &self.user
    }

    /// Ask the server for the current roster.
    pub fn request_roster(&self) -> Result<(), QueueClosed> {
        self.outbound.submit(Envelope::whoisin_request(&self.user))
    }

    /// Send a chat line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::MessageTooLong` when the line would not fit in
    /// one frame; nothing is queued then and the session stays up.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ClientError> {
        let envelope = Envelope::message(&self.user, text);
        if !EnvelopeCodec::fits(&envelope) {
            return Err(ClientError::MessageTooLong {
                max: MAX_FRAME_LENGTH,
            });
        }
        self.outbound.submit(envelope)?;
        Ok(())
    }

    /// Queue a LOGOUT. The session closes once it has been written.
    pub fn logout(&self) -> Result<(), QueueClosed> {
        self.outbound.submit(Envelope::logout(&self.user))
    }
}

/// A logged-in chat client
pub struct ChatClient {
    handle: ClientHandle,
    session: Arc<Session>,
    reader: JoinHandle<ReadEnd>,
    sender: JoinHandle<Result<bool, SessionError>>,
}

impl ChatClient {
    /// Connect to the server named by `info` and log in as its user.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Connect` when `info` has no user or the server
    /// cannot be reached.
    pub async fn connect(
        info: &ConnectionInfo,
        presentation: Arc<dyn Presentation>,
        log: Arc<dyn EventLog>,
    ) -> Result<Self, ClientError> {
        let user = info.user().cloned().ok_or(ConnectError::Missing("user"))?;
        let addr = info.socket_address();

        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ConnectError::Connect {
                addr: addr.clone(),
                source,
            })?;
        let session = Arc::new(Session::new(stream)?);
        session.mark_open()?;
        log.log_message(&format!(
            "Connection accepted {} (session {})",
            session.peer_addr(),
            session.id()
        ));

        let (outbound, queue) = outbound_queue();
        outbound.submit(Envelope::login(&user))?;
        outbound.submit(Envelope::whoisin_request(&user))?;

        let stop = CancellationToken::new();
        let sender = tokio::spawn(run_sender_loop(queue, session.clone(), stop.clone()));

        let dispatcher = ClientDispatcher::new(user.clone(), presentation, log);
        let reader = tokio::spawn(run_read_loop(session.clone(), dispatcher, stop));

        Ok(Self {
            handle: ClientHandle { user, outbound },
            session,
            reader,
            sender,
        })
    }

    pub fn user(&self) -> &Username {
        self.handle.user()
    }

    /// Another producer handle for chat lines, roster requests and LOGOUT
    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    /// Close the connection without logging out.
    pub async fn close(&self) {
        self.session.close().await;
    }

    /// Wait for the session to end.
    pub async fn wait(self) -> ClientExit {
        let read_end = match self.reader.await {
            Ok(read_end) => read_end,
            Err(e) => ReadEnd::Failed(SessionError::Io(std::io::Error::other(e))),
        };
        let sent = match self.sender.await {
            Ok(sent) => sent,
            Err(e) => Err(SessionError::Io(std::io::Error::other(e))),
        };

        match (read_end, sent) {
            (ReadEnd::Rejected(reason), _) => ClientExit::Rejected(reason),
            (ReadEnd::Failed(e), _) => ClientExit::ConnectionLost(e),
            // a write cut short by our own close
            (ReadEnd::ClosedLocally, Err(SessionError::Closed)) => ClientExit::Closed,
            (ReadEnd::ClosedLocally, Err(e)) => ClientExit::ConnectionLost(e),
            (ReadEnd::ClosedLocally, Ok(true)) => ClientExit::LoggedOut,
            (ReadEnd::ClosedLocally, Ok(false)) => ClientExit::Closed,
        }
    }
}

async fn run_read_loop(
    session: Arc<Session>,
    mut dispatcher: ClientDispatcher,
    stop: CancellationToken,
) -> ReadEnd {
    let end = loop {
        match session.receive().await {
            Ok(envelope) => {
                if let ClientFlow::Rejected(reason) = dispatcher.dispatch(envelope) {
                    break ReadEnd::Rejected(reason);
                }
            }
            Err(SessionError::Closed) => break ReadEnd::ClosedLocally,
            // the peer's close raced our own
            Err(_) if session.state() != SessionState::Open => break ReadEnd::ClosedLocally,
            Err(e) => {
                tracing::warn!("Connection to the server lost: {}", e);
                break ReadEnd::Failed(e);
            }
        }
    };

    stop.cancel();
    session.close().await;
    end
}

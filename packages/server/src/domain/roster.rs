//! Roster of logged-in sessions.
//!
//! ## 責務
//!
//! - ログイン済みセッションとユーザー名の対応を登録順に保持する
//! - 全セッションへのブロードキャスト（部分失敗を許容）
//! - WHOISIN 用のユーザー名一覧の提供
//!
//! ## 設計ノート
//!
//! All mutation happens under one roster-wide lock. `broadcast` copies the
//! target list under the lock and performs socket I/O after releasing it, so a
//! slow peer never blocks logins or logouts of other connections.

use std::sync::Arc;

use lanchat_shared::{Envelope, SessionId, Username};
use tokio::sync::Mutex;

use super::{error::RosterError, sink::EnvelopeSink};

struct RosterEntry {
    sink: Arc<dyn EnvelopeSink>,
    user: Username,
}

/// Outcome of a broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Number of sessions the envelope was written to
    pub delivered: usize,
    /// Users removed because their write failed
    pub evicted: Vec<Username>,
}

/// Shared registry of identified sessions, in registration order
#[derive(Default)]
pub struct Roster {
    entries: Mutex<Vec<RosterEntry>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Usernames are not required to be unique here.
    pub async fn add(&self, sink: Arc<dyn EnvelopeSink>, user: Username) {
        let mut entries = self.entries.lock().await;
        tracing::debug!("Roster add '{}' (session {})", user, sink.session_id());
        entries.push(RosterEntry { sink, user });
    }

    /// Register a session unless its username is already taken.
    ///
    /// The check and the insert happen under the same lock, so two concurrent
    /// logins with one name cannot both succeed. Returns the position the
    /// session took in the roster.
    pub async fn try_add(
        &self,
        sink: Arc<dyn EnvelopeSink>,
        user: Username,
    ) -> Result<usize, RosterError> {
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|entry| entry.user == user) {
            return Err(RosterError::DuplicateUser(user));
        }
        tracing::debug!("Roster add '{}' (session {})", user, sink.session_id());
        entries.push(RosterEntry { sink, user });
        Ok(entries.len() - 1)
    }

    /// Unregister a session. Returns the username it was registered under, or
    /// `None` when the session was not in the roster.
    pub async fn remove(&self, session_id: SessionId) -> Option<Username> {
        let mut entries = self.entries.lock().await;
        let position = entries
            .iter()
            .position(|entry| entry.sink.session_id() == session_id)?;
        let entry = entries.remove(position);
        tracing::debug!("Roster remove '{}' (session {})", entry.user, session_id);
        Some(entry.user)
    }

    /// Deliver `envelope` to every session registered at call time.
    ///
    /// A session whose write fails is removed and closed; delivery to the
    /// others continues.
    pub async fn broadcast(&self, envelope: &Envelope) -> BroadcastReport {
        let targets = self.snapshot().await;
        let mut report = BroadcastReport::default();

        for sink in targets {
            match sink.deliver(envelope).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        "Failed to deliver {} to session {}: {}",
                        envelope.kind(),
                        sink.session_id(),
                        e
                    );
                    if let Some(user) = self.evict(sink).await {
                        report.evicted.push(user);
                    }
                }
            }
        }

        report
    }

    /// Deliver `envelope` to one registered session, with the same eviction
    /// rule as [`Roster::broadcast`].
    pub async fn send_to(&self, session_id: SessionId, envelope: &Envelope) -> BroadcastReport {
        let target = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .find(|entry| entry.sink.session_id() == session_id)
                .map(|entry| entry.sink.clone())
        };

        let mut report = BroadcastReport::default();
        let Some(sink) = target else {
            tracing::warn!("Session {} not found in roster, skipping", session_id);
            return report;
        };

        match sink.deliver(envelope).await {
            Ok(()) => report.delivered = 1,
            Err(e) => {
                tracing::warn!(
                    "Failed to deliver {} to session {}: {}",
                    envelope.kind(),
                    session_id,
                    e
                );
                if let Some(user) = self.evict(sink).await {
                    report.evicted.push(user);
                }
            }
        }

        report
    }

    /// Current usernames in registration order
    pub async fn list_users(&self) -> Vec<Username> {
        let entries = self.entries.lock().await;
        entries.iter().map(|entry| entry.user.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Remove every session and hand the sinks back for closing.
    pub async fn drain(&self) -> Vec<Arc<dyn EnvelopeSink>> {
        let mut entries = self.entries.lock().await;
        entries.drain(..).map(|entry| entry.sink).collect()
    }

    async fn snapshot(&self) -> Vec<Arc<dyn EnvelopeSink>> {
        let entries = self.entries.lock().await;
        entries.iter().map(|entry| entry.sink.clone()).collect()
    }

    async fn evict(&self, sink: Arc<dyn EnvelopeSink>) -> Option<Username> {
        let user = self.remove(sink.session_id()).await;
        sink.shut().await;
        user
    }
}

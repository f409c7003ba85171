//! TCP セッションを使った EnvelopeSink 実装
//!
//! ## 設計ノート
//!
//! The session is created by the accept loop (UI layer). The roster only
//! writes through it and closes it on eviction; reading stays with the
//! connection worker.

use async_trait::async_trait;
use lanchat_shared::{Envelope, Session, SessionError, SessionId};

use crate::domain::EnvelopeSink;

#[async_trait]
impl EnvelopeSink for Session {
    fn session_id(&self) -> SessionId {
        self.id()
    }

    async fn deliver(&self, envelope: &Envelope) -> Result<(), SessionError> {
        self.send(envelope).await
    }

    async fn shut(&self) {
        self.close().await;
    }
}

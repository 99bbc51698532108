use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::session::{Outbox, SessionId};

/// Sessions currently between handshake and teardown, keyed by session id.
///
/// A single lock guards add, remove and broadcast. A broadcast reaches exactly
/// the sessions registered when it takes the lock; a session added while a
/// broadcast is in flight does not receive it.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: Mutex<HashMap<SessionId, Outbox>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, session: Outbox) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.id(), session);
    }

    /// Removes a session. Removing an unknown id is a no-op.
    pub async fn remove(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&id).is_some()
    }

    /// Queues `text` for every registered session.
    ///
    /// Delivery is independent per session: a session whose writer has gone
    /// away is skipped and cleaned up by its own connection task.
    pub async fn broadcast(&self, text: &str) {
        let sessions = self.sessions.lock().await;
        for (id, session) in sessions.iter() {
            if !session.send(text) {
                debug!(session = id, "skipping broadcast to closed session");
            }
        }
        drop(sessions);

        info!("{text}");
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

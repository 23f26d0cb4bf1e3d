//! Durable keyed storage for session state.
//!
//! The engine checkpoints the full session snapshot after every role
//! invocation; a store implementation decides where that snapshot lives.
//! `FileSessionStore` is the durable default, `MemorySessionStore` backs
//! tests and ephemeral embeddings.

pub mod file_store;

pub use file_store::{FileSessionStore, SNAPSHOT_VERSION};

use crate::domain::SessionKey;
use crate::session::Session;
use std::collections::HashMap;
use std::sync::Mutex;

/// Keyed snapshot storage. Checkpoint writes are the unit of durability.
pub trait SessionStore: Send + Sync {
    /// Loads the latest durable snapshot for a key, if any.
    fn load(&self, key: &SessionKey) -> anyhow::Result<Option<Session>>;

    /// Persists the session snapshot. Called after every role invocation,
    /// before the next role runs.
    fn checkpoint(&self, session: &Session) -> anyhow::Result<()>;
}

/// In-memory store for tests and ephemeral embeddings. Not durable.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionKey, Session>>,
    checkpoint_counts: Mutex<HashMap<SessionKey, u64>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checkpoints taken for a key. Test observability.
    pub fn checkpoint_count(&self, key: &SessionKey) -> u64 {
        self.checkpoint_counts
            .lock()
            .map(|counts| counts.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &SessionKey) -> anyhow::Result<Option<Session>> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("session map poisoned"))?;
        Ok(sessions.get(key).cloned())
    }

    fn checkpoint(&self, session: &Session) -> anyhow::Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("session map poisoned"))?;
        sessions.insert(session.key.clone(), session.clone());
        drop(sessions);

        if let Ok(mut counts) = self.checkpoint_counts.lock() {
            *counts.entry(session.key.clone()).or_insert(0) += 1;
        }
        Ok(())
    }
}

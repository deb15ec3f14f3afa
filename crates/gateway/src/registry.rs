//! In-memory session registry
//!
//! Each session sits behind its own async mutex: queries against one
//! conversation run one at a time while different sessions proceed in
//! parallel. Sessions untouched for longer than the idle limit are
//! dropped by [`SessionRegistry::evict_idle`]; their knowledge base
//! snapshots stay on disk so they can be resumed.

use docguard_common::errors::{AppError, Result};
use docguard_context::Session;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub type SessionHandle = Arc<Mutex<Session>>;

struct Entry {
    handle: SessionHandle,
    last_active: Instant,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, replacing any live session with the same id
    pub async fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(
            id,
            Entry {
                handle: handle.clone(),
                last_active: Instant::now(),
            },
        );
        handle
    }

    /// Look up a session and mark it active
    pub async fn get(&self, id: Uuid) -> Result<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::SessionNotFound { id: id.to_string() })?;
        entry.last_active = Instant::now();
        Ok(entry.handle.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::SessionNotFound { id: id.to_string() })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for at least `max_idle`, returning how many went.
    /// A session still held by a request is kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.last_active.elapsed() < max_idle || Arc::strong_count(&entry.handle) > 1
        });
        before - sessions.len()
    }
}

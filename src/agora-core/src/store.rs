//! Session storage.
//!
//! Storage is a trait so the in-memory map can be swapped for a persisted
//! or sharded store without touching orchestration logic. Ids are assigned
//! by the store from a serialized monotonic counter, so two concurrent
//! creates never race on id assignment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::session::Session;

/// Shared handle to one session's mutable state. The lock is never held
/// across an await point.
pub type SessionHandle = Arc<Mutex<Session>>;

pub trait SessionStore: Send + Sync {
    /// Reserve the next session id.
    fn next_id(&self) -> String;

    /// Insert a session under its id and return the shared handle.
    fn insert(&self, session: Session) -> SessionHandle;

    /// Look up a session, refreshing its activity timestamp.
    fn get(&self, id: &str) -> Option<SessionHandle>;

    fn remove(&self, id: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refresh the activity timestamp for a session.
    fn touch(&self, id: &str);

    /// Drop sessions idle for at least `ttl`. Sessions currently paused at
    /// a human turn are kept; their wait ceiling bounds the pause anyway.
    /// Returns the number of evicted sessions.
    fn evict_idle(&self, ttl: Duration) -> usize;
}

struct Entry {
    session: SessionHandle,
    last_activity: Instant,
}

/// Process-local store backed by a map behind a lock.
#[derive(Default)]
pub struct MemoryStore {
    counter: AtomicU64,
    inner: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn next_id(&self) -> String {
        (self.counter.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id.clone();
        let handle = Arc::new(Mutex::new(session));
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.insert(
            id,
            Entry {
                session: handle.clone(),
                last_activity: Instant::now(),
            },
        );
        handle
    }

    fn get(&self, id: &str) -> Option<SessionHandle> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.get_mut(id).map(|entry| {
            entry.last_activity = Instant::now();
            entry.session.clone()
        })
    }

    fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.remove(id).is_some()
    }

    fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.len()
    }

    fn touch(&self, id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = inner.get_mut(id) {
            entry.last_activity = Instant::now();
        }
    }

    fn evict_idle(&self, ttl: Duration) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let before = inner.len();
        inner.retain(|_, entry| {
            if entry.last_activity.elapsed() < ttl {
                return true;
            }
            let awaiting = entry
                .session
                .lock()
                .map(|s| s.awaiting_human)
                .unwrap_or(false);
            awaiting
        });
        before - inner.len()
    }
}

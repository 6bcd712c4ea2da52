//! Registry of connected clients.
//!
//! The only structure mutated by more than one task. Registration and removal
//! take the write lock; fan-out iterates under the read lock. Because
//! [`ClientRegistry::remove`] waits for the write lock, no iteration that is
//! still running (or starts later) can see a session once `remove` has
//! returned.

use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    error::RegistryError,
    session::{ClientId, ClientSession},
};

/// Concurrent map from client id to session.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    sessions: RwLock<HashMap<ClientId, Arc<ClientSession>>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh client id. Ids are never reused.
    pub fn next_id(&self) -> ClientId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register a session under `id`.
    pub fn add(&self, id: ClientId, session: Arc<ClientSession>) -> Result<(), RegistryError> {
        let mut sessions = self.write();
        if sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateClient(id));
        }
        sessions.insert(id, session);
        Ok(())
    }

    /// Remove and return the session under `id`.
    pub fn remove(&self, id: ClientId) -> Option<Arc<ClientSession>> {
        self.write().remove(&id)
    }

    /// Look up a session.
    pub fn get(&self, id: ClientId) -> Option<Arc<ClientSession>> {
        self.read().get(&id).cloned()
    }

    /// Visit every registered session under the read lock.
    ///
    /// `f` must not block and must not call back into `add`, `remove` or
    /// `drain` on this registry.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<ClientSession>),
    {
        for session in self.read().values() {
            f(session);
        }
    }

    /// Ids of all registered sessions, in no particular order.
    pub fn ids(&self) -> Vec<ClientId> {
        self.read().keys().copied().collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove every session and return them (used at shutdown).
    pub fn drain(&self) -> Vec<Arc<ClientSession>> {
        self.write().drain().map(|(_, session)| session).collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ClientId, Arc<ClientSession>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ClientId, Arc<ClientSession>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

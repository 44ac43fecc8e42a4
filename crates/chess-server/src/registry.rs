//! Live game sessions, keyed by id and indexed by owner.
//!
//! Each session gets its own engine process. The game state sits behind
//! its own `Mutex`; the engine does not, so tearing a session down can
//! kill the engine while a search on it is still pending.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chess_core::{GameError, GameSession, OwnerId, SessionId};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine_process::EngineProcess;

/// One registered session: game state plus its engine.
pub struct SessionHandle {
    id: SessionId,
    owner: OwnerId,
    pub game: Mutex<GameSession>,
    pub engine: EngineProcess,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Arc<SessionHandle>>,
    by_owner: HashMap<OwnerId, HashSet<SessionId>>,
}

impl Inner {
    fn take(&mut self, id: SessionId) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.remove(&id)?;
        if let Some(ids) = self.by_owner.get_mut(&handle.owner) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_owner.remove(&handle.owner);
            }
        }
        Some(handle)
    }
}

pub struct SessionRegistry {
    engine_config: EngineConfig,
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    pub fn new(engine_config: EngineConfig) -> Self {
        SessionRegistry {
            engine_config,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Spawn an engine and register a new session in `Waiting` state.
    pub async fn create(&self, owner: OwnerId) -> Result<Arc<SessionHandle>, GameError> {
        // Spawn outside the lock; it may take a while.
        let engine = EngineProcess::start(&self.engine_config)
            .await
            .map_err(GameError::from)?;

        let mut inner = self.inner.write().await;
        let mut id = SessionId::new();
        while inner.sessions.contains_key(&id) {
            id = SessionId::new();
        }

        let handle = Arc::new(SessionHandle {
            id,
            owner,
            game: Mutex::new(GameSession::new(id, owner)),
            engine,
        });
        inner.sessions.insert(id, handle.clone());
        inner.by_owner.entry(owner).or_default().insert(id);

        info!(session = %id, owner = %owner, "session created");
        Ok(handle)
    }

    pub async fn get(&self, id: SessionId) -> Option<Arc<SessionHandle>> {
        self.inner.read().await.sessions.get(&id).cloned()
    }

    /// Like [`get`](Self::get), but an unknown id is a `NotFound` error.
    pub async fn lookup(&self, id: SessionId) -> Result<Arc<SessionHandle>, GameError> {
        self.get(id).await.ok_or(GameError::NotFound(id))
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.inner.read().await.sessions.contains_key(&id)
    }

    /// Unregister a session and kill its engine. Returns false if the id
    /// was not registered.
    pub async fn remove(&self, id: SessionId) -> bool {
        let handle = self.inner.write().await.take(id);
        match handle {
            Some(handle) => {
                handle.engine.shutdown().await;
                info!(session = %id, "session removed");
                true
            }
            None => false,
        }
    }

    /// Remove every session the owner has, e.g. on disconnect.
    pub async fn remove_owner(&self, owner: OwnerId) -> Vec<SessionId> {
        let handles: Vec<_> = {
            let mut inner = self.inner.write().await;
            let ids = inner.by_owner.remove(&owner).unwrap_or_default();
            ids.into_iter().filter_map(|id| inner.take(id)).collect()
        };

        let mut removed = Vec::with_capacity(handles.len());
        for handle in handles {
            handle.engine.shutdown().await;
            removed.push(handle.id);
        }
        if !removed.is_empty() {
            debug!(owner = %owner, count = removed.len(), "removed owner's sessions");
        }
        removed
    }

    pub async fn sessions_for(&self, owner: OwnerId) -> Vec<SessionId> {
        self.inner
            .read()
            .await
            .by_owner
            .get(&owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove everything and kill every engine (server shutdown).
    pub async fn shutdown_all(&self) {
        let handles: Vec<_> = {
            let mut inner = self.inner.write().await;
            inner.by_owner.clear();
            inner.sessions.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &handles {
            handle.engine.shutdown().await;
        }
        if !handles.is_empty() {
            info!(count = handles.len(), "all sessions shut down");
        }
    }
}

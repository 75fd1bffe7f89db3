//! Session directory: loads datasets, restores stored sessions and keeps one
//! task per live session id.

use std::sync::Arc;

use hashbrown::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    config::StudioConfig,
    core::{Session, SessionError},
    loader::{self, LoadDescriptor, LoadError},
    persist::{MemorySessionStore, PersistError, SessionStore, SqliteSessionStore},
    table::Table,
    types::SessionId,
};

use super::handle::{RuntimeError, SessionHandle, SharedStore, persist_session, spawn_session};

/// Failures of directory operations.
#[derive(Debug, Error)]
pub enum StudioError {
    /// The dataset could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// A stored session could not be rebuilt.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Store access failed.
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),
    /// A session task failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// No session with this id is live or stored.
    #[error("session {0} not found")]
    NotFound(SessionId),
    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Live sessions over one shared store.
pub struct Studio {
    config: StudioConfig,
    store: SharedStore,
    live: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl Studio {
    /// Opens the store named by `config.storage_path`, or an in-memory one.
    pub fn open(config: StudioConfig) -> Result<Self, StudioError> {
        let store: Box<dyn SessionStore> = match &config.storage_path {
            Some(path) => {
                info!(path = %path.display(), "opening session store");
                Box::new(SqliteSessionStore::open(path)?)
            }
            None => Box::new(MemorySessionStore::new()),
        };
        Ok(Self::with_store(config, store))
    }

    /// A directory over `store`.
    pub fn with_store(config: StudioConfig, store: Box<dyn SessionStore>) -> Self {
        Self {
            config,
            store: Arc::new(Mutex::new(store)),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Reads the dataset behind `descriptor` and starts a session on it.
    pub async fn load(&self, descriptor: LoadDescriptor) -> Result<SessionHandle, StudioError> {
        let source = descriptor.clone();
        let table = tokio::task::spawn_blocking(move || loader::load(&descriptor))
            .await
            .map_err(|e| StudioError::Task(format!("join error: {e}")))??;
        self.create(source, table).await
    }

    /// Starts a session on an already loaded table and stores it.
    pub async fn create(&self, source: LoadDescriptor, base: Table) -> Result<SessionHandle, StudioError> {
        let session = Session::new(SessionId::new(), source, base);
        persist_session(&self.store, &session).await?;

        let id = session.id();
        let handle = spawn_session(session, Some(Arc::clone(&self.store)), &self.config);
        self.live.lock().await.insert(id, handle.clone());
        info!(session_id = %id, "session created");
        Ok(handle)
    }

    /// Handle of a live session, restoring it from the store if needed.
    pub async fn session(&self, id: SessionId) -> Result<SessionHandle, StudioError> {
        let mut live = self.live.lock().await;
        if let Some(handle) = live.get(&id) {
            return Ok(handle.clone());
        }

        let store_ref = Arc::clone(&self.store);
        let stored = tokio::task::spawn_blocking(move || {
            let mut store = store_ref.blocking_lock();
            store.get(id)
        })
        .await
        .map_err(|e| StudioError::Task(format!("join error: {e}")))??
        .ok_or(StudioError::NotFound(id))?;

        let session = Session::from_record(stored.record, stored.base)?;
        info!(session_id = %id, cursor = session.cursor(), "session restored");
        let handle = spawn_session(session, Some(Arc::clone(&self.store)), &self.config);
        live.insert(id, handle.clone());
        Ok(handle)
    }

    /// Ids of sessions with a running task.
    pub async fn live_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.live.lock().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Stops the session's task. Its stored state is kept.
    ///
    /// The directory stays locked until the task has drained the commands
    /// queued ahead of the shutdown, so a concurrent [`Studio::session`] only
    /// restores the session after its last write.
    pub async fn close(&self, id: SessionId) -> Result<bool, StudioError> {
        let mut live = self.live.lock().await;
        let closed = stop(&mut live, id).await?;
        drop(live);
        if closed {
            info!(session_id = %id, "session closed");
        }
        Ok(closed)
    }

    /// Stops the session and removes it from the store.
    pub async fn delete(&self, id: SessionId) -> Result<bool, StudioError> {
        let mut live = self.live.lock().await;
        let was_live = stop(&mut live, id).await?;
        let store_ref = Arc::clone(&self.store);
        let removed = tokio::task::spawn_blocking(move || {
            let mut store = store_ref.blocking_lock();
            store.delete(id)
        })
        .await
        .map_err(|e| StudioError::Task(format!("join error: {e}")))??;
        drop(live);
        if was_live || removed {
            info!(session_id = %id, "session deleted");
        }
        Ok(was_live || removed)
    }

    /// Closes every live session, reporting the first failure.
    pub async fn shutdown(&self) -> Result<(), StudioError> {
        let mut live = self.live.lock().await;
        let mut first_err = None;
        for (id, handle) in live.drain() {
            if let Err(e) = handle.shutdown().await {
                warn!(session_id = %id, "session shutdown failed: {e}");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Removes `id` from the directory and waits for its task to stop.
async fn stop(live: &mut HashMap<SessionId, SessionHandle>, id: SessionId) -> Result<bool, RuntimeError> {
    let Some(handle) = live.remove(&id) else {
        return Ok(false);
    };
    handle.shutdown().await?;
    Ok(true)
}

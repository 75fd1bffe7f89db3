//! In-process session store.

use hashbrown::HashMap;

use crate::{core::SessionRecord, table::Table, types::SessionId};

use super::{PersistResult, SessionStore, StoredSession};

/// Sessions kept in a hash map; lost when dropped.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: HashMap<SessionId, StoredSession>,
}

impl MemorySessionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&mut self, id: SessionId) -> PersistResult<Option<StoredSession>> {
        Ok(self.sessions.get(&id).cloned())
    }

    fn put(&mut self, record: &SessionRecord, base: &Table) -> PersistResult<()> {
        match self.sessions.get_mut(&record.session_id) {
            Some(existing) => existing.record = record.clone(),
            None => {
                self.sessions.insert(
                    record.session_id,
                    StoredSession {
                        record: record.clone(),
                        base: base.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    fn delete(&mut self, id: SessionId) -> PersistResult<bool> {
        Ok(self.sessions.remove(&id).is_some())
    }
}

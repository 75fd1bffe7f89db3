pub mod memory;
pub mod sqlite;

use thiserror::Error;

use crate::{core::SessionRecord, table::Table, types::SessionId};

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

/// Failures of a session store.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Database error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Envelope encoding or decoding.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// Filesystem error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Anything else, such as a failed blocking task.
    #[error("{0}")]
    Message(String),
}

/// Result of a store call.
pub type PersistResult<T> = Result<T, PersistError>;

/// What a store keeps per session: the small record and the base table it replays onto.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    /// History and cursor.
    pub record: SessionRecord,
    /// Table the history replays onto.
    pub base: Table,
}

/// Key-value storage of sessions by id.
///
/// The base table of a session never changes, so implementations may write it
/// once and only replace the record on later `put`s.
pub trait SessionStore: Send {
    /// The stored session, if any.
    fn get(&mut self, id: SessionId) -> PersistResult<Option<StoredSession>>;
    /// Stores `record`, and `base` if this is the session's first write.
    fn put(&mut self, record: &SessionRecord, base: &Table) -> PersistResult<()>;
    /// Returns whether anything was removed.
    fn delete(&mut self, id: SessionId) -> PersistResult<bool>;
    /// Pushes buffered writes to durable storage.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}

//! SQLite-backed session store.
//!
//! Each session owns one row in `bases`, written once, and one row in
//! `sessions` that is replaced on every `put`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{core::SessionRecord, table::Table, types::SessionId};

use super::{PersistError, PersistResult, SessionStore, StoredSession};

const BASE_FORMAT_VERSION: u16 = 1;
const RECORD_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct BaseEnvelope<T> {
    format_version: u16,
    table: T,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordEnvelope<R> {
    format_version: u16,
    record: R,
}

/// SQLite implementation of [`crate::persist::SessionStore`].
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    /// Opens or creates a store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Ids of every stored session, oldest update first.
    pub fn session_ids(&self) -> PersistResult<Vec<SessionId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT session_id FROM sessions ORDER BY updated_ms ASC, session_id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            let raw = row?;
            let id = raw
                .parse::<SessionId>()
                .map_err(|e| PersistError::Message(format!("bad session id {raw:?}: {e}")))?;
            out.push(id);
        }
        Ok(out)
    }

    fn load_base(&self, key: &str) -> PersistResult<Option<Table>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT payload FROM bases WHERE session_id = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let Some(payload) = payload else {
            return Ok(None);
        };

        let env: BaseEnvelope<Table> = serde_json::from_slice(&payload)?;
        if env.format_version != BASE_FORMAT_VERSION {
            return Err(PersistError::Message(format!(
                "unsupported base table format version: {}",
                env.format_version
            )));
        }
        Ok(Some(env.table))
    }

    fn load_record(&self, key: &str) -> PersistResult<Option<SessionRecord>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT payload FROM sessions WHERE session_id = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let Some(payload) = payload else {
            return Ok(None);
        };

        let env: RecordEnvelope<SessionRecord> = serde_json::from_slice(&payload)?;
        if env.format_version != RECORD_FORMAT_VERSION {
            return Err(PersistError::Message(format!(
                "unsupported session record format version: {}",
                env.format_version
            )));
        }
        Ok(Some(env.record))
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&mut self, id: SessionId) -> PersistResult<Option<StoredSession>> {
        let key = id.to_string();
        let Some(record) = self.load_record(&key)? else {
            return Ok(None);
        };
        let base = self
            .load_base(&key)?
            .ok_or_else(|| PersistError::Message(format!("session {id} has no base table")))?;
        Ok(Some(StoredSession { record, base }))
    }

    fn put(&mut self, record: &SessionRecord, base: &Table) -> PersistResult<()> {
        let key = record.session_id.to_string();
        let ts_ms = now_ms() as i64;
        let record_payload = serde_json::to_vec(&RecordEnvelope {
            format_version: RECORD_FORMAT_VERSION,
            record,
        })?;

        let tx = self.conn.transaction()?;
        let have_base: bool = tx
            .query_row(
                "SELECT 1 FROM bases WHERE session_id = ?1",
                params![key],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !have_base {
            let base_payload = serde_json::to_vec(&BaseEnvelope {
                format_version: BASE_FORMAT_VERSION,
                table: base,
            })?;
            tx.execute(
                "INSERT INTO bases(session_id, created_ms, payload) VALUES (?1, ?2, ?3)",
                params![key, ts_ms, base_payload],
            )?;
        }
        tx.execute(
            "INSERT INTO sessions(session_id, cursor, history_len, updated_ms, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id) DO UPDATE SET
                cursor = excluded.cursor,
                history_len = excluded.history_len,
                updated_ms = excluded.updated_ms,
                payload = excluded.payload",
            params![
                key,
                record.cursor,
                record.history.len() as i64,
                ts_ms,
                record_payload
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&mut self, id: SessionId) -> PersistResult<bool> {
        let key = id.to_string();
        let tx = self.conn.transaction()?;
        let records = tx.execute("DELETE FROM sessions WHERE session_id = ?1", params![key])?;
        let bases = tx.execute("DELETE FROM bases WHERE session_id = ?1", params![key])?;
        tx.commit()?;
        Ok(records + bases > 0)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loader::LoadDescriptor,
        op::{ActionSpec, Operation},
        table::Column,
    };

    #[test]
    fn record_is_replaced_and_base_is_not() {
        let mut store = SqliteSessionStore::open_in_memory().expect("open");
        let id = SessionId::new();
        let base = Table::new(vec![Column::ints("a", [1, 2, 3])]).expect("table");
        let mut record = SessionRecord {
            session_id: id,
            source: LoadDescriptor::new("/data/a.csv", "csv"),
            cursor: -1,
            history: Vec::new(),
        };
        store.put(&record, &base).expect("put");

        record.history.push(ActionSpec::single(
            "drop a",
            Operation::new("drop_column").with("column", "a"),
        ));
        record.cursor = 0;
        let ignored = Table::default();
        store.put(&record, &ignored).expect("put again");

        let stored = store.get(id).expect("get").expect("present");
        assert_eq!(stored.record, record);
        assert_eq!(stored.base, base);
        assert_eq!(store.session_ids().expect("ids"), vec![id]);

        assert!(store.delete(id).expect("delete"));
        assert!(store.get(id).expect("get").is_none());
    }

    #[test]
    fn unknown_format_version_is_rejected() {
        let mut store = SqliteSessionStore::open_in_memory().expect("open");
        let id = SessionId::new();
        let record = SessionRecord {
            session_id: id,
            source: LoadDescriptor::memory("t"),
            cursor: -1,
            history: Vec::new(),
        };
        store.put(&record, &Table::default()).expect("put");
        store
            .conn
            .execute(
                "UPDATE bases SET payload = ?1",
                params![br#"{"format_version":9,"table":{"columns":[]}}"#.to_vec()],
            )
            .expect("tamper");
        assert!(matches!(store.get(id), Err(PersistError::Message(_))));
    }
}

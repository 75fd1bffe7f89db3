use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    codegen::{self, Export, ExportFormat, GenerationError},
    engine,
    loader::LoadDescriptor,
    op::ActionSpec,
    profile::{self, Profile},
    registry::{ActionError, ActionRegistry, registry},
    table::{Row, Table},
    types::SessionId,
};

/// Failures of session operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// An action failed; the session is unchanged.
    #[error(transparent)]
    Action(#[from] ActionError),
    /// A stored record does not describe a valid session.
    #[error("corrupt session record: {0}")]
    CorruptRecord(String),
}

/// Durable part of a session. The base table is stored beside it, once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session id.
    pub session_id: SessionId,
    /// Where the base table came from.
    pub source: LoadDescriptor,
    /// Index of the active history entry; `-1` is the base table.
    pub cursor: i64,
    /// Every recorded step, including redo entries.
    pub history: Vec<ActionSpec>,
}

/// A base table, a linear history of action specs and a cursor into it.
///
/// `materialized` is always the base replayed through the first `applied`
/// history entries. Forward moves update it incrementally; undo rebuilds it
/// from the base.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    source: LoadDescriptor,
    base: Table,
    history: Vec<ActionSpec>,
    applied: usize,
    materialized: Table,
    registry: &'static ActionRegistry,
}

impl Session {
    /// A session with empty history over `base`.
    pub fn new(id: SessionId, source: LoadDescriptor, base: Table) -> Self {
        Self {
            id,
            source,
            materialized: base.clone(),
            base,
            history: Vec::new(),
            applied: 0,
            registry: registry(),
        }
    }

    /// Runs this session's actions through `registry` instead of the builtin one.
    pub fn with_registry(mut self, registry: &'static ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Rebuilds a session from its stored parts, replaying up to the cursor.
    pub fn from_record(record: SessionRecord, base: Table) -> Result<Self, SessionError> {
        let len = record.history.len() as i64;
        if record.cursor < -1 || record.cursor >= len {
            return Err(SessionError::CorruptRecord(format!(
                "cursor {} outside -1..{len}",
                record.cursor
            )));
        }
        let mut session = Self::new(record.session_id, record.source, base);
        session.history = record.history;
        session.applied = (record.cursor + 1) as usize;
        session.materialized = session.replay(session.applied).map_err(|e| {
            SessionError::CorruptRecord(format!("history does not replay: {e}"))
        })?;
        Ok(session)
    }

    /// The durable part of this session.
    pub fn export_record(&self) -> SessionRecord {
        SessionRecord {
            session_id: self.id,
            source: self.source.clone(),
            cursor: self.cursor(),
            history: self.history.clone(),
        }
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Where the base table came from.
    pub fn source(&self) -> &LoadDescriptor {
        &self.source
    }

    /// The table as loaded.
    pub fn base(&self) -> &Table {
        &self.base
    }

    /// The table at the cursor.
    pub fn materialized(&self) -> &Table {
        &self.materialized
    }

    /// Full history, including entries past the cursor that redo can reach.
    pub fn history(&self) -> &[ActionSpec] {
        &self.history
    }

    /// History up to and including the cursor.
    pub fn active_history(&self) -> &[ActionSpec] {
        &self.history[..self.applied]
    }

    /// Index of the active entry, `-1` at the base table.
    pub fn cursor(&self) -> i64 {
        self.applied as i64 - 1
    }

    /// True unless at the base table.
    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    /// True when entries follow the cursor.
    pub fn can_redo(&self) -> bool {
        self.applied < self.history.len()
    }

    /// Applies `spec` after the cursor, discarding any redo entries.
    ///
    /// On error the session is left exactly as it was.
    pub fn apply_action(&mut self, spec: ActionSpec) -> Result<(), SessionError> {
        let next = engine::apply(self.registry, &self.materialized, &spec)?;
        self.history.truncate(self.applied);
        self.history.push(spec);
        self.applied += 1;
        self.materialized = next;
        debug!(
            session_id = %self.id,
            cursor = self.cursor(),
            history = self.history.len(),
            "action applied"
        );
        Ok(())
    }

    /// Steps back one entry. Returns `false` at the base table.
    pub fn undo(&mut self) -> Result<bool, SessionError> {
        if self.applied == 0 {
            return Ok(false);
        }
        let rebuilt = self.replay(self.applied - 1)?;
        self.applied -= 1;
        self.materialized = rebuilt;
        debug!(session_id = %self.id, cursor = self.cursor(), "undo");
        Ok(true)
    }

    /// Re-applies the next entry. Returns `false` at the end of history.
    pub fn redo(&mut self) -> Result<bool, SessionError> {
        let Some(spec) = self.history.get(self.applied) else {
            return Ok(false);
        };
        let next = engine::apply(self.registry, &self.materialized, spec)?;
        self.applied += 1;
        self.materialized = next;
        debug!(session_id = %self.id, cursor = self.cursor(), "redo");
        Ok(true)
    }

    /// Recomputes the table after the first `upto` history entries from the base.
    pub fn replay(&self, upto: usize) -> Result<Table, SessionError> {
        let upto = upto.min(self.history.len());
        Ok(engine::replay(self.registry, &self.base, &self.history[..upto])?)
    }

    /// First `rows` rows of the current table.
    pub fn preview(&self, rows: usize) -> Vec<Row> {
        self.materialized.head(rows)
    }

    /// Statistics and suggestions for the current table.
    pub fn profile(&self) -> Profile {
        profile::profile(&self.materialized)
    }

    /// Code reproducing the active history from the source file.
    pub fn export(&self, format: ExportFormat) -> Result<Export, GenerationError> {
        codegen::export_with(self.registry, &self.source, self.active_history(), format)
    }
}

//! Session event stream payloads.

use crate::types::SessionId;

/// Events emitted by a session task after each state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An action spec was appended at the cursor.
    Applied {
        /// Session that changed.
        session_id: SessionId,
        /// Cursor after the change.
        cursor: i64,
    },
    /// The cursor moved back one entry.
    Undone {
        /// Session that changed.
        session_id: SessionId,
        /// Cursor after the change.
        cursor: i64,
    },
    /// The cursor moved forward one entry.
    Redone {
        /// Session that changed.
        session_id: SessionId,
        /// Cursor after the change.
        cursor: i64,
    },
    /// The store accepted the session's state at this cursor.
    Persisted {
        /// Session that was written.
        session_id: SessionId,
        /// Cursor that was written.
        cursor: i64,
    },
}

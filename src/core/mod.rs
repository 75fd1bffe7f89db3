//! Session state and time travel.

/// Session, its durable record and undo/redo.
pub mod session;

pub use session::{Session, SessionError, SessionRecord};

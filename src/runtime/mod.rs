//! Per-session async runtime and the session directory.

/// Event stream types emitted by session tasks.
pub mod events;
/// Session task handle and command loop.
pub mod handle;
/// Session directory over a shared store.
pub mod studio;

pub use events::SessionEvent;
pub use handle::{HistoryView, RuntimeError, SessionHandle, SharedStore, spawn_session};
pub use studio::{Studio, StudioError};

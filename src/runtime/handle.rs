use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use crate::{
    codegen::{Export, ExportFormat, GenerationError},
    config::StudioConfig,
    core::{Session, SessionError},
    op::ActionSpec,
    persist::{PersistError, SessionStore},
    profile::Profile,
    table::Row,
    types::SessionId,
};

use super::events::SessionEvent;

/// A store shared between session tasks; only touched from blocking threads.
pub type SharedStore = Arc<Mutex<Box<dyn SessionStore>>>;

/// Failures of session commands.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The session rejected the command.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The store write failed; the session was rolled back.
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),
    /// Code generation failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// The task has stopped.
    #[error("session task is no longer running")]
    ChannelClosed,
}

/// Snapshot of a session's history and cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryView {
    /// Every recorded step.
    pub history: Vec<ActionSpec>,
    /// Index of the active step, `-1` at the base table.
    pub cursor: i64,
    /// Whether undo would move.
    pub can_undo: bool,
    /// Whether redo would move.
    pub can_redo: bool,
}

/// Cloneable front end of one session task.
pub struct SessionHandle {
    session_id: SessionId,
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        Self {
            session_id: self.session_id,
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    Apply {
        spec: ActionSpec,
        resp: oneshot::Sender<Result<i64, RuntimeError>>,
    },
    Undo {
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    Redo {
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    Preview {
        rows: Option<usize>,
        resp: oneshot::Sender<Vec<Row>>,
    },
    Profile {
        resp: oneshot::Sender<Profile>,
    },
    Export {
        format: ExportFormat,
        resp: oneshot::Sender<Result<Export, RuntimeError>>,
    },
    History {
        resp: oneshot::Sender<HistoryView>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

/// Moves `session` onto its own task.
///
/// Commands run one at a time; a mutation and the write of its result to
/// `store` finish before the next command is read.
pub fn spawn_session(session: Session, store: Option<SharedStore>, config: &StudioConfig) -> SessionHandle {
    let session_id = session.id();
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<SessionEvent>(config.event_capacity.max(1));
    let preview_rows = config.preview_rows;

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut session = session;
        while let Some(cmd) = cmd_rx.recv().await {
            let done = handle_command(cmd, &mut session, store.as_ref(), &events_tx_loop, preview_rows).await;
            if done {
                break;
            }
        }
        debug!(session_id = %session.id(), "session task stopped");
    });

    SessionHandle {
        session_id,
        cmd_tx,
        events_tx,
    }
}

impl SessionHandle {
    /// Id of the session this handle drives.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// A receiver for events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Applies `spec` and returns the new cursor.
    pub async fn apply(&self, spec: ActionSpec) -> Result<i64, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Apply { spec, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Steps back; `false` at the base table.
    pub async fn undo(&self) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Undo { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Steps forward; `false` at the end of history.
    pub async fn redo(&self) -> Result<bool, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Redo { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// First `rows` rows of the current table, or the configured default.
    pub async fn preview(&self, rows: Option<usize>) -> Result<Vec<Row>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Preview { rows, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Profile of the current table.
    pub async fn profile(&self) -> Result<Profile, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Profile { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Code reproducing the active history.
    pub async fn export(&self, format: ExportFormat) -> Result<Export, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Export { format, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// History and cursor.
    pub async fn history(&self) -> Result<HistoryView, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::History { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Flushes the store and stops the task. Later calls fail with
    /// [`RuntimeError::ChannelClosed`].
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

async fn handle_command(
    cmd: Command,
    session: &mut Session,
    store: Option<&SharedStore>,
    events_tx: &broadcast::Sender<SessionEvent>,
    preview_rows: usize,
) -> bool {
    match cmd {
        Command::Apply { spec, resp } => {
            let before = session.clone();
            let res = match session.apply_action(spec) {
                Ok(()) => {
                    let event = SessionEvent::Applied {
                        session_id: session.id(),
                        cursor: session.cursor(),
                    };
                    commit(session, before, store, events_tx, event)
                        .await
                        .map(|()| session.cursor())
                }
                Err(err) => Err(err.into()),
            };
            let _ = resp.send(res);
        }
        Command::Undo { resp } => {
            let before = session.clone();
            let res = match session.undo() {
                Ok(true) => {
                    let event = SessionEvent::Undone {
                        session_id: session.id(),
                        cursor: session.cursor(),
                    };
                    commit(session, before, store, events_tx, event).await.map(|()| true)
                }
                Ok(false) => Ok(false),
                Err(err) => Err(err.into()),
            };
            let _ = resp.send(res);
        }
        Command::Redo { resp } => {
            let before = session.clone();
            let res = match session.redo() {
                Ok(true) => {
                    let event = SessionEvent::Redone {
                        session_id: session.id(),
                        cursor: session.cursor(),
                    };
                    commit(session, before, store, events_tx, event).await.map(|()| true)
                }
                Ok(false) => Ok(false),
                Err(err) => Err(err.into()),
            };
            let _ = resp.send(res);
        }
        Command::Preview { rows, resp } => {
            let _ = resp.send(session.preview(rows.unwrap_or(preview_rows)));
        }
        Command::Profile { resp } => {
            let _ = resp.send(session.profile());
        }
        Command::Export { format, resp } => {
            let _ = resp.send(session.export(format).map_err(RuntimeError::from));
        }
        Command::History { resp } => {
            let _ = resp.send(HistoryView {
                history: session.history().to_vec(),
                cursor: session.cursor(),
                can_undo: session.can_undo(),
                can_redo: session.can_redo(),
            });
        }
        Command::Shutdown { resp } => {
            let out = match store {
                Some(store) => flush_store(store).await.map_err(RuntimeError::from),
                None => Ok(()),
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

/// Writes the mutated session, restoring `before` if the write fails.
async fn commit(
    session: &mut Session,
    before: Session,
    store: Option<&SharedStore>,
    events_tx: &broadcast::Sender<SessionEvent>,
    event: SessionEvent,
) -> Result<(), RuntimeError> {
    let Some(store) = store else {
        let _ = events_tx.send(event);
        return Ok(());
    };

    if let Err(err) = persist_session(store, session).await {
        warn!(
            session_id = %session.id(),
            cursor = before.cursor(),
            "persist failed, rolling back: {err}"
        );
        *session = before;
        return Err(err.into());
    }

    let _ = events_tx.send(event);
    let _ = events_tx.send(SessionEvent::Persisted {
        session_id: session.id(),
        cursor: session.cursor(),
    });
    Ok(())
}

/// Puts the session's record and base table into `store` off the async threads.
pub(crate) async fn persist_session(store: &SharedStore, session: &Session) -> Result<(), PersistError> {
    let record = session.export_record();
    let base = session.base().clone();
    let store_ref = Arc::clone(store);
    tokio::task::spawn_blocking(move || {
        let mut store = store_ref.blocking_lock();
        store.put(&record, &base)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?
}

async fn flush_store(store: &SharedStore) -> Result<(), PersistError> {
    let store_ref = Arc::clone(store);
    tokio::task::spawn_blocking(move || {
        let mut store = store_ref.blocking_lock();
        store.flush()
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?
}

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tabstudio::{
    codegen::ExportFormat,
    config::StudioConfig,
    core::{Session, SessionRecord},
    loader::LoadDescriptor,
    op::{ActionSpec, Operation},
    persist::{MemorySessionStore, PersistError, PersistResult, SessionStore, StoredSession},
    runtime::{RuntimeError, SessionEvent, Studio, StudioError, spawn_session},
    table::{Column, Table},
    types::SessionId,
};

fn base() -> Table {
    Table::new(vec![
        Column::ints("A", [1, 2, 3, 4, 5]),
        Column::ints("B", [10, 20, 30, 40, 50]),
    ])
    .expect("table")
}

fn drop_b() -> ActionSpec {
    ActionSpec::single("Drop B", Operation::new("drop_column").with("column", "B"))
}

fn keep_a_above(n: i64) -> ActionSpec {
    ActionSpec::single(
        "Keep A",
        Operation::new("filter_rows")
            .with("column", "A")
            .with("operator", ">")
            .with("value", n),
    )
}

/// Store whose writes fail while `failing` is set.
struct FlakyStore {
    inner: MemorySessionStore,
    failing: Arc<AtomicBool>,
}

impl SessionStore for FlakyStore {
    fn get(&mut self, id: SessionId) -> PersistResult<Option<StoredSession>> {
        self.inner.get(id)
    }

    fn put(&mut self, record: &SessionRecord, base: &Table) -> PersistResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistError::Message("disk full".to_string()));
        }
        self.inner.put(record, base)
    }

    fn delete(&mut self, id: SessionId) -> PersistResult<bool> {
        self.inner.delete(id)
    }
}

async fn next_event(sub: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("event")
        .expect("recv")
}

#[tokio::test]
async fn commands_apply_in_order_and_emit_events() {
    let session = Session::new(SessionId::new(), LoadDescriptor::memory("smoke"), base());
    let id = session.id();
    let handle = spawn_session(session, None, &StudioConfig::default());
    let mut sub = handle.subscribe();

    assert_eq!(handle.apply(drop_b()).await.expect("apply"), 0);
    assert_eq!(handle.apply(keep_a_above(2)).await.expect("apply"), 1);
    assert!(handle.undo().await.expect("undo"));
    assert!(handle.redo().await.expect("redo"));
    assert!(!handle.redo().await.expect("redo at end"));

    assert_eq!(next_event(&mut sub).await, SessionEvent::Applied { session_id: id, cursor: 0 });
    assert_eq!(next_event(&mut sub).await, SessionEvent::Applied { session_id: id, cursor: 1 });
    assert_eq!(next_event(&mut sub).await, SessionEvent::Undone { session_id: id, cursor: 0 });
    assert_eq!(next_event(&mut sub).await, SessionEvent::Redone { session_id: id, cursor: 1 });

    let rows = handle.preview(None).await.expect("preview");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["A"], serde_json::json!(3));
    assert!(!rows[0].contains_key("B"));
    assert_eq!(handle.preview(Some(1)).await.expect("preview").len(), 1);

    let history = handle.history().await.expect("history");
    assert_eq!(history.cursor, 1);
    assert!(history.can_undo && !history.can_redo);

    let profile = handle.profile().await.expect("profile");
    assert_eq!((profile.rows, profile.columns), (3, 1));

    let export = handle.export(ExportFormat::Script).await.expect("export");
    assert!(export.content.contains("df = df.drop(columns=['B'])\n# Keep A\ndf = df[df['A'] > 2]"));

    handle.shutdown().await.expect("shutdown");
    assert!(matches!(handle.history().await, Err(RuntimeError::ChannelClosed)));
}

#[tokio::test]
async fn failed_persist_rolls_the_session_back() {
    let failing = Arc::new(AtomicBool::new(false));
    let store = FlakyStore {
        inner: MemorySessionStore::new(),
        failing: Arc::clone(&failing),
    };
    let studio = Studio::with_store(StudioConfig::default(), Box::new(store));
    let handle = studio
        .create(LoadDescriptor::memory("flaky"), base())
        .await
        .expect("create");
    handle.apply(drop_b()).await.expect("apply");

    failing.store(true, Ordering::SeqCst);
    let err = handle.apply(keep_a_above(3)).await.expect_err("persist fails");
    assert!(matches!(err, RuntimeError::Persist(_)));
    assert!(matches!(handle.undo().await, Err(RuntimeError::Persist(_))));

    let history = handle.history().await.expect("history");
    assert_eq!(history.cursor, 0);
    assert_eq!(history.history, vec![drop_b()]);
    assert_eq!(handle.preview(Some(10)).await.expect("preview").len(), 5);

    failing.store(false, Ordering::SeqCst);
    assert_eq!(handle.apply(keep_a_above(3)).await.expect("apply"), 1);
    studio.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn studio_restores_closed_sessions_from_the_store() {
    let studio = Studio::open(StudioConfig::default()).expect("studio");
    let handle = studio
        .create(LoadDescriptor::new("/data/ab.csv", "csv"), base())
        .await
        .expect("create");
    let id = handle.session_id();
    handle.apply(drop_b()).await.expect("apply");
    handle.apply(keep_a_above(1)).await.expect("apply");
    handle.undo().await.expect("undo");

    assert!(studio.close(id).await.expect("close"));
    assert!(studio.live_sessions().await.is_empty());

    let restored = studio.session(id).await.expect("restore");
    let history = restored.history().await.expect("history");
    assert_eq!(history.cursor, 0);
    assert_eq!(history.history.len(), 2);
    assert!(restored.redo().await.expect("redo"));
    assert_eq!(restored.preview(Some(10)).await.expect("preview").len(), 4);

    let again = studio.session(id).await.expect("live handle");
    assert_eq!(again.session_id(), id);
    assert_eq!(studio.live_sessions().await, vec![id]);

    assert!(studio.delete(id).await.expect("delete"));
    assert!(matches!(studio.session(id).await, Err(StudioError::NotFound(missing)) if missing == id));
}

#[tokio::test]
async fn sessions_run_independently() {
    let studio = Arc::new(Studio::open(StudioConfig::default()).expect("studio"));
    let mut tasks = Vec::new();
    for n in 0..4i64 {
        let studio = Arc::clone(&studio);
        tasks.push(tokio::spawn(async move {
            let handle = studio
                .create(LoadDescriptor::memory(format!("s{n}")), base())
                .await
                .expect("create");
            handle.apply(keep_a_above(n)).await.expect("apply");
            handle.preview(Some(10)).await.expect("preview").len()
        }));
    }
    let mut lens = Vec::new();
    for task in tasks {
        lens.push(task.await.expect("join"));
    }
    assert_eq!(lens, vec![5, 4, 3, 2]);
    assert_eq!(studio.live_sessions().await.len(), 4);
}

#[tokio::test]
async fn close_drains_queued_applies_before_the_session_is_restored() {
    let studio = Arc::new(Studio::open(StudioConfig::default()).expect("studio"));
    let handle = studio
        .create(LoadDescriptor::memory("busy"), base())
        .await
        .expect("create");
    let id = handle.session_id();
    handle.apply(keep_a_above(0)).await.expect("first apply");

    let mut applies = Vec::new();
    for _ in 0..40 {
        let handle = handle.clone();
        applies.push(tokio::spawn(async move { handle.apply(keep_a_above(0)).await }));
    }
    tokio::task::yield_now().await;

    let closing = {
        let studio = Arc::clone(&studio);
        tokio::spawn(async move { studio.close(id).await })
    };
    while !studio.live_sessions().await.is_empty() {
        tokio::task::yield_now().await;
    }
    let restored = studio.session(id).await.expect("restore");

    let mut acknowledged = 1;
    for apply in applies {
        match apply.await.expect("join") {
            Ok(_) => acknowledged += 1,
            Err(RuntimeError::ChannelClosed) => {}
            Err(other) => panic!("unexpected apply error: {other}"),
        }
    }
    assert!(closing.await.expect("join").expect("close"));

    let history = restored.history().await.expect("history");
    assert_eq!(history.history.len(), acknowledged);
    assert_eq!(history.cursor, acknowledged as i64 - 1);
    assert_eq!(restored.apply(drop_b()).await.expect("apply"), acknowledged as i64);

    assert!(matches!(handle.apply(drop_b()).await, Err(RuntimeError::ChannelClosed)));
    studio.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn delete_waits_for_in_flight_commands() {
    let studio = Arc::new(Studio::open(StudioConfig::default()).expect("studio"));
    let handle = studio
        .create(LoadDescriptor::memory("doomed"), base())
        .await
        .expect("create");
    let id = handle.session_id();

    let mut applies = Vec::new();
    for _ in 0..10 {
        let handle = handle.clone();
        applies.push(tokio::spawn(async move { handle.apply(keep_a_above(0)).await }));
    }
    tokio::task::yield_now().await;

    assert!(studio.delete(id).await.expect("delete"));
    for apply in applies {
        match apply.await.expect("join") {
            Ok(_) | Err(RuntimeError::ChannelClosed) => {}
            Err(other) => panic!("unexpected apply error: {other}"),
        }
    }
    assert!(matches!(studio.session(id).await, Err(StudioError::NotFound(missing)) if missing == id));
}

use tempfile::TempDir;

use tabstudio::{
    core::Session,
    loader::LoadDescriptor,
    op::{ActionSpec, Operation, Value},
    persist::{SessionStore, sqlite::SqliteSessionStore},
    table::{Cell, Column, Table},
    types::{DType, SessionId},
};

fn base() -> Table {
    Table::new(vec![
        Column::strs("Dept", ["IT", "IT", "HR", "HR"]),
        Column::new(
            "Salary",
            DType::Float,
            vec![Cell::Float(5000.0), Cell::Float(6000.0), Cell::Null, Cell::Float(f64::INFINITY)],
        )
        .expect("Salary"),
        Column::strs("Note", ["it's", "a \"q\"", "\n", "ünï"]),
    ])
    .expect("table")
}

#[test]
fn sessions_survive_reopen_and_rebuild_by_replay() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("sessions.db");

    let mut session = Session::new(SessionId::new(), LoadDescriptor::new("/data/staff.csv", "csv"), base());
    session
        .apply_action(ActionSpec::single(
            "Fill salary",
            Operation::new("fill_na")
                .with("columns", Value::strings(["Salary"]))
                .with("value", 0.0),
        ))
        .expect("fill");
    session
        .apply_action(ActionSpec::single(
            "Mean by dept",
            Operation::new("groupby_agg")
                .with("group_by", Value::strings(["Dept"]))
                .with("aggregations", Value::mapping([("Salary", "mean")])),
        ))
        .expect("groupby");
    session.undo().expect("undo");

    {
        let mut store = SqliteSessionStore::open(&db_path).expect("open sqlite");
        store.put(&session.export_record(), session.base()).expect("put");
        store.flush().expect("flush");
    }

    let mut reopened = SqliteSessionStore::open(&db_path).expect("reopen");
    let stored = reopened.get(session.id()).expect("get").expect("stored");
    assert_eq!(stored.base, base());
    assert_eq!(stored.record.cursor, 0);
    assert_eq!(stored.record.history.len(), 2);

    let mut restored = Session::from_record(stored.record, stored.base).expect("restore");
    assert_eq!(restored.materialized(), session.materialized());

    assert!(restored.redo().expect("redo"));
    assert!(session.redo().expect("redo"));
    assert_eq!(restored.materialized(), session.materialized());
    assert_eq!(restored.materialized().row_count(), 2);
}

#[test]
fn missing_and_deleted_sessions_read_as_absent() {
    let tmp = TempDir::new().expect("tmp");
    let mut store = SqliteSessionStore::open(tmp.path().join("s.db")).expect("open");
    assert!(store.get(SessionId::new()).expect("get").is_none());

    let a = Session::new(SessionId::new(), LoadDescriptor::memory("a"), base());
    let b = Session::new(SessionId::new(), LoadDescriptor::memory("b"), base());
    store.put(&a.export_record(), a.base()).expect("put a");
    store.put(&b.export_record(), b.base()).expect("put b");

    let mut ids = store.session_ids().expect("ids");
    ids.sort();
    let mut expected = vec![a.id(), b.id()];
    expected.sort();
    assert_eq!(ids, expected);

    assert!(store.delete(a.id()).expect("delete"));
    assert!(!store.delete(a.id()).expect("delete again"));
    assert!(store.get(a.id()).expect("get").is_none());
    assert!(store.get(b.id()).expect("get").is_some());
}

use tabstudio::{
    codegen::ExportFormat,
    core::{Session, SessionError, SessionRecord},
    loader::LoadDescriptor,
    op::{ActionSpec, Operation},
    registry::{ActionDefinition, ActionError, ActionKind, ActionRegistry, Segment, Template},
    table::{Cell, Column, Table},
    types::SessionId,
};

fn base() -> Table {
    Table::new(vec![
        Column::ints("A", [1, 2, 3, 4, 5]),
        Column::ints("B", [10, 20, 30, 40, 50]),
    ])
    .expect("table")
}

fn session() -> Session {
    Session::new(SessionId::new(), LoadDescriptor::new("/data/ab.csv", "csv"), base())
}

fn drop_b() -> ActionSpec {
    ActionSpec::single("Drop B", Operation::new("drop_column").with("column", "B"))
}

fn filter_a(op: &str, value: i64) -> ActionSpec {
    ActionSpec::single(
        format!("A {op} {value}"),
        Operation::new("filter_rows")
            .with("column", "A")
            .with("operator", op)
            .with("value", value),
    )
}

fn a_values(session: &Session) -> Vec<Cell> {
    session.materialized().column("A").expect("A").cells().to_vec()
}

fn ints(values: &[i64]) -> Vec<Cell> {
    values.iter().map(|v| Cell::Int(*v)).collect()
}

#[test]
fn drop_filter_undo_undo_redo() {
    let mut s = session();

    s.apply_action(drop_b()).expect("drop");
    assert_eq!(s.materialized().column_names(), vec!["A"]);
    assert_eq!(s.materialized().row_count(), 5);

    s.apply_action(filter_a(">", 2)).expect("filter");
    assert_eq!(a_values(&s), ints(&[3, 4, 5]));
    assert_eq!(s.cursor(), 1);

    assert!(s.undo().expect("undo"));
    assert_eq!(s.cursor(), 0);
    assert_eq!(s.materialized().row_count(), 5);
    assert!(!s.materialized().contains("B"));

    assert!(s.undo().expect("undo"));
    assert_eq!(s.cursor(), -1);
    assert_eq!(s.materialized(), &base());

    assert!(s.redo().expect("redo"));
    assert_eq!(s.cursor(), 0);
    assert!(!s.materialized().contains("B"));
    assert_eq!(s.history().len(), 2);
}

#[test]
fn applying_after_undo_discards_the_redo_branch() {
    let mut s = session();
    s.apply_action(drop_b()).expect("drop");
    s.apply_action(filter_a(">", 2)).expect("filter");
    s.undo().expect("undo");

    let cursor_before = s.cursor();
    s.apply_action(filter_a("<", 4)).expect("branch");

    assert_eq!(s.history().len() as i64, cursor_before + 2);
    assert_eq!(s.history()[1], filter_a("<", 4));
    assert_eq!(a_values(&s), ints(&[1, 2, 3]));
    assert!(!s.materialized().contains("B"));
    assert!(!s.can_redo());
}

#[test]
fn undo_and_redo_past_the_ends_are_no_ops() {
    let mut s = session();
    assert!(!s.undo().expect("undo at base"));
    assert!(!s.redo().expect("redo with empty history"));
    assert_eq!(s.cursor(), -1);

    s.apply_action(drop_b()).expect("drop");
    assert!(!s.redo().expect("redo at end"));
    assert_eq!(s.cursor(), 0);
}

#[test]
fn failed_apply_leaves_session_untouched() {
    let mut s = session();
    s.apply_action(drop_b()).expect("drop");
    s.apply_action(filter_a(">", 1)).expect("filter");
    s.undo().expect("undo");

    let history = s.history().to_vec();
    let materialized = s.materialized().clone();

    let err = s
        .apply_action(ActionSpec::single(
            "Drop missing",
            Operation::new("drop_column").with("column", "B"),
        ))
        .expect_err("B is gone");
    assert!(matches!(
        err,
        SessionError::Action(ActionError::ColumnNotFound { ref column, .. }) if column == "B"
    ));

    assert_eq!(s.history(), history.as_slice());
    assert_eq!(s.cursor(), 0);
    assert_eq!(s.materialized(), &materialized);
    assert!(s.can_redo(), "redo branch survives a failed apply");
}

#[test]
fn compound_spec_is_all_or_nothing() {
    let mut s = session();
    let spec = ActionSpec {
        intent: "drop both".to_string(),
        operations: vec![
            Operation::new("drop_column").with("column", "B"),
            Operation::new("drop_column").with("column", "C"),
        ],
    };
    assert!(s.apply_action(spec).is_err());
    assert_eq!(s.materialized(), &base());
    assert!(s.history().is_empty());
}

#[test]
fn empty_spec_is_recorded_as_a_step() {
    let mut s = session();
    s.apply_action(ActionSpec::empty("nothing matched")).expect("apply");
    assert_eq!(s.cursor(), 0);
    assert_eq!(s.materialized(), &base());
}

#[test]
fn record_round_trip_rebuilds_by_replay() {
    let mut s = session();
    s.apply_action(drop_b()).expect("drop");
    s.apply_action(filter_a(">=", 3)).expect("filter");
    s.undo().expect("undo");

    let record = s.export_record();
    assert_eq!(record.cursor, 0);
    let json = serde_json::to_string(&record).expect("encode");
    let back: SessionRecord = serde_json::from_str(&json).expect("decode");

    let restored = Session::from_record(back, base()).expect("restore");
    assert_eq!(restored.id(), s.id());
    assert_eq!(restored.cursor(), 0);
    assert_eq!(restored.materialized(), s.materialized());
    assert_eq!(restored.history(), s.history());
}

#[test]
fn corrupt_records_are_rejected() {
    let mut s = session();
    s.apply_action(drop_b()).expect("drop");

    let mut record = s.export_record();
    record.cursor = 3;
    assert!(matches!(
        Session::from_record(record, base()),
        Err(SessionError::CorruptRecord(_))
    ));

    let mut record = s.export_record();
    record.history.push(drop_b());
    record.cursor = 1;
    assert!(matches!(
        Session::from_record(record, base()),
        Err(SessionError::CorruptRecord(_))
    ));
}

static DROP_IN_PLACE: &[Segment] = &[
    Segment::Code("df.drop(columns=["),
    Segment::Slot("column"),
    Segment::Code("], inplace=True)"),
];

#[test]
fn apply_and_export_share_the_session_registry() {
    let mut reg = ActionRegistry::empty();
    reg.register(ActionDefinition::new(ActionKind::DropColumn).with_template(Template::new(DROP_IN_PLACE)))
        .expect("register");
    let reg: &'static ActionRegistry = Box::leak(Box::new(reg));

    let mut s = session().with_registry(reg);
    s.apply_action(drop_b()).expect("drop");
    assert!(matches!(
        s.apply_action(filter_a(">", 2)),
        Err(SessionError::Action(ActionError::UnknownAction(name))) if name == "filter_rows"
    ));

    let script = s.export(ExportFormat::Script).expect("export").content;
    assert!(script.contains("# Drop B\ndf.drop(columns=['B'], inplace=True)\n"), "{script}");
}

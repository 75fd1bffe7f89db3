use std::fs;

use tempfile::TempDir;

use tabstudio::{
    config::StudioConfig,
    loader::{LoadDescriptor, LoadError, load},
    op::{ActionSpec, Operation},
    runtime::{Studio, StudioError},
    table::Cell,
    types::DType,
};

#[test]
fn csv_columns_are_typed_like_pandas() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("people.csv");
    fs::write(
        &path,
        "name,age,score,active,,age\nAlice,30,1.5,True,x,1\nBob,NA,2,False,y,2\n\"O'Neil, Jr.\",41,,true,z,3\n",
    )
    .expect("write");

    let table = load(&LoadDescriptor::new(path.to_string_lossy(), "csv")).expect("load");
    assert_eq!(
        table.column_names(),
        vec!["name", "age", "score", "active", "Unnamed: 4", "age.1"]
    );
    let dtypes: Vec<DType> = table.columns().iter().map(|c| c.dtype()).collect();
    assert_eq!(
        dtypes,
        vec![DType::Str, DType::Float, DType::Float, DType::Bool, DType::Str, DType::Int]
    );
    let age = table.column("age").expect("age");
    assert_eq!(age.cells(), &[Cell::Float(30.0), Cell::Null, Cell::Float(41.0)]);
    assert_eq!(
        table.column("name").expect("name").cells()[2],
        Cell::Str("O'Neil, Jr.".to_string())
    );
}

#[test]
fn json_records_and_columns_load_the_same_table() {
    let tmp = TempDir::new().expect("tmp");
    let records = tmp.path().join("records.json");
    let columns = tmp.path().join("columns.json");
    fs::write(&records, r#"[{"a": 1, "b": "x"}, {"a": 2}, {"a": 3, "b": null}]"#).expect("write");
    fs::write(&columns, r#"{"a": [1, 2, 3], "b": ["x", null, null]}"#).expect("write");

    let from_records = load(&LoadDescriptor::new(records.to_string_lossy(), "json")).expect("records");
    let from_columns = load(&LoadDescriptor::new(columns.to_string_lossy(), "json")).expect("columns");
    assert_eq!(from_records, from_columns);
    assert_eq!(from_records.column("a").expect("a").dtype(), DType::Int);
    assert_eq!(from_records.column("b").expect("b").null_count(), 2);
}

#[test]
fn load_errors_are_specific() {
    let tmp = TempDir::new().expect("tmp");
    let missing = tmp.path().join("missing.csv");
    assert!(matches!(
        load(&LoadDescriptor::new(missing.to_string_lossy(), "csv")),
        Err(LoadError::Io { .. })
    ));

    let bad = tmp.path().join("bad.json");
    fs::write(&bad, "{not json").expect("write");
    assert!(matches!(
        load(&LoadDescriptor::new(bad.to_string_lossy(), "json")),
        Err(LoadError::Parse { .. })
    ));

    assert!(matches!(
        load(&LoadDescriptor::new("data.parquet", "parquet")),
        Err(LoadError::UnsupportedFormat(tag)) if tag == "parquet"
    ));
}

#[tokio::test]
async fn studio_load_starts_a_session_on_the_file() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("scores.csv");
    fs::write(&path, "Score\n80\n40\n90\n").expect("write");

    let studio = Studio::open(StudioConfig::default()).expect("studio");
    let descriptor = LoadDescriptor::new(path.to_string_lossy(), "csv");
    let handle = studio.load(descriptor.clone()).await.expect("load");
    handle
        .apply(ActionSpec::single(
            "Pass mark",
            Operation::new("conditional")
                .with("column", "Score")
                .with("operator", ">")
                .with("value", 50)
                .with("true_val", "Pass")
                .with("false_val", "Fail")
                .with("new_col", "Status"),
        ))
        .await
        .expect("apply");

    let rows = handle.preview(None).await.expect("preview");
    let status: Vec<&serde_json::Value> = rows.iter().map(|r| &r["Status"]).collect();
    assert_eq!(status, vec!["Pass", "Fail", "Pass"]);

    let script = handle
        .export(tabstudio::codegen::ExportFormat::Script)
        .await
        .expect("export");
    assert!(script.content.contains("df = pd.read_csv("));

    let missing = LoadDescriptor::new(tmp.path().join("nope.csv").to_string_lossy(), "csv");
    assert!(matches!(studio.load(missing).await, Err(StudioError::Load(LoadError::Io { .. }))));
    studio.shutdown().await.expect("shutdown");
}

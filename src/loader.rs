//! Dataset loading: CSV, JSON and Excel files into a [`Table`], with the
//! column typing pandas would infer for the same file.

use std::{fs::File, io::BufReader, path::Path};

use calamine::{Data, Reader, open_workbook_auto};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    table::{Cell, Column, Table, TableError},
    types::{DType, SourceFormat},
};

/// Format tag of sessions built from an in-memory table.
pub const MEMORY_FORMAT: &str = "memory";

/// Tokens read as missing values, matching pandas' default `na_values`.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>", "N/A", "NA",
    "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Where a session's base table came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadDescriptor {
    /// File path as given by the caller.
    pub path: String,
    /// Format tag; `csv`, `json`, `xls` and `xlsx` are loadable.
    pub format: String,
}

impl LoadDescriptor {
    /// Describes a file.
    pub fn new(path: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: format.into(),
        }
    }

    /// Describes a table handed over in memory.
    pub fn memory(label: impl Into<String>) -> Self {
        Self::new(label, MEMORY_FORMAT)
    }

    /// Parsed format, if it is a loadable one.
    pub fn source_format(&self) -> Option<SourceFormat> {
        SourceFormat::parse(&self.format)
    }
}

/// Failures while reading a dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be opened or read.
    #[error("cannot read '{path}': {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The format tag is not loadable.
    #[error("unsupported format '{0}'")]
    UnsupportedFormat(String),
    /// The file was read but its content is not a table.
    #[error("cannot parse '{path}': {message}")]
    Parse {
        /// Offending path.
        path: String,
        /// What went wrong.
        message: String,
    },
}

impl LoadError {
    fn parse(path: &str, message: impl ToString) -> Self {
        Self::Parse {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    fn table(path: &str, err: TableError) -> Self {
        Self::parse(path, err)
    }
}

/// Reads the dataset `descriptor` points at.
pub fn load(descriptor: &LoadDescriptor) -> Result<Table, LoadError> {
    let format = descriptor
        .source_format()
        .ok_or_else(|| LoadError::UnsupportedFormat(descriptor.format.clone()))?;
    let path = descriptor.path.as_str();
    let table = match format {
        SourceFormat::Csv => load_csv(path)?,
        SourceFormat::Json => load_json(path)?,
        SourceFormat::Xls | SourceFormat::Xlsx => load_excel(path)?,
    };
    info!(
        path,
        format = %descriptor.format,
        rows = table.row_count(),
        columns = table.column_count(),
        "dataset loaded"
    );
    Ok(table)
}

fn open(path: &str) -> Result<File, LoadError> {
    File::open(path).map_err(|source| LoadError::Io {
        path: path.to_string(),
        source,
    })
}

fn load_csv(path: &str) -> Result<Table, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(open(path)?));
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::parse(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| LoadError::parse(path, e))?;
        for (column, field) in raw.iter_mut().zip(record.iter()) {
            column.push(field.to_string());
        }
    }

    let columns = column_names(headers)
        .into_iter()
        .zip(raw)
        .map(|(name, fields)| infer_text_column(name, &fields))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LoadError::table(path, e))?;
    Table::new(columns).map_err(|e| LoadError::table(path, e))
}

/// Blank headers become `Unnamed: i`; repeats get `.1`, `.2` suffixes.
fn column_names(headers: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(headers.len());
    for (idx, header) in headers.into_iter().enumerate() {
        let base = if header.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            header
        };
        let mut name = base.clone();
        let mut n = 1;
        while out.contains(&name) {
            name = format!("{base}.{n}");
            n += 1;
        }
        out.push(name);
    }
    out
}

fn infer_text_column(name: String, fields: &[String]) -> Result<Column, TableError> {
    let values: Vec<Option<&str>> = fields
        .iter()
        .map(|f| (!NA_TOKENS.contains(&f.as_str())).then_some(f.as_str()))
        .collect();
    let present = || values.iter().flatten();

    let dtype = if present().all(|v| v.trim().parse::<i64>().is_ok()) && present().next().is_some() {
        DType::Int
    } else if present().all(|v| v.trim().parse::<f64>().is_ok()) {
        DType::Float
    } else if present().all(|v| parse_bool(v).is_some()) {
        DType::Bool
    } else {
        DType::Str
    };

    let cells = values
        .iter()
        .map(|v| match v {
            None => Cell::Null,
            Some(text) => match dtype {
                DType::Int => text.trim().parse().map_or(Cell::Null, Cell::Int),
                DType::Float => text.trim().parse().map_or(Cell::Null, Cell::float),
                DType::Bool => parse_bool(text).map_or(Cell::Null, Cell::Bool),
                DType::Str => Cell::Str((*text).to_string()),
            },
        })
        .collect();
    Column::infer(name, cells)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

fn load_json(path: &str) -> Result<Table, LoadError> {
    let value: serde_json::Value =
        serde_json::from_reader(BufReader::new(open(path)?)).map_err(|e| LoadError::parse(path, e))?;

    let mut names: Vec<String> = Vec::new();
    let mut data: Vec<Vec<Cell>> = Vec::new();
    match value {
        serde_json::Value::Array(records) => {
            for (row, record) in records.into_iter().enumerate() {
                let serde_json::Value::Object(fields) = record else {
                    return Err(LoadError::parse(path, format!("record {row} is not an object")));
                };
                for (key, field) in fields {
                    let idx = match names.iter().position(|n| *n == key) {
                        Some(idx) => idx,
                        None => {
                            names.push(key);
                            data.push(vec![Cell::Null; row]);
                            names.len() - 1
                        }
                    };
                    data[idx].push(json_cell(path, field)?);
                }
                for column in &mut data {
                    column.resize(row + 1, Cell::Null);
                }
            }
        }
        serde_json::Value::Object(columns) => {
            for (key, values) in columns {
                let cells = match values {
                    serde_json::Value::Array(items) => items,
                    serde_json::Value::Object(by_index) => by_index.into_iter().map(|(_, v)| v).collect(),
                    _ => return Err(LoadError::parse(path, format!("column '{key}' is not an array or object"))),
                };
                names.push(key);
                data.push(cells.into_iter().map(|v| json_cell(path, v)).collect::<Result<_, _>>()?);
            }
        }
        _ => return Err(LoadError::parse(path, "expected an array of records or an object of columns")),
    }

    let columns = names
        .into_iter()
        .zip(data)
        .map(|(name, cells)| Column::infer(name, cells))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LoadError::table(path, e))?;
    Table::new(columns).map_err(|e| LoadError::table(path, e))
}

fn json_cell(path: &str, value: serde_json::Value) -> Result<Cell, LoadError> {
    Ok(match value {
        serde_json::Value::Null => Cell::Null,
        serde_json::Value::Bool(b) => Cell::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map_or(Cell::Null, Cell::float),
        },
        serde_json::Value::String(s) => Cell::Str(s),
        nested => return Err(LoadError::parse(path, format!("nested value {nested} is not a cell"))),
    })
}

fn load_excel(path: &str) -> Result<Table, LoadError> {
    if let Err(source) = std::fs::metadata(Path::new(path)) {
        return Err(LoadError::Io {
            path: path.to_string(),
            source,
        });
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::parse(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::parse(path, "workbook has no sheets"))?
        .map_err(|e| LoadError::parse(path, e))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Table::new(Vec::new()).map_err(|e| LoadError::table(path, e));
    };
    let names = column_names(header.iter().map(|d| d.to_string()).collect());
    let mut data: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (column, value) in data.iter_mut().zip(row.iter()) {
            column.push(excel_cell(value));
        }
    }

    let columns = names
        .into_iter()
        .zip(data)
        .map(|(name, cells)| Column::infer(name, cells))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LoadError::table(path, e))?;
    Table::new(columns).map_err(|e| LoadError::table(path, e))
}

/// Integral floats come back as ints, the way pandas reads Excel numbers.
fn excel_cell(value: &Data) -> Cell {
    match value {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Cell::Int(*f as i64),
        Data::Float(f) => Cell::float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => Cell::Str(s.clone()),
        other => Cell::Str(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_inference_follows_pandas() {
        let ints = infer_text_column("a".into(), &["1".into(), " 2".into()]).expect("ints");
        assert_eq!(ints.dtype(), DType::Int);

        let nullable = infer_text_column("a".into(), &["1".into(), "NA".into()]).expect("nullable");
        assert_eq!(nullable.dtype(), DType::Float);
        assert_eq!(nullable.cells(), &[Cell::Float(1.0), Cell::Null]);

        let bools = infer_text_column("a".into(), &["True".into(), "false".into()]).expect("bools");
        assert_eq!(bools.dtype(), DType::Bool);

        let text = infer_text_column("a".into(), &["1".into(), "x".into(), "".into()]).expect("text");
        assert_eq!(text.dtype(), DType::Str);
        assert_eq!(text.cells()[2], Cell::Null);

        let empty = infer_text_column("a".into(), &["".into(), "null".into()]).expect("all null");
        assert_eq!(empty.dtype(), DType::Float);
    }

    #[test]
    fn headers_are_mangled_like_pandas() {
        let names = column_names(vec!["a".into(), "".into(), "a".into(), "a".into()]);
        assert_eq!(names, ["a", "Unnamed: 1", "a.1", "a.2"]);
    }

    #[test]
    fn unknown_format_is_rejected_before_io() {
        let err = load(&LoadDescriptor::new("/nope", "parquet")).expect_err("parquet");
        assert!(matches!(err, LoadError::UnsupportedFormat(tag) if tag == "parquet"));
        let err = load(&LoadDescriptor::memory("inline")).expect_err("memory");
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }
}

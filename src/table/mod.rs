//! Immutable columnar table.
//!
//! Every operation returns a new [`Table`]; inputs are never mutated. Column
//! data sits behind an [`Arc`], so operations that only reshape the column
//! list (select, drop, rename) share cell storage with their input.

/// Cell values and comparison rules.
pub mod cell;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::DType;

pub use cell::Cell;

/// One preview row: column name to JSON value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Structural errors raised while building or reshaping a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A referenced column does not exist.
    #[error("column '{0}' not found")]
    ColumnNotFound(String),
    /// A column name would appear twice.
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),
    /// Columns of different lengths.
    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        /// Offending column.
        column: String,
        /// Row count of the table.
        expected: usize,
        /// Row count of the column.
        found: usize,
    },
    /// A cell does not fit its column dtype.
    #[error("column '{column}' of dtype {dtype:?} cannot hold a {found} value")]
    CellType {
        /// Offending column.
        column: String,
        /// Declared dtype.
        dtype: DType,
        /// Kind of the rejected cell.
        found: &'static str,
    },
    /// Inference found values with no common dtype.
    #[error("column '{column}' mixes {first} and {second} values")]
    MixedTypes {
        /// Offending column.
        column: String,
        /// First kind seen.
        first: &'static str,
        /// Conflicting kind.
        second: &'static str,
    },
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColumnRepr")]
pub struct Column {
    name: String,
    dtype: DType,
    cells: Arc<[Cell]>,
}

#[derive(Deserialize)]
struct ColumnRepr {
    name: String,
    dtype: DType,
    cells: Vec<Cell>,
}

impl TryFrom<ColumnRepr> for Column {
    type Error = TableError;

    fn try_from(repr: ColumnRepr) -> Result<Self, Self::Error> {
        Self::new(repr.name, repr.dtype, repr.cells)
    }
}

impl Column {
    /// Builds a column, checking every cell against `dtype`.
    ///
    /// Int columns may not hold nulls; a float NaN is stored as null.
    pub fn new(name: impl Into<String>, dtype: DType, cells: Vec<Cell>) -> Result<Self, TableError> {
        let name = name.into();
        let mut cells = cells;
        for cell in &mut cells {
            let fits = match (dtype, &*cell) {
                (DType::Int, Cell::Int(_)) => true,
                (DType::Float, Cell::Float(f)) => {
                    if f.is_nan() {
                        *cell = Cell::Null;
                    }
                    true
                }
                (DType::Float, Cell::Int(i)) => {
                    *cell = Cell::Float(*i as f64);
                    true
                }
                (DType::Float | DType::Bool | DType::Str, Cell::Null) => true,
                (DType::Bool, Cell::Bool(_)) | (DType::Str, Cell::Str(_)) => true,
                _ => false,
            };
            if !fits {
                return Err(TableError::CellType {
                    column: name,
                    dtype,
                    found: cell.kind(),
                });
            }
        }
        Ok(Self {
            name,
            dtype,
            cells: cells.into(),
        })
    }

    /// Infers the dtype from the cells the way pandas does for parsed data.
    ///
    /// Integers with any null become floats; an all-null column is float.
    pub fn infer(name: impl Into<String>, cells: Vec<Cell>) -> Result<Self, TableError> {
        let name = name.into();
        let mut seen: Option<&'static str> = None;
        let mut has_null = false;
        let mut has_float = false;
        for cell in &cells {
            let kind = match cell {
                Cell::Null => {
                    has_null = true;
                    continue;
                }
                Cell::Int(_) => "number",
                Cell::Float(_) => {
                    has_float = true;
                    "number"
                }
                Cell::Bool(_) => "bool",
                Cell::Str(_) => "str",
            };
            match seen {
                None => seen = Some(kind),
                Some(prev) if prev != kind => {
                    return Err(TableError::MixedTypes {
                        column: name,
                        first: prev,
                        second: kind,
                    });
                }
                Some(_) => {}
            }
        }
        let dtype = match seen {
            None => DType::Float,
            Some("number") if has_float || has_null => DType::Float,
            Some("number") => DType::Int,
            Some("bool") => DType::Bool,
            Some(_) => DType::Str,
        };
        Self::new(name, dtype, cells)
    }

    /// Integer column.
    pub fn ints(name: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Self::trusted(name.into(), DType::Int, values.into_iter().map(Cell::Int).collect())
    }

    /// Float column; NaN entries are nulls.
    pub fn floats(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Self::trusted(name.into(), DType::Float, values.into_iter().map(Cell::float).collect())
    }

    /// Boolean column.
    pub fn bools(name: impl Into<String>, values: impl IntoIterator<Item = bool>) -> Self {
        Self::trusted(name.into(), DType::Bool, values.into_iter().map(Cell::Bool).collect())
    }

    /// Text column without nulls.
    pub fn strs<S: Into<String>>(name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::trusted(
            name.into(),
            DType::Str,
            values.into_iter().map(|s| Cell::Str(s.into())).collect(),
        )
    }

    pub(crate) fn trusted(name: String, dtype: DType, cells: Vec<Cell>) -> Self {
        Self {
            name,
            dtype,
            cells: cells.into(),
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column dtype.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Cell values in row order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of null cells.
    pub fn null_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_null()).count()
    }

    /// Same data under another name; shares storage.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: self.dtype,
            cells: Arc::clone(&self.cells),
        }
    }

    fn take(&self, rows: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            dtype: self.dtype,
            cells: rows.iter().map(|&r| self.cells[r].clone()).collect(),
        }
    }
}

/// An immutable table of equally long, uniquely named columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "TableRepr")]
pub struct Table {
    columns: Vec<Column>,
    #[serde(skip)]
    rows: usize,
}

#[derive(Deserialize)]
struct TableRepr {
    columns: Vec<Column>,
}

impl TryFrom<TableRepr> for Table {
    type Error = TableError;

    fn try_from(repr: TableRepr) -> Result<Self, Self::Error> {
        Self::new(repr.columns)
    }
}

impl Table {
    /// Builds a table, rejecting duplicate names and ragged columns.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let rows = columns.first().map_or(0, Column::len);
        for (idx, col) in columns.iter().enumerate() {
            if col.len() != rows {
                return Err(TableError::LengthMismatch {
                    column: col.name.clone(),
                    expected: rows,
                    found: col.len(),
                });
            }
            if columns[..idx].iter().any(|c| c.name == col.name) {
                return Err(TableError::DuplicateColumn(col.name.clone()));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column, failing with [`TableError::ColumnNotFound`].
    pub fn require(&self, name: &str) -> Result<&Column, TableError> {
        self.column(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    /// True if the column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Keeps only the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Self, TableError> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            columns.push(self.require(name)?.clone());
        }
        Self::new(columns)
    }

    /// Removes the named columns.
    pub fn drop_columns(&self, names: &[&str]) -> Result<Self, TableError> {
        for name in names {
            self.require(name)?;
        }
        Ok(Self {
            columns: self
                .columns
                .iter()
                .filter(|c| !names.contains(&c.name.as_str()))
                .cloned()
                .collect(),
            rows: self.rows,
        })
    }

    /// Renames one column in place.
    pub fn rename(&self, old: &str, new: &str) -> Result<Self, TableError> {
        self.require(old)?;
        if old != new && self.contains(new) {
            return Err(TableError::DuplicateColumn(new.to_string()));
        }
        Ok(Self {
            columns: self
                .columns
                .iter()
                .map(|c| if c.name == old { c.renamed(new) } else { c.clone() })
                .collect(),
            rows: self.rows,
        })
    }

    /// Replaces the column of the same name in place, or appends it.
    pub fn with_column(&self, column: Column) -> Result<Self, TableError> {
        let found = column.len();
        if found != self.rows && !self.columns.is_empty() {
            return Err(TableError::LengthMismatch {
                column: column.name,
                expected: self.rows,
                found,
            });
        }
        let rows = column.len();
        let mut columns = self.columns.clone();
        match columns.iter_mut().find(|c| c.name == column.name) {
            Some(slot) => *slot = column,
            None => columns.push(column),
        }
        Ok(Self { columns, rows })
    }

    /// Keeps the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            rows: rows.len(),
        }
    }

    /// First `n` rows as JSON records.
    pub fn head(&self, n: usize) -> Vec<Row> {
        (0..self.rows.min(n))
            .map(|r| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.cells[r].to_json()))
                    .collect()
            })
            .collect()
    }
}

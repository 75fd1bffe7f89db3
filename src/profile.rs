//! Column statistics and advisory cleaning suggestions.

use hashbrown::HashSet;
use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    op::{ActionSpec, Operation, Value},
    table::{Cell, Column, Table},
    types::DType,
};

/// Share of parsable values above which a text column looks numeric.
const NUMERIC_TEXT_RATIO: f64 = 0.95;
/// Share of missing values below which dropping those rows is suggested.
const SPARSE_MISSING_RATIO: f64 = 0.10;

/// Bytes pandas reports for a default `RangeIndex`.
const RANGE_INDEX_BYTES: usize = 132;
/// Object column slot plus the `str` header of a compact ASCII string.
const ASCII_STR_BYTES: usize = 8 + 49;
/// Object column slot plus the `str` header of a non-ASCII string.
const WIDE_STR_BYTES: usize = 8 + 74;
/// Object column slot plus `None`.
const NONE_BYTES: usize = 8 + 16;

/// Summary of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    /// Row count.
    pub rows: usize,
    /// Column count.
    pub columns: usize,
    /// Column names in order.
    pub column_names: Vec<String>,
    /// pandas dtype name per column, in column order.
    pub dtypes: IndexMap<String, &'static str>,
    /// Null count per column, in column order.
    pub missing_values: IndexMap<String, usize>,
    /// Estimate of `df.memory_usage(deep=True).sum()` in MiB.
    pub memory_usage_mb: f64,
    /// One entry per column, in order.
    pub column_details: Vec<ColumnProfile>,
    /// Advisory actions.
    pub suggestions: Vec<Suggestion>,
}

/// Statistics of one column. Numeric stats are `None` for text columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    /// Column name.
    pub name: String,
    /// pandas dtype name.
    pub dtype: &'static str,
    /// Null cells.
    pub missing_count: usize,
    /// Distinct non-null values.
    pub unique_count: usize,
    /// Mean of non-null values.
    pub mean: Option<f64>,
    /// Smallest non-null value.
    pub min: Option<f64>,
    /// Largest non-null value.
    pub max: Option<f64>,
}

/// A ready-to-apply action spec the caller may offer. Never applied automatically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    /// Action name the suggestion uses.
    pub kind: &'static str,
    /// Column concerned.
    pub column: String,
    /// Human-readable reason.
    pub description: String,
    /// Spec to apply if accepted.
    pub action: ActionSpec,
    /// Between 0 and 1.
    pub confidence: f64,
}

/// Profiles `table`.
pub fn profile(table: &Table) -> Profile {
    let column_details: Vec<ColumnProfile> = table.columns().iter().map(column_profile).collect();
    let suggestions = table
        .columns()
        .iter()
        .zip(&column_details)
        .flat_map(|(column, stats)| suggest(table.row_count(), column, stats))
        .collect();
    Profile {
        rows: table.row_count(),
        columns: table.column_count(),
        column_names: table.column_names().into_iter().map(str::to_string).collect(),
        dtypes: column_details.iter().map(|c| (c.name.clone(), c.dtype)).collect(),
        missing_values: column_details.iter().map(|c| (c.name.clone(), c.missing_count)).collect(),
        memory_usage_mb: memory_usage_bytes(table) as f64 / (1024.0 * 1024.0),
        column_details,
        suggestions,
    }
}

/// Bytes pandas would report for `table` with deep introspection.
fn memory_usage_bytes(table: &Table) -> usize {
    let columns: usize = table
        .columns()
        .iter()
        .map(|column| match column.dtype() {
            DType::Int | DType::Float => 8 * column.len(),
            DType::Bool => column.len(),
            DType::Str => column
                .cells()
                .iter()
                .map(|c| match c {
                    Cell::Str(s) if s.is_ascii() => ASCII_STR_BYTES + s.len(),
                    Cell::Str(s) => WIDE_STR_BYTES + 4 * s.chars().count(),
                    _ => NONE_BYTES,
                })
                .sum(),
        })
        .sum();
    RANGE_INDEX_BYTES + columns
}

fn column_profile(column: &Column) -> ColumnProfile {
    let distinct: HashSet<String> = column
        .cells()
        .iter()
        .filter(|c| !c.is_null())
        .map(|c| match c {
            Cell::Float(f) if *f == 0.0 => "0.0".to_string(),
            other => other.python_str(),
        })
        .collect();

    let (mut mean, mut min, mut max) = (None, None, None);
    if column.dtype() != DType::Str {
        let values: Vec<f64> = column.cells().iter().filter_map(Cell::as_f64).collect();
        if !values.is_empty() {
            mean = Some(values.iter().sum::<f64>() / values.len() as f64);
            min = values.iter().copied().reduce(f64::min);
            max = values.iter().copied().reduce(f64::max);
        }
    }

    ColumnProfile {
        name: column.name().to_string(),
        dtype: column.dtype().pandas_name(),
        missing_count: column.null_count(),
        unique_count: distinct.len(),
        mean,
        min,
        max,
    }
}

fn suggest(rows: usize, column: &Column, stats: &ColumnProfile) -> Vec<Suggestion> {
    let name = column.name();
    let mut out = Vec::new();
    if rows == 0 {
        return out;
    }

    if stats.missing_count == rows {
        out.push(Suggestion {
            kind: "drop_column",
            column: name.to_string(),
            description: format!("Column '{name}' is entirely empty"),
            action: drop_column(name),
            confidence: 1.0,
        });
        return out;
    }
    if rows > 1 && stats.unique_count == 1 && stats.missing_count == 0 {
        out.push(Suggestion {
            kind: "drop_column",
            column: name.to_string(),
            description: format!("Column '{name}' holds a single constant value"),
            action: drop_column(name),
            confidence: 0.9,
        });
    }

    if column.dtype() == DType::Str {
        let present: Vec<&str> = column
            .cells()
            .iter()
            .filter_map(|c| match c {
                Cell::Str(s) => Some(s.trim()),
                _ => None,
            })
            .collect();
        let floats = present.iter().filter(|s| s.parse::<f64>().is_ok()).count();
        let ratio = floats as f64 / present.len() as f64;
        if !present.is_empty() && ratio >= NUMERIC_TEXT_RATIO {
            let target = if present.iter().all(|s| s.parse::<i64>().is_ok()) {
                "int"
            } else {
                "float"
            };
            out.push(Suggestion {
                kind: "astype",
                column: name.to_string(),
                description: format!("Column '{name}' looks numeric; convert it to {target}"),
                action: ActionSpec::single(
                    format!("Convert {name} to {target}"),
                    Operation::new("astype").with("column", name).with("dtype", target),
                ),
                confidence: ratio,
            });
        }
    }

    let missing = stats.missing_count as f64 / rows as f64;
    if stats.missing_count > 0 && missing < SPARSE_MISSING_RATIO {
        out.push(Suggestion {
            kind: "drop_na",
            column: name.to_string(),
            description: format!(
                "Column '{name}' is missing {} of {rows} values; drop those rows",
                stats.missing_count
            ),
            action: ActionSpec::single(
                format!("Drop rows missing {name}"),
                Operation::new("drop_na").with("subset", Value::strings([name])),
            ),
            confidence: 0.7,
        });
    }
    out
}

fn drop_column(name: &str) -> ActionSpec {
    ActionSpec::single(
        format!("Drop column {name}"),
        Operation::new("drop_column").with("column", name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_skip_nulls() {
        let table = Table::new(vec![
            Column::new(
                "x",
                DType::Float,
                vec![Cell::Float(1.0), Cell::Null, Cell::Float(3.0), Cell::Float(-0.0), Cell::Float(0.0)],
            )
            .expect("x"),
        ])
        .expect("table");
        let p = profile(&table);
        let x = &p.column_details[0];
        assert_eq!(x.dtype, "float64");
        assert_eq!(x.missing_count, 1);
        assert_eq!(x.unique_count, 3);
        assert_eq!(x.mean, Some(1.0));
        assert_eq!(x.min, Some(-0.0));
        assert_eq!(x.max, Some(3.0));
    }

    #[test]
    fn per_column_maps_follow_column_order() {
        let table = Table::new(vec![
            Column::new("name", DType::Str, vec![Cell::Str("Ann".into()), Cell::Null]).expect("name"),
            Column::ints("age", [30, 40]),
            Column::bools("ok", [true, false]),
        ])
        .expect("table");
        let p = profile(&table);
        assert_eq!(p.dtypes.keys().collect::<Vec<_>>(), ["name", "age", "ok"]);
        assert_eq!(p.dtypes["name"], "object");
        assert_eq!(p.dtypes["age"], "int64");
        assert_eq!(p.missing_values["name"], 1);
        assert_eq!(p.missing_values["age"], 0);

        let bytes = RANGE_INDEX_BYTES + (ASCII_STR_BYTES + 3) + NONE_BYTES + 16 + 2;
        assert_eq!(p.memory_usage_mb, bytes as f64 / (1024.0 * 1024.0));
    }

    #[test]
    fn suggestions_cover_each_heuristic() {
        let mut ids: Vec<Cell> = (0..20).map(|i| Cell::Str(i.to_string())).collect();
        ids[3] = Cell::Null;
        let table = Table::new(vec![
            Column::new("empty", DType::Float, vec![Cell::Null; 20]).expect("empty"),
            Column::ints("same", [7; 20]),
            Column::new("ids", DType::Str, ids).expect("ids"),
        ])
        .expect("table");
        let p = profile(&table);
        let kinds: Vec<(&str, &str)> = p
            .suggestions
            .iter()
            .map(|s| (s.kind, s.column.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("drop_column", "empty"),
                ("drop_column", "same"),
                ("astype", "ids"),
                ("drop_na", "ids"),
            ]
        );
        let cast = &p.suggestions[2].action.operations[0];
        assert_eq!(cast.parameters["dtype"], Value::from("int"));
    }
}

//! Executors for the builtin actions.
//!
//! Each one validates every parameter and referenced column before it reads
//! any cell, and builds a fresh table for its result.

use std::cmp::Ordering;

use hashbrown::HashMap;

use crate::{
    op::Params,
    table::{
        Column, Table,
        cell::{Cell, compare_cells, evaluate},
    },
    types::{CastType, CompareOp, DType, MathFunction, Reducer},
};

use super::{ActionError, ActionKind, args::Args};

pub(crate) fn drop_column(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::DropColumn, params)?;
    let column = args.text("column")?;
    args.require(table, column)?;
    table.drop_columns(&[column]).map_err(|e| args.table_error(e))
}

pub(crate) fn select_columns(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::SelectColumns, params)?;
    let columns = args.texts("columns")?;
    args.require_all(table, &columns)?;
    table.select(&columns).map_err(|e| args.table_error(e))
}

pub(crate) fn filter_rows(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::FilterRows, params)?;
    let column = args.text("column")?;
    let op = args.operator("operator")?;
    let value = args.scalar("value")?;
    let column = args.require(table, column)?;
    let mask = comparison_mask(&args, column, op, &value)?;
    let keep: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter_map(|(idx, hit)| hit.then_some(idx))
        .collect();
    Ok(table.take_rows(&keep))
}

pub(crate) fn sort_values(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::SortValues, params)?;
    let column = args.text("column")?;
    let ascending = args.flag("ascending")?;
    let cells = args.require(table, column)?.cells();

    let mut order: Vec<usize> = (0..cells.len()).collect();
    order.sort_by(|&a, &b| match (&cells[a], &cells[b]) {
        (Cell::Null, Cell::Null) => Ordering::Equal,
        (Cell::Null, _) => Ordering::Greater,
        (_, Cell::Null) => Ordering::Less,
        (x, y) => {
            let ord = compare_cells(x, y).ok().flatten().unwrap_or(Ordering::Equal);
            if ascending { ord } else { ord.reverse() }
        }
    });
    Ok(table.take_rows(&order))
}

pub(crate) fn rename_column(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::RenameColumn, params)?;
    let old = args.text("old_name")?;
    let new = args.text("new_name")?;
    args.require(table, old)?;
    table.rename(old, new).map_err(|e| args.table_error(e))
}

pub(crate) fn drop_na(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::DropNa, params)?;
    let subset = args.texts("subset")?;
    let mut columns = Vec::with_capacity(subset.len());
    for name in &subset {
        columns.push(args.require(table, name)?);
    }
    let keep: Vec<usize> = (0..table.row_count())
        .filter(|&row| columns.iter().all(|c| !c.cells()[row].is_null()))
        .collect();
    Ok(table.take_rows(&keep))
}

pub(crate) fn fill_na(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::FillNa, params)?;
    let names = args.texts("columns")?;
    let value = args.scalar("value")?;
    args.require_all(table, &names)?;
    if value.is_null() {
        return Ok(table.clone());
    }

    let mut out = table.clone();
    for name in names {
        let column = args.require(table, name)?;
        if column.null_count() == 0 {
            continue;
        }
        let fill = match (column.dtype(), &value) {
            (DType::Float, Cell::Int(i)) => Cell::Float(*i as f64),
            (DType::Float, Cell::Float(_)) | (DType::Str, Cell::Str(_)) | (DType::Bool, Cell::Bool(_)) => {
                value.clone()
            }
            (dtype, other) => {
                return Err(args.conversion(format!(
                    "cannot fill column '{name}' of dtype {} with a {} value",
                    dtype.pandas_name(),
                    other.kind()
                )));
            }
        };
        let cells = column
            .cells()
            .iter()
            .map(|c| if c.is_null() { fill.clone() } else { c.clone() })
            .collect();
        let filled = Column::new(name, column.dtype(), cells).map_err(|e| args.table_error(e))?;
        out = out.with_column(filled).map_err(|e| args.table_error(e))?;
    }
    Ok(out)
}

pub(crate) fn astype(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::AsType, params)?;
    let name = args.text("column")?;
    let target = args.cast_type("dtype")?;
    let column = args.require(table, name)?;

    let cells = column
        .cells()
        .iter()
        .map(|cell| cast_cell(cell, target).map_err(|m| args.conversion(format!("column '{name}': {m}"))))
        .collect::<Result<Vec<_>, _>>()?;
    let cast = Column::new(name, target.dtype(), cells).map_err(|e| args.table_error(e))?;
    table.with_column(cast).map_err(|e| args.table_error(e))
}

fn cast_cell(cell: &Cell, target: CastType) -> Result<Cell, String> {
    Ok(match (target, cell) {
        (CastType::Int, Cell::Null) => return Err("cannot convert NaN to int".to_string()),
        (CastType::Int, Cell::Int(i)) => Cell::Int(*i),
        (CastType::Int, Cell::Bool(b)) => Cell::Int(i64::from(*b)),
        (CastType::Int, Cell::Float(f)) => Cell::Int(float_to_int(*f)?),
        (CastType::Int, Cell::Str(s)) => Cell::Int(
            s.trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid literal for int(): {s:?}"))?,
        ),
        (CastType::Float, Cell::Null) => Cell::Null,
        (CastType::Float, Cell::Str(s)) => Cell::float(
            s.trim()
                .parse::<f64>()
                .map_err(|_| format!("could not convert string to float: {s:?}"))?,
        ),
        (CastType::Float, other) => other.as_f64().map_or(Cell::Null, Cell::float),
        (CastType::Str, other) => Cell::Str(other.python_str()),
        (CastType::Bool, Cell::Null) => Cell::Bool(true),
        (CastType::Bool, Cell::Str(s)) => Cell::Bool(!s.is_empty()),
        (CastType::Bool, other) => Cell::Bool(other.as_f64().is_some_and(|f| f != 0.0)),
    })
}

fn float_to_int(value: f64) -> Result<i64, String> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if !value.is_finite() {
        return Err(format!("cannot convert {value} to int"));
    }
    let truncated = value.trunc();
    if truncated >= LIMIT || truncated < -LIMIT {
        return Err(format!("{value} is out of int64 range"));
    }
    Ok(truncated as i64)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Int(i64),
    Float(u64),
    Bool(bool),
    Str(String),
}

impl KeyPart {
    fn of(cell: &Cell) -> Option<Self> {
        match cell {
            Cell::Null => None,
            Cell::Int(i) => Some(Self::Int(*i)),
            Cell::Float(f) => Some(Self::Float(if *f == 0.0 { 0.0f64.to_bits() } else { f.to_bits() })),
            Cell::Bool(b) => Some(Self::Bool(*b)),
            Cell::Str(s) => Some(Self::Str(s.clone())),
        }
    }
}

pub(crate) fn groupby_agg(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::GroupByAgg, params)?;
    let keys = args.texts("group_by")?;
    let aggregations = args.aggregations("aggregations")?;

    let mut key_columns = Vec::with_capacity(keys.len());
    for name in &keys {
        key_columns.push(args.require(table, name)?);
    }
    let mut value_columns = Vec::with_capacity(aggregations.len());
    for (name, reducer) in &aggregations {
        if keys.contains(name) {
            return Err(args.invalid("aggregations", format!("'{name}' is also a group key")));
        }
        value_columns.push((args.require(table, name)?, *reducer));
    }

    let mut index: HashMap<Vec<KeyPart>, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    'rows: for row in 0..table.row_count() {
        let mut key = Vec::with_capacity(key_columns.len());
        for column in &key_columns {
            match KeyPart::of(&column.cells()[row]) {
                Some(part) => key.push(part),
                None => continue 'rows,
            }
        }
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }

    let mut columns = Vec::with_capacity(key_columns.len() + value_columns.len());
    for column in &key_columns {
        let cells = groups.iter().map(|rows| column.cells()[rows[0]].clone()).collect();
        columns.push(Column::new(column.name(), column.dtype(), cells).map_err(|e| args.table_error(e))?);
    }
    for (column, reducer) in value_columns {
        columns.push(aggregate(&args, column, reducer, &groups)?);
    }
    Table::new(columns).map_err(|e| args.table_error(e))
}

fn aggregate(args: &Args<'_>, column: &Column, reducer: Reducer, groups: &[Vec<usize>]) -> Result<Column, ActionError> {
    let name = column.name();
    let dtype = column.dtype();
    let present = |rows: &Vec<usize>| non_null(column, rows);
    let not_numeric = || {
        args.conversion(format!(
            "cannot {} column '{name}' of dtype {}",
            reducer.name(),
            dtype.pandas_name()
        ))
    };

    let (out_dtype, cells): (DType, Vec<Cell>) = match reducer {
        Reducer::Count => (
            DType::Int,
            groups.iter().map(|rows| Cell::Int(present(rows).len() as i64)).collect(),
        ),
        Reducer::Sum => match dtype {
            DType::Int | DType::Bool => (
                DType::Int,
                groups
                    .iter()
                    .map(|rows| {
                        Cell::Int(present(rows).iter().fold(0i64, |acc, c| match c {
                            Cell::Int(i) => acc.wrapping_add(*i),
                            Cell::Bool(b) => acc.wrapping_add(i64::from(*b)),
                            _ => acc,
                        }))
                    })
                    .collect(),
            ),
            DType::Float => (
                DType::Float,
                groups
                    .iter()
                    .map(|rows| Cell::float(compensated_sum(present(rows).iter().filter_map(|c| c.as_f64()))))
                    .collect(),
            ),
            DType::Str => return Err(not_numeric()),
        },
        Reducer::Mean => {
            if dtype == DType::Str {
                return Err(not_numeric());
            }
            (
                DType::Float,
                groups
                    .iter()
                    .map(|rows| {
                        let values = present(rows);
                        if values.is_empty() {
                            return Cell::Null;
                        }
                        let sum = compensated_sum(values.iter().filter_map(|c| c.as_f64()));
                        Cell::float(sum / values.len() as f64)
                    })
                    .collect(),
            )
        }
        Reducer::Min | Reducer::Max => {
            let wanted = if reducer == Reducer::Min { Ordering::Less } else { Ordering::Greater };
            (
                dtype,
                groups
                    .iter()
                    .map(|rows| {
                        present(rows)
                            .into_iter()
                            .reduce(|best, c| match compare_cells(c, best) {
                                Ok(Some(ord)) if ord == wanted => c,
                                _ => best,
                            })
                            .cloned()
                            .unwrap_or(Cell::Null)
                    })
                    .collect(),
            )
        }
        Reducer::First => (
            dtype,
            groups
                .iter()
                .map(|rows| present(rows).first().map_or(Cell::Null, |c| (*c).clone()))
                .collect(),
        ),
        Reducer::Last => (
            dtype,
            groups
                .iter()
                .map(|rows| present(rows).last().map_or(Cell::Null, |c| (*c).clone()))
                .collect(),
        ),
    };
    Column::new(name, out_dtype, cells).map_err(|e| args.table_error(e))
}

fn non_null<'c>(column: &'c Column, rows: &[usize]) -> Vec<&'c Cell> {
    rows.iter()
        .map(|&r| &column.cells()[r])
        .filter(|c| !c.is_null())
        .collect()
}

/// Kahan summation; the compensation resets once it turns NaN so that
/// infinities propagate instead of poisoning every later term.
fn compensated_sum(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut compensation = 0.0;
    for value in values {
        let y = value - compensation;
        let t = sum + y;
        compensation = (t - sum) - y;
        if compensation.is_nan() {
            compensation = 0.0;
        }
        sum = t;
    }
    sum
}

pub(crate) fn math_transform(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::MathTransform, params)?;
    let target = args.text("target_col")?;
    let function = args.function("function")?;
    let new_name = args.text("new_col_name")?;
    let column = args.require(table, target)?;
    if !column.dtype().is_numeric() {
        return Err(args.conversion(format!(
            "np.{} needs a numeric column, '{target}' is {}",
            function.name(),
            column.dtype().pandas_name()
        )));
    }

    let float = |f: fn(f64) -> f64| -> Vec<Cell> {
        column
            .cells()
            .iter()
            .map(|c| c.as_f64().map_or(Cell::Null, |v| Cell::float(f(v))))
            .collect()
    };
    let (dtype, cells) = match (function, column.dtype()) {
        (MathFunction::Log, _) => (DType::Float, float(f64::ln)),
        (MathFunction::Sqrt, _) => (DType::Float, float(f64::sqrt)),
        (MathFunction::Ceil, _) => (DType::Float, float(f64::ceil)),
        (MathFunction::Round | MathFunction::Abs, DType::Int) => {
            let cells = column
                .cells()
                .iter()
                .map(|c| match (function, c) {
                    (MathFunction::Abs, Cell::Int(i)) => Cell::Int(i.wrapping_abs()),
                    _ => c.clone(),
                })
                .collect();
            (DType::Int, cells)
        }
        (MathFunction::Abs, DType::Bool) => (DType::Bool, column.cells().to_vec()),
        (MathFunction::Round, _) => (DType::Float, float(f64::round_ties_even)),
        (MathFunction::Abs, _) => (DType::Float, float(f64::abs)),
    };
    let derived = Column::new(new_name, dtype, cells).map_err(|e| args.table_error(e))?;
    table.with_column(derived).map_err(|e| args.table_error(e))
}

pub(crate) fn conditional(table: &Table, params: &Params) -> Result<Table, ActionError> {
    let args = Args::new(ActionKind::Conditional, params)?;
    let column = args.text("column")?;
    let op = args.operator("operator")?;
    let value = args.scalar("value")?;
    let when_true = args.scalar("true_val")?;
    let when_false = args.scalar("false_val")?;
    let new_col = args.text("new_col")?;
    let column = args.require(table, column)?;

    let dtype = branch_dtype(&when_true, &when_false).ok_or_else(|| {
        args.invalid(
            "false_val",
            format!(
                "true_val is {} but false_val is {}",
                when_true.kind(),
                when_false.kind()
            ),
        )
    })?;
    let mask = comparison_mask(&args, column, op, &value)?;
    let cells = mask
        .into_iter()
        .map(|hit| if hit { when_true.clone() } else { when_false.clone() })
        .collect();
    let derived = Column::new(new_col, dtype, cells).map_err(|e| args.table_error(e))?;
    table.with_column(derived).map_err(|e| args.table_error(e))
}

fn branch_dtype(a: &Cell, b: &Cell) -> Option<DType> {
    match (a, b) {
        (Cell::Int(_), Cell::Int(_)) => Some(DType::Int),
        (Cell::Int(_) | Cell::Float(_) | Cell::Null, Cell::Int(_) | Cell::Float(_) | Cell::Null) => {
            Some(DType::Float)
        }
        (Cell::Bool(_), Cell::Bool(_)) => Some(DType::Bool),
        (Cell::Str(_), Cell::Str(_)) => Some(DType::Str),
        _ => None,
    }
}

/// Elementwise `column <op> value`, refusing orderings between a column and
/// a literal of incompatible kinds before any cell is read.
fn comparison_mask(args: &Args<'_>, column: &Column, op: CompareOp, value: &Cell) -> Result<Vec<bool>, ActionError> {
    if op.is_ordering() && !value.is_null() {
        let compatible = match column.dtype() {
            DType::Int | DType::Float | DType::Bool => {
                matches!(value, Cell::Int(_) | Cell::Float(_) | Cell::Bool(_))
            }
            DType::Str => matches!(value, Cell::Str(_)),
        };
        if !compatible {
            return Err(args.conversion(format!(
                "'{}' not supported between column '{}' of dtype {} and a {} value",
                op.symbol(),
                column.name(),
                column.dtype().pandas_name(),
                value.kind()
            )));
        }
    }
    column
        .cells()
        .iter()
        .map(|cell| {
            evaluate(op, cell, value).map_err(|m| {
                args.conversion(format!(
                    "'{}' not supported between {} and {} in column '{}'",
                    op.symbol(),
                    m.left,
                    m.right,
                    column.name()
                ))
            })
        })
        .collect()
}

//! Transformation engine: sequential, all-or-nothing application of action
//! specs to a table.

use crate::{
    op::ActionSpec,
    registry::{ActionError, ActionRegistry},
    table::Table,
};

/// Applies every operation of `spec` in order, feeding each result into the
/// next. On error nothing partial escapes; the caller keeps its input.
pub fn apply(registry: &ActionRegistry, table: &Table, spec: &ActionSpec) -> Result<Table, ActionError> {
    let mut current = table.clone();
    for op in &spec.operations {
        current = registry.execute(&current, &op.name, &op.parameters)?;
    }
    Ok(current)
}

/// Rebuilds a table from `base` by applying `history` front to back.
pub fn replay<'a, I>(registry: &ActionRegistry, base: &Table, history: I) -> Result<Table, ActionError>
where
    I: IntoIterator<Item = &'a ActionSpec>,
{
    let mut current = base.clone();
    for spec in history {
        current = apply(registry, &current, spec)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        op::{Operation, Value},
        registry::registry,
        table::{Cell, Column},
    };

    fn base() -> Table {
        Table::new(vec![
            Column::ints("A", [1, 2, 3, 4, 5]),
            Column::ints("B", [10, 20, 30, 40, 50]),
        ])
        .expect("table")
    }

    #[test]
    fn operations_compose_in_order() {
        let spec = ActionSpec {
            intent: "rename then filter".into(),
            operations: vec![
                Operation::new("rename_column")
                    .with("old_name", "A")
                    .with("new_name", "a"),
                Operation::new("filter_rows")
                    .with("column", "a")
                    .with("operator", ">=")
                    .with("value", 4),
            ],
        };
        let out = apply(registry(), &base(), &spec).expect("apply");
        assert_eq!(out.column_names(), vec!["a", "B"]);
        assert_eq!(out.require("a").expect("a").cells(), &[Cell::Int(4), Cell::Int(5)]);
    }

    #[test]
    fn a_late_failure_returns_the_error_not_a_partial_table() {
        let spec = ActionSpec {
            intent: "drop then use".into(),
            operations: vec![
                Operation::new("drop_column").with("column", "B"),
                Operation::new("filter_rows")
                    .with("column", "B")
                    .with("operator", ">")
                    .with("value", Value::Int(1)),
            ],
        };
        let input = base();
        let err = apply(registry(), &input, &spec).expect_err("B is gone");
        assert_eq!(
            err,
            ActionError::ColumnNotFound {
                action: "filter_rows",
                column: "B".into(),
            }
        );
        assert_eq!(input, base());
    }

    #[test]
    fn empty_spec_is_identity() {
        let out = apply(registry(), &base(), &ActionSpec::empty("nothing")).expect("apply");
        assert_eq!(out, base());
    }
}

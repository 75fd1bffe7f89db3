//! Typed, validated access to an operation's parameters.

use std::collections::BTreeSet;

use crate::{
    op::{Params, Value},
    table::{Cell, Column, Table, TableError},
    types::{CastType, CompareOp, MathFunction, Reducer},
};

use super::{ActionError, ActionKind, ParamSpec};

/// Parameters of one call, checked against the action's declared list.
pub(crate) struct Args<'a> {
    kind: ActionKind,
    params: &'a Params,
}

impl<'a> Args<'a> {
    /// Rejects undeclared parameter names up front.
    pub(crate) fn new(kind: ActionKind, params: &'a Params) -> Result<Self, ActionError> {
        if let Some(key) = params.keys().find(|k| kind.param(k).is_none()) {
            return Err(ActionError::InvalidParameter {
                action: kind.name(),
                parameter: key.clone(),
                reason: "not a parameter of this action".to_string(),
            });
        }
        Ok(Self { kind, params })
    }

    pub(crate) fn action(&self) -> &'static str {
        self.kind.name()
    }

    fn spec(&self, name: &'static str) -> Result<&'static ParamSpec, ActionError> {
        self.kind.param(name).ok_or_else(|| ActionError::InvalidParameter {
            action: self.action(),
            parameter: name.to_string(),
            reason: "not declared".to_string(),
        })
    }

    fn raw(&self, name: &'static str) -> Result<&'a Value, ActionError> {
        self.params.get(name).ok_or(ActionError::MissingParameter {
            action: self.kind.name(),
            parameter: name,
        })
    }

    pub(crate) fn invalid(&self, name: &str, reason: impl Into<String>) -> ActionError {
        ActionError::InvalidParameter {
            action: self.action(),
            parameter: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn text(&self, name: &'static str) -> Result<&'a str, ActionError> {
        let value = self.raw(name)?;
        value
            .as_str()
            .ok_or_else(|| self.invalid(name, format!("expected a string, got {}", value.kind())))
    }

    /// Non-empty list of distinct strings.
    pub(crate) fn texts(&self, name: &'static str) -> Result<Vec<&'a str>, ActionError> {
        let Value::List(items) = self.raw(name)? else {
            return Err(self.invalid(name, "expected a list of strings"));
        };
        if items.is_empty() {
            return Err(self.invalid(name, "must not be empty"));
        }
        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let text = item
                .as_str()
                .ok_or_else(|| self.invalid(name, format!("expected strings, got {}", item.kind())))?;
            if !seen.insert(text) {
                return Err(self.invalid(name, format!("'{text}' listed twice")));
            }
            out.push(text);
        }
        Ok(out)
    }

    pub(crate) fn scalar(&self, name: &'static str) -> Result<Cell, ActionError> {
        let value = self.raw(name)?;
        Cell::from_scalar(value)
            .ok_or_else(|| self.invalid(name, format!("expected a scalar, got {}", value.kind())))
    }

    /// Boolean, falling back to the declared default.
    pub(crate) fn flag(&self, name: &'static str) -> Result<bool, ActionError> {
        match self.params.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(self.invalid(name, format!("expected a bool, got {}", other.kind()))),
            None => match self.spec(name)?.default.map(|d| d.to_value()) {
                Some(Value::Bool(b)) => Ok(b),
                _ => Err(ActionError::MissingParameter {
                    action: self.action(),
                    parameter: name,
                }),
            },
        }
    }

    pub(crate) fn operator(&self, name: &'static str) -> Result<CompareOp, ActionError> {
        let symbol = self.text(name)?;
        CompareOp::parse(symbol).ok_or_else(|| ActionError::UnsupportedOperator {
            action: self.action(),
            operator: symbol.to_string(),
        })
    }

    pub(crate) fn cast_type(&self, name: &'static str) -> Result<CastType, ActionError> {
        let dtype = self.text(name)?;
        CastType::parse(dtype).ok_or_else(|| ActionError::UnsupportedType {
            action: self.action(),
            dtype: dtype.to_string(),
        })
    }

    pub(crate) fn function(&self, name: &'static str) -> Result<MathFunction, ActionError> {
        let function = self.text(name)?;
        MathFunction::parse(function).ok_or_else(|| ActionError::UnsupportedFunction {
            action: self.action(),
            function: function.to_string(),
        })
    }

    /// Column to reducer pairs in the caller's order; reducers are whitelisted.
    pub(crate) fn aggregations(&self, name: &'static str) -> Result<Vec<(&'a str, Reducer)>, ActionError> {
        let Value::Map(map) = self.raw(name)? else {
            return Err(self.invalid(name, "expected a mapping of column to aggregator"));
        };
        if map.is_empty() {
            return Err(self.invalid(name, "must not be empty"));
        }
        map.iter()
            .map(|(column, reducer)| {
                Reducer::parse(reducer)
                    .map(|r| (column.as_str(), r))
                    .ok_or_else(|| ActionError::UnsupportedAggregator {
                        action: self.action(),
                        column: column.clone(),
                        aggregator: reducer.clone(),
                    })
            })
            .collect()
    }

    pub(crate) fn require<'t>(&self, table: &'t Table, column: &str) -> Result<&'t Column, ActionError> {
        table.column(column).ok_or_else(|| ActionError::ColumnNotFound {
            action: self.action(),
            column: column.to_string(),
        })
    }

    pub(crate) fn require_all(&self, table: &Table, columns: &[&str]) -> Result<(), ActionError> {
        for column in columns {
            self.require(table, column)?;
        }
        Ok(())
    }

    pub(crate) fn table_error(&self, err: TableError) -> ActionError {
        let action = self.action();
        match err {
            TableError::ColumnNotFound(column) => ActionError::ColumnNotFound { action, column },
            TableError::DuplicateColumn(column) => ActionError::DuplicateColumn { action, column },
            other => ActionError::Conversion {
                action,
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn conversion(&self, message: impl Into<String>) -> ActionError {
        ActionError::Conversion {
            action: self.action(),
            message: message.into(),
        }
    }
}

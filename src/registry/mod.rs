//! Action registry: the one place mapping an action name to what it computes
//! and how it is written as pandas code.
//!
//! The vocabulary is closed. Every action is an [`ActionKind`] variant, the
//! builtin registry is assembled once and frozen behind [`registry()`], and
//! registering a name twice is an error rather than a silent shadow.

mod args;
/// The closed action vocabulary.
pub mod catalog;
mod executors;
/// Statement templates and parameter policies.
pub mod template;

use std::sync::OnceLock;

use hashbrown::HashMap;
use thiserror::Error;

use crate::{op::Params, table::Table};

pub use catalog::ActionKind;
pub use template::{ParamDefault, ParamKind, ParamSpec, Segment, Template};

/// Validated executor: computes a new table, never mutating its input.
pub type Executor = fn(&Table, &Params) -> Result<Table, ActionError>;

/// Failures raised while validating or executing one operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    /// The operation name is not registered.
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    /// A referenced column does not exist.
    #[error("{action}: column '{column}' not found")]
    ColumnNotFound {
        /// Failing action.
        action: &'static str,
        /// Missing column.
        column: String,
    },
    /// The result would contain the same column twice.
    #[error("{action}: column '{column}' already exists")]
    DuplicateColumn {
        /// Failing action.
        action: &'static str,
        /// Clashing column.
        column: String,
    },
    /// Comparison operator outside the whitelist.
    #[error("{action}: unsupported operator '{operator}'")]
    UnsupportedOperator {
        /// Failing action.
        action: &'static str,
        /// Rejected operator.
        operator: String,
    },
    /// Math function outside the whitelist.
    #[error("{action}: unsupported function '{function}'")]
    UnsupportedFunction {
        /// Failing action.
        action: &'static str,
        /// Rejected function.
        function: String,
    },
    /// Cast target outside the whitelist.
    #[error("{action}: unsupported type '{dtype}'")]
    UnsupportedType {
        /// Failing action.
        action: &'static str,
        /// Rejected type name.
        dtype: String,
    },
    /// Reducer outside the whitelist.
    #[error("{action}: unsupported aggregator '{aggregator}' for column '{column}'")]
    UnsupportedAggregator {
        /// Failing action.
        action: &'static str,
        /// Aggregated column.
        column: String,
        /// Rejected reducer.
        aggregator: String,
    },
    /// A required parameter is absent.
    #[error("{action}: missing parameter '{parameter}'")]
    MissingParameter {
        /// Failing action.
        action: &'static str,
        /// Missing parameter.
        parameter: &'static str,
    },
    /// A parameter has the wrong shape or is not declared.
    #[error("{action}: invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Failing action.
        action: &'static str,
        /// Offending parameter.
        parameter: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Data-level failure such as unparsable text cast to int.
    #[error("{action}: conversion failed: {message}")]
    Conversion {
        /// Failing action.
        action: &'static str,
        /// Underlying cause.
        message: String,
    },
}

/// Failures raised while assembling a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name is already taken.
    #[error("action '{0}' is already registered")]
    AlreadyRegistered(&'static str),
    /// A template slot names no declared parameter.
    #[error("template of '{action}' uses undeclared slot '{slot}'")]
    Template {
        /// Action whose template is malformed.
        action: &'static str,
        /// Undeclared slot.
        slot: &'static str,
    },
}

/// Executor, template and parameters of one action.
#[derive(Debug, Clone, Copy)]
pub struct ActionDefinition {
    kind: ActionKind,
    template: Template,
    params: &'static [ParamSpec],
    executor: Executor,
}

impl ActionDefinition {
    /// Definition of a builtin action.
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            template: kind.template(),
            params: kind.params(),
            executor: kind.executor(),
        }
    }

    /// The same action rendered through `template`. Slots are checked when
    /// the definition is registered.
    pub fn with_template(mut self, template: Template) -> Self {
        self.template = template;
        self
    }

    /// Action kind.
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Registered name.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Statement template.
    pub fn template(&self) -> Template {
        self.template
    }

    /// Declared parameters.
    pub fn params(&self) -> &'static [ParamSpec] {
        self.params
    }

    /// Validated executor.
    pub fn executor(&self) -> Executor {
        self.executor
    }

    /// Declared parameter `name`.
    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    fn check(&self) -> Result<(), RegistryError> {
        for slot in self.template.slots() {
            if self.param(slot).is_none() {
                return Err(RegistryError::Template {
                    action: self.name(),
                    slot,
                });
            }
        }
        Ok(())
    }
}

/// Name to definition map. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    definitions: HashMap<&'static str, ActionDefinition>,
}

impl ActionRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding every builtin action.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for kind in ActionKind::ALL {
            let def = ActionDefinition::new(kind);
            registry.definitions.insert(def.name(), def);
        }
        registry
    }

    /// Adds a definition. Fails if the name is taken or the template is malformed.
    pub fn register(&mut self, def: ActionDefinition) -> Result<(), RegistryError> {
        if self.definitions.contains_key(def.name()) {
            return Err(RegistryError::AlreadyRegistered(def.name()));
        }
        def.check()?;
        self.definitions.insert(def.name(), def);
        Ok(())
    }

    /// Looks up a definition.
    pub fn get(&self, name: &str) -> Result<&ActionDefinition, ActionError> {
        self.definitions
            .get(name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))
    }

    /// Looks up an executor.
    pub fn get_executor(&self, name: &str) -> Result<Executor, ActionError> {
        self.get(name).map(ActionDefinition::executor)
    }

    /// Looks up a template.
    pub fn get_template(&self, name: &str) -> Result<Template, ActionError> {
        self.get(name).map(ActionDefinition::template)
    }

    /// Runs the named action. Executor errors pass through unchanged.
    pub fn execute(&self, table: &Table, name: &str, params: &Params) -> Result<Table, ActionError> {
        let executor = self.get_executor(name)?;
        executor(table, params)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.definitions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Process-wide builtin registry, built on first use.
pub fn registry() -> &'static ActionRegistry {
    static REGISTRY: OnceLock<ActionRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ActionRegistry::builtin)
}

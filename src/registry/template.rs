//! Code templates and per-parameter rendering policy.
//!
//! A template is a fixed sequence of code fragments and named slots. Slots
//! are filled after the template is fixed, so nothing in a parameter value
//! is ever interpreted as template syntax, and no code fragment wraps a slot
//! in quotes of its own.

use std::fmt;

use crate::op::Value;

/// One piece of a [`Template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Code emitted verbatim.
    Code(&'static str),
    /// Parameter slot, filled by name.
    Slot(&'static str),
}

/// A statement template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    segments: &'static [Segment],
}

impl Template {
    /// Wraps a static segment list.
    pub const fn new(segments: &'static [Segment]) -> Self {
        Self { segments }
    }

    /// Segments in order.
    pub fn segments(&self) -> &'static [Segment] {
        self.segments
    }

    /// Slot names in order of appearance; a name may repeat.
    pub fn slots(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(name) => Some(*name),
            Segment::Code(_) => None,
        })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in self.segments {
            match segment {
                Segment::Code(code) => f.write_str(code)?,
                Segment::Slot(name) => write!(f, "{{{name}}}")?,
            }
        }
        Ok(())
    }
}

/// How a parameter is validated and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A column name, rendered as a string literal.
    Column,
    /// A non-empty list of distinct column names, rendered as a list literal.
    Columns,
    /// A string, integer, float or boolean literal.
    Scalar,
    /// A boolean literal.
    Flag,
    /// A comparison operator symbol, injected as a raw token.
    Operator,
    /// A cast target type, injected as a raw token.
    CastType,
    /// A numpy function name, injected as a raw token.
    Function,
    /// Column to reducer mapping, rendered as a dict literal.
    Aggregations,
}

impl ParamKind {
    /// True when the value is injected verbatim after whitelist validation
    /// instead of being rendered as a literal.
    pub fn is_raw_token(self) -> bool {
        matches!(self, Self::Operator | Self::CastType | Self::Function)
    }
}

/// Value used when an optional parameter is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDefault {
    /// Boolean default.
    Flag(bool),
}

impl ParamDefault {
    /// The default as a parameter value.
    pub fn to_value(self) -> Value {
        match self {
            Self::Flag(b) => Value::Bool(b),
        }
    }
}

/// Declared parameter of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: &'static str,
    /// Validation and rendering policy.
    pub kind: ParamKind,
    /// Default when omitted; `None` means required.
    pub default: Option<ParamDefault>,
}

impl ParamSpec {
    pub(crate) const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            default: None,
        }
    }

    pub(crate) const fn optional(name: &'static str, kind: ParamKind, default: ParamDefault) -> Self {
        Self {
            name,
            kind,
            default: Some(default),
        }
    }
}

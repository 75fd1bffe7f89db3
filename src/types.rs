//! Shared identifiers and the closed whitelists every action draws from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Column data type, mirroring the pandas dtypes the generated code produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 64-bit integers; never holds nulls.
    Int,
    /// 64-bit floats; nulls are NaN.
    Float,
    /// Booleans.
    Bool,
    /// Text (pandas `object`); nulls are NaN.
    Str,
}

impl DType {
    /// Name as pandas reports it.
    pub fn pandas_name(self) -> &'static str {
        match self {
            Self::Int => "int64",
            Self::Float => "float64",
            Self::Bool => "bool",
            Self::Str => "object",
        }
    }

    /// True for int and float columns.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

/// Comparison operators accepted by `filter_rows` and `conditional`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
}

impl CompareOp {
    /// Every supported operator.
    pub const ALL: [Self; 6] = [Self::Eq, Self::Ne, Self::Gt, Self::Lt, Self::Ge, Self::Le];

    /// Parses an operator symbol. Anything outside the whitelist is `None`.
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    /// Canonical symbol, identical in the engine and in generated code.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    /// True for the operators that need an ordering rather than equality.
    pub fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }
}

/// Target types for `astype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastType {
    /// Python `int`.
    Int,
    /// Python `float`.
    Float,
    /// Python `str`.
    Str,
    /// Python `bool`.
    Bool,
}

impl CastType {
    /// Parses a type name, accepting the `integer`, `string` and `boolean` aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "int" | "integer" => Some(Self::Int),
            "float" => Some(Self::Float),
            "str" | "string" => Some(Self::Str),
            "bool" | "boolean" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Canonical Python builtin name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bool => "bool",
        }
    }

    /// Column dtype produced by the cast.
    pub fn dtype(self) -> DType {
        match self {
            Self::Int => DType::Int,
            Self::Float => DType::Float,
            Self::Str => DType::Str,
            Self::Bool => DType::Bool,
        }
    }
}

/// Elementwise numpy functions for `math_transform`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFunction {
    /// Natural logarithm.
    Log,
    /// Square root.
    Sqrt,
    /// Ceiling.
    Ceil,
    /// Round half to even.
    Round,
    /// Absolute value.
    Abs,
}

impl MathFunction {
    /// Parses a function name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "log" => Some(Self::Log),
            "sqrt" => Some(Self::Sqrt),
            "ceil" => Some(Self::Ceil),
            "round" => Some(Self::Round),
            "abs" => Some(Self::Abs),
            _ => None,
        }
    }

    /// numpy attribute name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Sqrt => "sqrt",
            Self::Ceil => "ceil",
            Self::Round => "round",
            Self::Abs => "abs",
        }
    }
}

/// Group reducers for `groupby_agg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reducer {
    /// Sum of non-null values.
    Sum,
    /// Mean of non-null values.
    Mean,
    /// Count of non-null values.
    Count,
    /// Minimum non-null value.
    Min,
    /// Maximum non-null value.
    Max,
    /// First non-null value.
    First,
    /// Last non-null value.
    Last,
}

impl Reducer {
    /// Parses a reducer name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Self::Sum),
            "mean" => Some(Self::Mean),
            "count" => Some(Self::Count),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "first" => Some(Self::First),
            "last" => Some(Self::Last),
            _ => None,
        }
    }

    /// pandas aggregation name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
        }
    }
}

/// Dataset formats the loader and the generated load statement understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// Comma separated values.
    Csv,
    /// JSON records or columns.
    Json,
    /// Legacy Excel workbook.
    Xls,
    /// Excel workbook.
    Xlsx,
}

impl SourceFormat {
    /// Parses a format tag, case-insensitively.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "xls" => Some(Self::Xls),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// pandas reader function for this format.
    pub fn pandas_reader(self) -> &'static str {
        match self {
            Self::Csv => "read_csv",
            Self::Json => "read_json",
            Self::Xls | Self::Xlsx => "read_excel",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelists_are_closed() {
        for op in CompareOp::ALL {
            assert_eq!(CompareOp::parse(op.symbol()), Some(op));
        }
        for rejected in ["=", "===", "<>", "in", "is", "~", ""] {
            assert_eq!(CompareOp::parse(rejected), None, "{rejected}");
        }
        assert_eq!(CastType::parse("integer"), Some(CastType::Int));
        assert_eq!(CastType::parse("string"), Some(CastType::Str));
        assert_eq!(CastType::parse("boolean"), Some(CastType::Bool));
        assert_eq!(CastType::parse("int64"), None);
        assert_eq!(CastType::parse("object"), None);
        assert_eq!(MathFunction::parse("exp"), None);
        assert_eq!(Reducer::parse("median"), None);
        assert_eq!(Reducer::parse("Mean"), None);
    }

    #[test]
    fn session_id_round_trips_through_text() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().expect("parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn source_format_tags() {
        assert_eq!(SourceFormat::parse("CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::parse("xlsx"), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::parse("parquet"), None);
        assert_eq!(SourceFormat::Xls.pandas_reader(), "read_excel");
    }
}

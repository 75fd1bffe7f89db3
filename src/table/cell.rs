//! Scalar cell values and the comparison rules shared by every action.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{op::Value, types::CompareOp};

/// A single table value.
///
/// Float cells are never NaN: a missing float is [`Cell::Null`], which is how
/// pandas treats NaN as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// Missing value.
    Null,
    /// Integer.
    Int(i64),
    /// Finite or infinite float.
    Float(#[serde(with = "float_repr")] f64),
    /// Boolean.
    Bool(bool),
    /// Text.
    Str(String),
}

/// Two cells of kinds that have no ordering between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindMismatch {
    /// Kind of the left-hand cell.
    pub left: &'static str,
    /// Kind of the right-hand cell.
    pub right: &'static str,
}

impl Cell {
    /// Builds a float cell, mapping NaN to [`Cell::Null`].
    pub fn float(value: f64) -> Self {
        if value.is_nan() {
            Self::Null
        } else {
            Self::Float(value)
        }
    }

    /// Converts a scalar parameter into a cell. Lists and mappings have no cell form.
    pub fn from_scalar(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Int(i) => Some(Self::Int(*i)),
            Value::Float(f) => Some(Self::float(*f)),
            Value::Str(s) => Some(Self::Str(s.clone())),
            Value::List(_) | Value::Map(_) => None,
        }
    }

    /// True for [`Cell::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Str(_) => "str",
        }
    }

    /// Numeric view; booleans count as 0 and 1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Null | Self::Str(_) => None,
        }
    }

    /// Text produced by Python's `str()` for the equivalent pandas value.
    pub fn python_str(&self) -> String {
        match self {
            Self::Null => "nan".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => python_float_repr(*f),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Str(s) => s.clone(),
        }
    }

    /// JSON form used by previews; non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Str(s) => serde_json::Value::String(s.clone()),
        }
    }

    fn is_numeric_like(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_) | Self::Bool(_))
    }
}

/// Orders two cells. `Ok(None)` when either side is null.
pub fn compare_cells(left: &Cell, right: &Cell) -> Result<Option<Ordering>, KindMismatch> {
    match (left, right) {
        (Cell::Null, _) | (_, Cell::Null) => Ok(None),
        (Cell::Int(a), Cell::Int(b)) => Ok(Some(a.cmp(b))),
        (Cell::Bool(a), Cell::Bool(b)) => Ok(Some(a.cmp(b))),
        (Cell::Str(a), Cell::Str(b)) => Ok(Some(a.cmp(b))),
        (a, b) if a.is_numeric_like() && b.is_numeric_like() => {
            let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
                return Ok(None);
            };
            Ok(x.partial_cmp(&y))
        }
        (a, b) => Err(KindMismatch {
            left: a.kind(),
            right: b.kind(),
        }),
    }
}

/// Evaluates `cell <op> rhs` the way a pandas column comparison does.
///
/// Nulls compare false except under `!=`. Kinds without an ordering are
/// unequal, and an ordering operator between them is an error.
pub fn evaluate(op: CompareOp, cell: &Cell, rhs: &Cell) -> Result<bool, KindMismatch> {
    match compare_cells(cell, rhs) {
        Ok(None) => Ok(op == CompareOp::Ne),
        Ok(Some(ord)) => Ok(match op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Ge => ord != Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
        }),
        Err(mismatch) if op.is_ordering() => Err(mismatch),
        Err(_) => Ok(op == CompareOp::Ne),
    }
}

/// Python's `repr()` of a float: shortest round-trip digits, positional
/// between `1e-4` and `1e16`, scientific with a signed two-digit exponent
/// outside that range.
pub fn python_float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{value:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return sci;
    };
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();

    let mut out = String::with_capacity(digits.len() + 8);
    if negative {
        out.push('-');
    }

    if (-4..16).contains(&exp) {
        let point = exp + 1;
        if point <= 0 {
            out.push_str("0.");
            out.extend(std::iter::repeat_n('0', point.unsigned_abs() as usize));
            out.push_str(&digits);
        } else {
            let point = point as usize;
            if point >= digits.len() {
                out.push_str(&digits);
                out.extend(std::iter::repeat_n('0', point - digits.len()));
                out.push_str(".0");
            } else {
                out.push_str(&digits[..point]);
                out.push('.');
                out.push_str(&digits[point..]);
            }
        }
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exp < 0 { '-' } else { '+' });
        out.push_str(&format!("{:02}", exp.unsigned_abs()));
    }
    out
}

mod float_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&super::python_float_repr(*value))
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Text(String),
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Num(v) => Ok(v),
            Repr::Text(text) => match text.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!("invalid float {other:?}"))),
            },
        }
    }
}

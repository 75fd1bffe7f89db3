//! Python literal rendering.
//!
//! This is the only place generated code gets quoted or escaped. Every
//! literal slot of every template goes through [`render_literal`], and the
//! output of [`render_str`] always parses back, under Python's own string
//! grammar, to exactly its input.

use std::fmt::Write as _;

use crate::{op::Value, table::cell::python_float_repr};

/// Renders a parameter value as a Python literal of the same runtime type.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => render_float(*f),
        Value::Str(s) => render_str(s),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(render_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Map(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", render_str(k), render_str(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// Float literal; non-finite values go through `float()`.
pub fn render_float(value: f64) -> String {
    if value.is_nan() {
        "float('nan')".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "float('inf')" } else { "-float('inf')" }.to_string()
    } else {
        python_float_repr(value)
    }
}

/// Single-quoted Python string literal.
pub fn render_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if needs_escape(c) => {
                let code = u32::from(c);
                let _ = if code <= 0xff {
                    write!(out, "\\x{code:02x}")
                } else if code <= 0xffff {
                    write!(out, "\\u{code:04x}")
                } else {
                    write!(out, "\\U{code:08x}")
                };
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn needs_escape(c: char) -> bool {
    c.is_control() || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}')
}

/// Flattens text for a `#` comment or a markdown line: anything that could
/// end the line becomes a space.
pub fn render_comment(text: &str) -> String {
    text.chars()
        .map(|c| if needs_escape(c) { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_render_as_python() {
        assert_eq!(render_literal(&Value::Bool(true)), "True");
        assert_eq!(render_literal(&Value::Int(-18)), "-18");
        assert_eq!(render_literal(&Value::Float(2.0)), "2.0");
        assert_eq!(render_literal(&Value::Float(1e-7)), "1e-07");
        assert_eq!(render_literal(&Value::Float(f64::NAN)), "float('nan')");
        assert_eq!(render_literal(&Value::Float(f64::NEG_INFINITY)), "-float('inf')");
        assert_eq!(render_literal(&Value::from("Alice")), "'Alice'");
    }

    #[test]
    fn strings_escape_everything_that_could_break_out() {
        assert_eq!(render_str(r#"it's a "test" {value}"#), r#"'it\'s a "test" {value}'"#);
        assert_eq!(render_str("a\\b"), r"'a\\b'");
        assert_eq!(render_str("x\ny\r\t"), r"'x\ny\r\t'");
        assert_eq!(render_str("\u{0}\u{7f}\u{85}"), r"'\x00\x7f\x85'");
        assert_eq!(render_str("\u{2028}"), r"'\u2028'");
        assert_eq!(render_str("C:\\data\\ünï.csv"), r"'C:\\data\\ünï.csv'");
    }

    #[test]
    fn collections_render_recursively() {
        assert_eq!(render_literal(&Value::strings(["a", "b'c"])), r"['a', 'b\'c']");
        assert_eq!(
            render_literal(&Value::mapping([("Salary", "mean"), ("Age", "max")])),
            "{'Age': 'max', 'Salary': 'mean'}"
        );
        assert_eq!(
            render_literal(&Value::List(vec![Value::Int(1), Value::Float(0.5)])),
            "[1, 0.5]"
        );
    }

    #[test]
    fn comments_stay_on_one_line() {
        assert_eq!(render_comment("drop\nimport os"), "drop import os");
        assert_eq!(render_comment("a\u{2028}b\rc"), "a b c");
    }
}

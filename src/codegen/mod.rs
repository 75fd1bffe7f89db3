//! Code-faithful generation of pandas scripts and notebooks.
//!
//! Generation only reads templates and parameters; it never looks at a live
//! table. Each operation is rendered slot by slot: raw-token slots are
//! re-checked against their whitelist and written in canonical spelling,
//! every other slot goes through [`literal::render_literal`]. A step that
//! cannot be rendered becomes a visible `#` comment so the rest of the
//! output stays usable.

/// Python literal rendering.
pub mod literal;
/// Notebook document model.
pub mod notebook;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{
    loader::LoadDescriptor,
    op::{ActionSpec, Operation, Value},
    registry::{ActionRegistry, ParamDefault, ParamKind, ParamSpec, Segment, registry},
    types::{CastType, CompareOp, MathFunction, Reducer},
};

use literal::{render_comment, render_literal, render_str};
use notebook::{Notebook, NotebookCell};

const PREAMBLE: [&str; 2] = ["import numpy as np", "import pandas as pd"];
const SHOW_SCRIPT: &str = "print(df.head())";
const SHOW_NOTEBOOK: &str = "df.head()";

/// Failures while rendering one operation or assembling the output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// No template for the operation name.
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    /// A required parameter is absent.
    #[error("missing parameter '{parameter}'")]
    MissingParameter {
        /// Missing parameter.
        parameter: String,
    },
    /// A parameter the template does not declare.
    #[error("unexpected parameter '{parameter}'")]
    UnexpectedParameter {
        /// Offending parameter.
        parameter: String,
    },
    /// A parameter value of the wrong shape.
    #[error("parameter '{parameter}' must be {expected}, got {found}")]
    WrongShape {
        /// Offending parameter.
        parameter: String,
        /// Expected shape.
        expected: &'static str,
        /// Actual kind.
        found: &'static str,
    },
    /// A raw token outside its whitelist.
    #[error("parameter '{parameter}' has unsupported value {value}")]
    Token {
        /// Offending parameter.
        parameter: String,
        /// Rejected value, as a literal.
        value: String,
    },
    /// The notebook document could not be encoded.
    #[error("notebook encoding failed: {0}")]
    Notebook(String),
}

/// Output forms of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// A linear Python script.
    Script,
    /// A Jupyter notebook, one cell per action spec.
    Notebook,
}

impl ExportFormat {
    /// Parses `script`/`py` or `notebook`/`ipynb`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "script" | "py" => Some(Self::Script),
            "notebook" | "ipynb" => Some(Self::Notebook),
            _ => None,
        }
    }

    /// Download filename.
    pub fn filename(self) -> &'static str {
        match self {
            Self::Script => "pandas_script.py",
            Self::Notebook => "pandas_analysis.ipynb",
        }
    }

    /// Media type of the content.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Script => "text/x-python",
            Self::Notebook => "application/x-ipynb+json",
        }
    }
}

/// Generated code plus the fixed filename and media type of its format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Export {
    /// Script text or notebook JSON.
    pub content: String,
    /// Download filename.
    pub filename: &'static str,
    /// Media type.
    pub media_type: &'static str,
}

/// Generates code for `history` against the file `source` describes.
pub fn export(source: &LoadDescriptor, history: &[ActionSpec], format: ExportFormat) -> Result<Export, GenerationError> {
    export_with(registry(), source, history, format)
}

/// Like [`export`], rendering operations through `registry`.
pub fn export_with(
    registry: &ActionRegistry,
    source: &LoadDescriptor,
    history: &[ActionSpec],
    format: ExportFormat,
) -> Result<Export, GenerationError> {
    let content = match format {
        ExportFormat::Script => script_with(registry, source, history),
        ExportFormat::Notebook => serde_json::to_string_pretty(&notebook_with(registry, source, history))
            .map_err(|e| GenerationError::Notebook(e.to_string()))?,
    };
    Ok(Export {
        content,
        filename: format.filename(),
        media_type: format.media_type(),
    })
}

/// Linear script: preamble, load, one commented block per action spec, preview.
pub fn generate_script(source: &LoadDescriptor, history: &[ActionSpec]) -> String {
    script_with(registry(), source, history)
}

fn script_with(registry: &ActionRegistry, source: &LoadDescriptor, history: &[ActionSpec]) -> String {
    let mut lines: Vec<String> = PREAMBLE.iter().map(|s| s.to_string()).collect();
    lines.push(String::new());
    lines.push("# Load dataset".to_string());
    lines.extend(load_statement(source));
    lines.push(String::new());
    lines.push("# Apply transformations".to_string());
    for spec in history {
        lines.push(format!("# {}", render_comment(&spec.intent)));
        lines.extend(render_spec(registry, spec));
    }
    lines.push(String::new());
    lines.push("# Result preview".to_string());
    lines.push(SHOW_SCRIPT.to_string());
    let mut script = lines.join("\n");
    script.push('\n');
    script
}

/// Notebook: a setup cell, then a markdown intent and a code cell per action
/// spec, then a preview cell.
pub fn generate_notebook(source: &LoadDescriptor, history: &[ActionSpec]) -> Notebook {
    notebook_with(registry(), source, history)
}

fn notebook_with(registry: &ActionRegistry, source: &LoadDescriptor, history: &[ActionSpec]) -> Notebook {
    let mut setup: Vec<String> = PREAMBLE.iter().map(|s| s.to_string()).collect();
    setup.push(String::new());
    setup.push("# Load dataset".to_string());
    setup.extend(load_statement(source));

    let mut cells = Vec::with_capacity(history.len() * 2 + 2);
    cells.push(NotebookCell::code(setup.as_slice()));
    for spec in history {
        cells.push(NotebookCell::markdown(&[render_comment(&spec.intent)]));
        cells.push(NotebookCell::code(render_spec(registry, spec).as_slice()));
    }
    cells.push(NotebookCell::code(&[SHOW_NOTEBOOK]));
    Notebook::python3(cells)
}

/// Read statement for the source format, or a commented placeholder.
pub fn load_statement(source: &LoadDescriptor) -> Vec<String> {
    match source.source_format() {
        Some(format) => vec![format!(
            "df = pd.{}({})",
            format.pandas_reader(),
            render_str(&source.path)
        )],
        None => vec![
            format!(
                "# Unsupported format '{}': load the data into df manually",
                render_comment(&source.format)
            ),
            "df = pd.DataFrame()  # placeholder".to_string(),
        ],
    }
}

fn render_spec(registry: &ActionRegistry, spec: &ActionSpec) -> Vec<String> {
    spec.operations
        .iter()
        .map(|op| {
            render_operation(registry, op).unwrap_or_else(|err| {
                warn!(action = %op.name, error = %err, "operation rendered as comment");
                format!(
                    "# Error generating code for {}: {}",
                    render_comment(&op.name),
                    render_comment(&err.to_string())
                )
            })
        })
        .collect()
}

/// One pandas statement for `op`.
pub fn render_operation(registry: &ActionRegistry, op: &Operation) -> Result<String, GenerationError> {
    let def = registry
        .get(&op.name)
        .map_err(|_| GenerationError::UnknownAction(op.name.clone()))?;
    if let Some(key) = op.parameters.keys().find(|k| def.param(k).is_none()) {
        return Err(GenerationError::UnexpectedParameter { parameter: key.clone() });
    }

    let mut out = String::new();
    for segment in def.template().segments() {
        match segment {
            Segment::Code(code) => out.push_str(code),
            Segment::Slot(name) => {
                let spec = def.param(name).ok_or_else(|| GenerationError::MissingParameter {
                    parameter: (*name).to_string(),
                })?;
                let value = match op.parameters.get(*name) {
                    Some(value) => value.clone(),
                    None => spec
                        .default
                        .map(ParamDefault::to_value)
                        .ok_or_else(|| GenerationError::MissingParameter {
                            parameter: (*name).to_string(),
                        })?,
                };
                out.push_str(&render_slot(spec, &value)?);
            }
        }
    }
    Ok(out)
}

fn render_slot(spec: &ParamSpec, value: &Value) -> Result<String, GenerationError> {
    let shape = |expected: &'static str| GenerationError::WrongShape {
        parameter: spec.name.to_string(),
        expected,
        found: value.kind(),
    };
    let token = || GenerationError::Token {
        parameter: spec.name.to_string(),
        value: render_literal(value),
    };

    match spec.kind {
        ParamKind::Column => match value {
            Value::Str(_) => Ok(render_literal(value)),
            _ => Err(shape("a column name")),
        },
        ParamKind::Columns => match value {
            Value::List(items) if !items.is_empty() && items.iter().all(|v| v.as_str().is_some()) => {
                Ok(render_literal(value))
            }
            _ => Err(shape("a non-empty list of column names")),
        },
        ParamKind::Scalar => match value {
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => Ok(render_literal(value)),
            _ => Err(shape("a scalar")),
        },
        ParamKind::Flag => match value {
            Value::Bool(_) => Ok(render_literal(value)),
            _ => Err(shape("a bool")),
        },
        ParamKind::Operator => value
            .as_str()
            .and_then(CompareOp::parse)
            .map(|op| op.symbol().to_string())
            .ok_or_else(token),
        ParamKind::CastType => value
            .as_str()
            .and_then(CastType::parse)
            .map(|t| t.name().to_string())
            .ok_or_else(token),
        ParamKind::Function => value
            .as_str()
            .and_then(MathFunction::parse)
            .map(|f| f.name().to_string())
            .ok_or_else(token),
        ParamKind::Aggregations => match value {
            Value::Map(map) if !map.is_empty() => {
                let canonical: IndexMap<String, String> = map
                    .iter()
                    .map(|(column, reducer)| {
                        Reducer::parse(reducer)
                            .map(|r| (column.clone(), r.name().to_string()))
                            .ok_or_else(token)
                    })
                    .collect::<Result<_, GenerationError>>()?;
                Ok(render_literal(&Value::Map(canonical)))
            }
            _ => Err(shape("a mapping of column to aggregator")),
        },
    }
}

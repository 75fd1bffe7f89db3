//! Jupyter notebook document model (nbformat 4).

use serde::{Deserialize, Serialize};

/// Major notebook format version.
pub const NBFORMAT: u32 = 4;
/// Minor notebook format version.
pub const NBFORMAT_MINOR: u32 = 4;

/// A notebook document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    /// Cells in order.
    pub cells: Vec<NotebookCell>,
    /// Kernel and language metadata.
    pub metadata: NotebookMetadata,
    /// Major format version.
    pub nbformat: u32,
    /// Minor format version.
    pub nbformat_minor: u32,
}

impl Notebook {
    /// An nbformat 4.4 Python 3 notebook holding `cells`.
    pub fn python3(cells: Vec<NotebookCell>) -> Self {
        Self {
            cells,
            metadata: NotebookMetadata::default(),
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
        }
    }
}

/// One notebook cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum NotebookCell {
    /// Markdown text.
    Markdown {
        /// Always empty.
        metadata: serde_json::Map<String, serde_json::Value>,
        /// Lines, each but the last ending in `\n`.
        source: Vec<String>,
    },
    /// Python code, never executed.
    Code {
        /// Always `null`.
        execution_count: Option<u32>,
        /// Always empty.
        metadata: serde_json::Map<String, serde_json::Value>,
        /// Always empty.
        outputs: Vec<serde_json::Value>,
        /// Lines, each but the last ending in `\n`.
        source: Vec<String>,
    },
}

impl NotebookCell {
    /// Markdown cell from lines.
    pub fn markdown<S: AsRef<str>>(lines: &[S]) -> Self {
        Self::Markdown {
            metadata: serde_json::Map::new(),
            source: source_lines(lines),
        }
    }

    /// Code cell from lines.
    pub fn code<S: AsRef<str>>(lines: &[S]) -> Self {
        Self::Code {
            execution_count: None,
            metadata: serde_json::Map::new(),
            outputs: Vec::new(),
            source: source_lines(lines),
        }
    }

    /// The cell text joined back together.
    pub fn text(&self) -> String {
        match self {
            Self::Markdown { source, .. } | Self::Code { source, .. } => source.concat(),
        }
    }
}

fn source_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let last = lines.len().saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let line = line.as_ref();
            if idx == last { line.to_string() } else { format!("{line}\n") }
        })
        .collect()
}

/// Notebook-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookMetadata {
    /// Kernel to start.
    pub kernelspec: KernelSpec,
    /// Language of the code cells.
    pub language_info: LanguageInfo,
}

impl Default for NotebookMetadata {
    fn default() -> Self {
        Self {
            kernelspec: KernelSpec {
                display_name: "Python 3".to_string(),
                language: "python".to_string(),
                name: "python3".to_string(),
            },
            language_info: LanguageInfo {
                name: "python".to_string(),
            },
        }
    }
}

/// Kernel specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Name shown in the UI.
    pub display_name: String,
    /// Kernel language.
    pub language: String,
    /// Kernel name.
    pub name: String,
}

/// Language information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageInfo {
    /// Language name.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_serialize_in_nbformat_shape() {
        let cell = NotebookCell::code(&["a = 1", "b = 2"]);
        let json = serde_json::to_value(&cell).expect("encode");
        assert_eq!(
            json,
            serde_json::json!({
                "cell_type": "code",
                "execution_count": null,
                "metadata": {},
                "outputs": [],
                "source": ["a = 1\n", "b = 2"],
            })
        );
        assert_eq!(cell.text(), "a = 1\nb = 2");
    }

    #[test]
    fn envelope_is_nbformat_4_4_python3() {
        let nb = Notebook::python3(vec![NotebookCell::markdown(&["# title"])]);
        let json = serde_json::to_value(&nb).expect("encode");
        assert_eq!(json["nbformat"], 4);
        assert_eq!(json["nbformat_minor"], 4);
        assert_eq!(json["metadata"]["kernelspec"]["name"], "python3");
        assert_eq!(json["cells"][0]["cell_type"], "markdown");
    }
}

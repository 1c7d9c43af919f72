use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Opaque formatting token attached to every span.
///
/// The fill engine never interprets these attributes; it only clones them and
/// keeps them attached to the spans it rewrites around. Detectors anchored to
/// low-level formatting (underline runs) may query named boolean flags via
/// [`Format::flag`], but that is the only read surface.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Format(BTreeMap<String, serde_json::Value>);

impl Format {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a token carrying a single boolean flag, e.g. `underline`.
    pub fn with_flag(name: &str) -> Self {
        let mut attrs = BTreeMap::new();
        attrs.insert(name.to_string(), serde_json::Value::Bool(true));
        Self(attrs)
    }

    /// Boolean attribute lookup for formatting-anchored detectors.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(serde_json::Value::Bool(true)))
    }
}

/// A formatting-homogeneous run of text within a container.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    #[serde(default)]
    pub format: Format,
}

impl Span {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: Format::default(),
        }
    }

    pub fn with_format(text: impl Into<String>, format: Format) -> Self {
        Self {
            text: text.into(),
            format,
        }
    }
}

/// A paragraph or a single-paragraph table cell: an ordered sequence of spans.
///
/// Invariant: concatenating all span texts in index order reproduces the
/// container's logical text exactly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Container {
    #[serde(default)]
    pub spans: Vec<Span>,
}

impl Container {
    pub fn from_texts(texts: &[&str]) -> Self {
        Self {
            spans: texts.iter().map(|t| Span::new(*t)).collect(),
        }
    }

    /// Exact concatenation of span texts in index order.
    pub fn logical_text(&self) -> String {
        let mut text = String::with_capacity(self.spans.iter().map(|s| s.text.len()).sum());
        for span in &self.spans {
            text.push_str(&span.text);
        }
        text
    }
}

/// Stable identity of a container within its document.
///
/// Cells carry their full table coordinates instead of an encoded paragraph
/// index, so occurrence lists stay self-describing.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum ContainerId {
    Paragraph { index: usize },
    Cell { table: usize, row: usize, col: usize },
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerId::Paragraph { index } => write!(f, "paragraph {index}"),
            ContainerId::Cell { table, row, col } => {
                write!(f, "table {table} cell [{row},{col}]")
            }
        }
    }
}

/// A table: rows of single-paragraph cells. The first row is treated as the
/// header row by the table cell adapter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Table {
    #[serde(default)]
    pub rows: Vec<Vec<Container>>,
}

/// The whole form document: body paragraphs followed by tables.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Document {
    #[serde(default)]
    pub paragraphs: Vec<Container>,
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Document {
    /// Load a `*.form.json` document.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read document {}", path.display()))?;
        let doc: Document = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse document {}", path.display()))?;
        debug!(
            "Loaded document {}: {} paragraphs, {} tables",
            path.display(),
            doc.paragraphs.len(),
            doc.tables.len()
        );
        Ok(doc)
    }

    /// Save the document, pretty-printed for diffability.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write document {}", path.display()))?;
        Ok(())
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        match id {
            ContainerId::Paragraph { index } => self.paragraphs.get(index),
            ContainerId::Cell { table, row, col } => {
                self.tables.get(table)?.rows.get(row)?.get(col)
            }
        }
    }

    pub fn container_mut(&mut self, id: ContainerId) -> Option<&mut Container> {
        match id {
            ContainerId::Paragraph { index } => self.paragraphs.get_mut(index),
            ContainerId::Cell { table, row, col } => {
                self.tables.get_mut(table)?.rows.get_mut(row)?.get_mut(col)
            }
        }
    }

    /// All container ids in document order: paragraphs first, then tables
    /// row-major. Output determinism depends on this ordering.
    pub fn container_ids(&self) -> Vec<ContainerId> {
        let mut ids = Vec::new();
        for index in 0..self.paragraphs.len() {
            ids.push(ContainerId::Paragraph { index });
        }
        for (table, t) in self.tables.iter().enumerate() {
            for (row, r) in t.rows.iter().enumerate() {
                for col in 0..r.len() {
                    ids.push(ContainerId::Cell { table, row, col });
                }
            }
        }
        ids
    }
}

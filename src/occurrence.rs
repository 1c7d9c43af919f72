use crate::document::{ContainerId, Span};
use crate::span_index::SpanIndex;
use serde::{Deserialize, Serialize};

/// Which heuristic produced an occurrence.
///
/// Priority order is explicit and drives overlap resolution in the merger:
/// table-cell beats character-run beats underline-space beats model-detected,
/// reflecting detector reliability.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceKind {
    TableCell,
    CharacterRun,
    UnderlineSpace,
    ModelDetected,
}

impl OccurrenceKind {
    /// Lower value wins ties in the merger.
    pub fn priority(self) -> u8 {
        match self {
            OccurrenceKind::TableCell => 0,
            OccurrenceKind::CharacterRun => 1,
            OccurrenceKind::UnderlineSpace => 2,
            OccurrenceKind::ModelDetected => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OccurrenceKind::TableCell => "table-cell",
            OccurrenceKind::CharacterRun => "character-run",
            OccurrenceKind::UnderlineSpace => "underline-space",
            OccurrenceKind::ModelDetected => "model-detected",
        }
    }
}

/// Whether an occurrence's offsets can be trusted to map onto spans.
///
/// A detector anchored to formatting flags rather than text content cannot
/// vouch for exact run alignment; it names the one span it is sure about and
/// the replacement engine patches only that span.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Reliable,
    SingleSpanOnly { span: usize },
}

/// Bounded surrounding text handed to the generation collaborator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct OccurrenceContext {
    pub before: String,
    pub after: String,
    /// Full logical text of the containing line (the container itself).
    pub line: String,
}

/// Extract before/after windows around `[start, end)`, clipped to `window`
/// characters on each side and always on char boundaries.
pub fn extract_context(text: &str, start: usize, end: usize, window: usize) -> OccurrenceContext {
    let before: String = {
        let rev: Vec<char> = text[..start].chars().rev().take(window).collect();
        rev.into_iter().rev().collect()
    };
    let after: String = text[end..].chars().take(window).collect();
    OccurrenceContext {
        before,
        after,
        line: text.to_string(),
    }
}

/// A detected placeholder: a half-open byte range into a container's logical
/// text plus everything downstream stages need to fill it.
///
/// Invariant for reliable occurrences: `start < end <= len(logical_text)`.
/// Single-span-only occurrences may be zero-width (pure insertion into the
/// named span, e.g. an empty table cell).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub container: ContainerId,
    pub start: usize,
    pub end: usize,
    /// The original characters being replaced.
    pub raw_text: String,
    pub kind: OccurrenceKind,
    pub context: OccurrenceContext,
    /// Detector-supplied literal replacement (e.g. a table header) that
    /// bypasses the generation collaborator entirely.
    pub replacement_hint: Option<String>,
    pub alignment: Alignment,
}

/// Everything a detector gets to look at for one container. Detectors never
/// mutate spans.
pub struct DetectContext<'a> {
    pub id: ContainerId,
    /// Exact concatenation of span texts.
    pub text: &'a str,
    pub spans: &'a [Span],
    pub index: &'a SpanIndex,
    /// Context window size in chars for `extract_context`.
    pub context_window: usize,
}

/// The capability every detector implements. Detection runs per container on
/// the logical text; results are merged after all detectors complete.
pub trait PlaceholderDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, cx: &DetectContext<'_>) -> Vec<Occurrence>;
}

/// Why an occurrence could not be filled. Recorded per occurrence; never
/// fatal to the container or the document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Fallback path: `raw_text` was not found verbatim in the named span.
    RawTextNotFound,
    /// No covering span set could be resolved for the range.
    SpansUnresolved,
    /// The generation collaborator failed or timed out.
    GenerationFailed(String),
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::RawTextNotFound => {
                write!(f, "original text not found in its span")
            }
            UnresolvedReason::SpansUnresolved => write!(f, "no covering spans resolved"),
            UnresolvedReason::GenerationFailed(detail) => {
                write!(f, "generation failed: {detail}")
            }
        }
    }
}

/// Outcome of one occurrence after the replacement pass.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Filled(String),
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub fn is_filled(&self) -> bool {
        matches!(self, Resolution::Filled(_))
    }
}

use crate::occurrence::{
    extract_context, Alignment, DetectContext, Occurrence, OccurrenceKind, PlaceholderDetector,
};
use anyhow::Result;
use regex::Regex;
use tracing::debug;

/// Character-run placeholder detector.
///
/// Matches fill-in conventions written as literal characters in the logical
/// text: underline runs (`_____`) and x-runs (`xxxx`). Pattern offsets come
/// straight from the text, so span alignment is reliable.
pub struct CharacterRunDetector {
    patterns: Vec<(&'static str, Regex)>,
}

impl CharacterRunDetector {
    pub fn new(min_repetition: usize) -> Result<Self> {
        let underline = format!("_{{{min_repetition},}}");
        let patterns = vec![
            ("underline", Regex::new(&underline)?),
            ("x-run", Regex::new("x{2,10}")?),
        ];
        Ok(Self { patterns })
    }

    pub fn with_default_patterns() -> Result<Self> {
        Self::new(3)
    }
}

impl PlaceholderDetector for CharacterRunDetector {
    fn name(&self) -> &'static str {
        "character-run"
    }

    fn detect(&self, cx: &DetectContext<'_>) -> Vec<Occurrence> {
        let mut occurrences = Vec::new();
        if cx.text.trim().is_empty() {
            return occurrences;
        }

        for (pattern_name, pattern) in &self.patterns {
            for m in pattern.find_iter(cx.text) {
                debug!(
                    "character-run match ({pattern_name}) in {}: [{},{})",
                    cx.id,
                    m.start(),
                    m.end()
                );
                occurrences.push(Occurrence {
                    container: cx.id,
                    start: m.start(),
                    end: m.end(),
                    raw_text: m.as_str().to_string(),
                    kind: OccurrenceKind::CharacterRun,
                    context: extract_context(cx.text, m.start(), m.end(), cx.context_window),
                    replacement_hint: None,
                    alignment: Alignment::Reliable,
                });
            }
        }

        occurrences
    }
}

/// Underline-space placeholder detector.
///
/// Finds runs of spaces inside spans whose formatting carries the `underline`
/// flag — the classic blank line a form author draws with underlined spaces.
/// The heuristic is anchored to the formatting flag, not the text, so it
/// cannot vouch for cross-span alignment: every occurrence names its span and
/// is marked single-span-only.
#[derive(Default)]
pub struct UnderlineSpaceDetector;

impl UnderlineSpaceDetector {
    /// Maximal space runs in `text` as `(start, end)` byte ranges, adjacent
    /// runs separated by a single character merged into one.
    fn space_runs(text: &str) -> Vec<(usize, usize)> {
        let mut runs: Vec<(usize, usize)> = Vec::new();
        let mut current: Option<(usize, usize)> = None;

        for (i, b) in text.bytes().enumerate() {
            if b == b' ' {
                current = match current {
                    Some((start, _)) => Some((start, i + 1)),
                    None => Some((i, i + 1)),
                };
            } else if let Some(run) = current.take() {
                runs.push(run);
            }
        }
        if let Some(run) = current {
            runs.push(run);
        }

        // merge runs split by a single stray character
        let mut merged: Vec<(usize, usize)> = Vec::new();
        for (start, end) in runs {
            match merged.last_mut() {
                Some((_, prev_end)) if start <= *prev_end + 1 => *prev_end = end,
                _ => merged.push((start, end)),
            }
        }
        merged
    }
}

impl PlaceholderDetector for UnderlineSpaceDetector {
    fn name(&self) -> &'static str {
        "underline-space"
    }

    fn detect(&self, cx: &DetectContext<'_>) -> Vec<Occurrence> {
        let mut occurrences = Vec::new();

        for (span_idx, span) in cx.spans.iter().enumerate() {
            if !span.format.flag("underline") || span.text.is_empty() {
                continue;
            }

            let span_start = cx.index.span_start(span_idx);
            for (local_start, local_end) in Self::space_runs(&span.text) {
                let start = span_start + local_start;
                let end = span_start + local_end;
                debug!(
                    "underline-space run in {} span {span_idx}: [{start},{end})",
                    cx.id
                );
                occurrences.push(Occurrence {
                    container: cx.id,
                    start,
                    end,
                    // raw_text stays within the named span so the direct
                    // substitution path can find it verbatim
                    raw_text: span.text[local_start..local_end].to_string(),
                    kind: OccurrenceKind::UnderlineSpace,
                    context: extract_context(cx.text, start, end, cx.context_window),
                    replacement_hint: None,
                    alignment: Alignment::SingleSpanOnly { span: span_idx },
                });
            }
        }

        occurrences
    }
}

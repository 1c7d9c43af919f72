use crate::document::{Container, Span};
use crate::occurrence::{Alignment, Occurrence, Resolution, UnresolvedReason};
use crate::span_index::{self, SpanIndex};
use tracing::{debug, warn};

/// Substitute `replacement` for one occurrence, rewriting the minimal set of
/// spans and leaving every span outside the covered range untouched.
///
/// Reliable occurrences are resolved through the span index. A single
/// covering span gets an in-place splice; when the occurrence straddles
/// spans, the first covered span keeps its prefix followed by the full
/// replacement (leading-edge formatting wins), the last keeps only its
/// suffix, and spans strictly between are emptied but never removed, so
/// container ordering stays stable. Single-span-only occurrences patch the
/// detector-named span directly by verbatim text search.
///
/// The index is stale after a `Filled` outcome; rebuild before the next
/// apply on the same container.
pub fn apply(
    container: &mut Container,
    index: &SpanIndex,
    occurrence: &Occurrence,
    replacement: &str,
) -> Resolution {
    match occurrence.alignment {
        Alignment::SingleSpanOnly { span } => {
            replace_in_named_span(container, span, &occurrence.raw_text, replacement)
        }
        Alignment::Reliable => {
            let slices = index.spans_covering(occurrence.start, occurrence.end);
            match slices.as_slice() {
                [] => {
                    // Should not happen while the index invariants hold;
                    // degrade to a direct text search instead of giving up.
                    warn!(
                        "no covering spans for [{},{}) in {}, falling back to span search",
                        occurrence.start, occurrence.end, occurrence.container
                    );
                    replace_by_search(container, &occurrence.raw_text, replacement)
                }
                [only] => {
                    let span = &mut container.spans[only.span];
                    span.text
                        .replace_range(only.local_start..only.local_end, replacement);
                    debug!(
                        "spliced [{},{}) inside span {} of {}",
                        occurrence.start, occurrence.end, only.span, occurrence.container
                    );
                    Resolution::Filled(replacement.to_string())
                }
                [first, middle @ .., last] => {
                    let first_span = &mut container.spans[first.span];
                    let mut text = first_span.text[..first.local_start].to_string();
                    text.push_str(replacement);
                    first_span.text = text;

                    for slice in middle {
                        container.spans[slice.span].text.clear();
                    }

                    let last_span = &mut container.spans[last.span];
                    last_span.text = last_span.text[last.local_end..].to_string();

                    debug!(
                        "spliced [{},{}) across spans {}..={} of {}",
                        occurrence.start,
                        occurrence.end,
                        first.span,
                        last.span,
                        occurrence.container
                    );
                    Resolution::Filled(replacement.to_string())
                }
            }
        }
    }
}

/// Apply a batch of fills to one container in descending start order, so
/// offsets of not-yet-processed occurrences stay valid while earlier
/// replacements shift lengths. The span index is rebuilt after every splice.
///
/// Returns `(occurrence, resolution)` pairs in ascending start order.
pub fn apply_all(
    container: &mut Container,
    fills: Vec<(Occurrence, String)>,
) -> Vec<(Occurrence, Resolution)> {
    let mut fills = fills;
    fills.sort_by(|a, b| b.0.start.cmp(&a.0.start));

    let mut results = Vec::with_capacity(fills.len());
    for (occurrence, replacement) in fills {
        let (_, index) = span_index::build(container);
        let resolution = apply(container, &index, &occurrence, &replacement);
        results.push((occurrence, resolution));
    }

    results.reverse();
    results
}

/// Direct in-place substitution inside the span a detector named. Other
/// spans are never touched; a `raw_text` that is not found verbatim leaves
/// the span unmodified and reports the occurrence unresolved.
fn replace_in_named_span(
    container: &mut Container,
    span_idx: usize,
    raw_text: &str,
    replacement: &str,
) -> Resolution {
    if container.spans.is_empty() {
        if raw_text.is_empty() {
            // empty cell with no spans at all: the fill creates the span
            container.spans.push(Span::new(replacement));
            return Resolution::Filled(replacement.to_string());
        }
        return Resolution::Unresolved(UnresolvedReason::RawTextNotFound);
    }

    let idx = if span_idx < container.spans.len() {
        span_idx
    } else {
        warn!(
            "named span {span_idx} out of range ({} spans), using span 0",
            container.spans.len()
        );
        0
    };

    let span = &mut container.spans[idx];
    match span.text.find(raw_text) {
        Some(pos) => {
            span.text
                .replace_range(pos..pos + raw_text.len(), replacement);
            Resolution::Filled(replacement.to_string())
        }
        None => Resolution::Unresolved(UnresolvedReason::RawTextNotFound),
    }
}

/// Last-resort path for a reliable occurrence whose covering set could not
/// be resolved: patch the first span containing `raw_text` verbatim.
fn replace_by_search(container: &mut Container, raw_text: &str, replacement: &str) -> Resolution {
    if raw_text.is_empty() {
        return Resolution::Unresolved(UnresolvedReason::SpansUnresolved);
    }
    for span in &mut container.spans {
        if let Some(pos) = span.text.find(raw_text) {
            span.text
                .replace_range(pos..pos + raw_text.len(), replacement);
            return Resolution::Filled(replacement.to_string());
        }
    }
    Resolution::Unresolved(UnresolvedReason::SpansUnresolved)
}

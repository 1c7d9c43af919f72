use crate::document::Container;

/// One span's overlap with a queried logical-text range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanSlice {
    /// Physical span index within the container.
    pub span: usize,
    /// Byte offset into the span's own text where the overlap begins.
    pub local_start: usize,
    /// Byte offset into the span's own text where the overlap ends.
    pub local_end: usize,
}

/// Read-only mapping from logical-text offsets to physical spans.
///
/// Built once per container, consumed by every detector for that container
/// and once more by the replacement engine. Any span mutation invalidates the
/// index; callers rebuild after each splice because span boundaries shift.
#[derive(Debug, Clone)]
pub struct SpanIndex {
    /// Start offset of each span in the logical text (same order as spans).
    starts: Vec<usize>,
    /// Byte length of each span's text.
    lens: Vec<usize>,
    total_len: usize,
}

/// Build the logical text and its span index for a container.
///
/// The returned string is the exact concatenation of span texts; zero-length
/// spans keep their slot in the index without affecting offsets. A container
/// with zero spans yields empty text and an empty index.
pub fn build(container: &Container) -> (String, SpanIndex) {
    let mut starts = Vec::with_capacity(container.spans.len());
    let mut lens = Vec::with_capacity(container.spans.len());
    let mut text = String::new();

    for span in &container.spans {
        starts.push(text.len());
        lens.push(span.text.len());
        text.push_str(&span.text);
    }

    let total_len = text.len();
    (text, SpanIndex { starts, lens, total_len })
}

impl SpanIndex {
    /// Total logical-text length the index was built from.
    pub fn len(&self) -> usize {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    pub fn span_count(&self) -> usize {
        self.starts.len()
    }

    /// Start offset of span `i` in the logical text.
    pub fn span_start(&self, i: usize) -> usize {
        self.starts[i]
    }

    /// Ordered list of spans overlapping `[start, end)`, with the overlap
    /// expressed in each span's local byte offsets.
    ///
    /// Zero-length spans never overlap a range and are skipped; an empty or
    /// inverted range yields no slices. Linear scan — containers hold tens of
    /// spans at most.
    pub fn spans_covering(&self, start: usize, end: usize) -> Vec<SpanSlice> {
        let mut slices = Vec::new();
        if start >= end {
            return slices;
        }

        for (i, (&span_start, &span_len)) in self.starts.iter().zip(&self.lens).enumerate() {
            if span_len == 0 {
                continue;
            }
            let span_end = span_start + span_len;
            if span_end <= start {
                continue;
            }
            if span_start >= end {
                break;
            }
            slices.push(SpanSlice {
                span: i,
                local_start: start.saturating_sub(span_start),
                local_end: end.min(span_end) - span_start,
            });
        }

        slices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Container, Span};

    #[test]
    fn test_build_concatenates_exactly() {
        let container = Container::from_texts(&["Name: ", "____, Age: ", "____"]);
        let (text, index) = build(&container);
        assert_eq!(text, "Name: ____, Age: ____");
        assert_eq!(index.len(), text.len());
        assert_eq!(index.span_count(), 3);
        assert_eq!(index.span_start(0), 0);
        assert_eq!(index.span_start(1), 6);
        assert_eq!(index.span_start(2), 17);
    }

    #[test]
    fn test_zero_spans_yield_empty_index() {
        let container = Container::default();
        let (text, index) = build(&container);
        assert_eq!(text, "");
        assert!(index.is_empty());
        assert!(index.spans_covering(0, 1).is_empty());
    }

    #[test]
    fn test_covering_single_span() {
        let container = Container::from_texts(&["Name: ", "____, Age: ", "____"]);
        let (_, index) = build(&container);

        // [6,10) is "____" wholly inside span 1
        let slices = index.spans_covering(6, 10);
        assert_eq!(
            slices,
            vec![SpanSlice { span: 1, local_start: 0, local_end: 4 }]
        );
    }

    #[test]
    fn test_covering_straddles_spans() {
        let container = Container::from_texts(&["Name: ", "____, Age: ", "____"]);
        let (_, index) = build(&container);

        // [4,19) crosses all three spans
        let slices = index.spans_covering(4, 19);
        assert_eq!(
            slices,
            vec![
                SpanSlice { span: 0, local_start: 4, local_end: 6 },
                SpanSlice { span: 1, local_start: 0, local_end: 11 },
                SpanSlice { span: 2, local_start: 0, local_end: 2 },
            ]
        );
    }

    #[test]
    fn test_empty_spans_hold_position_without_offsets() {
        let container = Container {
            spans: vec![
                Span::new("ab"),
                Span::new(""),
                Span::new("cd"),
            ],
        };
        let (text, index) = build(&container);
        assert_eq!(text, "abcd");
        assert_eq!(index.span_start(1), 2);
        assert_eq!(index.span_start(2), 2);

        // the empty span never appears in a covering set
        let slices = index.spans_covering(1, 3);
        assert_eq!(
            slices,
            vec![
                SpanSlice { span: 0, local_start: 1, local_end: 2 },
                SpanSlice { span: 2, local_start: 0, local_end: 1 },
            ]
        );
    }

    #[test]
    fn test_inverted_or_empty_range() {
        let container = Container::from_texts(&["abc"]);
        let (_, index) = build(&container);
        assert!(index.spans_covering(2, 2).is_empty());
        assert!(index.spans_covering(2, 1).is_empty());
    }

    #[test]
    fn test_range_beyond_text_clamps_to_spans() {
        let container = Container::from_texts(&["abc", "def"]);
        let (_, index) = build(&container);
        let slices = index.spans_covering(4, 40);
        assert_eq!(
            slices,
            vec![SpanSlice { span: 1, local_start: 1, local_end: 3 }]
        );
    }
}

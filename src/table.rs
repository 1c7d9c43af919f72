use crate::document::{ContainerId, Table};
use crate::occurrence::{Alignment, Occurrence, OccurrenceContext, OccurrenceKind};
use tracing::debug;

/// Header cells a hint is never derived from.
const MEANINGLESS_HEADERS: &[&str] = &["-", "*", "#"];

/// Trimmed first-row cell texts; the column headers of a table.
pub fn headers(table: &Table) -> Vec<String> {
    match table.rows.first() {
        Some(row) => row
            .iter()
            .map(|cell| cell.logical_text().trim().to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// Detect fill-in cells in one table.
///
/// Each single-paragraph cell is its own container; the row is the unit of
/// detection only in the sense that row text (cells joined by a column
/// delimiter) forms the occurrence context — cells are never merged in the
/// document itself. Empty body cells under a named header produce an
/// occurrence carrying `replacement_hint` = that header, which downstream
/// stages use verbatim instead of calling the generation collaborator.
pub fn detect_table_cells(table_idx: usize, table: &Table) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();

    // header-only tables have nothing to fill
    if table.rows.len() <= 1 {
        return occurrences;
    }

    let headers = headers(table);
    if headers.iter().all(|h| h.is_empty()) {
        debug!("table {table_idx} has an empty header row, skipping");
        return occurrences;
    }

    for (row_idx, row) in table.rows.iter().enumerate().skip(1) {
        let cell_texts: Vec<String> = row.iter().map(|cell| cell.logical_text()).collect();

        for (col_idx, cell) in row.iter().enumerate() {
            let cell_text = &cell_texts[col_idx];
            if !cell_text.trim().is_empty() {
                continue;
            }

            let hint = match headers.get(col_idx) {
                Some(h) if !h.is_empty() => h.clone(),
                _ => format!("column {}", col_idx + 1),
            };
            if MEANINGLESS_HEADERS.contains(&hint.as_str()) {
                continue;
            }

            let context = OccurrenceContext {
                before: cell_texts[..col_idx].join(" | "),
                after: cell_texts[col_idx + 1..].join(" | "),
                line: cell_texts.join(" | "),
            };

            debug!(
                "empty cell [{row_idx},{col_idx}] in table {table_idx}, hint '{hint}'"
            );
            occurrences.push(Occurrence {
                container: ContainerId::Cell { table: table_idx, row: row_idx, col: col_idx },
                start: 0,
                end: cell_text.len(),
                raw_text: cell_text.clone(),
                kind: OccurrenceKind::TableCell,
                context,
                replacement_hint: Some(hint),
                alignment: Alignment::SingleSpanOnly { span: 0 },
            });
        }
    }

    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Container;
    use crate::replace;
    use crate::span_index;

    fn table(rows: Vec<Vec<&str>>) -> Table {
        Table {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|c| Container::from_texts(&[c])).collect())
                .collect(),
        }
    }

    #[test]
    fn test_header_extraction() {
        let t = table(vec![vec!["姓名", " 年龄 ", "性别"], vec!["张三", "30", "男"]]);
        assert_eq!(headers(&t), vec!["姓名", "年龄", "性别"]);
    }

    #[test]
    fn test_empty_middle_cell_uses_header_hint() {
        // three columns, one empty middle cell in the body row
        let t = table(vec![vec!["姓名", "年龄", "性别"], vec!["张三", "", "男"]]);
        let occurrences = detect_table_cells(0, &t);

        assert_eq!(occurrences.len(), 1);
        let occ = &occurrences[0];
        assert_eq!(occ.container, ContainerId::Cell { table: 0, row: 1, col: 1 });
        assert_eq!(occ.replacement_hint.as_deref(), Some("年龄"));
        assert_eq!(occ.kind, OccurrenceKind::TableCell);
        assert_eq!(occ.alignment, Alignment::SingleSpanOnly { span: 0 });
        assert_eq!(occ.context.line, "张三 |  | 男");
    }

    #[test]
    fn test_hint_fills_cell_directly() {
        // the hint bypasses generation and lands verbatim in the cell
        let t = table(vec![vec!["姓名", "年龄", "性别"], vec!["张三", "", "男"]]);
        let occ = detect_table_cells(0, &t)[0].clone();

        let mut cell = Container::default();
        let (_, index) = span_index::build(&cell);
        let hint = occ.replacement_hint.clone().unwrap();
        let resolution = replace::apply(&mut cell, &index, &occ, &hint);

        assert!(resolution.is_filled());
        assert_eq!(cell.logical_text(), "年龄");
    }

    #[test]
    fn test_whitespace_only_cell_counts_as_empty() {
        let t = table(vec![vec!["a", "b"], vec!["  ", "x"]]);
        let occurrences = detect_table_cells(0, &t);
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].raw_text, "  ");
        assert_eq!(occurrences[0].end, 2);
    }

    #[test]
    fn test_header_only_table_is_skipped() {
        let t = table(vec![vec!["姓名", "年龄"]]);
        assert!(detect_table_cells(0, &t).is_empty());
    }

    #[test]
    fn test_all_empty_headers_skip_table() {
        let t = table(vec![vec!["", ""], vec!["", ""]]);
        assert!(detect_table_cells(0, &t).is_empty());
    }

    #[test]
    fn test_meaningless_header_skips_column() {
        let t = table(vec![vec!["姓名", "-"], vec!["", ""]]);
        let occurrences = detect_table_cells(0, &t);
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].replacement_hint.as_deref(), Some("姓名"));
    }

    #[test]
    fn test_missing_header_falls_back_to_column_label() {
        let t = table(vec![vec!["姓名"], vec!["张三", ""]]);
        let occurrences = detect_table_cells(0, &t);
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].replacement_hint.as_deref(), Some("column 2"));
    }
}

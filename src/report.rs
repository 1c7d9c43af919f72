use crate::occurrence::Resolution;
use crate::pipeline::{ContainerOutcome, DocumentReport};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Render the human-readable markdown report for one document: every
/// occurrence with its resolution outcome, integrity-skipped containers
/// listed distinctly.
pub fn render_markdown(document_path: &str, report: &DocumentReport) -> String {
    let stats = &report.stats;
    let mut out = String::new();

    out.push_str("# Fill-in processing report\n\n");
    out.push_str(&format!("Document: {document_path}\n\n"));
    out.push_str(&format!(
        "{} occurrence(s) across {} container(s): {} filled, {} unresolved",
        stats.occurrences, stats.containers, stats.filled, stats.unresolved
    ));
    if stats.skipped_containers > 0 {
        out.push_str(&format!(
            ", {} container(s) skipped on integrity violations",
            stats.skipped_containers
        ));
    }
    out.push_str("\n\n");

    let mut number = 0usize;
    for container in &report.containers {
        match &container.outcome {
            ContainerOutcome::IntegrityViolation { detail } => {
                out.push_str(&format!("## Skipped container: {}\n\n", container.id));
                out.push_str(&format!("- integrity violation: {detail}\n\n---\n\n"));
            }
            ContainerOutcome::Processed { outcomes } => {
                for outcome in outcomes {
                    number += 1;
                    let occ = &outcome.occurrence;
                    out.push_str(&format!(
                        "## Occurrence {number}: {}\n\n",
                        occ.kind.label()
                    ));
                    out.push_str(&format!("- location: {}\n", occ.container));
                    out.push_str(&format!("- offsets: [{},{})\n", occ.start, occ.end));
                    out.push_str(&format!("- original: '{}'\n", occ.raw_text));
                    match &outcome.resolution {
                        Resolution::Filled(text) => {
                            out.push_str(&format!("- filled with: '{text}'\n"));
                        }
                        Resolution::Unresolved(reason) => {
                            out.push_str(&format!("- unresolved: {reason}\n"));
                        }
                    }
                    out.push_str("\n### Context\n\n");
                    out.push_str(&format!("before: {}\n\n", occ.context.before));
                    out.push_str(&format!("after: {}\n\n", occ.context.after));
                    out.push_str("---\n\n");
                }
            }
        }
    }

    out
}

/// Write the markdown report next to the output document.
pub async fn write_markdown_report<P: AsRef<Path>>(
    path: P,
    document_path: &str,
    report: &DocumentReport,
) -> Result<()> {
    let path = path.as_ref();
    let content = render_markdown(document_path, report);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, content).await?;
    info!("Wrote processing report to {}", path.display());
    Ok(())
}

/// Per-document processing statistics for the run stats file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DocumentStats {
    /// Document path relative to the invocation root.
    pub path: String,
    pub containers: u64,
    pub occurrences: u64,
    pub filled: u64,
    pub unresolved: u64,
    pub skipped_containers: u64,
    pub processing_time_ms: u64,
    /// Processing status (success, skipped, failed).
    pub status: String,
    /// Error message if processing failed.
    pub error: Option<String>,
}

impl DocumentStats {
    pub fn from_report(path: &Path, report: &DocumentReport) -> Self {
        let stats = &report.stats;
        Self {
            path: path.display().to_string(),
            containers: stats.containers,
            occurrences: stats.occurrences,
            filled: stats.filled,
            unresolved: stats.unresolved,
            skipped_containers: stats.skipped_containers,
            processing_time_ms: stats.total_time_ms,
            status: "success".to_string(),
            error: None,
        }
    }

    pub fn failed(path: &Path, error: &str) -> Self {
        Self {
            path: path.display().to_string(),
            containers: 0,
            occurrences: 0,
            filled: 0,
            unresolved: 0,
            skipped_containers: 0,
            processing_time_ms: 0,
            status: "failed".to_string(),
            error: Some(error.to_string()),
        }
    }

    pub fn skipped(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            containers: 0,
            occurrences: 0,
            filled: 0,
            unresolved: 0,
            skipped_containers: 0,
            processing_time_ms: 0,
            status: "skipped".to_string(),
            error: None,
        }
    }
}

/// Write run-level stats for all processed documents as pretty JSON.
pub async fn write_run_stats<P: AsRef<Path>>(path: P, stats: &[DocumentStats]) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(stats)?;
    tokio::fs::write(path, content).await?;
    info!("Wrote run stats for {} document(s) to {}", stats.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ContainerId;
    use crate::occurrence::{
        Alignment, Occurrence, OccurrenceContext, OccurrenceKind, UnresolvedReason,
    };
    use crate::pipeline::{ContainerReport, FillStats, OccurrenceOutcome};
    use tempfile::TempDir;

    fn sample_report() -> DocumentReport {
        let occurrence = Occurrence {
            container: ContainerId::Paragraph { index: 0 },
            start: 6,
            end: 10,
            raw_text: "____".to_string(),
            kind: OccurrenceKind::CharacterRun,
            context: OccurrenceContext {
                before: "Name: ".to_string(),
                after: "".to_string(),
                line: "Name: ____".to_string(),
            },
            replacement_hint: None,
            alignment: Alignment::Reliable,
        };
        DocumentReport {
            containers: vec![
                ContainerReport {
                    id: ContainerId::Paragraph { index: 0 },
                    outcome: ContainerOutcome::Processed {
                        outcomes: vec![
                            OccurrenceOutcome {
                                occurrence: occurrence.clone(),
                                resolution: Resolution::Filled("{{Name}}".to_string()),
                            },
                            OccurrenceOutcome {
                                occurrence,
                                resolution: Resolution::Unresolved(
                                    UnresolvedReason::RawTextNotFound,
                                ),
                            },
                        ],
                    },
                },
                ContainerReport {
                    id: ContainerId::Paragraph { index: 3 },
                    outcome: ContainerOutcome::IntegrityViolation {
                        detail: "expected 10 bytes of span text, found 12".to_string(),
                    },
                },
            ],
            stats: FillStats {
                containers: 4,
                occurrences: 2,
                filled: 1,
                unresolved: 1,
                skipped_containers: 1,
                detection_time_ms: 1,
                total_time_ms: 2,
            },
        }
    }

    #[test]
    fn test_markdown_lists_every_outcome() {
        let markdown = render_markdown("sample.form.json", &sample_report());

        assert!(markdown.contains("Document: sample.form.json"));
        assert!(markdown.contains("2 occurrence(s) across 4 container(s): 1 filled, 1 unresolved"));
        assert!(markdown.contains("## Occurrence 1: character-run"));
        assert!(markdown.contains("- filled with: '{{Name}}'"));
        assert!(markdown.contains("- unresolved: original text not found in its span"));
        assert!(markdown.contains("## Skipped container: paragraph 3"));
        assert!(markdown.contains("before: Name: "));
    }

    #[tokio::test]
    async fn test_run_stats_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let stats_path = temp_dir.path().join("run_stats.json");

        let stats = vec![
            DocumentStats::from_report(Path::new("a.form.json"), &sample_report()),
            DocumentStats::failed(Path::new("b.form.json"), "parse error"),
            DocumentStats::skipped(Path::new("c.form.json")),
        ];
        write_run_stats(&stats_path, &stats).await.unwrap();

        let content = tokio::fs::read_to_string(&stats_path).await.unwrap();
        let loaded: Vec<DocumentStats> = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].status, "success");
        assert_eq!(loaded[0].filled, 1);
        assert_eq!(loaded[1].status, "failed");
        assert_eq!(loaded[1].error.as_deref(), Some("parse error"));
        assert_eq!(loaded[2].status, "skipped");
    }
}

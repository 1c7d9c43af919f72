use crate::document::{Container, ContainerId, Document};
use crate::generate::{generate_with_timeout, GenerationRequest, TextGenerator};
use crate::merge::merge_occurrences;
use crate::occurrence::{
    DetectContext, Occurrence, PlaceholderDetector, Resolution, UnresolvedReason,
};
use crate::replace;
use crate::span_index;
use crate::table;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tunables for one document run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on concurrently detected containers; also bounds
    /// in-flight generation calls.
    pub max_concurrency: usize,
    /// Context window in chars handed to detectors and the generator.
    pub context_window: usize,
    /// Deadline per generation call.
    pub generation_timeout: Duration,
    /// Console progress bar across containers.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: num_cpus::get().max(1),
            context_window: 100,
            generation_timeout: Duration::from_secs(30),
            show_progress: false,
        }
    }
}

/// One occurrence and how it ended up.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OccurrenceOutcome {
    pub occurrence: Occurrence,
    pub resolution: Resolution,
}

/// Per-container result. Integrity violations are reported distinctly from
/// ordinary unresolved occurrences: the container was skipped whole.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ContainerOutcome {
    Processed { outcomes: Vec<OccurrenceOutcome> },
    IntegrityViolation { detail: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContainerReport {
    pub id: ContainerId,
    pub outcome: ContainerOutcome,
}

/// Counters for one document run.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FillStats {
    pub containers: u64,
    pub occurrences: u64,
    pub filled: u64,
    pub unresolved: u64,
    pub skipped_containers: u64,
    pub detection_time_ms: u64,
    pub total_time_ms: u64,
}

/// Everything the reporting collaborator consumes for one document.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DocumentReport {
    pub containers: Vec<ContainerReport>,
    pub stats: FillStats,
}

/// A container snapshot queued for detection.
struct DetectionUnit {
    id: ContainerId,
    container: Container,
    /// Occurrences the table cell adapter already produced for this cell.
    seeded: Vec<Occurrence>,
}

/// A fill ready for the apply phase: either resolved text or the reason the
/// occurrence is already unresolved (generation failure).
struct PlannedFill {
    occurrence: Occurrence,
    text: Result<String, UnresolvedReason>,
}

struct PlannedContainer {
    id: ContainerId,
    /// Logical text detection ran against; re-checked before mutation.
    logical_text: String,
    fills: Vec<PlannedFill>,
}

/// Detect, merge and fill every placeholder in the document.
///
/// Phase one runs detection and text generation per container, concurrently
/// up to `max_concurrency` — containers share no state. Phase two mutates
/// containers sequentially in document order, applying each container's
/// fills in descending start order. A container whose spans no longer
/// concatenate to the text detection saw is skipped whole and reported as an
/// integrity violation; everything else continues.
pub async fn process_document(
    doc: &mut Document,
    detectors: &[Box<dyn PlaceholderDetector>],
    generator: &dyn TextGenerator,
    config: &PipelineConfig,
) -> Result<DocumentReport> {
    let started = Instant::now();

    // table cell adapter seeds hint-carrying occurrences per cell
    let mut seeded: HashMap<ContainerId, Vec<Occurrence>> = HashMap::new();
    for (table_idx, t) in doc.tables.iter().enumerate() {
        for occ in table::detect_table_cells(table_idx, t) {
            seeded.entry(occ.container).or_default().push(occ);
        }
    }

    let units: Vec<DetectionUnit> = doc
        .container_ids()
        .into_iter()
        .filter_map(|id| {
            doc.container(id).map(|container| DetectionUnit {
                id,
                container: container.clone(),
                seeded: seeded.remove(&id).unwrap_or_default(),
            })
        })
        .collect();

    let total_units = units.len();
    let progress = if config.show_progress {
        ProgressBar::new(total_units as u64)
    } else {
        ProgressBar::hidden()
    };

    let detection_started = Instant::now();
    let mut planned: Vec<PlannedContainer> = stream::iter(units)
        .map(|unit| {
            let progress = progress.clone();
            async move {
                let plan = plan_container(unit, detectors, generator, config).await;
                progress.inc(1);
                plan
            }
        })
        .buffer_unordered(config.max_concurrency)
        .collect()
        .await;
    progress.finish_and_clear();
    let detection_time_ms = detection_started.elapsed().as_millis() as u64;

    // apply in document order for deterministic output
    planned.sort_by_key(|p| p.id);

    let mut stats = FillStats {
        containers: total_units as u64,
        detection_time_ms,
        ..FillStats::default()
    };
    let mut reports = Vec::new();

    for plan in planned {
        if plan.fills.is_empty() {
            continue;
        }

        let Some(container) = doc.container_mut(plan.id) else {
            warn!("container {} vanished before apply phase", plan.id);
            continue;
        };

        let current = container.logical_text();
        if current != plan.logical_text {
            warn!(
                "integrity violation in {}: span text no longer matches the index record",
                plan.id
            );
            stats.skipped_containers += 1;
            reports.push(ContainerReport {
                id: plan.id,
                outcome: ContainerOutcome::IntegrityViolation {
                    detail: format!(
                        "expected {} bytes of span text, found {}",
                        plan.logical_text.len(),
                        current.len()
                    ),
                },
            });
            continue;
        }

        let mut ready = Vec::new();
        let mut outcomes = Vec::new();
        for fill in plan.fills {
            match fill.text {
                Ok(text) => ready.push((fill.occurrence, text)),
                Err(reason) => outcomes.push(OccurrenceOutcome {
                    occurrence: fill.occurrence,
                    resolution: Resolution::Unresolved(reason),
                }),
            }
        }

        outcomes.extend(
            replace::apply_all(container, ready)
                .into_iter()
                .map(|(occurrence, resolution)| OccurrenceOutcome { occurrence, resolution }),
        );
        outcomes.sort_by_key(|o| o.occurrence.start);

        for outcome in &outcomes {
            stats.occurrences += 1;
            if outcome.resolution.is_filled() {
                stats.filled += 1;
            } else {
                stats.unresolved += 1;
            }
        }

        reports.push(ContainerReport {
            id: plan.id,
            outcome: ContainerOutcome::Processed { outcomes },
        });
    }

    stats.total_time_ms = started.elapsed().as_millis() as u64;
    info!(
        "document processed: {} containers, {} occurrences, {} filled, {} unresolved, {} skipped",
        stats.containers, stats.occurrences, stats.filled, stats.unresolved, stats.skipped_containers
    );

    Ok(DocumentReport { containers: reports, stats })
}

/// Detection + merge + text resolution for one container snapshot.
async fn plan_container(
    unit: DetectionUnit,
    detectors: &[Box<dyn PlaceholderDetector>],
    generator: &dyn TextGenerator,
    config: &PipelineConfig,
) -> PlannedContainer {
    let (text, index) = span_index::build(&unit.container);
    let cx = DetectContext {
        id: unit.id,
        text: &text,
        spans: &unit.container.spans,
        index: &index,
        context_window: config.context_window,
    };

    let mut occurrences = unit.seeded;
    for detector in detectors {
        let found = detector.detect(&cx);
        if !found.is_empty() {
            debug!("{} found {} occurrence(s) in {}", detector.name(), found.len(), unit.id);
        }
        occurrences.extend(found);
    }

    let merged = merge_occurrences(occurrences);
    let mut fills = Vec::with_capacity(merged.len());
    for occurrence in merged {
        let text = match &occurrence.replacement_hint {
            // a hint short-circuits the generation collaborator
            Some(hint) => Ok(hint.clone()),
            None => {
                let request = GenerationRequest {
                    kind: occurrence.kind,
                    context: occurrence.context.clone(),
                    hint: None,
                };
                generate_with_timeout(generator, &request, config.generation_timeout)
                    .await
                    .map_err(|e| UnresolvedReason::GenerationFailed(e.to_string()))
            }
        };
        fills.push(PlannedFill { occurrence, text });
    }

    PlannedContainer { id: unit.id, logical_text: text, fills }
}

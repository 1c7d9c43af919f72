pub mod detectors;
pub mod discovery;
pub mod document;
pub mod generate;
pub mod incremental;
pub mod merge;
pub mod occurrence;
pub mod pipeline;
pub mod replace;
pub mod report;
pub mod span_index;
pub mod table;

// Re-export main types for convenient access
pub use document::{Container, ContainerId, Document, Format, Span, Table};
pub use occurrence::{
    Alignment, Occurrence, OccurrenceKind, PlaceholderDetector, Resolution, UnresolvedReason,
};
pub use pipeline::{process_document, DocumentReport, PipelineConfig};

// Re-export incremental processing utilities
pub use incremental::{
    generate_output_path, generate_report_path, output_exists, should_process_document,
};

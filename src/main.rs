use anyhow::Result;
use clap::Parser;
use infill::detectors::{CharacterRunDetector, UnderlineSpaceDetector};
use infill::generate::{FieldNameGenerator, TextGenerator};
use infill::occurrence::PlaceholderDetector;
use infill::pipeline::{self, PipelineConfig};
use infill::report::{self, DocumentStats};
use infill::{discovery, incremental, Document};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "infill")]
#[command(about = "Detects fill-in placeholders in form documents and fills them in place")]
#[command(version)]
struct Args {
    /// Form document (*.form.json), or a root directory with --batch
    input: PathBuf,

    /// Process every *.form.json found under the input directory
    #[arg(long)]
    batch: bool,

    /// Output document path (single-document mode; defaults to <stem>_filled.form.json)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Markdown report path (single-document mode; defaults to <stem>_report.md)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Overwrite even documents whose output already exists
    #[arg(long)]
    overwrite_all: bool,

    /// Abort on first error
    #[arg(long)]
    fail_fast: bool,

    /// Suppress console progress bars
    #[arg(long)]
    no_progress: bool,

    /// Stats output file path
    #[arg(long, default_value = "run_stats.json")]
    stats_out: PathBuf,

    /// Containers processed concurrently (defaults to CPU count)
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Context window in characters around each placeholder
    #[arg(long, default_value_t = 100)]
    context_window: usize,

    /// Per-occurrence generation timeout in seconds
    #[arg(long, default_value_t = 30)]
    generation_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // structured JSON logging for observability in production runs
    tracing_subscriber::fmt()
        .with_target(false)
        .json()
        .init();

    let args = Args::parse();

    info!("Starting infill");
    info!(?args, "Parsed CLI arguments");

    // validate input early to fail fast with a clear error
    if !args.input.exists() {
        anyhow::bail!("Input path does not exist: {}", args.input.display());
    }
    if args.batch && !args.input.is_dir() {
        anyhow::bail!("--batch requires a directory: {}", args.input.display());
    }
    if !args.batch && !args.input.is_file() {
        anyhow::bail!("Input path is not a file: {}", args.input.display());
    }

    let config = PipelineConfig {
        max_concurrency: args.max_concurrency.unwrap_or_else(|| num_cpus::get().max(1)),
        context_window: args.context_window,
        generation_timeout: Duration::from_secs(args.generation_timeout),
        show_progress: !args.no_progress,
    };

    let detectors: Vec<Box<dyn PlaceholderDetector>> = vec![
        Box::new(CharacterRunDetector::with_default_patterns()?),
        Box::new(UnderlineSpaceDetector),
    ];
    let generator = FieldNameGenerator::default();

    let mut run_stats: Vec<DocumentStats> = Vec::new();

    if args.batch {
        info!("Starting document discovery in: {}", args.input.display());
        let discovery_config = discovery::DiscoveryConfig { fail_fast: args.fail_fast };
        let discovered =
            discovery::collect_discovered_documents(&args.input, discovery_config).await?;

        let valid: Vec<_> = discovered.iter().filter(|d| d.error.is_none()).collect();
        let invalid_count = discovered.len() - valid.len();

        println!(
            "infill v{} - discovered {} document(s), {} with issues",
            env!("CARGO_PKG_VERSION"),
            discovered.len(),
            invalid_count
        );

        for document in valid {
            let path = &document.path;
            if !incremental::should_process_document(path, args.overwrite_all) {
                info!("Skipping already-filled document: {}", path.display());
                run_stats.push(DocumentStats::skipped(path));
                continue;
            }

            let output_path = incremental::generate_output_path(path);
            let report_path = incremental::generate_report_path(path);
            match process_one(path, &output_path, &report_path, &detectors, &generator, &config)
                .await
            {
                Ok(stats) => run_stats.push(stats),
                Err(e) => {
                    warn!("Failed to process {}: {e:#}", path.display());
                    if args.fail_fast {
                        return Err(e);
                    }
                    run_stats.push(DocumentStats::failed(path, &format!("{e:#}")));
                }
            }
        }
    } else {
        let output_path = args
            .output
            .clone()
            .unwrap_or_else(|| incremental::generate_output_path(&args.input));
        let report_path = args
            .report
            .clone()
            .unwrap_or_else(|| incremental::generate_report_path(&args.input));
        let stats = process_one(
            &args.input,
            &output_path,
            &report_path,
            &detectors,
            &generator,
            &config,
        )
        .await?;
        run_stats.push(stats);
    }

    report::write_run_stats(&args.stats_out, &run_stats).await?;

    let processed = run_stats.iter().filter(|s| s.status == "success").count();
    let skipped = run_stats.iter().filter(|s| s.status == "skipped").count();
    let failed = run_stats.iter().filter(|s| s.status == "failed").count();
    let filled: u64 = run_stats.iter().map(|s| s.filled).sum();
    let unresolved: u64 = run_stats.iter().map(|s| s.unresolved).sum();

    println!("Processing complete:");
    println!("  Documents processed: {processed}");
    if skipped > 0 {
        println!("  Documents skipped (already filled): {skipped}");
    }
    if failed > 0 {
        println!("  Documents failed: {failed}");
    }
    println!("  Placeholders filled: {filled}");
    if unresolved > 0 {
        println!("  Placeholders unresolved: {unresolved}");
    }
    println!("  Run stats written to: {}", args.stats_out.display());

    info!(
        "Run finished: {} processed, {} skipped, {} failed",
        processed, skipped, failed
    );
    Ok(())
}

/// Fill one document end to end: load, process, save, report.
async fn process_one(
    input_path: &Path,
    output_path: &Path,
    report_path: &Path,
    detectors: &[Box<dyn PlaceholderDetector>],
    generator: &dyn TextGenerator,
    config: &PipelineConfig,
) -> Result<DocumentStats> {
    info!("Processing document: {}", input_path.display());

    let mut document = Document::load(input_path).await?;
    let document_report = pipeline::process_document(&mut document, detectors, generator, config).await?;

    document.save(output_path).await?;
    report::write_markdown_report(report_path, &input_path.display().to_string(), &document_report)
        .await?;

    println!(
        "{}: {} filled, {} unresolved -> {}",
        input_path.display(),
        document_report.stats.filled,
        document_report.stats.unresolved,
        output_path.display()
    );

    Ok(DocumentStats::from_report(input_path, &document_report))
}

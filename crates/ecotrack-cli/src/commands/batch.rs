//! Batch command - ingest multiple invoice files.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, warn};

use ecotrack_core::upload::is_supported_mime;
use ecotrack_core::{IngestOutcome, IngestionPipeline, InvoiceOverrides};

use super::load_config;
use super::process::ingest_file;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Identity of the uploading user
    #[arg(short, long, env = "ECOTRACK_USER")]
    user: Option<String>,

    /// Write a summary CSV to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of ingesting a single file.
struct FileResult {
    path: PathBuf,
    outcome: Option<IngestOutcome>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file() && is_candidate(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let pipeline = IngestionPipeline::from_config(&config)?;
    let overrides = InvoiceOverrides::default();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    // Uploads are independent; they run one after another
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let file_start = Instant::now();
        let result = ingest_file(
            &pipeline,
            &config,
            &path,
            None,
            args.user.as_deref(),
            &overrides,
        )
        .await;
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => results.push(FileResult {
                path,
                outcome: Some(outcome),
                error: None,
                processing_time_ms,
            }),
            Err(e) => {
                let message = e.to_response().message;
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), e);
                    results.push(FileResult {
                        path,
                        outcome: None,
                        error: Some(message),
                        processing_time_ms,
                    });
                } else {
                    error!("Failed to process {}: {}", path.display(), e);
                    pb.abandon();
                    anyhow::bail!("Processing failed with status {}: {}", e.status(), message);
                }
            }
        }

        pb.inc(1);
    }

    pb.finish_and_clear();

    if let Some(summary_path) = &args.summary {
        write_summary(summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let successful: Vec<_> = results.iter().filter_map(|r| r.outcome.as_ref()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    let simulated = successful.iter().filter(|o| o.fallback_used).count();
    let total_kg: f64 = successful.iter().map(|o| o.record.emissions).sum();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful ({} simulated), {} failed",
        style(successful.len()).green(),
        style(simulated).yellow(),
        style(failed.len()).red()
    );
    println!("   Total emissions: {:.3} kg CO2", total_kg);

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn is_candidate(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .is_some_and(|mime| is_supported_mime(mime.essence_str()))
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "record_id",
        "invoice_number",
        "invoice_date",
        "provider",
        "type",
        "emissions_kg",
        "simulated",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        if let Some(outcome) = &result.outcome {
            let record = &outcome.record;
            wtr.write_record([
                filename,
                "success",
                &outcome.id,
                &record.invoice_number,
                &record.invoice_date.to_string(),
                &record.provider,
                &record.invoice_type,
                &record.emissions.to_string(),
                &outcome.fallback_used.to_string(),
                &result.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                &result.processing_time_ms.to_string(),
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

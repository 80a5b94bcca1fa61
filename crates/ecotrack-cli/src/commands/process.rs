//! Process command - ingest a single invoice file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use ecotrack_core::error::PipelineError;
use ecotrack_core::report::render_summary;
use ecotrack_core::{
    EcotrackConfig, IngestOutcome, IngestionPipeline, InvoiceOverrides, InvoiceRecord,
    UploadedFile,
};

use super::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Identity of the uploading user
    #[arg(short, long, env = "ECOTRACK_USER")]
    user: Option<String>,

    /// MIME type of the input (guessed from the extension by default)
    #[arg(long)]
    mime: Option<String>,

    /// Invoice date (YYYY-MM-DD), overrides the extracted one
    #[arg(long)]
    invoice_date: Option<String>,

    /// Invoice number, overrides the extracted one
    #[arg(long)]
    invoice_number: Option<String>,

    /// Provider name, overrides the extracted one
    #[arg(long)]
    provider: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary with the analysis report
    Text,
}

/// Success body printed for an ingested invoice.
#[derive(Serialize)]
struct SuccessResponse<'a> {
    success: bool,
    id: &'a str,
    fallback_used: bool,
    record: &'a InvoiceRecord,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb.set_message("Extracting and analyzing invoice...");

    let pipeline = IngestionPipeline::from_config(&config)?;
    let overrides = InvoiceOverrides {
        invoice_date: args.invoice_date.clone(),
        invoice_number: args.invoice_number.clone(),
        provider: args.provider.clone(),
    };

    let result = ingest_file(
        &pipeline,
        &config,
        &args.input,
        args.mime.as_deref(),
        args.user.as_deref(),
        &overrides,
    )
    .await;

    pb.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            println!("{}", serde_json::to_string(&e.to_response())?);
            anyhow::bail!("Ingestion failed with status {}: {}", e.status(), e);
        }
    };

    if outcome.fallback_used {
        eprintln!(
            "{} Emissions could not be calculated, simulated values were stored",
            style("⚠").yellow()
        );
    }

    let output = format_outcome(&outcome, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Accept `input` as an upload and run it through the pipeline.
pub async fn ingest_file(
    pipeline: &IngestionPipeline,
    config: &EcotrackConfig,
    input: &Path,
    mime: Option<&str>,
    user: Option<&str>,
    overrides: &InvoiceOverrides,
) -> Result<IngestOutcome, PipelineError> {
    let upload = UploadedFile::accept(
        input,
        &config.storage.upload_dir,
        mime,
        config.storage.max_upload_bytes,
    )?;
    pipeline.ingest(upload, user, overrides).await
}

fn format_outcome(outcome: &IngestOutcome, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&SuccessResponse {
            success: true,
            id: &outcome.id,
            fallback_used: outcome.fallback_used,
            record: &outcome.record,
        })?),
        OutputFormat::Text => Ok(format!(
            "{}\n{}",
            render_summary(&outcome.id, &outcome.record),
            outcome.record.analysis
        )),
    }
}

//! Records command - inspect stored invoice records.

use clap::{Args, Subcommand};
use console::style;

use ecotrack_core::error::StoreError;
use ecotrack_core::report::{render_row, render_summary};
use ecotrack_core::JsonFileStore;

use super::load_config;
use super::process::OutputFormat;

/// Arguments for the records command.
#[derive(Args)]
pub struct RecordsArgs {
    #[command(subcommand)]
    command: RecordsCommand,
}

#[derive(Subcommand)]
enum RecordsCommand {
    /// List stored records, newest first
    List {
        /// Only records uploaded by this user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show a single record
    Show {
        /// Record id
        id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
}

pub async fn run(args: RecordsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = JsonFileStore::new(config.storage.record_dir.clone());

    match args.command {
        RecordsCommand::List { user } => list_records(&store, user.as_deref()).await,
        RecordsCommand::Show { id, format } => show_record(&store, &id, format).await,
    }
}

async fn list_records(store: &JsonFileStore, user: Option<&str>) -> anyhow::Result<()> {
    let records: Vec<_> = store
        .list()
        .await?
        .into_iter()
        .filter(|r| user.is_none_or(|u| r.record.user_id == u))
        .collect();

    if records.is_empty() {
        println!(
            "{} No records found in {}",
            style("ℹ").blue(),
            store.dir().display()
        );
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "{:<36}  {:<10}  {:<24}  {:<12}  {:>10}",
            "ID", "DATE", "PROVIDER", "TYPE", "KG CO2"
        ))
        .bold()
    );
    for stored in &records {
        println!("{}", render_row(&stored.id, &stored.record));
    }

    let total: f64 = records.iter().map(|r| r.record.emissions).sum();
    println!();
    println!("{} records, {:.3} kg CO2 in total", records.len(), total);

    Ok(())
}

async fn show_record(store: &JsonFileStore, id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let stored = match store.load(id).await {
        Ok(stored) => stored,
        Err(StoreError::NotFound(_)) => anyhow::bail!("No record with id {}", id),
        Err(e) => return Err(e.into()),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stored)?),
        OutputFormat::Text => {
            println!("{}", render_summary(&stored.id, &stored.record));
            println!("{}", stored.record.analysis);
        }
    }

    Ok(())
}

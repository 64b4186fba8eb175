//! `harvest` command-line entry point.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use harvest_app::commands::{export, records, scrape};
use harvest_app::{init_tracing, AppState};
use harvest_core::AppConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Acquire web pages into a deduplicated record store")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape now from a JSON request file (`-` for stdin)
    Scrape {
        #[arg(default_value = "-")]
        input: String,
    },

    /// Queue a JSON request for background scraping and wait for it
    Enqueue {
        #[arg(default_value = "-")]
        input: String,
    },

    /// List stored records, newest first
    List {
        #[command(flatten)]
        filters: FilterArgs,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Show one record
    Get { id: String },

    /// Delete one record
    Delete { id: String },

    /// Export records as json, jsonl or csv
    Export {
        format: String,

        #[command(flatten)]
        filters: FilterArgs,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// URL substring
    #[arg(long)]
    url: Option<String>,

    /// Only records acquired at or after this RFC 3339 time
    #[arg(long)]
    after: Option<DateTime<Utc>>,

    /// Only records acquired before this RFC 3339 time
    #[arg(long)]
    before: Option<DateTime<Utc>>,

    #[arg(long)]
    content_type: Option<String>,

    /// Only dynamically rendered (true) or statically fetched (false) records
    #[arg(long)]
    dynamic: Option<bool>,
}

impl FilterArgs {
    fn into_filters(self, page: Option<u32>, page_size: Option<u32>) -> records::RecordFilters {
        records::RecordFilters {
            url: self.url,
            after: self.after,
            before: self.before,
            content_type: self.content_type,
            is_dynamic: self.dynamic,
            page,
            page_size,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let state = AppState::initialize(config).await?;

    let outcome = run(&state, cli.command).await;
    state.shutdown().await;
    outcome
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path)?.with_env_overrides(),
        None => AppConfig::load_with_env()?,
    };
    config.validate()?;
    Ok(config)
}

async fn run(state: &AppState, command: Commands) -> Result<()> {
    match command {
        Commands::Scrape { input } => {
            let body = read_request(&input).await?;
            print_json(&scrape::scrape(state, &body).await?)
        }
        Commands::Enqueue { input } => {
            let body = read_request(&input).await?;
            let response = scrape::enqueue(state, &body).await?;
            print_json(&response)?;

            state.queue.wait_idle().await;
            let ids = match response {
                scrape::EnqueueResponse::Single { job_id } => vec![job_id],
                scrape::EnqueueResponse::Batch { job_ids } => job_ids,
            };
            for id in ids {
                print_json(&scrape::job_status(state, id.as_str()).await?)?;
            }
            Ok(())
        }
        Commands::List {
            filters,
            page,
            page_size,
        } => {
            let filters = filters.into_filters(page, page_size);
            print_json(&records::list_records(state, &filters).await?)
        }
        Commands::Get { id } => print_json(&records::get_record(state, &id).await?),
        Commands::Delete { id } => {
            records::delete_record(state, &id).await?;
            println!("Deleted {id}");
            Ok(())
        }
        Commands::Export {
            format,
            filters,
            output,
        } => {
            let filters = filters.into_filters(None, None);
            let rendered = export::export_records(state, &format, &filters).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, rendered)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!("Export written to {}", path.display());
                }
                None => print!("{rendered}"),
            }
            Ok(())
        }
    }
}

async fn read_request(input: &str) -> Result<serde_json::Value> {
    let raw = if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read request from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("failed to read {input}"))?
    };

    serde_json::from_str(&raw).context("request is not valid JSON")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

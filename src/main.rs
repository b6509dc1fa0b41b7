use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gavel::config::Config;

mod commands;
use commands::{failed, ingest};

#[derive(Parser)]
#[command(
    name = "gavel",
    version,
    about = "Parallel legislative bill ingestion engine",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a range of bills from the legislative data API
    Ingest {
        /// Offset into the bill listing
        #[arg(short, long, default_value = "0")]
        offset: u32,

        /// Number of bills to ingest
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Restrict to one congress (e.g. 118)
        #[arg(short, long)]
        congress: Option<u32>,

        /// Number of parallel workers (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// SQLite database path (overrides config)
        #[arg(long)]
        db: Option<PathBuf>,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List bills that exhausted retries with a permanent error
    Failed {
        /// SQLite database path
        #[arg(long, default_value = "data/bills.db")]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    tracing::info!("gavel bill ingestion engine starting");

    match cli.command {
        Commands::Ingest {
            offset,
            limit,
            congress,
            workers,
            db,
            config,
        } => {
            tracing::info!(
                offset = %offset,
                limit = %limit,
                congress = ?congress,
                workers = ?workers,
                "Starting ingest command"
            );
            let config = match config {
                Some(path) => Config::from_file(&path)?,
                None => Config::from_env()?,
            };
            ingest(config, offset, limit, congress, workers, db).await?;
        }

        Commands::Failed { db } => {
            tracing::info!(db = %db.display(), "Starting failed command");
            failed(db).await?;
        }
    }

    tracing::info!("gavel completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("gavel=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("gavel=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

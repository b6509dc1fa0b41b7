use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use gavel::client::backoff::{GovernorConfig, RateLimitGovernor};
use gavel::client::{CongressClient, LegislativeApi};
use gavel::config::Config;
use gavel::ingest::run_ingest;
use gavel::storage::create_sqlite_repository;

pub async fn ingest(
    mut config: Config,
    offset: u32,
    limit: u32,
    congress: Option<u32>,
    workers: Option<usize>,
    db: Option<PathBuf>,
) -> Result<()> {
    if let Some(workers) = workers {
        config.ingest.workers = workers;
    }
    if let Some(db) = db {
        config.database.sqlite_path = db;
    }
    config.validate()?;

    println!("Starting bill ingestion");
    println!("=======================");

    let repo = create_sqlite_repository(&config.database.sqlite_path)?;
    let client = Arc::new(CongressClient::new(
        &config.api.base_url,
        &config.api.api_key,
        config.api.requests_per_second,
        config.request_timeout(),
    )?);

    // Resolve the requested range into concrete bill references,
    // under the same retry discipline the workers use
    let mut governor = RateLimitGovernor::new(GovernorConfig {
        max_retries: config.ingest.max_retries,
        cooldown_threshold: config.ingest.cooldown_threshold,
        ..GovernorConfig::default()
    });
    let listing_client = Arc::clone(&client);
    let bills = governor
        .execute(|| {
            let client = Arc::clone(&listing_client);
            async move { client.list_bills(congress, offset, limit).await }
        })
        .await
        .context("Failed to list bills in the requested range")?;

    if bills.is_empty() {
        println!("No bills found in the requested range");
        return Ok(());
    }
    println!(
        "Resolved {} bills, ingesting with {} workers",
        bills.len(),
        config.ingest.workers
    );

    let report = run_ingest(client, repo, &config.ingest, bills).await?;

    println!();
    println!("Ingestion summary");
    println!("  processed:      {}", report.processed);
    println!("  succeeded:      {}", report.succeeded);
    println!("  failed:         {}", report.failed);
    println!("  deferred:       {}", report.deferred);
    println!("  text extracted: {}", report.text_extracted);
    println!("  cooldowns:      {}", report.cooldowns);

    Ok(())
}

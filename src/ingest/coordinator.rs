//! Worker pool coordinator
//!
//! Spawns N isolated workers over partitioned batches and aggregates
//! their one-way progress messages into a run report. Workers share
//! nothing mutable; the channel is their only link back here.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::client::LegislativeApi;
use crate::config::IngestConfig;
use crate::ingest::partition::partition;
use crate::ingest::worker::IngestWorker;
use crate::models::{BillOutcome, BillReference, ProgressMessage};
use crate::storage::repository::BillRepository;
use crate::storage::writer::PersistenceWriter;

/// Aggregated counters for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Terminal outcomes observed (saved + failed)
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Bills deferred to a retry queue at least once
    pub deferred: usize,
    /// Saved bills that carried resolved full text
    pub text_extracted: usize,
    /// Circuit-breaker cooldowns entered across all workers
    pub cooldowns: usize,
}

/// Run the full ingestion job over the given bill references.
///
/// Completes when every worker has reported done. A worker that
/// panics is logged as fatal for its batch; the remaining workers are
/// unaffected.
pub async fn run_ingest<C>(
    client: Arc<C>,
    repo: Arc<dyn BillRepository>,
    config: &IngestConfig,
    bills: Vec<BillReference>,
) -> Result<IngestReport>
where
    C: LegislativeApi + ?Sized + 'static,
{
    let total = bills.len();
    let batches = partition(bills, config.workers);
    info!(
        bills = total,
        workers = batches.len(),
        "Starting ingestion run"
    );

    let (tx, mut rx) = mpsc::channel::<ProgressMessage>(64);

    let mut handles = Vec::with_capacity(batches.len());
    for (index, batch) in batches.into_iter().enumerate() {
        let worker = IngestWorker::new(
            index,
            batch,
            Arc::clone(&client),
            PersistenceWriter::new(Arc::clone(&repo)),
            config.clone(),
            tx.clone(),
        );
        handles.push(tokio::spawn(worker.run()));
    }
    // Workers hold the remaining senders; the channel closes once the
    // last one finishes.
    drop(tx);

    let mut report = IngestReport::default();
    let mut done = 0usize;
    while let Some(message) = rx.recv().await {
        match message {
            ProgressMessage::Progress {
                worker,
                bill,
                outcome,
            } => {
                report.processed += 1;
                match outcome {
                    BillOutcome::Saved {
                        status, has_text, ..
                    } => {
                        report.succeeded += 1;
                        if has_text {
                            report.text_extracted += 1;
                        }
                        info!(worker, bill = %bill, status = %status, has_text, "Bill saved");
                    }
                    BillOutcome::Failed { error } => {
                        report.failed += 1;
                        warn!(worker, bill = %bill, error = %error, "Bill failed");
                    }
                }
            }
            ProgressMessage::RateLimited { worker, bill, .. } => {
                report.deferred += 1;
                info!(worker, bill = %bill, "Bill deferred to retry queue");
            }
            ProgressMessage::RateLimitCooldown {
                worker,
                cooldown_ms,
            } => {
                report.cooldowns += 1;
                warn!(worker, cooldown_ms, "Worker entered rate-limit cooldown");
            }
            ProgressMessage::RetryingBills { worker, count } => {
                info!(worker, count, "Worker retrying deferred bills");
            }
            ProgressMessage::Done { worker } => {
                done += 1;
                info!(worker, "Worker reported done");
            }
        }
    }

    for (index, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            error!(worker = index, error = %e, "Worker terminated abnormally; its batch is incomplete");
        }
    }

    info!(
        processed = report.processed,
        succeeded = report.succeeded,
        failed = report.failed,
        deferred = report.deferred,
        text_extracted = report.text_extracted,
        done_workers = done,
        "Ingestion run complete"
    );

    Ok(report)
}

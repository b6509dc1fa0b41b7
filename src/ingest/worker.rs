//! Sequential per-worker bill processing
//!
//! Each worker owns an immutable batch and walks it strictly one bill
//! at a time: fetch detail, resolve text, classify, persist, report.
//! Rate-limit exhaustion defers the bill to the worker's retry queue;
//! the queue is replayed once after the primary pass, behind a fixed
//! cooldown and with slower pacing. A bill that is rate limited again
//! in the retry pass is recorded as failed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::backoff::{GovernorConfig, RateLimitGovernor};
use crate::client::{BillDetail, LegislativeApi};
use crate::config::IngestConfig;
use crate::models::{BillOutcome, BillRecord, BillReference, ProgressMessage};
use crate::status;
use crate::storage::writer::PersistenceWriter;
use crate::text::{self, ResolvedText};

/// Stage a bill is in, for log context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BillPhase {
    Fetching,
    TextResolving,
    Classifying,
    Persisting,
}

/// Why a bill did not reach a saved outcome in the current pass
enum BillError {
    /// Rate-limit budget exhausted; defer to the retry queue
    Deferred { retry_after_ms: Option<u64> },
    /// Terminal error for this bill
    Permanent(String),
}

pub struct IngestWorker<C: LegislativeApi + ?Sized> {
    index: usize,
    batch: Vec<BillReference>,
    client: Arc<C>,
    writer: PersistenceWriter,
    config: IngestConfig,
    tx: mpsc::Sender<ProgressMessage>,
    governor: RateLimitGovernor,
    retry_queue: VecDeque<BillReference>,
}

impl<C: LegislativeApi + ?Sized> IngestWorker<C> {
    pub fn new(
        index: usize,
        batch: Vec<BillReference>,
        client: Arc<C>,
        writer: PersistenceWriter,
        config: IngestConfig,
        tx: mpsc::Sender<ProgressMessage>,
    ) -> Self {
        let governor_config = GovernorConfig {
            max_retries: config.max_retries,
            cooldown_threshold: config.cooldown_threshold,
            ..GovernorConfig::default()
        };
        let governor = RateLimitGovernor::new(governor_config).with_notifier(index, tx.clone());

        Self {
            index,
            batch,
            client,
            writer,
            config,
            tx,
            governor,
            retry_queue: VecDeque::new(),
        }
    }

    /// Process the primary batch, then replay the retry queue, then
    /// signal completion. Consumes the worker.
    pub async fn run(mut self) {
        let batch = std::mem::take(&mut self.batch);
        info!(worker = self.index, bills = batch.len(), "Worker starting");

        for (i, bill) in batch.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.pacing_ms)).await;
            }
            self.process_and_report(bill, true).await;
        }

        self.run_retry_pass().await;

        let _ = self
            .tx
            .send(ProgressMessage::Done { worker: self.index })
            .await;
        info!(worker = self.index, "Worker done");
    }

    /// Replay deferred bills once, after a fixed cooldown, with the
    /// slower retry pacing
    async fn run_retry_pass(&mut self) {
        if self.retry_queue.is_empty() {
            return;
        }

        let count = self.retry_queue.len();
        let _ = self
            .tx
            .send(ProgressMessage::RetryingBills {
                worker: self.index,
                count,
            })
            .await;
        info!(worker = self.index, count, "Starting retry pass");

        tokio::time::sleep(Duration::from_millis(self.config.retry_cooldown_ms)).await;

        let mut first = true;
        while let Some(bill) = self.retry_queue.pop_front() {
            if !first {
                tokio::time::sleep(Duration::from_millis(self.config.retry_pacing_ms)).await;
            }
            first = false;
            self.process_and_report(bill, false).await;
        }
    }

    async fn process_and_report(&mut self, bill: BillReference, defer_on_limit: bool) {
        match self.process_bill(&bill).await {
            Ok(outcome) => {
                let _ = self
                    .tx
                    .send(ProgressMessage::Progress {
                        worker: self.index,
                        bill,
                        outcome,
                    })
                    .await;
            }
            Err(BillError::Deferred { retry_after_ms }) if defer_on_limit => {
                debug!(worker = self.index, bill = %bill, "Deferring rate-limited bill");
                self.retry_queue.push_back(bill);
                let _ = self
                    .tx
                    .send(ProgressMessage::RateLimited {
                        worker: self.index,
                        bill,
                        retry_after_ms,
                    })
                    .await;
            }
            Err(err) => {
                let message = match err {
                    BillError::Deferred { .. } => {
                        "rate limited again during retry pass".to_string()
                    }
                    BillError::Permanent(m) => m,
                };
                warn!(worker = self.index, bill = %bill, error = %message, "Bill failed");
                self.record_failure(&bill, &message);
                let _ = self
                    .tx
                    .send(ProgressMessage::Progress {
                        worker: self.index,
                        bill,
                        outcome: BillOutcome::Failed { error: message },
                    })
                    .await;
            }
        }
    }

    /// Walk one bill through fetch, text resolution, classification
    /// and persistence
    async fn process_bill(&mut self, bill: &BillReference) -> Result<BillOutcome, BillError> {
        debug!(worker = self.index, bill = %bill, phase = ?BillPhase::Fetching, "Processing");
        let detail = self.fetch_detail(bill).await?;

        debug!(worker = self.index, bill = %bill, phase = ?BillPhase::TextResolving, "Processing");
        let resolved = self.resolve_text(bill).await?;

        debug!(worker = self.index, bill = %bill, phase = ?BillPhase::Classifying, "Processing");
        let latest_action_text = detail
            .latest_action
            .as_ref()
            .and_then(|a| a.text.as_deref());
        let classified = status::classify(latest_action_text, detail.has_actions(), &detail.laws);

        debug!(worker = self.index, bill = %bill, phase = ?BillPhase::Persisting, "Processing");
        let record = build_record(bill, &detail, &resolved, classified);
        let has_text = record.has_full_text;
        let text_source = record.text_source;

        self.writer
            .persist(&record)
            .map_err(|e| BillError::Permanent(format!("persistence failed: {e}")))?;

        Ok(BillOutcome::Saved {
            status: classified,
            has_text,
            text_source,
        })
    }

    async fn fetch_detail(&mut self, bill: &BillReference) -> Result<BillDetail, BillError> {
        let client = Arc::clone(&self.client);
        let reference = *bill;
        self.governor
            .execute(|| {
                let client = Arc::clone(&client);
                async move { client.bill_detail(&reference).await }
            })
            .await
            .map_err(classify_bill_error)
    }

    /// Resolve full text through the format chain. A failure to list
    /// the available versions degrades to a textless record unless it
    /// was rate limiting, which defers the bill.
    async fn resolve_text(&mut self, bill: &BillReference) -> Result<ResolvedText, BillError> {
        let client = Arc::clone(&self.client);
        let reference = *bill;
        let versions = match self
            .governor
            .execute(|| {
                let client = Arc::clone(&client);
                async move { client.text_versions(&reference).await }
            })
            .await
        {
            Ok(versions) => versions,
            Err(e) if e.is_rate_limited() => return Err(classify_bill_error(e)),
            Err(e) => {
                warn!(worker = self.index, bill = %bill, error = %e, "Text version listing failed");
                Vec::new()
            }
        };

        text::resolve_text(&self.client, &mut self.governor, &versions)
            .await
            .map_err(classify_bill_error)
    }

    /// Best-effort bookkeeping for a terminally failed bill
    fn record_failure(&self, bill: &BillReference, error: &str) {
        if let Err(e) = self.writer.repo().record_failed_bill(bill, error) {
            warn!(worker = self.index, bill = %bill, error = %e, "Failed-bill record write failed");
        }
    }
}

fn classify_bill_error(e: crate::error::FetchError) -> BillError {
    match e {
        crate::error::FetchError::RateLimited { retry_after_ms } => {
            BillError::Deferred { retry_after_ms }
        }
        other => BillError::Permanent(other.to_string()),
    }
}

/// Assemble the persisted record from the detail payload, the
/// resolved text and the classified status
fn build_record(
    bill: &BillReference,
    detail: &BillDetail,
    resolved: &ResolvedText,
    classified: crate::models::BillStatus,
) -> BillRecord {
    let latest_action_text = detail.latest_action.as_ref().and_then(|a| a.text.clone());
    let committee = latest_action_text
        .as_deref()
        .and_then(status::committee_from_action);

    BillRecord {
        id: bill.bill_id(),
        bill_number: bill.number,
        congress: bill.congress,
        bill_type: bill.bill_type,
        title: detail.title.clone().unwrap_or_else(|| bill.to_string()),
        introduction_date: detail.introduced_date,
        status: classified,
        sponsors: detail
            .sponsors
            .iter()
            .filter_map(|s| s.display_name())
            .collect(),
        committee,
        full_text: resolved.text.clone(),
        has_full_text: resolved.text.is_some(),
        text_source: resolved.source,
        origin_chamber: detail.origin_chamber.clone(),
        origin_chamber_code: detail.origin_chamber_code.clone(),
        latest_action_date: detail.latest_action.as_ref().and_then(|a| a.action_date),
        latest_action_text,
        constitutional_authority_text: detail.constitutional_authority_statement_text.clone(),
        policy_area: detail.policy_area.as_ref().and_then(|p| p.name.clone()),
        subjects: Vec::new(),
        summary: None,
        cbo_cost_estimates: detail.cbo_cost_estimates.clone(),
        laws: detail.laws.clone(),
        committees_count: detail.committees.as_ref().map(|c| c.count).unwrap_or(0),
        cosponsors_count: detail.cosponsors.as_ref().map(|c| c.count).unwrap_or(0),
        withdrawn_cosponsors_count: detail
            .cosponsors
            .as_ref()
            .map(|c| c.count_including_withdrawn_cosponsors.saturating_sub(c.count))
            .unwrap_or(0),
        actions_count: detail.actions.as_ref().map(|a| a.count).unwrap_or(0),
        update_date: detail.update_date,
        update_date_including_text: detail.update_date_including_text,
        pdf_url: resolved.pdf_url.clone(),
    }
}

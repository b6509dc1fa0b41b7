//! History-tracking persistence writer
//!
//! Sits between the workers and the repository. Every persisted bill
//! goes through a single upsert keyed by the deterministic bill id;
//! the returned previous status drives the append-only history trail.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, warn};

use crate::models::{BillRecord, BillStatus, BillStatusHistoryEntry};
use crate::storage::repository::BillRepository;

/// Result of persisting one bill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Status stored before this write, if the bill already existed
    pub previous: Option<BillStatus>,
    /// Whether a history row was due (new bill or status change)
    pub status_changed: bool,
}

/// Writes bill records and maintains their status history
pub struct PersistenceWriter {
    repo: Arc<dyn BillRepository>,
}

impl PersistenceWriter {
    pub fn new(repo: Arc<dyn BillRepository>) -> Self {
        Self { repo }
    }

    /// Direct access to the underlying repository
    pub fn repo(&self) -> &Arc<dyn BillRepository> {
        &self.repo
    }

    /// Upsert the record, then append a history row when the status
    /// differs from the stored one or no prior row existed.
    ///
    /// The history append is best-effort: the bill upsert is already
    /// committed, so a failed append is logged and swallowed rather
    /// than rolled back.
    pub fn persist(&self, record: &BillRecord) -> Result<PersistOutcome> {
        let previous = self.repo.upsert_bill(record)?;
        let status_changed = previous != Some(record.status);

        if status_changed {
            let changed_at = record
                .latest_action_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
                .unwrap_or_else(Utc::now);

            let entry = BillStatusHistoryEntry {
                bill_id: record.id,
                status: record.status,
                changed_at,
                action_text: record.latest_action_text.clone(),
            };

            if let Err(e) = self.repo.insert_history(&entry) {
                warn!(bill = %record.reference(), error = %e, "Status history append failed");
            } else {
                debug!(
                    bill = %record.reference(),
                    previous = ?previous,
                    status = %record.status,
                    "Status history appended"
                );
            }
        }

        Ok(PersistOutcome {
            previous,
            status_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillReference, BillType, TextSource};
    use crate::storage::repository::MockBillRepository;
    use chrono::NaiveDate;

    fn record(number: u32, status: BillStatus) -> BillRecord {
        let reference = BillReference::new(118, BillType::Hr, number);
        BillRecord {
            id: reference.bill_id(),
            bill_number: number,
            congress: 118,
            bill_type: BillType::Hr,
            title: "Test".to_string(),
            introduction_date: None,
            status,
            sponsors: vec![],
            committee: None,
            full_text: None,
            has_full_text: false,
            text_source: None,
            origin_chamber: None,
            origin_chamber_code: None,
            latest_action_date: Some(NaiveDate::from_ymd_opt(2023, 3, 15).unwrap()),
            latest_action_text: Some("Some action.".to_string()),
            constitutional_authority_text: None,
            policy_area: None,
            subjects: vec![],
            summary: None,
            cbo_cost_estimates: vec![],
            laws: vec![],
            committees_count: 0,
            cosponsors_count: 0,
            withdrawn_cosponsors_count: 0,
            actions_count: 1,
            update_date: None,
            update_date_including_text: None,
            pdf_url: None,
        }
    }

    #[test]
    fn test_new_bill_gets_history_row() {
        let repo = Arc::new(MockBillRepository::new());
        let writer = PersistenceWriter::new(repo.clone());

        let outcome = writer.persist(&record(1, BillStatus::Introduced)).unwrap();
        assert_eq!(outcome.previous, None);
        assert!(outcome.status_changed);
        assert_eq!(repo.history_len(), 1);
    }

    #[test]
    fn test_unchanged_status_appends_nothing() {
        let repo = Arc::new(MockBillRepository::new());
        let writer = PersistenceWriter::new(repo.clone());

        writer.persist(&record(1, BillStatus::Introduced)).unwrap();
        let outcome = writer.persist(&record(1, BillStatus::Introduced)).unwrap();

        assert_eq!(outcome.previous, Some(BillStatus::Introduced));
        assert!(!outcome.status_changed);
        assert_eq!(repo.history_len(), 1);
    }

    #[test]
    fn test_status_change_appends_history() {
        let repo = Arc::new(MockBillRepository::new());
        let writer = PersistenceWriter::new(repo.clone());

        writer.persist(&record(1, BillStatus::Introduced)).unwrap();
        let outcome = writer
            .persist(&record(1, BillStatus::PassedChamber))
            .unwrap();

        assert_eq!(outcome.previous, Some(BillStatus::Introduced));
        assert!(outcome.status_changed);

        let history = repo
            .history_for(&BillReference::new(118, BillType::Hr, 1).bill_id())
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].status, BillStatus::PassedChamber);
        // changedAt comes from the latest action date, pinned to midnight
        assert_eq!(
            history[1].changed_at.date_naive(),
            NaiveDate::from_ymd_opt(2023, 3, 15).unwrap()
        );
    }

    #[test]
    fn test_history_failure_does_not_fail_persist() {
        let repo = Arc::new(MockBillRepository::new());
        repo.fail_history
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let writer = PersistenceWriter::new(repo.clone());

        let outcome = writer.persist(&record(1, BillStatus::Introduced)).unwrap();
        assert!(outcome.status_changed);
        assert_eq!(repo.history_len(), 0);
        // The bill itself is committed
        assert_eq!(repo.count_bills().unwrap(), 1);
    }
}

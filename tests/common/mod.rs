//! Shared test helpers: a scripted API implementation with
//! per-bill failure budgets, plus small builders.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use gavel::client::{
    BillDetail, CountBlock, FormatLink, LatestAction, LegislativeApi, TextVersion,
};
use gavel::error::FetchError;
use gavel::models::{BillReference, BillType};

pub fn hr(congress: u32, number: u32) -> BillReference {
    BillReference::new(congress, BillType::Hr, number)
}

/// Detail payload for a bill that was referred to committee
pub fn referred_detail(bill: &BillReference) -> BillDetail {
    BillDetail {
        congress: bill.congress,
        bill_type: bill.bill_type.as_str().to_uppercase(),
        number: bill.number.to_string(),
        title: Some(format!("Test Bill {}", bill.number)),
        latest_action: Some(LatestAction {
            action_date: chrono::NaiveDate::from_ymd_opt(2023, 6, 1),
            text: Some("Referred to the Committee on the Judiciary.".to_string()),
        }),
        actions: Some(CountBlock { count: 2 }),
        ..Default::default()
    }
}

/// Scripted implementation of the API seam.
///
/// Each bill can be given a budget of 429 responses that its detail
/// endpoint serves before succeeding, or marked permanently failing.
/// Document fetches always return plain text.
pub struct ScriptedApi {
    rate_limit_budgets: Mutex<HashMap<BillReference, u32>>,
    permanent_failures: Vec<BillReference>,
    pub detail_calls: AtomicU32,
    pub document_calls: AtomicU32,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            rate_limit_budgets: Mutex::new(HashMap::new()),
            permanent_failures: Vec::new(),
            detail_calls: AtomicU32::new(0),
            document_calls: AtomicU32::new(0),
        }
    }

    /// Serve `count` 429s for this bill's detail endpoint before
    /// letting it succeed
    pub fn with_rate_limited(self, bill: BillReference, count: u32) -> Self {
        self.rate_limit_budgets.lock().unwrap().insert(bill, count);
        self
    }

    /// This bill's detail endpoint always returns 404
    pub fn with_permanent_failure(mut self, bill: BillReference) -> Self {
        self.permanent_failures.push(bill);
        self
    }
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LegislativeApi for ScriptedApi {
    async fn list_bills(
        &self,
        _congress: Option<u32>,
        _offset: u32,
        _limit: u32,
    ) -> Result<Vec<BillReference>, FetchError> {
        Ok(Vec::new())
    }

    async fn bill_detail(&self, bill: &BillReference) -> Result<BillDetail, FetchError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);

        if self.permanent_failures.contains(bill) {
            return Err(FetchError::Permanent(404));
        }

        let mut budgets = self.rate_limit_budgets.lock().unwrap();
        if let Some(remaining) = budgets.get_mut(bill) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::RateLimited {
                    retry_after_ms: None,
                });
            }
        }
        drop(budgets);

        Ok(referred_detail(bill))
    }

    async fn text_versions(&self, bill: &BillReference) -> Result<Vec<TextVersion>, FetchError> {
        Ok(vec![TextVersion {
            date: Some("2023-06-01T04:00:00Z".to_string()),
            version_type: Some("Introduced in House".to_string()),
            formats: vec![FormatLink {
                format_type: "Text".to_string(),
                url: format!("https://example.com/{bill}.txt"),
            }],
        }])
    }

    async fn fetch_document(&self, _url: &str) -> Result<String, FetchError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok("A BILL to test the ingestion engine.".to_string())
    }

    async fn fetch_binary(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Permanent(404))
    }
}

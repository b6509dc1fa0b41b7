// Core data structures for the gavel ingestion engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed namespace for deterministic bill ids. Identical
/// (congress, type, number) inputs always hash to the same id, which
/// is what makes the bill upsert idempotent without a pre-lookup.
const BILL_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c2b6e_9a4d_4c3e_8e5a_1b7d0c9f4a21);

/// Chamber-qualified bill type as used by the legislative data API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillType {
    Hr,
    S,
    Hjres,
    Sjres,
    Hconres,
    Sconres,
    Hres,
    Sres,
}

impl BillType {
    /// Get the lowercase API path segment
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hr => "hr",
            Self::S => "s",
            Self::Hjres => "hjres",
            Self::Sjres => "sjres",
            Self::Hconres => "hconres",
            Self::Sconres => "sconres",
            Self::Hres => "hres",
            Self::Sres => "sres",
        }
    }

    /// Parse from the API's type string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hr" => Some(Self::Hr),
            "s" => Some(Self::S),
            "hjres" => Some(Self::Hjres),
            "sjres" => Some(Self::Sjres),
            "hconres" => Some(Self::Hconres),
            "sconres" => Some(Self::Sconres),
            "hres" => Some(Self::Hres),
            "sres" => Some(Self::Sres),
            _ => None,
        }
    }

    /// Get all known bill types
    pub fn all() -> Vec<Self> {
        vec![
            Self::Hr,
            Self::S,
            Self::Hjres,
            Self::Sjres,
            Self::Hconres,
            Self::Sconres,
            Self::Hres,
            Self::Sres,
        ]
    }
}

impl std::fmt::Display for BillType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The unit of ingestion work: (congress, type, number).
/// Immutable once assigned to a worker batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillReference {
    pub congress: u32,
    pub bill_type: BillType,
    pub number: u32,
}

impl BillReference {
    pub fn new(congress: u32, bill_type: BillType, number: u32) -> Self {
        Self {
            congress,
            bill_type,
            number,
        }
    }

    /// Deterministic bill id: v5 UUID over the canonical
    /// "congress/type/number" string.
    pub fn bill_id(&self) -> Uuid {
        let name = format!("{}/{}/{}", self.congress, self.bill_type, self.number);
        Uuid::new_v5(&BILL_NAMESPACE, name.as_bytes())
    }
}

impl std::fmt::Display for BillReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}-{}", self.bill_type, self.number, self.congress)
    }
}

/// Canonical procedural status of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Introduced,
    ReferredToCommittee,
    ReportedByCommittee,
    PassedChamber,
    PassedBothChambers,
    PresentedToPresident,
    SignedIntoLaw,
    Vetoed,
    VetoOverridden,
    Failed,
}

impl BillStatus {
    /// Convert to the string stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Introduced => "introduced",
            Self::ReferredToCommittee => "referred_to_committee",
            Self::ReportedByCommittee => "reported_by_committee",
            Self::PassedChamber => "passed_chamber",
            Self::PassedBothChambers => "passed_both_chambers",
            Self::PresentedToPresident => "presented_to_president",
            Self::SignedIntoLaw => "signed_into_law",
            Self::Vetoed => "vetoed",
            Self::VetoOverridden => "veto_overridden",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for BillStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "referred_to_committee" => Self::ReferredToCommittee,
            "reported_by_committee" => Self::ReportedByCommittee,
            "passed_chamber" => Self::PassedChamber,
            "passed_both_chambers" => Self::PassedBothChambers,
            "presented_to_president" => Self::PresentedToPresident,
            "signed_into_law" => Self::SignedIntoLaw,
            "vetoed" => Self::Vetoed,
            "veto_overridden" => Self::VetoOverridden,
            "failed" => Self::Failed,
            _ => Self::Introduced,
        })
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provenance of the resolved full text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    /// Plain text, XML or HTML served by the API
    Api,
    /// Extracted from the PDF binary
    Pdf,
}

impl TextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Pdf => "pdf",
        }
    }
}

impl std::str::FromStr for TextSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "pdf" => Self::Pdf,
            _ => Self::Api,
        })
    }
}

/// A public/private law reference attached to an enacted bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LawReference {
    #[serde(rename = "type", default)]
    pub law_type: String,
    #[serde(default)]
    pub number: String,
}

/// CBO cost estimate metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CostEstimate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "pubDate", default)]
    pub pub_date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// The persisted bill entity. Owned by the persistence writer and
/// mutated only via upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillRecord {
    pub id: Uuid,
    pub bill_number: u32,
    pub congress: u32,
    pub bill_type: BillType,
    pub title: String,
    pub introduction_date: Option<NaiveDate>,
    pub status: BillStatus,
    pub sponsors: Vec<String>,
    pub committee: Option<String>,
    pub full_text: Option<String>,
    pub has_full_text: bool,
    pub text_source: Option<TextSource>,
    pub origin_chamber: Option<String>,
    pub origin_chamber_code: Option<String>,
    pub latest_action_date: Option<NaiveDate>,
    pub latest_action_text: Option<String>,
    pub constitutional_authority_text: Option<String>,
    pub policy_area: Option<String>,
    pub subjects: Vec<String>,
    pub summary: Option<String>,
    pub cbo_cost_estimates: Vec<CostEstimate>,
    pub laws: Vec<LawReference>,
    pub committees_count: u32,
    pub cosponsors_count: u32,
    pub withdrawn_cosponsors_count: u32,
    pub actions_count: u32,
    pub update_date: Option<DateTime<Utc>>,
    pub update_date_including_text: Option<DateTime<Utc>>,
    pub pdf_url: Option<String>,
}

impl BillRecord {
    pub fn reference(&self) -> BillReference {
        BillReference::new(self.congress, self.bill_type, self.bill_number)
    }
}

/// One row in the append-only status history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillStatusHistoryEntry {
    pub bill_id: Uuid,
    pub status: BillStatus,
    pub changed_at: DateTime<Utc>,
    pub action_text: Option<String>,
}

/// A bill that exhausted retries with a permanent error.
/// Distinct from the in-memory retry queue, which only holds
/// transient rate-limit deferrals within a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedBillRecord {
    pub congress: u32,
    pub bill_type: BillType,
    pub number: u32,
    pub error: String,
    pub retry_count: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_retry_at: DateTime<Utc>,
}

impl FailedBillRecord {
    pub fn reference(&self) -> BillReference {
        BillReference::new(self.congress, self.bill_type, self.number)
    }
}

/// Terminal per-bill outcome carried in a progress message
#[derive(Debug, Clone)]
pub enum BillOutcome {
    /// Bill fetched, classified and persisted
    Saved {
        status: BillStatus,
        has_text: bool,
        text_source: Option<TextSource>,
    },
    /// Permanent failure, bill recorded in failed_bills
    Failed { error: String },
}

impl BillOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// One-way message from a worker to the coordinator
#[derive(Debug, Clone)]
pub enum ProgressMessage {
    /// Terminal outcome for one bill
    Progress {
        worker: usize,
        bill: BillReference,
        outcome: BillOutcome,
    },
    /// Bill deferred to the worker's retry queue
    RateLimited {
        worker: usize,
        bill: BillReference,
        retry_after_ms: Option<u64>,
    },
    /// Worker entered circuit-breaker cooldown
    RateLimitCooldown { worker: usize, cooldown_ms: u64 },
    /// Worker is starting its retry pass
    RetryingBills { worker: usize, count: usize },
    /// Worker finished its batch (primary + retry passes)
    Done { worker: usize },
}

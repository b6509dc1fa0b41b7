//! Authenticated HTTP client for the legislative data API
//!
//! Every outbound call attaches the API-key credential and passes
//! through a client-side throttle. Responses are classified into the
//! transient/permanent taxonomy the governor retries on; the reactive
//! backoff itself lives in [`backoff`].

pub mod backoff;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{header::RETRY_AFTER, Client, Response, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::FetchError;
use crate::models::{BillReference, BillType, CostEstimate, LawReference};

// ============================================================================
// API payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct BillDetailEnvelope {
    bill: BillDetail,
}

/// Bill detail as returned by `GET /bill/{congress}/{type}/{number}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BillDetail {
    pub congress: u32,
    #[serde(rename = "type")]
    pub bill_type: String,
    pub number: String,
    pub title: Option<String>,
    pub introduced_date: Option<NaiveDate>,
    pub origin_chamber: Option<String>,
    pub origin_chamber_code: Option<String>,
    pub latest_action: Option<LatestAction>,
    pub laws: Vec<LawReference>,
    pub sponsors: Vec<Sponsor>,
    pub policy_area: Option<NamedItem>,
    pub committees: Option<CountBlock>,
    pub cosponsors: Option<CosponsorsBlock>,
    pub actions: Option<CountBlock>,
    pub constitutional_authority_statement_text: Option<String>,
    pub cbo_cost_estimates: Vec<CostEstimate>,
    pub update_date: Option<DateTime<Utc>>,
    pub update_date_including_text: Option<DateTime<Utc>>,
}

impl BillDetail {
    /// True when the API recorded at least one action for this bill
    pub fn has_actions(&self) -> bool {
        self.actions.as_ref().map(|a| a.count > 0).unwrap_or(false)
            || self.latest_action.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LatestAction {
    pub action_date: Option<NaiveDate>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sponsor {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
}

impl Sponsor {
    /// Display name, falling back to "First Last" when fullName is absent
    pub fn display_name(&self) -> Option<String> {
        if let Some(full) = &self.full_name {
            return Some(full.clone());
        }
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (None, Some(last)) => Some(last.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedItem {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountBlock {
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CosponsorsBlock {
    pub count: u32,
    pub count_including_withdrawn_cosponsors: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextVersionsEnvelope {
    #[serde(default)]
    text_versions: Vec<TextVersion>,
}

/// One entry of the text-version listing endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextVersion {
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub version_type: Option<String>,
    pub formats: Vec<FormatLink>,
}

/// A single downloadable format of a text version
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatLink {
    #[serde(rename = "type")]
    pub format_type: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct BillListEnvelope {
    #[serde(default)]
    bills: Vec<ListedBill>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ListedBill {
    congress: u32,
    #[serde(rename = "type")]
    bill_type: String,
    number: String,
}

// ============================================================================
// Trait seam
// ============================================================================

/// Outbound interface to the legislative data provider.
///
/// Workers and the text resolver depend on this trait rather than the
/// concrete client, so timing-sensitive tests can substitute a
/// scripted implementation.
#[async_trait]
pub trait LegislativeApi: Send + Sync {
    /// Resolve an (offset, limit) range into bill references
    async fn list_bills(
        &self,
        congress: Option<u32>,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<BillReference>, FetchError>;

    /// Fetch the full detail payload for one bill
    async fn bill_detail(&self, bill: &BillReference) -> Result<BillDetail, FetchError>;

    /// Fetch the available text-version formats for one bill
    async fn text_versions(&self, bill: &BillReference) -> Result<Vec<TextVersion>, FetchError>;

    /// Fetch a text/XML/HTML document body by format URL
    async fn fetch_document(&self, url: &str) -> Result<String, FetchError>;

    /// Fetch a binary (PDF) body by format URL
    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

// ============================================================================
// Congress.gov client
// ============================================================================

/// HTTP client for the congress.gov-shaped API
pub struct CongressClient {
    client: Client,

    /// Client-side throttle; awaited before every outbound request
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    api_key: String,
    base_url: String,
}

impl CongressClient {
    /// Create a new client
    pub fn new(
        base_url: &str,
        api_key: &str,
        requests_per_second: u32,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(1).unwrap());
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Issue one throttled, authenticated GET and classify the response
    async fn get(&self, url: &str, extra_query: &[(&str, String)]) -> Result<Response, FetchError> {
        self.rate_limiter.until_ready().await;

        let mut request = self
            .client
            .get(url)
            .query(&[("api_key", self.api_key.as_str()), ("format", "json")]);
        for (key, value) in extra_query {
            request = request.query(&[(*key, value.as_str())]);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        classify_status(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        extra_query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let response = self.get(url, extra_query).await?;
        let body = response.text().await.map_err(map_reqwest_error)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Map a reqwest transport error into the fetch taxonomy
fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(e)
    }
}

/// Classify a response status: 2xx passes through, 429/503 become
/// transient errors, other 4xx are permanent.
fn classify_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_ms = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            Err(FetchError::RateLimited { retry_after_ms })
        }
        StatusCode::SERVICE_UNAVAILABLE => Err(FetchError::ServiceUnavailable),
        s if s.is_server_error() => Err(FetchError::Server(s.as_u16())),
        s => Err(FetchError::Permanent(s.as_u16())),
    }
}

#[async_trait]
impl LegislativeApi for CongressClient {
    async fn list_bills(
        &self,
        congress: Option<u32>,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<BillReference>, FetchError> {
        let url = match congress {
            Some(c) => format!("{}/bill/{c}", self.base_url),
            None => format!("{}/bill", self.base_url),
        };

        let envelope: BillListEnvelope = self
            .get_json(
                &url,
                &[("offset", offset.to_string()), ("limit", limit.to_string())],
            )
            .await?;

        let mut references = Vec::with_capacity(envelope.bills.len());
        for listed in envelope.bills {
            let Some(bill_type) = BillType::parse(&listed.bill_type) else {
                tracing::warn!(bill_type = %listed.bill_type, "Skipping bill with unknown type");
                continue;
            };
            let Ok(number) = listed.number.parse::<u32>() else {
                tracing::warn!(number = %listed.number, "Skipping bill with non-numeric number");
                continue;
            };
            references.push(BillReference::new(listed.congress, bill_type, number));
        }

        Ok(references)
    }

    async fn bill_detail(&self, bill: &BillReference) -> Result<BillDetail, FetchError> {
        let url = format!(
            "{}/bill/{}/{}/{}",
            self.base_url, bill.congress, bill.bill_type, bill.number
        );
        let envelope: BillDetailEnvelope = self.get_json(&url, &[]).await?;
        Ok(envelope.bill)
    }

    async fn text_versions(&self, bill: &BillReference) -> Result<Vec<TextVersion>, FetchError> {
        let url = format!(
            "{}/bill/{}/{}/{}/text",
            self.base_url, bill.congress, bill.bill_type, bill.number
        );
        let envelope: TextVersionsEnvelope = self.get_json(&url, &[]).await?;
        Ok(envelope.text_versions)
    }

    async fn fetch_document(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url, &[]).await?;
        response.text().await.map_err(map_reqwest_error)
    }

    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url, &[]).await?;
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = CongressClient::new(
            "https://api.congress.gov/v3",
            "test-key",
            2,
            Duration::from_secs(10),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = CongressClient::new(
            "https://api.congress.gov/v3/",
            "k",
            1,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://api.congress.gov/v3");
    }

    #[test]
    fn test_bill_detail_parses_minimal_payload() {
        let json = r#"{
            "bill": {
                "congress": 118,
                "type": "HR",
                "number": "3076",
                "title": "Postal Service Reform Act",
                "introducedDate": "2023-05-11",
                "originChamber": "House",
                "originChamberCode": "H",
                "latestAction": {
                    "actionDate": "2023-06-01",
                    "text": "Referred to the Committee on Oversight."
                },
                "actions": {"count": 4},
                "cosponsors": {"count": 12, "countIncludingWithdrawnCosponsors": 13},
                "policyArea": {"name": "Government Operations"}
            }
        }"#;

        let envelope: BillDetailEnvelope = serde_json::from_str(json).unwrap();
        let bill = envelope.bill;
        assert_eq!(bill.congress, 118);
        assert_eq!(bill.number, "3076");
        assert!(bill.has_actions());
        assert_eq!(
            bill.cosponsors.as_ref().unwrap().count_including_withdrawn_cosponsors,
            13
        );
        assert_eq!(
            bill.policy_area.unwrap().name.as_deref(),
            Some("Government Operations")
        );
    }

    #[test]
    fn test_bill_detail_defaults_on_sparse_payload() {
        let json = r#"{"bill": {"congress": 117, "type": "S", "number": "1"}}"#;
        let envelope: BillDetailEnvelope = serde_json::from_str(json).unwrap();
        let bill = envelope.bill;
        assert!(bill.laws.is_empty());
        assert!(bill.sponsors.is_empty());
        assert!(!bill.has_actions());
    }

    #[test]
    fn test_text_versions_parse() {
        let json = r#"{
            "textVersions": [
                {
                    "date": "2023-06-01T04:00:00Z",
                    "type": "Engrossed in House",
                    "formats": [
                        {"type": "Formatted XML", "url": "https://example.com/bill.xml"},
                        {"type": "PDF", "url": "https://example.com/bill.pdf"}
                    ]
                }
            ]
        }"#;

        let envelope: TextVersionsEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.text_versions.len(), 1);
        assert_eq!(envelope.text_versions[0].formats.len(), 2);
        assert_eq!(envelope.text_versions[0].formats[0].format_type, "Formatted XML");
    }

    #[test]
    fn test_sponsor_display_name_fallback() {
        let full = Sponsor {
            full_name: Some("Rep. Doe, Jane [D-CA-12]".into()),
            ..Default::default()
        };
        assert_eq!(full.display_name().as_deref(), Some("Rep. Doe, Jane [D-CA-12]"));

        let parts = Sponsor {
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            ..Default::default()
        };
        assert_eq!(parts.display_name().as_deref(), Some("Jane Doe"));

        assert_eq!(Sponsor::default().display_name(), None);
    }
}

//! Cascading bill text resolution
//!
//! Full text is resolved through an ordered chain of format
//! extractors: plain text, formatted XML, rendered HTML, then the PDF
//! binary. The chain stops at the first format that yields non-empty
//! text; per-format failures cascade to the next entry. When every
//! format fails or none is offered, the result is a degraded record
//! (no text, no source) that still preserves the PDF URL.

use scraper::Html;
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::client::backoff::RateLimitGovernor;
use crate::client::{FormatLink, LegislativeApi, TextVersion};
use crate::error::{ExtractError, FetchError};
use crate::models::TextSource;

/// Result of the resolution chain. `text == None` is a degraded
/// outcome, not a failure.
#[derive(Debug, Clone, Default)]
pub struct ResolvedText {
    pub text: Option<String>,
    pub source: Option<TextSource>,
    pub pdf_url: Option<String>,
}

/// Format kinds in strict fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatKind {
    PlainText,
    Xml,
    Html,
    Pdf,
}

impl FormatKind {
    fn from_api(format_type: &str) -> Option<Self> {
        match format_type {
            "Text" => Some(Self::PlainText),
            "Formatted XML" => Some(Self::Xml),
            "Formatted Text" => Some(Self::Html),
            "PDF" => Some(Self::Pdf),
            _ => None,
        }
    }

    fn source(self) -> TextSource {
        match self {
            Self::Pdf => TextSource::Pdf,
            _ => TextSource::Api,
        }
    }
}

/// Pick the candidate format URLs from the most recent text version.
/// Returns (ordered candidates, pdf url if offered).
fn candidate_formats(versions: &[TextVersion]) -> (Vec<(FormatKind, String)>, Option<String>) {
    // The listing is newest-first; the first version with any formats
    // is the one to extract from.
    let Some(version) = versions.iter().find(|v| !v.formats.is_empty()) else {
        return (Vec::new(), None);
    };

    let find = |kind: FormatKind| -> Option<&FormatLink> {
        version
            .formats
            .iter()
            .find(|f| FormatKind::from_api(&f.format_type) == Some(kind))
    };

    let pdf_url = find(FormatKind::Pdf).map(|f| f.url.clone());

    let mut candidates = Vec::new();
    for kind in [
        FormatKind::PlainText,
        FormatKind::Xml,
        FormatKind::Html,
        FormatKind::Pdf,
    ] {
        if let Some(link) = find(kind) {
            candidates.push((kind, link.url.clone()));
        }
    }

    (candidates, pdf_url)
}

/// Resolve bill text by walking the format chain.
///
/// Rate-limit exhaustion while fetching a format bubbles up so the
/// caller can defer the whole bill; any other per-format error is
/// logged and the chain moves on.
pub async fn resolve_text<C>(
    client: &Arc<C>,
    governor: &mut RateLimitGovernor,
    versions: &[TextVersion],
) -> Result<ResolvedText, FetchError>
where
    C: LegislativeApi + ?Sized,
{
    let (candidates, pdf_url) = candidate_formats(versions);

    for (kind, url) in candidates {
        match extract_format(client, governor, kind, &url).await {
            Ok(text) => {
                debug!(format = ?kind, chars = text.len(), "Resolved bill text");
                return Ok(ResolvedText {
                    text: Some(text),
                    source: Some(kind.source()),
                    pdf_url,
                });
            }
            Err(ChainError::RateLimited(e)) => return Err(e),
            Err(ChainError::Extract(e)) => {
                warn!(format = ?kind, url = %url, error = %e, "Format extraction failed, falling back");
            }
        }
    }

    Ok(ResolvedText {
        text: None,
        source: None,
        pdf_url,
    })
}

/// Distinguishes the one error class that must abort the chain
enum ChainError {
    RateLimited(FetchError),
    Extract(ExtractError),
}

async fn extract_format<C>(
    client: &Arc<C>,
    governor: &mut RateLimitGovernor,
    kind: FormatKind,
    url: &str,
) -> Result<String, ChainError>
where
    C: LegislativeApi + ?Sized,
{
    let text = if kind == FormatKind::Pdf {
        let bytes = fetch_binary(client, governor, url).await?;
        extract_pdf_text(&bytes).map_err(ChainError::Extract)?
    } else {
        let body = fetch_document(client, governor, url).await?;
        match kind {
            FormatKind::PlainText => body,
            FormatKind::Xml => clean_xml(&body),
            FormatKind::Html => clean_html(&body),
            FormatKind::Pdf => unreachable!(),
        }
    };

    if text.trim().is_empty() {
        return Err(ChainError::Extract(ExtractError::Empty));
    }
    Ok(text)
}

async fn fetch_document<C>(
    client: &Arc<C>,
    governor: &mut RateLimitGovernor,
    url: &str,
) -> Result<String, ChainError>
where
    C: LegislativeApi + ?Sized,
{
    let client = Arc::clone(client);
    let url = url.to_string();
    governor
        .execute(|| {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move { client.fetch_document(&url).await }
        })
        .await
        .map_err(classify_chain_error)
}

async fn fetch_binary<C>(
    client: &Arc<C>,
    governor: &mut RateLimitGovernor,
    url: &str,
) -> Result<Vec<u8>, ChainError>
where
    C: LegislativeApi + ?Sized,
{
    let client = Arc::clone(client);
    let url = url.to_string();
    governor
        .execute(|| {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move { client.fetch_binary(&url).await }
        })
        .await
        .map_err(classify_chain_error)
}

fn classify_chain_error(e: FetchError) -> ChainError {
    if e.is_rate_limited() {
        ChainError::RateLimited(e)
    } else {
        ChainError::Extract(ExtractError::Fetch(e.to_string()))
    }
}

// ============================================================================
// Cleanup helpers
// ============================================================================

/// Collapse all whitespace runs to single spaces and trim
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tag_regex() -> &'static regex::Regex {
    static TAG_RE: OnceLock<regex::Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| regex::Regex::new(r"<[^>]+>").expect("static tag regex is valid"))
}

fn script_style_regex() -> &'static regex::Regex {
    static SCRIPT_RE: OnceLock<regex::Regex> = OnceLock::new();
    SCRIPT_RE.get_or_init(|| {
        regex::Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>")
            .expect("static script/style regex is valid")
    })
}

/// Structured XML: strip tags, decode common entities, collapse
pub fn clean_xml(raw: &str) -> String {
    let stripped = tag_regex().replace_all(raw, " ");
    let decoded = html_escape::decode_html_entities(stripped.as_ref()).into_owned();
    collapse_whitespace(&decoded)
}

/// Rendered HTML: drop script/style blocks, take the document's text
/// nodes, collapse whitespace
pub fn clean_html(raw: &str) -> String {
    let stripped = script_style_regex().replace_all(raw, " ");
    let document = Html::parse_document(&stripped);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// PDF binary: extract page by page; text items within a page are
/// joined with single spaces, pages with a newline.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut pages = Vec::new();
    for (page_number, _) in document.get_pages() {
        match document.extract_text(&[page_number]) {
            Ok(page_text) => {
                let collapsed = collapse_whitespace(&page_text);
                if !collapsed.is_empty() {
                    pages.push(collapsed);
                }
            }
            Err(e) => {
                debug!(page = page_number, error = %e, "Skipping unextractable PDF page");
            }
        }
    }

    if pages.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(pages.join("\n"))
}

//! Error types for the gavel ingestion engine
//!
//! Fetch errors carry the transient/permanent classification the
//! rate-limit governor and workers key their retry decisions on.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error (connection reset, DNS, TLS, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream returned 429; hint from the Retry-After header if any
    #[error("rate limited by upstream")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Upstream returned 503
    #[error("service unavailable")]
    ServiceUnavailable,

    /// Upstream returned a 5xx other than 503
    #[error("server error: {0}")]
    Server(u16),

    /// Any other 4xx; not retried
    #[error("permanent HTTP error: {0}")]
    Permanent(u16),

    /// Request timeout
    #[error("request timeout")]
    Timeout,

    /// Response body could not be decoded
    #[error("decoding error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether the governor may retry this error
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::ServiceUnavailable | Self::Server(_) | Self::Timeout => {
                true
            }
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Permanent(_) | Self::Decode(_) => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Errors that can occur while extracting bill text from one format.
/// Always caught locally by the resolver, which cascades to the next
/// format in the chain.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Document fetch for this format failed
    #[error("document fetch failed: {0}")]
    Fetch(String),

    /// PDF could not be parsed
    #[error("PDF parse failed: {0}")]
    Pdf(String),

    /// Extracted content was empty after cleanup
    #[error("extracted text was empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::RateLimited {
            retry_after_ms: None
        }
        .is_transient());
        assert!(FetchError::ServiceUnavailable.is_transient());
        assert!(FetchError::Server(500).is_transient());
        assert!(FetchError::Timeout.is_transient());
        assert!(!FetchError::Permanent(404).is_transient());
        assert!(!FetchError::Decode("bad".into()).is_transient());
    }

    #[test]
    fn test_rate_limited_flag() {
        assert!(FetchError::RateLimited {
            retry_after_ms: Some(30_000)
        }
        .is_rate_limited());
        assert!(!FetchError::ServiceUnavailable.is_rate_limited());
    }
}

//! gavel - Parallel legislative bill ingestion engine
//!
//! Pulls bill records from a rate-limited legislative-data API,
//! resolves full text through a cascading multi-format strategy,
//! classifies procedural status with a deterministic rule set, and
//! persists idempotent, history-tracked records.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`client`] - Authenticated API client and reactive backoff
//! - [`ingest`] - Worker pool, retry queue and coordinator
//! - [`text`] - Cascading full-text resolution (text/XML/HTML/PDF)
//! - [`status`] - Deterministic procedural status classification
//! - [`models`] - Core data structures and types
//! - [`storage`] - Repository and history-tracking writer (SQLite)
//!
//! # Example
//!
//! ```no_run
//! use gavel::client::CongressClient;
//! use gavel::config::Config;
//! use gavel::ingest::run_ingest;
//! use gavel::storage::create_sqlite_repository;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let repo = create_sqlite_repository(&config.database.sqlite_path)?;
//!     let client = Arc::new(CongressClient::new(
//!         &config.api.base_url,
//!         &config.api.api_key,
//!         config.api.requests_per_second,
//!         config.request_timeout(),
//!     )?);
//!     let report = run_ingest(client, repo, &config.ingest, Vec::new()).await?;
//!     println!("{} bills processed", report.processed);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod status;
pub mod storage;
pub mod text;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::{CongressClient, LegislativeApi};
    pub use crate::config::Config;
    pub use crate::error::{ExtractError, FetchError};
    pub use crate::ingest::{run_ingest, IngestReport};
    pub use crate::models::{
        BillOutcome, BillRecord, BillReference, BillStatus, BillType, ProgressMessage, TextSource,
    };
    pub use crate::storage::{BillRepository, PersistenceWriter, SqliteBillRepository};
}

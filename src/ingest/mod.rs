//! Parallel bill ingestion engine
//!
//! The coordinator partitions the work list across isolated workers;
//! each worker drives its bills through fetch, text resolution,
//! classification and persistence, reporting progress over a one-way
//! channel.

pub mod coordinator;
pub mod partition;
pub mod worker;

pub use coordinator::{run_ingest, IngestReport};
pub use partition::partition;
pub use worker::IngestWorker;

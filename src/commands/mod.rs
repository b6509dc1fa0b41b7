pub mod failed;
pub mod ingest;

// Re-export command functions for convenience
pub use failed::failed;
pub use ingest::ingest;

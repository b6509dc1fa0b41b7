//! Bill persistence
//!
//! Trait-based repository over SQLite plus the history-tracking
//! persistence writer that sits between the workers and the store.

pub mod repository;
pub mod writer;

pub use repository::{
    create_mock_repository, create_sqlite_repository, BillRepository, MockBillRepository,
    SharedBillRepository, SqliteBillRepository,
};
pub use writer::{PersistOutcome, PersistenceWriter};

use anyhow::Result;
use std::path::PathBuf;

use gavel::storage::create_sqlite_repository;

/// List bills that exhausted retries with a permanent error
pub async fn failed(db: PathBuf) -> Result<()> {
    let repo = create_sqlite_repository(&db)?;
    let failed = repo.failed_bills()?;

    if failed.is_empty() {
        println!("No failed bills recorded");
        return Ok(());
    }

    println!("{} failed bills", failed.len());
    println!("==============================");
    for record in failed {
        println!(
            "{}  retries: {}  last: {}  error: {}",
            record.reference(),
            record.retry_count,
            record.last_retry_at.format("%Y-%m-%d %H:%M:%S"),
            record.error
        );
    }

    Ok(())
}

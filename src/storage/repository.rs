//! Repository pattern for bill storage
//!
//! Trait-based abstraction decoupling the ingestion pipeline from the
//! storage backend, with a SQLite implementation for production and an
//! in-memory mock for tests.
//!
//! The bill upsert is keyed by the deterministic bill id, so writing
//! never needs a separate existence check. The upsert returns the
//! previously stored status, which is what the persistence writer
//! compares against to decide whether a history row is due.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::models::{
    BillRecord, BillReference, BillStatus, BillStatusHistoryEntry, BillType, CostEstimate,
    FailedBillRecord, LawReference, TextSource,
};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository for bill records, status history and failed-bill tracking
pub trait BillRepository: Send + Sync {
    /// Insert or replace the full bill record, keyed by its id.
    /// Returns the previously stored status if a row existed.
    fn upsert_bill(&self, record: &BillRecord) -> Result<Option<BillStatus>>;

    /// Append one status history row
    fn insert_history(&self, entry: &BillStatusHistoryEntry) -> Result<()>;

    /// Look up a bill by id
    fn get_bill(&self, id: &Uuid) -> Result<Option<BillRecord>>;

    /// All history rows for a bill, oldest first
    fn history_for(&self, id: &Uuid) -> Result<Vec<BillStatusHistoryEntry>>;

    /// Record a permanently failed bill. Repeated failures for the
    /// same (congress, type, number) bump the retry counter.
    fn record_failed_bill(&self, reference: &BillReference, error: &str) -> Result<()>;

    /// All recorded failed bills
    fn failed_bills(&self) -> Result<Vec<FailedBillRecord>>;

    /// Total number of stored bills
    fn count_bills(&self) -> Result<usize>;
}

/// Thread-safe shared repository wrapper
pub type SharedBillRepository = Arc<dyn BillRepository>;

/// Create a shared SQLite repository
pub fn create_sqlite_repository(path: impl AsRef<Path>) -> Result<SharedBillRepository> {
    let repo = SqliteBillRepository::new(path)?;
    Ok(Arc::new(repo))
}

/// Create a shared mock repository
pub fn create_mock_repository() -> SharedBillRepository {
    Arc::new(MockBillRepository::new())
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of BillRepository
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteBillRepository {
    conn: Mutex<Connection>,
}

impl SqliteBillRepository {
    /// Create a new SQLite repository
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bills (
                id TEXT PRIMARY KEY,
                bill_number INTEGER NOT NULL,
                congress INTEGER NOT NULL,
                bill_type TEXT NOT NULL,
                title TEXT NOT NULL,
                introduction_date TEXT,
                status TEXT NOT NULL,
                sponsors TEXT NOT NULL DEFAULT '[]',
                committee TEXT,
                full_text TEXT,
                has_full_text INTEGER NOT NULL DEFAULT 0,
                text_source TEXT,
                origin_chamber TEXT,
                origin_chamber_code TEXT,
                latest_action_date TEXT,
                latest_action_text TEXT,
                constitutional_authority_text TEXT,
                policy_area TEXT,
                subjects TEXT NOT NULL DEFAULT '[]',
                summary TEXT,
                cbo_cost_estimates TEXT NOT NULL DEFAULT '[]',
                laws TEXT NOT NULL DEFAULT '[]',
                committees_count INTEGER NOT NULL DEFAULT 0,
                cosponsors_count INTEGER NOT NULL DEFAULT 0,
                withdrawn_cosponsors_count INTEGER NOT NULL DEFAULT 0,
                actions_count INTEGER NOT NULL DEFAULT 0,
                update_date TEXT,
                update_date_including_text TEXT,
                pdf_url TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_bills_congress_type
                ON bills(congress, bill_type);

            CREATE INDEX IF NOT EXISTS idx_bills_status
                ON bills(status);

            CREATE TABLE IF NOT EXISTS bill_status_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bill_id TEXT NOT NULL,
                status TEXT NOT NULL,
                changed_at TEXT NOT NULL,
                action_text TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_history_bill_id
                ON bill_status_history(bill_id);

            CREATE TABLE IF NOT EXISTS failed_bills (
                congress INTEGER NOT NULL,
                bill_type TEXT NOT NULL,
                bill_number INTEGER NOT NULL,
                error TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                first_failed_at TEXT NOT NULL,
                last_retry_at TEXT NOT NULL,
                UNIQUE(congress, bill_type, bill_number)
            );
            "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<BillRecord> {
        let id: String = row.get("id")?;
        let bill_type: String = row.get("bill_type")?;
        let status: String = row.get("status")?;
        let sponsors: String = row.get("sponsors")?;
        let subjects: String = row.get("subjects")?;
        let estimates: String = row.get("cbo_cost_estimates")?;
        let laws: String = row.get("laws")?;
        let text_source: Option<String> = row.get("text_source")?;

        Ok(BillRecord {
            id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
            bill_number: row.get("bill_number")?,
            congress: row.get("congress")?,
            bill_type: BillType::parse(&bill_type).unwrap_or(BillType::Hr),
            title: row.get("title")?,
            introduction_date: parse_date(row.get::<_, Option<String>>("introduction_date")?),
            status: status.parse().unwrap_or(BillStatus::Introduced),
            sponsors: serde_json::from_str(&sponsors).unwrap_or_default(),
            committee: row.get("committee")?,
            full_text: row.get("full_text")?,
            has_full_text: row.get("has_full_text")?,
            text_source: text_source.map(|s| s.parse::<TextSource>().unwrap_or(TextSource::Api)),
            origin_chamber: row.get("origin_chamber")?,
            origin_chamber_code: row.get("origin_chamber_code")?,
            latest_action_date: parse_date(row.get::<_, Option<String>>("latest_action_date")?),
            latest_action_text: row.get("latest_action_text")?,
            constitutional_authority_text: row.get("constitutional_authority_text")?,
            policy_area: row.get("policy_area")?,
            subjects: serde_json::from_str(&subjects).unwrap_or_default(),
            summary: row.get("summary")?,
            cbo_cost_estimates: serde_json::from_str::<Vec<CostEstimate>>(&estimates)
                .unwrap_or_default(),
            laws: serde_json::from_str::<Vec<LawReference>>(&laws).unwrap_or_default(),
            committees_count: row.get("committees_count")?,
            cosponsors_count: row.get("cosponsors_count")?,
            withdrawn_cosponsors_count: row.get("withdrawn_cosponsors_count")?,
            actions_count: row.get("actions_count")?,
            update_date: parse_datetime(row.get::<_, Option<String>>("update_date")?),
            update_date_including_text: parse_datetime(
                row.get::<_, Option<String>>("update_date_including_text")?,
            ),
            pdf_url: row.get("pdf_url")?,
        })
    }
}

fn parse_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| s.parse().ok())
}

fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl BillRepository for SqliteBillRepository {
    fn upsert_bill(&self, record: &BillRecord) -> Result<Option<BillStatus>> {
        let conn = self.conn.lock().unwrap();

        let previous: Option<String> = conn
            .query_row(
                "SELECT status FROM bills WHERE id = ?1",
                params![record.id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read previous bill status")?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO bills (
                id, bill_number, congress, bill_type, title, introduction_date,
                status, sponsors, committee, full_text, has_full_text, text_source,
                origin_chamber, origin_chamber_code, latest_action_date, latest_action_text,
                constitutional_authority_text, policy_area, subjects, summary,
                cbo_cost_estimates, laws, committees_count, cosponsors_count,
                withdrawn_cosponsors_count, actions_count, update_date,
                update_date_including_text, pdf_url
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29
            )
            "#,
            params![
                record.id.to_string(),
                record.bill_number,
                record.congress,
                record.bill_type.as_str(),
                record.title,
                record.introduction_date.map(|d| d.to_string()),
                record.status.as_str(),
                serde_json::to_string(&record.sponsors)?,
                record.committee,
                record.full_text,
                record.has_full_text,
                record.text_source.map(|s| s.as_str()),
                record.origin_chamber,
                record.origin_chamber_code,
                record.latest_action_date.map(|d| d.to_string()),
                record.latest_action_text,
                record.constitutional_authority_text,
                record.policy_area,
                serde_json::to_string(&record.subjects)?,
                record.summary,
                serde_json::to_string(&record.cbo_cost_estimates)?,
                serde_json::to_string(&record.laws)?,
                record.committees_count,
                record.cosponsors_count,
                record.withdrawn_cosponsors_count,
                record.actions_count,
                record.update_date.map(|d| d.to_rfc3339()),
                record.update_date_including_text.map(|d| d.to_rfc3339()),
                record.pdf_url,
            ],
        )
        .context("Failed to upsert bill")?;

        Ok(previous.map(|s| s.parse().unwrap_or(BillStatus::Introduced)))
    }

    fn insert_history(&self, entry: &BillStatusHistoryEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO bill_status_history (bill_id, status, changed_at, action_text)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                entry.bill_id.to_string(),
                entry.status.as_str(),
                entry.changed_at.to_rfc3339(),
                entry.action_text,
            ],
        )
        .context("Failed to insert status history")?;

        Ok(())
    }

    fn get_bill(&self, id: &Uuid) -> Result<Option<BillRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT * FROM bills WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_record,
            )
            .optional()
            .context("Failed to get bill")?;

        Ok(record)
    }

    fn history_for(&self, id: &Uuid) -> Result<Vec<BillStatusHistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT bill_id, status, changed_at, action_text
                 FROM bill_status_history WHERE bill_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare history query")?;

        let rows = stmt
            .query_map(params![id.to_string()], |row| {
                let bill_id: String = row.get(0)?;
                let status: String = row.get(1)?;
                let changed_at: String = row.get(2)?;
                Ok(BillStatusHistoryEntry {
                    bill_id: Uuid::parse_str(&bill_id).unwrap_or_else(|_| Uuid::nil()),
                    status: status.parse().unwrap_or(BillStatus::Introduced),
                    changed_at: parse_datetime(Some(changed_at)).unwrap_or_else(Utc::now),
                    action_text: row.get(3)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    fn record_failed_bill(&self, reference: &BillReference, error: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO failed_bills
                (congress, bill_type, bill_number, error, retry_count, first_failed_at, last_retry_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
            ON CONFLICT(congress, bill_type, bill_number) DO UPDATE SET
                error = excluded.error,
                retry_count = retry_count + 1,
                last_retry_at = excluded.last_retry_at
            "#,
            params![
                reference.congress,
                reference.bill_type.as_str(),
                reference.number,
                error,
                now,
            ],
        )
        .context("Failed to record failed bill")?;

        Ok(())
    }

    fn failed_bills(&self) -> Result<Vec<FailedBillRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT congress, bill_type, bill_number, error, retry_count,
                        first_failed_at, last_retry_at
                 FROM failed_bills ORDER BY congress, bill_type, bill_number",
            )
            .context("Failed to prepare failed-bills query")?;

        let rows = stmt
            .query_map([], |row| {
                let bill_type: String = row.get(1)?;
                let first_failed_at: String = row.get(5)?;
                let last_retry_at: String = row.get(6)?;
                Ok(FailedBillRecord {
                    congress: row.get(0)?,
                    bill_type: BillType::parse(&bill_type).unwrap_or(BillType::Hr),
                    number: row.get(2)?,
                    error: row.get(3)?,
                    retry_count: row.get(4)?,
                    first_failed_at: parse_datetime(Some(first_failed_at))
                        .unwrap_or_else(Utc::now),
                    last_retry_at: parse_datetime(Some(last_retry_at)).unwrap_or_else(Utc::now),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    fn count_bills(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM bills", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

/// In-memory mock implementation of BillRepository
pub struct MockBillRepository {
    bills: RwLock<HashMap<Uuid, BillRecord>>,
    history: RwLock<Vec<BillStatusHistoryEntry>>,
    failed: RwLock<HashMap<BillReference, FailedBillRecord>>,
    /// When set, insert_history always errors. Exercises the
    /// best-effort history path.
    pub fail_history: std::sync::atomic::AtomicBool,
}

impl MockBillRepository {
    pub fn new() -> Self {
        Self {
            bills: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            failed: RwLock::new(HashMap::new()),
            fail_history: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.bills.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bills.read().unwrap().is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history.read().unwrap().len()
    }

    pub fn clear(&self) {
        self.bills.write().unwrap().clear();
        self.history.write().unwrap().clear();
        self.failed.write().unwrap().clear();
    }
}

impl Default for MockBillRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl BillRepository for MockBillRepository {
    fn upsert_bill(&self, record: &BillRecord) -> Result<Option<BillStatus>> {
        let mut bills = self.bills.write().unwrap();
        let previous = bills.insert(record.id, record.clone());
        Ok(previous.map(|r| r.status))
    }

    fn insert_history(&self, entry: &BillStatusHistoryEntry) -> Result<()> {
        if self.fail_history.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("history insert disabled");
        }
        self.history.write().unwrap().push(entry.clone());
        Ok(())
    }

    fn get_bill(&self, id: &Uuid) -> Result<Option<BillRecord>> {
        Ok(self.bills.read().unwrap().get(id).cloned())
    }

    fn history_for(&self, id: &Uuid) -> Result<Vec<BillStatusHistoryEntry>> {
        Ok(self
            .history
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.bill_id == *id)
            .cloned()
            .collect())
    }

    fn record_failed_bill(&self, reference: &BillReference, error: &str) -> Result<()> {
        let mut failed = self.failed.write().unwrap();
        let now = Utc::now();
        failed
            .entry(*reference)
            .and_modify(|r| {
                r.error = error.to_string();
                r.retry_count += 1;
                r.last_retry_at = now;
            })
            .or_insert_with(|| FailedBillRecord {
                congress: reference.congress,
                bill_type: reference.bill_type,
                number: reference.number,
                error: error.to_string(),
                retry_count: 0,
                first_failed_at: now,
                last_retry_at: now,
            });
        Ok(())
    }

    fn failed_bills(&self) -> Result<Vec<FailedBillRecord>> {
        Ok(self.failed.read().unwrap().values().cloned().collect())
    }

    fn count_bills(&self) -> Result<usize> {
        Ok(self.bills.read().unwrap().len())
    }
}

// ============================================================================
// Tests
// ============================================================================

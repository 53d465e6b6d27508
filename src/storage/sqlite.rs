//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::extract::ExtractedRecord;
use crate::state::{CrawlJob, JobStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::StoredRecord;
use crate::ScoutError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

const JOB_COLUMNS: &str = "institution_id, start_url, domain, course_selectors, \
     hero_image_selector, max_records, status, created_at, completed_at, records_found, message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> Result<Self, ScoutError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, ScoutError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self { conn })
    }
}

/// A `crawl_jobs` row before its text columns are decoded
struct JobRow {
    institution_id: String,
    start_url: String,
    domain: String,
    course_selectors: String,
    hero_image_selector: Option<String>,
    max_records: u32,
    status: String,
    created_at: String,
    completed_at: Option<String>,
    records_found: u32,
    message: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            institution_id: row.get(0)?,
            start_url: row.get(1)?,
            domain: row.get(2)?,
            course_selectors: row.get(3)?,
            hero_image_selector: row.get(4)?,
            max_records: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
            completed_at: row.get(8)?,
            records_found: row.get(9)?,
            message: row.get(10)?,
        })
    }

    fn into_job(self) -> StorageResult<CrawlJob> {
        let status = JobStatus::from_db_string(&self.status).ok_or_else(|| {
            StorageError::Serialization(format!("unknown job status '{}'", self.status))
        })?;
        let course_selectors: BTreeSet<String> = serde_json::from_str(&self.course_selectors)
            .map_err(|e| StorageError::Serialization(format!("course selectors: {}", e)))?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        Ok(CrawlJob {
            institution_id: self.institution_id,
            start_url: self.start_url,
            domain: self.domain,
            course_selectors,
            hero_image_selector: self.hero_image_selector,
            max_records: self.max_records,
            status,
            created_at: parse_timestamp(&self.created_at)?,
            completed_at,
            records_found: self.records_found,
            message: self.message,
        })
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("timestamp '{}': {}", value, e)))
}

impl Storage for SqliteStorage {
    // ===== Job Tracking =====

    fn get_job(&self, institution_id: &str) -> StorageResult<Option<CrawlJob>> {
        let sql = format!("SELECT {} FROM crawl_jobs WHERE institution_id = ?1", JOB_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![institution_id], JobRow::from_row)
            .optional()?;

        row.map(JobRow::into_job).transpose()
    }

    fn list_jobs(&self) -> StorageResult<Vec<CrawlJob>> {
        let sql = format!("SELECT {} FROM crawl_jobs ORDER BY institution_id", JOB_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    fn claim(&mut self, job: &CrawlJob) -> StorageResult<bool> {
        let selectors = serde_json::to_string(&job.course_selectors)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let created_at = job.created_at.to_rfc3339();
        let now = Utc::now().to_rfc3339();

        // Take the write lock up front so concurrent claimers serialize here
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Make sure a row exists so the claim below is a single guarded update
        tx.execute(
            "INSERT OR IGNORE INTO crawl_jobs
             (institution_id, start_url, domain, course_selectors, max_records, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                job.institution_id,
                job.start_url,
                job.domain,
                selectors,
                job.max_records,
                JobStatus::NotStarted.to_db_string(),
                now,
            ],
        )?;

        let claimed = tx.execute(
            "UPDATE crawl_jobs SET
                start_url = ?2, domain = ?3, course_selectors = ?4, hero_image_selector = ?5,
                max_records = ?6, status = ?7, created_at = ?8, completed_at = NULL,
                records_found = 0, message = NULL, updated_at = ?9
             WHERE institution_id = ?1 AND status NOT IN (?10, ?11)",
            params![
                job.institution_id,
                job.start_url,
                job.domain,
                selectors,
                job.hero_image_selector,
                job.max_records,
                JobStatus::Queued.to_db_string(),
                created_at,
                now,
                JobStatus::Queued.to_db_string(),
                JobStatus::InProgress.to_db_string(),
            ],
        )?;

        tx.commit()?;
        Ok(claimed == 1)
    }

    fn set_status(
        &mut self,
        institution_id: &str,
        status: JobStatus,
        records_found: Option<u32>,
        completed_at: Option<DateTime<Utc>>,
        message: Option<&str>,
    ) -> StorageResult<()> {
        let predecessors = status.allowed_predecessors();

        let changed = if predecessors.is_empty() {
            0
        } else {
            // Status strings are fixed identifiers, safe to inline
            let allowed = predecessors
                .iter()
                .map(|s| format!("'{}'", s.to_db_string()))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE crawl_jobs SET
                    status = ?1,
                    records_found = COALESCE(?2, records_found),
                    completed_at = COALESCE(?3, completed_at),
                    message = COALESCE(?4, message),
                    updated_at = ?5
                 WHERE institution_id = ?6 AND status IN ({})",
                allowed
            );

            self.conn.execute(
                &sql,
                params![
                    status.to_db_string(),
                    records_found,
                    completed_at.map(|t| t.to_rfc3339()),
                    message,
                    Utc::now().to_rfc3339(),
                    institution_id,
                ],
            )?
        };

        if changed == 1 {
            return Ok(());
        }

        match self.get_job(institution_id)? {
            None => Err(StorageError::JobNotFound(institution_id.to_string())),
            Some(current) => Err(StorageError::InvalidTransition {
                institution_id: institution_id.to_string(),
                from: current.status,
                to: status,
            }),
        }
    }

    // ===== Records =====

    fn upsert_record(
        &mut self,
        institution_id: &str,
        record: &ExtractedRecord,
    ) -> StorageResult<()> {
        let fields = serde_json::to_string(&record.fields)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO course_records
             (institution_id, source_url, fields, hero_image, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(institution_id, source_url) DO UPDATE SET
                fields = excluded.fields,
                hero_image = excluded.hero_image,
                content = excluded.content,
                updated_at = excluded.updated_at",
            params![
                institution_id,
                record.source_url,
                fields,
                record.hero_image,
                record.content,
                now,
            ],
        )?;

        Ok(())
    }

    fn count_records(&self, institution_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM course_records WHERE institution_id = ?1",
            params![institution_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_records(&self, institution_id: &str) -> StorageResult<Vec<StoredRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT institution_id, source_url, fields, hero_image, content, created_at, updated_at
             FROM course_records WHERE institution_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![institution_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(institution_id, source_url, fields, hero_image, content, created_at, updated_at)| {
                    let fields: Map<String, Value> = serde_json::from_str(&fields)
                        .map_err(|e| StorageError::Serialization(e.to_string()))?;
                    Ok(StoredRecord {
                        institution_id,
                        source_url,
                        fields,
                        hero_image,
                        content,
                        created_at,
                        updated_at,
                    })
                },
            )
            .collect()
    }
}

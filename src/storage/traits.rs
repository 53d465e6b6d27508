//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::extract::ExtractedRecord;
use crate::state::{CrawlJob, JobStatus};
use crate::storage::StoredRecord;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("No job stored for institution '{0}'")]
    JobNotFound(String),

    #[error("Invalid status transition for '{institution_id}': {from} -> {to}")]
    InvalidTransition {
        institution_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Holds the per-institution crawl jobs and the records they produce.
/// Callers share one backend behind a mutex; every operation is atomic with
/// respect to other operations on the same backend.
pub trait Storage {
    // ===== Job Tracking =====

    /// Gets the job of an institution
    fn get_job(&self, institution_id: &str) -> StorageResult<Option<CrawlJob>>;

    /// Lists every stored job, ordered by institution
    fn list_jobs(&self) -> StorageResult<Vec<CrawlJob>>;

    /// Atomically claims the institution for a new crawl
    ///
    /// The stored job is replaced by `job` (as a fresh queued job) unless the
    /// current job is queued or in progress.
    ///
    /// # Returns
    ///
    /// `true` if the claim succeeded, `false` if another crawl is active
    fn claim(&mut self, job: &CrawlJob) -> StorageResult<bool>;

    /// Moves a job to `status`, updating the optional fields that are given
    ///
    /// Fails with [`StorageError::InvalidTransition`] unless the job's current
    /// status is an allowed predecessor of `status`.
    fn set_status(
        &mut self,
        institution_id: &str,
        status: JobStatus,
        records_found: Option<u32>,
        completed_at: Option<DateTime<Utc>>,
        message: Option<&str>,
    ) -> StorageResult<()>;

    // ===== Records =====

    /// Inserts a record, or replaces the one from the same page
    fn upsert_record(&mut self, institution_id: &str, record: &ExtractedRecord)
        -> StorageResult<()>;

    /// Counts the records of an institution
    fn count_records(&self, institution_id: &str) -> StorageResult<u64>;

    /// Lists the records of an institution in insertion order
    fn list_records(&self, institution_id: &str) -> StorageResult<Vec<StoredRecord>>;
}

//! Storage module for persisting crawl jobs and course records
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - The per-institution job table and its status transitions
//! - Course record persistence

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::ScoutError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ScoutError> {
    SqliteStorage::new(path)
}

/// A course record as stored in the database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub institution_id: String,
    pub source_url: String,
    pub fields: Map<String, Value>,
    pub hero_image: Option<String>,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Course-Scout database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One crawl job per institution
CREATE TABLE IF NOT EXISTS crawl_jobs (
    institution_id TEXT PRIMARY KEY,
    start_url TEXT NOT NULL,
    domain TEXT NOT NULL,
    course_selectors TEXT NOT NULL,
    hero_image_selector TEXT,
    max_records INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    completed_at TEXT,
    records_found INTEGER NOT NULL DEFAULT 0,
    message TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_status ON crawl_jobs(status);

-- Extracted course records
CREATE TABLE IF NOT EXISTS course_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    institution_id TEXT NOT NULL,
    source_url TEXT NOT NULL,
    fields TEXT NOT NULL,
    hero_image TEXT,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(institution_id, source_url)
);

CREATE INDEX IF NOT EXISTS idx_course_records_institution ON course_records(institution_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

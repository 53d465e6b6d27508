//! Course-Scout: schema-driven course discovery for institution websites
//!
//! This crate crawls an institution's website with a bounded worker pool,
//! recognises course pages by CSS selectors, extracts structured course
//! records with compiled selector rules, and tracks one crawl job per
//! institution in a SQLite store.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod schema;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Course-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Schema error: {0}")]
    Schema(#[from] schema::SchemaError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("A crawl for institution '{institution_id}' is already {status}")]
    ConcurrentCrawlConflict {
        institution_id: String,
        status: state::JobStatus,
    },

    #[error("No crawl job found for institution '{institution_id}'")]
    JobNotFound { institution_id: String },

    #[error("Institution '{0}' is not configured")]
    UnknownInstitution(String),

    #[error("Invalid crawl request: {0}")]
    InvalidRequest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Course-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Coordinator;
pub use extract::{ExtractedRecord, FieldExtractor};
pub use schema::{compile, CompiledSchema, ExtractionRule, FieldDescriptor};
pub use state::{CrawlJob, CrawlRequest, JobStatus};
pub use crate::url::{normalize_url, registrable_domain, NormalizedUrl};

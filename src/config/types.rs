use crate::extract::DEFAULT_MATCH_THRESHOLD;
use crate::state::CrawlRequest;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure for Course-Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "institution")]
    pub institutions: Vec<InstitutionEntry>,
}

impl Config {
    /// Looks up a configured institution by id
    pub fn institution(&self, id: &str) -> Option<&InstitutionEntry> {
        self.institutions.iter().find(|i| i.id == id)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent crawl workers per job
    #[serde(rename = "workers", default = "default_workers")]
    pub workers: usize,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Pause before an idle worker re-checks the frontier (milliseconds)
    #[serde(rename = "idle-backoff-ms", default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Share of schema fields a page must match to yield a record
    #[serde(rename = "match-threshold", default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Wall-clock budget for one crawl job (seconds), unlimited if absent
    #[serde(rename = "job-timeout-secs", default)]
    pub job_timeout_secs: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            request_timeout_secs: default_request_timeout_secs(),
            idle_backoff_ms: default_idle_backoff_ms(),
            match_threshold: default_match_threshold(),
            job_timeout_secs: None,
        }
    }
}

fn default_workers() -> usize {
    20
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_idle_backoff_ms() -> u64 {
    250
}

fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// The User-Agent header value
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// An institution whose website can be crawled
#[derive(Debug, Clone, Deserialize)]
pub struct InstitutionEntry {
    pub id: String,

    /// Page the crawl starts from
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Selectors that identify a course page
    #[serde(rename = "course-selectors")]
    pub course_selectors: Vec<String>,

    #[serde(rename = "hero-image-selector", default)]
    pub hero_image_selector: Option<String>,

    /// Number of records after which the crawl stops
    #[serde(rename = "max-records", default = "default_max_records")]
    pub max_records: u32,

    /// JSON schema document for this institution's course pages
    #[serde(rename = "schema-path")]
    pub schema_path: String,

    /// Fields to keep from the schema document, all if empty
    #[serde(rename = "target-fields", default)]
    pub target_fields: Vec<String>,
}

fn default_max_records() -> u32 {
    50
}

impl InstitutionEntry {
    /// Builds the crawl request for this institution
    pub fn crawl_request(&self) -> CrawlRequest {
        CrawlRequest {
            institution_id: self.id.clone(),
            start_url: self.start_url.clone(),
            course_selectors: self.course_selectors.clone(),
            hero_image_selector: self.hero_image_selector.clone(),
            max_records: self.max_records,
        }
    }

    /// Schema path, relative paths taken from `config_dir`
    pub fn resolve_schema_path(&self, config_dir: &Path) -> PathBuf {
        let path = Path::new(&self.schema_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_dir.join(path)
        }
    }
}

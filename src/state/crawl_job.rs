use crate::state::JobStatus;
use crate::url::{normalize_url, registrable_domain};
use crate::ScoutError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// A request to crawl one institution's website
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// Institution the crawl belongs to
    pub institution_id: String,

    /// Page the crawl starts from
    pub start_url: String,

    /// Selectors that identify a course page; any match qualifies
    pub course_selectors: Vec<String>,

    /// Selector for the course's hero image, if the site has one
    pub hero_image_selector: Option<String>,

    /// Number of records after which the crawl stops
    pub max_records: u32,
}

impl CrawlRequest {
    /// Validates the request and turns it into a fresh queued job
    ///
    /// The start URL is normalized and the job's domain is the registrable
    /// domain of its host, so `https://www.example.edu/` crawls all of
    /// `example.edu`.
    pub fn into_job(self) -> Result<CrawlJob, ScoutError> {
        self.build_job(true)
    }

    /// Creates a request that processes a fixed list of pages
    ///
    /// The first URL stands in as the start URL, no course selectors gate the
    /// pages, and the cap equals the number of URLs.
    pub fn url_list(
        institution_id: &str,
        urls: &[String],
        hero_image_selector: Option<String>,
    ) -> Result<Self, ScoutError> {
        let start_url = urls
            .first()
            .ok_or_else(|| ScoutError::InvalidRequest("URL list is empty".to_string()))?;

        Ok(Self {
            institution_id: institution_id.to_string(),
            start_url: start_url.clone(),
            course_selectors: Vec::new(),
            hero_image_selector,
            max_records: u32::try_from(urls.len()).unwrap_or(u32::MAX),
        })
    }

    /// Like [`CrawlRequest::into_job`] but without requiring course selectors
    pub fn into_list_job(self) -> Result<CrawlJob, ScoutError> {
        self.build_job(false)
    }

    fn build_job(self, require_selectors: bool) -> Result<CrawlJob, ScoutError> {
        if self.institution_id.trim().is_empty() {
            return Err(ScoutError::InvalidRequest(
                "institution_id cannot be empty".to_string(),
            ));
        }

        let start = normalize_url(&self.start_url)?;
        let host = start
            .url()
            .host_str()
            .ok_or(crate::UrlError::MissingDomain)?;

        let course_selectors: BTreeSet<String> = self
            .course_selectors
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if require_selectors && course_selectors.is_empty() {
            return Err(ScoutError::InvalidRequest(
                "at least one course selector is required".to_string(),
            ));
        }

        if self.max_records == 0 {
            return Err(ScoutError::InvalidRequest(
                "max_records must be >= 1".to_string(),
            ));
        }

        Ok(CrawlJob {
            institution_id: self.institution_id,
            domain: registrable_domain(host),
            start_url: start.url().to_string(),
            course_selectors,
            hero_image_selector: self
                .hero_image_selector
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            max_records: self.max_records,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            completed_at: None,
            records_found: 0,
            message: None,
        })
    }
}

/// The crawl job of one institution
///
/// There is at most one job per institution. It is written by the crawl
/// coordinator and read by whoever reports status.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlJob {
    pub institution_id: String,
    pub start_url: String,

    /// Registrable domain the crawl is contained to
    pub domain: String,

    pub course_selectors: BTreeSet<String>,
    pub hero_image_selector: Option<String>,
    pub max_records: u32,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_found: u32,

    /// Outcome description, e.g. the reason a job failed
    pub message: Option<String>,
}

impl CrawlJob {
    /// Returns true once `records_found` has reached the cap
    pub fn is_capped(&self) -> bool {
        self.records_found >= self.max_records
    }
}

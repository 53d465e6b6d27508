//! Crawler coordinator - crawl job orchestration
//!
//! This module owns the lifecycle of crawl jobs, including:
//! - Admitting at most one active crawl per institution
//! - Running a bounded pool of workers over a shared frontier
//! - Containing the crawl to the institution's registrable domain
//! - Stopping at the record cap, the time budget, or frontier exhaustion
//! - Recording the outcome on the job

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchResult};
use crate::crawler::frontier::{Frontier, Next};
use crate::crawler::page::{analyze_page, PageRules};
use crate::extract::{ExtractedRecord, FieldExtractor};
use crate::schema::{compile, CompiledSchema, SchemaSource};
use crate::state::{CrawlJob, CrawlRequest, JobStatus};
use crate::storage::{SqliteStorage, Storage, StorageError};
use crate::url::{normalize_url, LinkFilter, NormalizedUrl};
use crate::{Result, ScoutError};
use chrono::Utc;
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use url::Url;

/// Pages between two progress log lines
const PROGRESS_INTERVAL: usize = 25;

/// Main crawler coordinator structure
///
/// The coordinator is the only writer of job status. Several coordinators may
/// share one database; the single-flight rule is enforced by the storage
/// layer's atomic claim.
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    client: Client,
}

/// State shared by the workers of one running job
struct CrawlContext {
    institution_id: String,
    max_records: u32,
    client: Client,
    storage: Arc<Mutex<SqliteStorage>>,
    frontier: Frontier,
    rules: PageRules,

    /// None when links are not followed
    link_filter: Option<LinkFilter>,

    records_found: AtomicU32,
    pages_processed: AtomicUsize,
    idle_backoff: Duration,
    started: Instant,
}

impl CrawlContext {
    fn cap_reached(&self) -> bool {
        self.records_found.load(Ordering::SeqCst) >= self.max_records
    }
}

impl Coordinator {
    /// Creates a coordinator using the database named in the configuration
    pub fn new(config: Config) -> Result<Self> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Self::with_storage(config, storage)
    }

    /// Creates a coordinator over an already opened store
    pub fn with_storage(config: Config, storage: SqliteStorage) -> Result<Self> {
        let timeout = Duration::from_secs(config.crawler.request_timeout_secs);
        let client = build_http_client(&config.user_agent, timeout)?;

        Ok(Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            client,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, SqliteStorage>> {
        self.storage
            .lock()
            .map_err(|_| ScoutError::Storage(StorageError::LockPoisoned))
    }

    // ===== Job Lifecycle =====

    /// Accepts a crawl request, replacing the institution's previous job
    ///
    /// Fails with [`ScoutError::ConcurrentCrawlConflict`] while another crawl
    /// for the same institution is queued or in progress.
    pub fn start_crawl(&self, request: CrawlRequest) -> Result<CrawlJob> {
        let job = request.into_job()?;
        self.claim(job)
    }

    fn claim(&self, job: CrawlJob) -> Result<CrawlJob> {
        let mut storage = self.lock_storage()?;

        if storage.claim(&job)? {
            tracing::info!(
                "Accepted crawl for {} starting at {} (domain {})",
                job.institution_id,
                job.start_url,
                job.domain
            );
            return Ok(job);
        }

        let status = storage
            .get_job(&job.institution_id)?
            .map(|current| current.status)
            .unwrap_or(JobStatus::Queued);
        tracing::warn!(
            "Rejected crawl for {}: a crawl is already {}",
            job.institution_id,
            status
        );

        Err(ScoutError::ConcurrentCrawlConflict {
            institution_id: job.institution_id,
            status,
        })
    }

    /// Gets the current job of an institution
    pub fn get_status(&self, institution_id: &str) -> Result<CrawlJob> {
        self.lock_storage()?
            .get_job(institution_id)?
            .ok_or_else(|| ScoutError::JobNotFound {
                institution_id: institution_id.to_string(),
            })
    }

    /// Lists the jobs of all institutions
    pub fn list_jobs(&self) -> Result<Vec<CrawlJob>> {
        Ok(self.lock_storage()?.list_jobs()?)
    }

    /// Marks a queued or in-progress job as cancelled
    ///
    /// Workers of a run in this process are not interrupted; when they finish
    /// the run keeps the cancelled status.
    pub fn cancel(&self, institution_id: &str) -> Result<CrawlJob> {
        self.finish(
            institution_id,
            JobStatus::Cancelled,
            None,
            "Cancelled by operator",
        )
    }

    /// Accepts a crawl request and runs it to completion
    pub async fn crawl(&self, request: CrawlRequest, schema: CompiledSchema) -> Result<CrawlJob> {
        let job = self.start_crawl(request)?;
        self.run(&job.institution_id, schema).await
    }

    /// Runs a queued discovery crawl
    ///
    /// Job-level problems (an empty schema, unusable course selectors) end
    /// the job as failed and are reported through the returned job, not as an
    /// error. Errors are returned when the job cannot be found or started.
    pub async fn run(&self, institution_id: &str, schema: CompiledSchema) -> Result<CrawlJob> {
        let job = self.begin(institution_id)?;

        let seed = match normalize_url(&job.start_url) {
            Ok(seed) => seed,
            Err(e) => return self.fail(institution_id, &format!("Invalid start URL: {}", e)),
        };
        let link_filter = LinkFilter::new(&job.domain);

        self.execute(job, schema, vec![seed], Some(link_filter)).await
    }

    /// Runs a queued discovery crawl with a schema obtained from `source`
    ///
    /// A schema that cannot be obtained fails the job.
    pub async fn run_with_source<S: SchemaSource>(
        &self,
        institution_id: &str,
        source: &S,
        target_fields: &[String],
    ) -> Result<CrawlJob> {
        let job = self.get_status(institution_id)?;

        let page_content = if S::WANTS_PAGE_CONTENT {
            self.sample_page(&job.start_url).await
        } else {
            String::new()
        };

        match source.generate(&page_content, target_fields).await {
            Ok(descriptors) => self.run(institution_id, compile(&descriptors)).await,
            Err(e) => self.fail(institution_id, &format!("Extraction schema unavailable: {}", e)),
        }
    }

    /// Fetches and extracts a single page without touching any job
    ///
    /// Returns None when the page cannot be fetched, is not a course page, or
    /// matches too few fields. An empty `course_selectors` accepts any page.
    pub async fn scrape_url(
        &self,
        url: &str,
        course_selectors: &[String],
        hero_image_selector: Option<&str>,
        schema: CompiledSchema,
    ) -> Result<Option<ExtractedRecord>> {
        let page = normalize_url(url)?;
        let rules = PageRules::new(
            course_selectors,
            hero_image_selector,
            FieldExtractor::new(schema, self.config.crawler.match_threshold),
        );
        if !course_selectors.is_empty() && !rules.gates_on_course_selectors() {
            tracing::warn!("None of the course selectors is valid, skipping {}", page);
            return Ok(None);
        }

        match fetch_url(&self.client, page.url().as_str()).await {
            FetchResult::Success {
                final_url, body, ..
            } => {
                let resolved = normalize_url(&final_url).unwrap_or_else(|_| page.clone());
                let base = Url::parse(&final_url).unwrap_or_else(|_| resolved.url().clone());
                Ok(analyze_page(&resolved, &base, &body, &rules, true, None).record)
            }
            other => {
                tracing::warn!("Failed to fetch {}: {}", page, other.describe());
                Ok(None)
            }
        }
    }

    /// Processes a fixed list of pages as one job of the institution
    ///
    /// Follows the same lifecycle as a discovery crawl, but no links are
    /// followed and no course selector gates the pages. Invalid and repeated
    /// URLs are skipped.
    pub async fn scrape_urls(
        &self,
        institution_id: &str,
        urls: &[String],
        hero_image_selector: Option<String>,
        schema: CompiledSchema,
    ) -> Result<CrawlJob> {
        let mut seen = HashSet::new();
        let mut seeds = Vec::new();
        for url in urls {
            match normalize_url(url) {
                Ok(normalized) => {
                    if seen.insert(normalized.as_str().to_string()) {
                        seeds.push(normalized);
                    }
                }
                Err(e) => tracing::warn!("Skipping URL {}: {}", url, e),
            }
        }

        let keys: Vec<String> = seeds.iter().map(|s| s.as_str().to_string()).collect();
        let job = CrawlRequest::url_list(institution_id, &keys, hero_image_selector)?
            .into_list_job()?;
        self.claim(job)?;

        let job = self.begin(institution_id)?;
        self.execute(job, schema, seeds, None).await
    }

    /// Moves a queued job to in progress
    fn begin(&self, institution_id: &str) -> Result<CrawlJob> {
        let mut storage = self.lock_storage()?;
        let job = storage
            .get_job(institution_id)?
            .ok_or_else(|| ScoutError::JobNotFound {
                institution_id: institution_id.to_string(),
            })?;

        storage.set_status(institution_id, JobStatus::InProgress, None, None, None)?;

        Ok(CrawlJob {
            status: JobStatus::InProgress,
            ..job
        })
    }

    /// Records a terminal status, keeping an already terminal job as it is
    fn finish(
        &self,
        institution_id: &str,
        status: JobStatus,
        records_found: Option<u32>,
        message: &str,
    ) -> Result<CrawlJob> {
        let mut storage = self.lock_storage()?;

        match storage.set_status(
            institution_id,
            status,
            records_found,
            Some(Utc::now()),
            Some(message),
        ) {
            Ok(()) => {}
            Err(StorageError::JobNotFound(institution_id)) => {
                return Err(ScoutError::JobNotFound { institution_id })
            }
            Err(StorageError::InvalidTransition { from, .. }) if from.is_terminal() => {
                tracing::warn!(
                    "Job for {} is already {}, not marking it {}",
                    institution_id,
                    from,
                    status
                );
            }
            Err(e) => return Err(e.into()),
        }

        storage
            .get_job(institution_id)?
            .ok_or_else(|| ScoutError::JobNotFound {
                institution_id: institution_id.to_string(),
            })
    }

    fn fail(&self, institution_id: &str, message: &str) -> Result<CrawlJob> {
        tracing::error!("Crawl for {} failed: {}", institution_id, message);
        self.finish(institution_id, JobStatus::Failed, Some(0), message)
    }

    /// Body of the start page, empty if it cannot be fetched
    async fn sample_page(&self, url: &str) -> String {
        match fetch_url(&self.client, url).await {
            FetchResult::Success { body, .. } => body,
            other => {
                tracing::warn!("Could not fetch sample page {}: {}", url, other.describe());
                String::new()
            }
        }
    }

    // ===== Crawl Execution =====

    async fn execute(
        &self,
        job: CrawlJob,
        schema: CompiledSchema,
        seeds: Vec<NormalizedUrl>,
        link_filter: Option<LinkFilter>,
    ) -> Result<CrawlJob> {
        let institution_id = job.institution_id.clone();

        let selectors: Vec<&str> = job.course_selectors.iter().map(String::as_str).collect();
        let rules = PageRules::new(
            &selectors,
            job.hero_image_selector.as_deref(),
            FieldExtractor::new(schema, self.config.crawler.match_threshold),
        );
        if rules.extractor().total_fields() == 0 {
            return self.fail(&institution_id, "Extraction schema has no usable fields");
        }
        if !selectors.is_empty() && !rules.gates_on_course_selectors() {
            return self.fail(&institution_id, "None of the course selectors is valid");
        }

        let workers = self.config.crawler.workers.max(1);
        tracing::info!(
            "Crawling {} with {} workers: {} seed(s), {} schema fields, cap {} records",
            institution_id,
            workers,
            seeds.len(),
            rules.extractor().total_fields(),
            job.max_records
        );

        let ctx = Arc::new(CrawlContext {
            institution_id: institution_id.clone(),
            max_records: job.max_records,
            client: self.client.clone(),
            storage: Arc::clone(&self.storage),
            frontier: Frontier::seeded(seeds),
            rules,
            link_filter,
            records_found: AtomicU32::new(0),
            pages_processed: AtomicUsize::new(0),
            idle_backoff: Duration::from_millis(self.config.crawler.idle_backoff_ms),
            started: Instant::now(),
        });

        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            pool.spawn(worker_loop(Arc::clone(&ctx), worker_id));
        }

        let budget = self.config.crawler.job_timeout_secs.map(Duration::from_secs);
        let budget_exhausted = match budget {
            Some(limit) => tokio::time::timeout(limit, drain_workers(&mut pool))
                .await
                .is_err(),
            None => {
                drain_workers(&mut pool).await;
                false
            }
        };

        if budget_exhausted {
            tracing::warn!("Time budget exhausted for {}, stopping workers", institution_id);
            pool.abort_all();
            drain_workers(&mut pool).await;
        }

        let records = ctx.records_found.load(Ordering::SeqCst);
        let pages = ctx.pages_processed.load(Ordering::SeqCst);
        let message = if budget_exhausted {
            format!(
                "Stopped after the {}s time budget: {} records from {} pages",
                budget.map(|b| b.as_secs()).unwrap_or_default(),
                records,
                pages
            )
        } else if records >= job.max_records {
            format!("Record cap reached: {} records from {} pages", records, pages)
        } else {
            format!("Crawl completed: {} records from {} pages", records, pages)
        };

        tracing::info!(
            "Crawl for {} finished in {:.1}s: {}",
            institution_id,
            ctx.started.elapsed().as_secs_f64(),
            message
        );

        self.finish(&institution_id, JobStatus::Completed, Some(records), &message)
    }
}

async fn drain_workers(pool: &mut JoinSet<()>) {
    while let Some(result) = pool.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!("Crawl worker panicked: {}", e);
            }
        }
    }
}

async fn worker_loop(ctx: Arc<CrawlContext>, worker_id: usize) {
    tracing::debug!("Worker {} started for {}", worker_id, ctx.institution_id);

    loop {
        if ctx.cap_reached() {
            tracing::debug!("Worker {}: record cap reached", worker_id);
            break;
        }

        match ctx.frontier.next() {
            Next::Ready(page) => {
                let _in_flight = ctx.frontier.in_flight_guard(&page);
                process_page(&ctx, worker_id, &page).await;
                report_progress(&ctx);
            }
            Next::Idle => tokio::time::sleep(ctx.idle_backoff).await,
            Next::Exhausted => break,
        }
    }

    tracing::debug!("Worker {} stopped", worker_id);
}

fn report_progress(ctx: &CrawlContext) {
    let processed = ctx.pages_processed.fetch_add(1, Ordering::SeqCst) + 1;
    if processed % PROGRESS_INTERVAL != 0 {
        return;
    }

    let elapsed = ctx.started.elapsed().as_secs_f64();
    tracing::info!(
        "Progress for {}: {} pages processed, {} queued, {} records, {:.2} pages/sec",
        ctx.institution_id,
        processed,
        ctx.frontier.queued(),
        ctx.records_found.load(Ordering::SeqCst),
        processed as f64 / elapsed.max(f64::EPSILON)
    );
}

async fn process_page(ctx: &CrawlContext, worker_id: usize, page: &NormalizedUrl) {
    tracing::debug!("Worker {} fetching {}", worker_id, page);

    let (final_url, body) = match fetch_url(&ctx.client, page.url().as_str()).await {
        FetchResult::Success {
            final_url, body, ..
        } => (final_url, body),
        mismatch @ FetchResult::ContentMismatch { .. } => {
            tracing::debug!("Skipping {}: {}", page, mismatch.describe());
            return;
        }
        failure => {
            tracing::warn!("Failed to fetch {}: {}", page, failure.describe());
            return;
        }
    };

    let resolved = normalize_url(&final_url).unwrap_or_else(|_| page.clone());
    if !ctx.frontier.claim_resolved(page, &resolved) {
        tracing::debug!("{} redirected to already visited {}", page, resolved);
        return;
    }

    if let Some(filter) = &ctx.link_filter {
        if !filter.is_same_site(resolved.url()) {
            tracing::debug!("{} redirected off-site to {}", page, resolved);
            return;
        }
    }

    let base = Url::parse(&final_url).unwrap_or_else(|_| resolved.url().clone());
    let outcome = analyze_page(
        &resolved,
        &base,
        &body,
        &ctx.rules,
        !ctx.cap_reached(),
        ctx.link_filter.as_ref(),
    );

    if let Some(record) = outcome.record {
        persist_record(ctx, &record);
    }

    if !outcome.links.is_empty() {
        let found = outcome.links.len();
        let added = ctx.frontier.enqueue_all(outcome.links);
        tracing::debug!("{}: {} links, {} new", resolved, found, added);
    }
}

/// Stores a record if the cap still allows it
///
/// A slot is reserved before writing so concurrent workers never push
/// `records_found` past the cap.
fn persist_record(ctx: &CrawlContext, record: &ExtractedRecord) {
    let reserved = ctx
        .records_found
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            (n < ctx.max_records).then_some(n + 1)
        });
    let Ok(previous) = reserved else {
        tracing::debug!("Record cap reached, dropping record from {}", record.source_url);
        return;
    };

    let result = match ctx.storage.lock() {
        Ok(mut storage) => storage.upsert_record(&ctx.institution_id, record),
        Err(_) => Err(StorageError::LockPoisoned),
    };

    match result {
        Ok(()) => tracing::info!(
            "Record {}/{} for {}: {}",
            previous + 1,
            ctx.max_records,
            ctx.institution_id,
            record.source_url
        ),
        Err(e) => {
            ctx.records_found.fetch_sub(1, Ordering::SeqCst);
            tracing::error!("Failed to store record from {}: {}", record.source_url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlerConfig, OutputConfig, UserAgentConfig};
    use crate::schema::{DataType, FieldDescriptor};

    fn test_config() -> Config {
        Config {
            crawler: CrawlerConfig {
                workers: 2,
                idle_backoff_ms: 10,
                ..CrawlerConfig::default()
            },
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: ":memory:".to_string(),
            },
            institutions: vec![],
        }
    }

    fn coordinator() -> Coordinator {
        Coordinator::with_storage(test_config(), SqliteStorage::new_in_memory().unwrap()).unwrap()
    }

    fn request(institution_id: &str) -> CrawlRequest {
        CrawlRequest {
            institution_id: institution_id.to_string(),
            start_url: "https://www.example.edu/courses".to_string(),
            course_selectors: vec![".course-detail".to_string()],
            hero_image_selector: None,
            max_records: 5,
        }
    }

    #[test]
    fn test_start_crawl_claims_institution() {
        let coordinator = coordinator();
        let job = coordinator.start_crawl(request("uni-a")).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(coordinator.get_status("uni-a").unwrap().status, JobStatus::Queued);
    }

    #[test]
    fn test_second_request_conflicts() {
        let coordinator = coordinator();
        coordinator.start_crawl(request("uni-a")).unwrap();

        match coordinator.start_crawl(request("uni-a")) {
            Err(ScoutError::ConcurrentCrawlConflict {
                institution_id,
                status,
            }) => {
                assert_eq!(institution_id, "uni-a");
                assert_eq!(status, JobStatus::Queued);
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        assert!(coordinator.start_crawl(request("uni-b")).is_ok());
    }

    #[test]
    fn test_invalid_request_never_claims() {
        let coordinator = coordinator();
        let mut bad = request("uni-a");
        bad.max_records = 0;

        assert!(matches!(
            coordinator.start_crawl(bad),
            Err(ScoutError::InvalidRequest(_))
        ));
        assert!(matches!(
            coordinator.get_status("uni-a"),
            Err(ScoutError::JobNotFound { .. })
        ));
    }

    #[test]
    fn test_cancel_queued_job() {
        let coordinator = coordinator();
        coordinator.start_crawl(request("uni-a")).unwrap();

        let job = coordinator.cancel("uni-a").unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.completed_at.is_some());

        // A cancelled job no longer blocks new crawls
        assert!(coordinator.start_crawl(request("uni-a")).is_ok());
    }

    #[tokio::test]
    async fn test_empty_schema_fails_job() {
        let coordinator = coordinator();
        coordinator.start_crawl(request("uni-a")).unwrap();

        let schema = compile(&[FieldDescriptor::leaf("title", "div[[", DataType::String)]);
        let job = coordinator.run("uni-a", schema).await.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.records_found, 0);
        assert!(job.message.unwrap().contains("no usable fields"));
    }

    #[tokio::test]
    async fn test_invalid_course_selectors_fail_job() {
        let coordinator = coordinator();
        let mut req = request("uni-a");
        req.course_selectors = vec!["div[[".to_string()];
        coordinator.start_crawl(req).unwrap();

        let schema = compile(&[FieldDescriptor::leaf("title", "h1", DataType::String)]);
        let job = coordinator.run("uni-a", schema).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_run_requires_queued_job() {
        let coordinator = coordinator();
        let schema = compile(&[FieldDescriptor::leaf("title", "h1", DataType::String)]);

        assert!(matches!(
            coordinator.run("uni-a", schema.clone()).await,
            Err(ScoutError::JobNotFound { .. })
        ));

        coordinator.start_crawl(request("uni-a")).unwrap();
        coordinator.cancel("uni-a").unwrap();
        assert!(matches!(
            coordinator.run("uni-a", schema).await,
            Err(ScoutError::Storage(StorageError::InvalidTransition { .. }))
        ));
    }
}

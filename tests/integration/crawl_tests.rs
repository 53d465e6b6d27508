//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use course_scout::config::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use course_scout::schema::{compile, DataType, FieldDescriptor};
use course_scout::storage::{open_storage, Storage};
use course_scout::{CompiledSchema, Coordinator, CrawlRequest, JobStatus, ScoutError};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing to a database in `dir`
fn create_test_config(dir: &TempDir, workers: usize) -> Config {
    Config {
        crawler: CrawlerConfig {
            workers,
            request_timeout_secs: 10,
            idle_backoff_ms: 10, // Very short for testing
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: dir.path().join("courses.db").display().to_string(),
        },
        institutions: vec![],
    }
}

fn course_schema() -> CompiledSchema {
    compile(&[
        FieldDescriptor::leaf("title", "h1", DataType::String),
        FieldDescriptor::leaf("ects", ".ects", DataType::Integer).with_fallbacks(&["[data-ects]"]),
    ])
}

fn request(start_url: &str, max_records: u32) -> CrawlRequest {
    CrawlRequest {
        institution_id: "test-uni".to_string(),
        start_url: start_url.to_string(),
        course_selectors: vec![".course-detail".to_string()],
        hero_image_selector: Some("img.hero".to_string()),
        max_records,
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

fn course_page(title: &str, ects: u32, extra: &str) -> ResponseTemplate {
    html(format!(
        r#"<div class="course-detail">
            <img class="hero" src="/img/{ects}.jpg">
            <h1>{title}</h1>
            <span class="ects">{ects} ECTS</span>
        </div>{extra}"#
    ))
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate, calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_visits_each_page_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let port = mock_server.address().port();

    mount(
        &mock_server,
        "/",
        html(format!(
            r#"<a href="/courses/data-science">Data Science</a>
            <a href="{base_url}/courses/law/">Law</a>
            <a href="/courses/draft">Draft</a>
            <a href="/about#team">About</a>
            <a href="/brochure.pdf">Brochure</a>
            <a href="http://localhost:{port}/external">Partner</a>
            <a href="mailto:info@example.edu">Mail</a>"#
        )),
        1,
    )
    .await;
    mount(
        &mock_server,
        "/courses/data-science",
        course_page("Data Science", 30, r#"<a href="/courses/law">Law</a>"#),
        1,
    )
    .await;
    mount(
        &mock_server,
        "/courses/law",
        course_page("Law", 180, r#"<a href="/">Home</a><a href="/courses/data-science">DS</a>"#),
        1,
    )
    .await;
    // A course page missing half of the fields
    mount(
        &mock_server,
        "/courses/draft",
        html(r#"<div class="course-detail"><h1>Draft</h1></div>"#.to_string()),
        1,
    )
    .await;
    mount(
        &mock_server,
        "/about",
        html(r#"<h1>About us</h1><a href="/courses/law">Law</a>"#.to_string()),
        1,
    )
    .await;
    mount(&mock_server, "/brochure.pdf", html(String::new()), 0).await;
    mount(&mock_server, "/external", html(String::new()), 0).await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 4)).unwrap();

    let job = coordinator
        .crawl(request(&base_url, 10), course_schema())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.records_found, 2);
    assert!(job.completed_at.is_some());
    assert!(job.message.unwrap().contains("Crawl completed"));

    let storage = open_storage(&dir.path().join("courses.db")).unwrap();
    let mut records = storage.list_records("test-uni").unwrap();
    records.sort_by(|a, b| a.source_url.cmp(&b.source_url));
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].source_url, format!("{}/courses/data-science", base_url));
    assert_eq!(
        serde_json::Value::Object(records[0].fields.clone()),
        json!({"title": "Data Science", "ects": 30})
    );
    assert_eq!(
        records[0].hero_image.as_deref(),
        Some(format!("{}/img/30.jpg", base_url).as_str())
    );

    assert_eq!(records[1].source_url, format!("{}/courses/law", base_url));
    assert_eq!(records[1].fields.get("ects"), Some(&json!(180)));
    assert!(records[1].content.contains("Law"));
}

#[tokio::test]
async fn test_record_cap_is_exact() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let links: String = (0..5)
        .map(|i| format!(r#"<a href="/courses/c{}">Course {}</a>"#, i, i))
        .collect();
    mount(&mock_server, "/", html(links), 1).await;
    for i in 0..5 {
        Mock::given(method("GET"))
            .and(path(format!("/courses/c{}", i)))
            .respond_with(course_page(&format!("Course {}", i), 5, ""))
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 3)).unwrap();

    let job = coordinator
        .crawl(request(&base_url, 2), course_schema())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.records_found, 2);
    assert!(job.message.unwrap().contains("Record cap reached"));

    let storage = open_storage(&dir.path().join("courses.db")).unwrap();
    assert_eq!(storage.count_records("test-uni").unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_crawl_rejected() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 1)).unwrap();

    coordinator.start_crawl(request(&mock_server.uri(), 5)).unwrap();

    match coordinator.start_crawl(request(&mock_server.uri(), 5)) {
        Err(ScoutError::ConcurrentCrawlConflict { institution_id, .. }) => {
            assert_eq!(institution_id, "test-uni");
        }
        other => panic!("expected a conflict, got {:?}", other),
    }

    // The first job is untouched by the rejected request
    let job = coordinator.get_status("test-uni").unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.max_records, 5);
}

#[tokio::test]
async fn test_recrawl_after_completion_resets_job() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(course_page("Only Course", 60, ""))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 1)).unwrap();

    let first = coordinator
        .crawl(request(&base_url, 5), course_schema())
        .await
        .unwrap();
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(first.records_found, 1);

    let queued = coordinator.start_crawl(request(&base_url, 5)).unwrap();
    assert_eq!(queued.status, JobStatus::Queued);
    assert_eq!(queued.records_found, 0);
    assert!(queued.completed_at.is_none());

    let second = coordinator.run("test-uni", course_schema()).await.unwrap();
    assert_eq!(second.status, JobStatus::Completed);

    // The page's record was replaced, not duplicated
    let storage = open_storage(&dir.path().join("courses.db")).unwrap();
    assert_eq!(storage.count_records("test-uni").unwrap(), 1);
}

#[tokio::test]
async fn test_redirect_target_processed_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount(
        &mock_server,
        "/",
        html(r#"<a href="/old-law">Old</a><a href="/courses/law">Law</a>"#.to_string()),
        1,
    )
    .await;
    mount(
        &mock_server,
        "/old-law",
        ResponseTemplate::new(301).insert_header("Location", "/courses/law"),
        1,
    )
    .await;
    mount(&mock_server, "/courses/law", course_page("Law", 180, ""), 1).await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 1)).unwrap();

    let job = coordinator
        .crawl(request(&base_url, 10), course_schema())
        .await
        .unwrap();
    assert_eq!(job.records_found, 1);

    let storage = open_storage(&dir.path().join("courses.db")).unwrap();
    let records = storage.list_records("test-uni").unwrap();
    assert_eq!(records[0].source_url, format!("{}/courses/law", base_url));
}

#[tokio::test]
async fn test_fetch_failures_are_contained() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount(
        &mock_server,
        "/",
        html(
            r#"<a href="/missing">Gone</a><a href="/broken">Broken</a>
            <a href="/feed">Feed</a><a href="/courses/law">Law</a>"#
                .to_string(),
        ),
        1,
    )
    .await;
    mount(&mock_server, "/missing", ResponseTemplate::new(404), 1).await;
    mount(&mock_server, "/broken", ResponseTemplate::new(500), 1).await;
    mount(
        &mock_server,
        "/feed",
        ResponseTemplate::new(200).set_body_raw(r#"{"courses":[]}"#, "application/json"),
        1,
    )
    .await;
    mount(&mock_server, "/courses/law", course_page("Law", 180, ""), 1).await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 2)).unwrap();

    let job = coordinator
        .crawl(request(&base_url, 10), course_schema())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.records_found, 1);
}

#[tokio::test]
async fn test_time_budget_stops_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(course_page("Slow", 10, "").set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, 1);
    config.crawler.job_timeout_secs = Some(1);
    let coordinator = Coordinator::new(config).unwrap();

    let job = coordinator
        .crawl(request(&base_url, 10), course_schema())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.records_found, 0);
    assert!(job.message.unwrap().contains("time budget"));
}

#[tokio::test]
async fn test_empty_schema_fails_without_fetching() {
    let mock_server = MockServer::start().await;
    mount(&mock_server, "/", html(String::new()), 0).await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 1)).unwrap();

    let schema = compile(&[FieldDescriptor::leaf("title", "", DataType::String)]);
    let job = coordinator
        .crawl(request(&mock_server.uri(), 10), schema)
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.records_found, 0);
    assert!(job.message.is_some());
}

#[tokio::test]
async fn test_run_unknown_job() {
    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 1)).unwrap();

    assert!(matches!(
        coordinator.run("nowhere", course_schema()).await,
        Err(ScoutError::JobNotFound { .. })
    ));
    assert!(matches!(
        coordinator.get_status("nowhere"),
        Err(ScoutError::JobNotFound { .. })
    ));
}

#[tokio::test]
async fn test_scrape_single_url() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount(
        &mock_server,
        "/courses/data-science",
        course_page("Data Science", 30, r#"<a href="/courses/law">Law</a>"#),
        1,
    )
    .await;
    mount(&mock_server, "/news", html("<h1>News</h1>".to_string()), 1).await;
    mount(&mock_server, "/courses/law", html(String::new()), 0).await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 1)).unwrap();
    let selectors = vec![".course-detail".to_string()];

    let record = coordinator
        .scrape_url(
            &format!("{}/courses/data-science", base_url),
            &selectors,
            Some("img.hero"),
            course_schema(),
        )
        .await
        .unwrap()
        .expect("course page should yield a record");
    assert_eq!(record.fields.get("title"), Some(&json!("Data Science")));
    assert_eq!(record.hero_image, Some(format!("{}/img/30.jpg", base_url)));

    let none = coordinator
        .scrape_url(&format!("{}/news", base_url), &selectors, None, course_schema())
        .await
        .unwrap();
    assert!(none.is_none());

    // Single-page extraction never creates a job
    assert!(coordinator.list_jobs().unwrap().is_empty());
}

#[tokio::test]
async fn test_scrape_url_with_only_invalid_selectors() {
    let mock_server = MockServer::start().await;
    mount(
        &mock_server,
        "/news",
        html(r#"<h1>Campus news</h1><span class="ects">5</span>"#.to_string()),
        0,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 1)).unwrap();

    let record = coordinator
        .scrape_url(
            &format!("{}/news", mock_server.uri()),
            &["div[[".to_string()],
            None,
            course_schema(),
        )
        .await
        .unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn test_scrape_url_list() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount(
        &mock_server,
        "/a",
        course_page("Course A", 10, r#"<a href="/linked">Linked</a>"#),
        1,
    )
    .await;
    // No course-detail element, but the list mode does not gate on selectors
    mount(
        &mock_server,
        "/b",
        html(r#"<h1>Course B</h1><p data-ects="20">20 credits</p>"#.to_string()),
        1,
    )
    .await;
    mount(&mock_server, "/c", html("<p>Nothing here</p>".to_string()), 1).await;
    mount(&mock_server, "/linked", html(String::new()), 0).await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 2)).unwrap();

    let urls = vec![
        format!("{}/a", base_url),
        format!("{}/b", base_url),
        format!("{}/a/", base_url),
        "not a url".to_string(),
        format!("{}/c", base_url),
    ];
    let job = coordinator
        .scrape_urls("test-uni", &urls, None, course_schema())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.max_records, 3);
    assert_eq!(job.records_found, 2);

    let storage = open_storage(&dir.path().join("courses.db")).unwrap();
    let mut records = storage.list_records("test-uni").unwrap();
    records.sort_by(|a, b| a.source_url.cmp(&b.source_url));
    assert_eq!(records[1].fields.get("ects"), Some(&json!(20)));
}

#[tokio::test]
async fn test_cancel_queued_job() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir, 1)).unwrap();

    coordinator.start_crawl(request(&mock_server.uri(), 5)).unwrap();
    let job = coordinator.cancel("test-uni").unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);

    assert!(matches!(
        coordinator.cancel("nowhere"),
        Err(ScoutError::JobNotFound { .. })
    ));
}

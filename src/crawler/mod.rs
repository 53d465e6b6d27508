//! Crawler module for course discovery
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and error classification
//! - HTML helpers for links, course-page detection and page text
//! - The shared frontier with exactly-once visitation
//! - Crawl job coordination over a bounded worker pool

mod coordinator;
mod fetcher;
mod frontier;
mod page;
mod parser;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, fetch_url, FetchResult, MAX_REDIRECTS};
pub use frontier::{CrawlState, Frontier, InFlightGuard, Next};
pub use page::{analyze_page, PageOutcome, PageRules};
pub use parser::{
    clean_text, compile_selectors, extract_hero_image, extract_links, extract_title, matches_any,
};

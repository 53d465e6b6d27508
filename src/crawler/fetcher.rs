//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch page content
//! - Error classification

use crate::config::UserAgentConfig;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Maximum redirect hops followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value
        content_type: String,
        /// Page body content
        body: String,
    },

    /// Page is not HTML (Content-Type mismatch)
    ContentMismatch {
        /// Final URL after redirects
        final_url: String,
        /// The actual Content-Type received
        content_type: String,
    },

    /// Server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, too many redirects, etc.)
    NetworkError {
        /// Error description
        error: String,
        /// Whether the request hit the timeout
        timed_out: bool,
    },
}

impl FetchResult {
    /// Short label for log lines
    pub fn describe(&self) -> String {
        match self {
            Self::Success { status_code, .. } => format!("HTTP {}", status_code),
            Self::ContentMismatch { content_type, .. } => {
                format!("not HTML ({})", content_type)
            }
            Self::HttpError { status_code } => format!("HTTP {}", status_code),
            Self::NetworkError { error, timed_out } => {
                if *timed_out {
                    "timed out".to_string()
                } else {
                    error.clone()
                }
            }
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Example
///
/// ```no_run
/// use course_scout::config::UserAgentConfig;
/// use course_scout::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "CourseScout".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, following redirects
///
/// Never fails: every outcome is a [`FetchResult`] the caller can log and
/// move past. A response without a Content-Type header is treated as HTML.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(e),
    };

    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html(&content_type) {
        return FetchResult::ContentMismatch {
            final_url,
            content_type,
        };
    }

    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
        },
        Err(e) => classify_error(e),
    }
}

fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.is_empty()
        || content_type.contains("text/html")
        || content_type.contains("application/xhtml+xml")
}

fn classify_error(e: reqwest::Error) -> FetchResult {
    if e.is_timeout() {
        FetchResult::NetworkError {
            error: "Request timeout".to_string(),
            timed_out: true,
        }
    } else if e.is_connect() {
        FetchResult::NetworkError {
            error: "Connection refused".to_string(),
            timed_out: false,
        }
    } else if e.is_redirect() {
        FetchResult::NetworkError {
            error: format!("Redirect error: {}", e),
            timed_out: false,
        }
    } else {
        FetchResult::NetworkError {
            error: e.to_string(),
            timed_out: false,
        }
    }
}

use crate::url::domain::url_registrable_domain;
use url::Url;

/// File extensions that are never worth fetching while looking for course pages
pub const BLOCKED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "jpg", "jpeg", "png", "gif", "zip", "rar", "csv", "xlsx", "ppt", "pptx",
];

/// Checks if a URL path ends in a blocked binary extension
///
/// The comparison is case-insensitive and only looks at the path, so query
/// strings such as `?format=pdf` do not trigger it.
pub fn has_blocked_extension(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };

    // A dot inside an earlier segment is not an extension
    if ext.contains('/') {
        return false;
    }

    BLOCKED_EXTENSIONS.contains(&ext)
}

/// Decides which discovered links belong to a crawl
///
/// A link is followed when it is absolute http(s), shares the crawl's
/// registrable domain, and does not point at a blocked binary file.
/// Deduplication is the frontier's job, not the filter's.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    domain: String,
}

impl LinkFilter {
    /// Creates a filter for the given registrable domain
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_lowercase(),
        }
    }

    /// The registrable domain this filter contains the crawl to
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns true if the URL lies inside the crawl's registrable domain
    pub fn is_same_site(&self, url: &Url) -> bool {
        url_registrable_domain(url).is_some_and(|d| d == self.domain)
    }

    /// Returns true if the link should be enqueued
    pub fn accepts(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        if !self.is_same_site(url) {
            return false;
        }

        !has_blocked_extension(url)
    }
}

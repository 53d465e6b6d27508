//! URL handling module for Course-Scout
//!
//! This module provides URL normalization, registrable-domain computation and
//! the link filter that keeps a crawl inside one institution's site.

mod domain;
mod filter;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, registrable_domain, url_registrable_domain};
pub use filter::{has_blocked_extension, LinkFilter, BLOCKED_EXTENSIONS};
pub use normalize::{normalize_url, NormalizedUrl};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_link_passes_filter() {
        let filter = LinkFilter::new(&registrable_domain("www.example.edu"));
        let link = normalize_url("https://WWW.EXAMPLE.EDU/courses/data-science/#fees").unwrap();

        assert_eq!(link.as_str(), "https://www.example.edu/courses/data-science");
        assert!(filter.accepts(link.url()));
    }

    #[test]
    fn test_normalized_binary_link_rejected() {
        let filter = LinkFilter::new("example.edu");
        let link = normalize_url("https://example.edu/brochure.pdf#page=2").unwrap();
        assert!(!filter.accepts(link.url()));
    }
}

//! HTML helpers for crawled pages
//!
//! This module works on an already parsed document to:
//! - Extract links to follow (from <a> tags and canonical links)
//! - Recognise course pages by selector
//! - Find the hero image and the visible page text

use scraper::{Html, Selector};
use url::Url;

/// Elements whose text is never part of the visible page content
const HIDDEN_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracts the page title from the HTML document
pub fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all valid links from the HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// Links are absolute but not yet normalized or filtered by domain.
pub fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}

/// Parses selector strings, skipping the ones that do not parse
pub fn compile_selectors<S: AsRef<str>>(selectors: &[S]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| {
            let s = s.as_ref();
            match Selector::parse(s) {
                Ok(selector) => Some(selector),
                Err(e) => {
                    tracing::warn!("Ignoring invalid selector '{}': {:?}", s, e);
                    None
                }
            }
        })
        .collect()
}

/// Returns true if any selector matches an element of the document
pub fn matches_any(document: &Html, selectors: &[Selector]) -> bool {
    selectors
        .iter()
        .any(|selector| document.select(selector).next().is_some())
}

/// Absolute URL of the first image matching `selector`
///
/// Uses the `src` attribute, or `data-src` for lazily loaded images.
pub fn extract_hero_image(document: &Html, selector: &Selector, base_url: &Url) -> Option<String> {
    let element = document.select(selector).next()?;
    let src = element
        .value()
        .attr("src")
        .or_else(|| element.value().attr("data-src"))
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    base_url.join(src).ok().map(|url| url.to_string())
}

/// Visible text of the document with whitespace collapsed
pub fn clean_text(document: &Html) -> String {
    let mut words: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|element| HIDDEN_TEXT_ELEMENTS.contains(&element.name()));
        if hidden {
            continue;
        }

        words.extend(text.split_whitespace());
    }

    words.join(" ")
}

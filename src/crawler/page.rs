//! Per-page analysis
//!
//! Parsing a page, recognising it as a course page, extracting its record and
//! collecting its links all happen in one synchronous call. The parsed
//! document is not `Send`, so it must never live across an await point.

use crate::crawler::parser::{
    clean_text, compile_selectors, extract_hero_image, extract_links, extract_title, matches_any,
};
use crate::extract::{ExtractedRecord, FieldExtractor};
use crate::url::{normalize_url, LinkFilter, NormalizedUrl};
use scraper::{Html, Selector};
use url::Url;

/// How pages of one job are recognised and extracted
#[derive(Debug)]
pub struct PageRules {
    course_selectors: Vec<Selector>,
    hero_image_selector: Option<Selector>,
    extractor: FieldExtractor,
}

impl PageRules {
    /// Compiles the page rules of a job
    ///
    /// With no course selectors every page counts as a course page.
    /// Selectors that do not parse are logged and skipped.
    pub fn new<S: AsRef<str>>(
        course_selectors: &[S],
        hero_image_selector: Option<&str>,
        extractor: FieldExtractor,
    ) -> Self {
        Self {
            course_selectors: compile_selectors(course_selectors),
            hero_image_selector: hero_image_selector.and_then(|s| compile_selectors(&[s]).pop()),
            extractor,
        }
    }

    /// Whether pages must match a course selector before extraction
    pub fn gates_on_course_selectors(&self) -> bool {
        !self.course_selectors.is_empty()
    }

    pub fn extractor(&self) -> &FieldExtractor {
        &self.extractor
    }
}

/// What one page produced
#[derive(Debug, Default)]
pub struct PageOutcome {
    pub is_course_page: bool,
    pub record: Option<ExtractedRecord>,

    /// Normalized links that passed the link filter
    pub links: Vec<NormalizedUrl>,
}

/// Analyzes one fetched page
///
/// # Arguments
///
/// * `page` - Normalized URL the page was fetched from, used as the record's source
/// * `base_url` - URL relative links and image sources resolve against
/// * `body` - The HTML body
/// * `rules` - The job's page rules
/// * `extract` - Whether a record may still be extracted (false once the cap is reached)
/// * `link_filter` - Filter for discovered links; None skips link collection
pub fn analyze_page(
    page: &NormalizedUrl,
    base_url: &Url,
    body: &str,
    rules: &PageRules,
    extract: bool,
    link_filter: Option<&LinkFilter>,
) -> PageOutcome {
    let document = Html::parse_document(body);

    let is_course_page =
        !rules.gates_on_course_selectors() || matches_any(&document, &rules.course_selectors);

    let record = if is_course_page && extract {
        let record = rules
            .extractor
            .extract(&document)
            .map(|fields| ExtractedRecord {
                source_url: page.as_str().to_string(),
                fields,
                hero_image: rules
                    .hero_image_selector
                    .as_ref()
                    .and_then(|selector| extract_hero_image(&document, selector, base_url)),
                content: clean_text(&document),
            });

        if record.is_none() {
            tracing::debug!(
                "{} ({}) did not match enough fields",
                page,
                extract_title(&document).unwrap_or_default()
            );
        }
        record
    } else {
        None
    };

    let links = match link_filter {
        Some(filter) => extract_links(&document, base_url)
            .into_iter()
            .filter_map(|link| normalize_url(&link).ok())
            .filter(|link| filter.accepts(link.url()))
            .collect(),
        None => Vec::new(),
    };

    PageOutcome {
        is_course_page,
        record,
        links,
    }
}

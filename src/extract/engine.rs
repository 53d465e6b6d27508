//! Field extraction engine
//!
//! Applies a compiled schema to a parsed page and decides, by match ratio,
//! whether the page yields a record.

use super::convert::convert_text;
use crate::schema::{CompiledSchema, ExtractionRule, RuleKind};
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Share of leaf fields that must match for a page to yield a record
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.75;

/// Result of applying a schema to one document
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Values of the fields that matched, nested like the schema
    pub fields: Map<String, Value>,

    /// Leaf fields that produced a value
    pub matched: usize,

    /// Leaf fields in the schema
    pub total: usize,
}

impl Extraction {
    /// Share of leaf fields that matched, 0.0 for an empty schema
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total as f64
    }
}

/// Applies a compiled schema to parsed documents
///
/// Selectors are parsed once when the extractor is built. The extractor holds
/// no per-document state and can be shared between workers.
#[derive(Debug)]
pub struct FieldExtractor {
    schema: CompiledSchema,
    threshold: f64,
    selectors: HashMap<String, Selector>,

    /// Leaf fields reachable through selectors that parsed
    total: usize,
}

impl FieldExtractor {
    /// Creates an extractor with the given match threshold
    ///
    /// The threshold is clamped to `0.0..=1.0`.
    pub fn new(schema: CompiledSchema, threshold: f64) -> Self {
        let mut selectors = HashMap::new();
        for selector in schema.all_selectors() {
            if selectors.contains_key(selector) {
                continue;
            }
            match Selector::parse(selector) {
                Ok(parsed) => {
                    selectors.insert(selector.to_string(), parsed);
                }
                Err(e) => {
                    tracing::warn!("Selector '{}' does not parse: {:?}", selector, e);
                }
            }
        }

        let total = executable_leaves(schema.rules(), &selectors);
        if total < schema.total_leaf_count() {
            tracing::warn!(
                "{} of {} schema fields have no usable selector",
                schema.total_leaf_count() - total,
                schema.total_leaf_count()
            );
        }

        Self {
            schema,
            threshold: threshold.clamp(0.0, 1.0),
            selectors,
            total,
        }
    }

    /// Leaf fields that count toward the match ratio
    pub fn total_fields(&self) -> usize {
        self.total
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Extracts a record from a document, or None below the match threshold
    ///
    /// A schema without leaf fields never yields a record.
    pub fn extract(&self, document: &Html) -> Option<Map<String, Value>> {
        let extraction = self.evaluate(document);
        if extraction.total == 0 {
            return None;
        }

        if extraction.ratio() >= self.threshold {
            Some(extraction.fields)
        } else {
            tracing::debug!(
                "Matched {}/{} fields, below threshold {:.2}",
                extraction.matched,
                extraction.total,
                self.threshold
            );
            None
        }
    }

    /// Parses `html` and extracts a record from it
    pub fn extract_html(&self, html: &str) -> Option<Map<String, Value>> {
        self.extract(&Html::parse_document(html))
    }

    /// Applies every rule and tallies matched leaves, ignoring the threshold
    pub fn evaluate(&self, document: &Html) -> Extraction {
        let mut matched = 0;
        let fields = self.extract_fields(document.root_element(), self.schema.rules(), &mut matched);

        Extraction {
            fields,
            matched,
            total: self.total,
        }
    }

    fn extract_fields(
        &self,
        scope: ElementRef<'_>,
        rules: &[ExtractionRule],
        matched: &mut usize,
    ) -> Map<String, Value> {
        let mut fields = Map::new();

        for rule in rules {
            let Some(element) = self.select_first(scope, rule) else {
                continue;
            };

            match rule.kind() {
                RuleKind::Leaf(data_type) => {
                    let text = element_text(element);
                    if let Some(value) = convert_text(&text, *data_type) {
                        *matched += 1;
                        fields.insert(rule.name().to_string(), value);
                    }
                }
                RuleKind::Group(nested) => {
                    let sub = self.extract_fields(element, nested, matched);
                    if !sub.is_empty() {
                        fields.insert(rule.name().to_string(), Value::Object(sub));
                    }
                }
            }
        }

        fields
    }

    /// First element matching the rule's selectors, tried in order
    fn select_first<'a>(&self, scope: ElementRef<'a>, rule: &ExtractionRule) -> Option<ElementRef<'a>> {
        rule.selectors()
            .filter_map(|s| self.selectors.get(s))
            .find_map(|selector| scope.select(selector).next())
    }
}

/// Counts the leaves a document can reach, skipping rules with no parsed selector
fn executable_leaves(rules: &[ExtractionRule], selectors: &HashMap<String, Selector>) -> usize {
    rules
        .iter()
        .filter(|rule| rule.selectors().any(|s| selectors.contains_key(s)))
        .map(|rule| match rule.kind() {
            RuleKind::Leaf(_) => 1,
            RuleKind::Group(nested) => executable_leaves(nested, selectors),
        })
        .sum()
}

/// All descendant text of an element, trimmed
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

//! Field extraction
//!
//! Applies a [`CompiledSchema`](crate::schema::CompiledSchema) to a parsed
//! page and decides, by the share of matched leaf fields, whether the page
//! yields a course record.

mod convert;
mod engine;

pub use convert::convert_text;
pub use engine::{Extraction, FieldExtractor, DEFAULT_MATCH_THRESHOLD};

use serde::Serialize;
use serde_json::{Map, Value};

/// A course record extracted from one page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecord {
    /// Normalized URL of the page the record came from
    pub source_url: String,

    /// Field values, nested like the schema
    pub fields: Map<String, Value>,

    /// Absolute URL of the course's hero image
    pub hero_image: Option<String>,

    /// Visible text of the page
    pub content: String,
}

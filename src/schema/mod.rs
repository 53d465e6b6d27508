//! Extraction schemas
//!
//! A schema starts as a list of [`FieldDescriptor`]s written by a schema
//! generator. Descriptors are compiled once per crawl job into a tree of
//! [`ExtractionRule`]s in which every selector is known to be valid.

mod compiler;
mod selector;
mod source;
mod types;

pub use compiler::{compile, compile_with};
pub use selector::{CssSelectorSyntax, SelectorSyntax};
pub use source::{
    group_target_fields, parse_schema_document, JsonSchemaSource, SchemaSource, TargetField,
};
pub use types::{
    CompiledSchema, DataType, ExtractionRule, FieldDescriptor, RuleKind, ScalarType,
};

use thiserror::Error;

/// Errors raised while obtaining a schema
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid schema document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    #[error("Schema generation failed: {0}")]
    Generation(String),
}

/// Result type alias for schema operations
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

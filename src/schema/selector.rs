//! Selector syntax checking
//!
//! The compiler only needs to know whether a selector string is usable. This
//! is kept behind a small trait so that the parsing engine can change without
//! touching the compiler or the extraction engine.

use scraper::Selector;

/// Decides whether a selector string can be executed by the document parser
pub trait SelectorSyntax {
    fn is_valid(&self, selector: &str) -> bool;
}

/// CSS selector syntax as understood by `scraper`
#[derive(Debug, Clone, Copy, Default)]
pub struct CssSelectorSyntax;

impl SelectorSyntax for CssSelectorSyntax {
    fn is_valid(&self, selector: &str) -> bool {
        !selector.trim().is_empty() && Selector::parse(selector).is_ok()
    }
}

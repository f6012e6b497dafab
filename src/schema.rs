//! Schema collaborator interface.
//!
//! The engine consumes, but never implements, table-schema validation. A
//! collaborator may contribute dialect defaults, decides its own
//! applicability through [`SchemaValidator::table_for`], and returns
//! [`Findings`] from each entry point; the engine merges those verbatim
//! into the session output.

use crate::{dialect::DialectOverrides, diagnostics::Findings};

pub trait SchemaValidator {
    /// Dialect defaults contributed by the schema document, if any.
    fn dialect(&self) -> Option<DialectOverrides> {
        None
    }

    /// Whether the schema declares a table matching the given source
    /// identifier. A negative answer sidelines the schema for the run.
    fn table_for(&self, source: &str) -> bool;

    fn validate_header(&mut self, cells: &[String]) -> Findings;

    fn validate_row(&mut self, cells: &[String], line: u64) -> Findings;

    /// Invoked once after the whole stream has been consumed.
    fn validate_foreign_keys(&mut self) -> Findings {
        Findings::default()
    }
}

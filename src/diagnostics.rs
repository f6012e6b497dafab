//! Diagnostic vocabulary and the ordered findings collector.
//!
//! Diagnostics are values, never `Err`: a malformed line produces a
//! [`Diagnostic`] and the session keeps consuming. [`Findings`] keeps the
//! three severity lists in append order so callers see findings in the order
//! the stream produced them.

use std::fmt;

use anyhow::{Context, Result};
use serde::{Serialize, Serializer};

/// Closed vocabulary of diagnostic kinds. Stable across releases; pipeline
/// consumers match on the serialized snake_case names.
///
/// `Schema` carries a kind contributed by a schema collaborator and passes
/// through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    NotFound,
    InvalidEncoding,
    StrayQuote,
    Whitespace,
    UnclosedQuote,
    LineBreaks,
    UnknownError,
    BlankRows,
    RaggedRows,
    EmptyColumnName,
    DuplicateColumnName,
    InconsistentValues,
    TitleRow,
    CheckOptions,
    NonRfcLineBreaks,
    NoContentType,
    WrongContentType,
    NoEncoding,
    Encoding,
    SchemaMismatch,
    AssumedHeader,
    Schema(String),
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidEncoding => "invalid_encoding",
            Self::StrayQuote => "stray_quote",
            Self::Whitespace => "whitespace",
            Self::UnclosedQuote => "unclosed_quote",
            Self::LineBreaks => "line_breaks",
            Self::UnknownError => "unknown_error",
            Self::BlankRows => "blank_rows",
            Self::RaggedRows => "ragged_rows",
            Self::EmptyColumnName => "empty_column_name",
            Self::DuplicateColumnName => "duplicate_column_name",
            Self::InconsistentValues => "inconsistent_values",
            Self::TitleRow => "title_row",
            Self::CheckOptions => "check_options",
            Self::NonRfcLineBreaks => "nonrfc_line_breaks",
            Self::NoContentType => "no_content_type",
            Self::WrongContentType => "wrong_content_type",
            Self::NoEncoding => "no_encoding",
            Self::Encoding => "encoding",
            Self::SchemaMismatch => "schema_mismatch",
            Self::AssumedHeader => "assumed_header",
            Self::Schema(name) => name,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DiagnosticKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Structure,
    Schema,
    Context,
}

/// One reported finding: kind, category, optional location, optional raw
/// content (the offending line or an auxiliary object rendered as text).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, category: Category) -> Self {
        Self {
            kind,
            category,
            line: None,
            column: None,
            content: None,
        }
    }

    pub fn at_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }

    pub fn at_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(line) = self.line {
            write!(f, " at line {line}")?;
        }
        if let Some(column) = self.column {
            write!(f, " column {column}")?;
        }
        Ok(())
    }
}

/// Ordered append-only sink of diagnostics, partitioned by severity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Findings {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub info: Vec<Diagnostic>,
}

impl Findings {
    pub fn error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    pub fn warning(&mut self, diagnostic: Diagnostic) {
        self.warnings.push(diagnostic);
    }

    pub fn info_message(&mut self, diagnostic: Diagnostic) {
        self.info.push(diagnostic);
    }

    /// Appends another set of findings verbatim, preserving its order.
    /// Used to fold schema-collaborator output into the session.
    pub fn merge(&mut self, other: Findings) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.info.extend(other.info);
    }

    pub fn has_error(&self, kind: &DiagnosticKind) -> bool {
        self.errors.iter().any(|d| &d.kind == kind)
    }

    /// A result is valid exactly when no errors were collected.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing findings to JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_as_snake_case_string() {
        let json = serde_json::to_string(&DiagnosticKind::NonRfcLineBreaks).unwrap();
        assert_eq!(json, "\"nonrfc_line_breaks\"");

        let schema_kind = DiagnosticKind::Schema("missing_value".to_string());
        assert_eq!(serde_json::to_string(&schema_kind).unwrap(), "\"missing_value\"");
    }

    #[test]
    fn diagnostic_omits_absent_location_fields() {
        let diagnostic = Diagnostic::new(DiagnosticKind::TitleRow, Category::Structure);
        let json = serde_json::to_string(&diagnostic).unwrap();
        assert!(!json.contains("line"));
        assert!(!json.contains("column"));
        assert!(!json.contains("content"));
    }

    #[test]
    fn validity_tracks_errors_only() {
        let mut findings = Findings::default();
        assert!(findings.is_valid());

        findings.warning(Diagnostic::new(DiagnosticKind::TitleRow, Category::Structure));
        assert!(findings.is_valid());

        findings.error(
            Diagnostic::new(DiagnosticKind::RaggedRows, Category::Structure).at_line(3),
        );
        assert!(!findings.is_valid());
        assert!(findings.has_error(&DiagnosticKind::RaggedRows));
        assert!(!findings.has_error(&DiagnosticKind::BlankRows));
    }

    #[test]
    fn merge_preserves_order() {
        let mut base = Findings::default();
        base.error(Diagnostic::new(DiagnosticKind::BlankRows, Category::Structure).at_line(2));

        let mut other = Findings::default();
        other.error(Diagnostic::new(
            DiagnosticKind::Schema("required".to_string()),
            Category::Schema,
        ));

        base.merge(other);
        assert_eq!(base.errors.len(), 2);
        assert_eq!(base.errors[1].kind.as_str(), "required");
    }
}

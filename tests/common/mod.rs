#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use tempfile::{TempDir, tempdir};

use csv_vet::{
    Category, Diagnostic, DiagnosticKind, DialectOverrides, Findings, Headers, RemoteDocument,
    SchemaValidator, Source, Validator,
};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Runs a fresh default session over buffered content.
pub fn validate_text(content: &str) -> Validator {
    let mut validator = Validator::new(None, None);
    validator
        .validate(Source::buffered(content))
        .expect("buffered validation");
    validator
}

pub fn error_kinds(validator: &Validator) -> Vec<&str> {
    validator
        .findings()
        .errors
        .iter()
        .map(|d| d.kind.as_str())
        .collect()
}

pub fn warning_kinds(validator: &Validator) -> Vec<&str> {
    validator
        .findings()
        .warnings
        .iter()
        .map(|d| d.kind.as_str())
        .collect()
}

/// Scripted transport collaborator: fixed status and headers, chunks
/// delivered in order.
pub struct ScriptedRemote {
    status: u16,
    headers: Headers,
    chunks: VecDeque<Vec<u8>>,
}

impl ScriptedRemote {
    pub fn new(
        status: u16,
        header_pairs: &[(&str, &str)],
        chunks: &[&[u8]],
    ) -> Self {
        Self {
            status,
            headers: Headers::from_pairs(header_pairs.iter().copied()),
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
        }
    }
}

impl RemoteDocument for ScriptedRemote {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.chunks.pop_front())
    }
}

/// Call counters shared between a test and the collaborator it hands to
/// the validator (which takes ownership of the box).
#[derive(Debug, Default)]
pub struct SchemaCalls {
    pub header: usize,
    pub rows: usize,
    pub foreign_keys: usize,
}

/// Recording schema collaborator: emits one scripted warning per header,
/// an error per row with an empty cell, and a foreign-key error at finish.
pub struct RecordingSchema {
    pub matches_table: bool,
    pub dialect: Option<DialectOverrides>,
    pub calls: Rc<RefCell<SchemaCalls>>,
}

impl RecordingSchema {
    pub fn matching() -> (Self, Rc<RefCell<SchemaCalls>>) {
        let calls = Rc::new(RefCell::new(SchemaCalls::default()));
        (
            Self {
                matches_table: true,
                dialect: None,
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }

    pub fn mismatched() -> (Self, Rc<RefCell<SchemaCalls>>) {
        let (mut schema, calls) = Self::matching();
        schema.matches_table = false;
        (schema, calls)
    }
}

impl SchemaValidator for RecordingSchema {
    fn dialect(&self) -> Option<DialectOverrides> {
        self.dialect.clone()
    }

    fn table_for(&self, _source: &str) -> bool {
        self.matches_table
    }

    fn validate_header(&mut self, cells: &[String]) -> Findings {
        self.calls.borrow_mut().header += 1;
        let mut findings = Findings::default();
        findings.warning(
            Diagnostic::new(
                DiagnosticKind::Schema("malformed_header".to_string()),
                Category::Schema,
            )
            .at_line(1)
            .with_content(cells.join(",")),
        );
        findings
    }

    fn validate_row(&mut self, cells: &[String], line: u64) -> Findings {
        self.calls.borrow_mut().rows += 1;
        let mut findings = Findings::default();
        if cells.iter().any(|cell| cell.is_empty()) {
            findings.error(
                Diagnostic::new(
                    DiagnosticKind::Schema("missing_value".to_string()),
                    Category::Schema,
                )
                .at_line(line),
            );
        }
        findings
    }

    fn validate_foreign_keys(&mut self) -> Findings {
        self.calls.borrow_mut().foreign_keys += 1;
        let mut findings = Findings::default();
        findings.error(Diagnostic::new(
            DiagnosticKind::Schema("unmatched_foreign_key".to_string()),
            Category::Schema,
        ));
        findings
    }
}

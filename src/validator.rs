//! Validation session: stream reconstruction, per-line checks, and
//! end-of-stream aggregation.
//!
//! A [`Validator`] owns all state for one run. Bytes arrive either through
//! the synchronous [`Validator::validate`] driver or through the reactive
//! [`Validator::open`] / [`Validator::push_chunk`] / [`Validator::finish`]
//! entry points; both paths share the same reconstruction pipeline:
//!
//! 1. decode the chunk (BOM, transport charset, or UTF-8, in that order),
//! 2. split the buffered text into terminator-delimited fragments,
//! 3. hold fragments whose quote parity is odd until the quote closes,
//! 4. hand each completed logical line to the row parser and checkers.
//!
//! Sessions are single-owner and never reused; the line counter increases
//! by exactly one per completed logical line.

use std::{collections::HashSet, mem};

use anyhow::{Context, Result};
use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use itertools::Itertools;
use log::debug;

use crate::{
    dialect::{Dialect, DialectOverrides, SplitOptions},
    diagnostics::{Category, Diagnostic, DiagnosticKind, Findings},
    formats::FormatTally,
    schema::SchemaValidator,
    source::{DEFAULT_CHUNK_SIZE, Headers, Source},
    splitter::{self, SplitError},
};

pub type LineHook = Box<dyn FnMut(&Validator)>;

pub struct Validator {
    dialect: Dialect,
    options: SplitOptions,
    source_id: Option<String>,
    schema: Option<Box<dyn SchemaValidator>>,
    schema_applies: bool,
    limit: Option<u64>,
    hook: Option<LineHook>,

    findings: Findings,
    rows: Vec<Option<Vec<String>>>,
    header_cells: Option<Vec<String>>,
    formats: FormatTally,

    encoding: Option<&'static Encoding>,
    transport_charset: Option<&'static Encoding>,
    decoder: Option<Decoder>,
    leading: String,
    current_line: u64,
    col_counts: Vec<usize>,
    expected_columns: Option<usize>,
    line_break_styles: Vec<&'static str>,

    reported_invalid_encoding: bool,
    reported_nonrfc: bool,
    assumed_header: bool,
    opened: bool,
    aborted: bool,
    limit_reached: bool,
    finished: bool,
}

impl Validator {
    /// Builds a session from an optional caller dialect and an optional
    /// schema collaborator. The collaborator's dialect contributes defaults
    /// that the caller's overrides still win over.
    pub fn new(
        caller_dialect: Option<DialectOverrides>,
        schema: Option<Box<dyn SchemaValidator>>,
    ) -> Self {
        let schema_dialect = schema.as_ref().and_then(|s| s.dialect());
        let declared_header = caller_dialect
            .as_ref()
            .is_some_and(DialectOverrides::declares_header)
            || schema_dialect
                .as_ref()
                .is_some_and(DialectOverrides::declares_header);
        let dialect = Dialect::compile(schema_dialect.as_ref(), caller_dialect.as_ref());
        debug!("Compiled dialect: {dialect:?}");
        let options = dialect.split_options();
        let schema_applies = schema.is_some();
        Self {
            dialect,
            options,
            source_id: None,
            schema,
            schema_applies,
            limit: None,
            hook: None,
            findings: Findings::default(),
            rows: Vec::new(),
            header_cells: None,
            formats: FormatTally::default(),
            encoding: None,
            transport_charset: None,
            decoder: None,
            leading: String::new(),
            current_line: 0,
            col_counts: Vec::new(),
            expected_columns: None,
            line_break_styles: Vec::new(),
            reported_invalid_encoding: false,
            reported_nonrfc: false,
            assumed_header: !declared_header,
            opened: false,
            aborted: false,
            limit_reached: false,
            finished: false,
        }
    }

    /// Identifier the schema collaborator matches tables against; also used
    /// as context in transport diagnostics.
    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    /// Stops consumption (successfully) after this many logical lines.
    pub fn with_line_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Callback invoked with the live session after every processed line.
    pub fn with_line_hook(mut self, hook: impl FnMut(&Validator) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn findings(&self) -> &Findings {
        &self.findings
    }

    pub fn into_findings(self) -> Findings {
        self.findings
    }

    pub fn is_valid(&self) -> bool {
        self.findings.is_valid()
    }

    /// All attempted rows, index-aligned with logical line numbers; a
    /// `None` entry marks a line whose parse failed entirely.
    pub fn rows(&self) -> &[Option<Vec<String>>] {
        &self.rows
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header_cells.as_deref()
    }

    pub fn current_line(&self) -> u64 {
        self.current_line
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn encoding_name(&self) -> Option<&'static str> {
        self.encoding.map(Encoding::name)
    }

    /// Synchronous driver: walks the whole source and finalizes.
    pub fn validate(&mut self, source: Source) -> Result<()> {
        match source {
            Source::Buffered(text) => {
                self.push_chunk(text.as_bytes());
            }
            Source::Reader(mut reader) => {
                let mut buffer = vec![0u8; DEFAULT_CHUNK_SIZE];
                loop {
                    let read = reader.read(&mut buffer).context("Reading CSV source")?;
                    if read == 0 {
                        break;
                    }
                    self.push_chunk(&buffer[..read]);
                    if self.limit_reached {
                        break;
                    }
                }
            }
            Source::Remote(mut document) => {
                if !self.open(document.status(), document.headers()) {
                    return Ok(());
                }
                while let Some(chunk) = document
                    .next_chunk()
                    .context("Reading CSV response chunk")?
                {
                    self.push_chunk(&chunk);
                    if self.limit_reached {
                        break;
                    }
                }
            }
        }
        self.finish();
        Ok(())
    }

    /// Reactive entry point for remote metadata, invoked before any body
    /// chunk. Returns `false` when validation short-circuits (HTTP 404).
    pub fn open(&mut self, status: u16, headers: &Headers) -> bool {
        self.begin();
        if status == 404 {
            let mut diagnostic = Diagnostic::new(DiagnosticKind::NotFound, Category::Context);
            if let Some(source) = &self.source_id {
                diagnostic = diagnostic.with_content(source.clone());
            }
            self.findings.error(diagnostic);
            self.aborted = true;
            return false;
        }
        match headers.content_type() {
            None => {
                self.findings.warning(Diagnostic::new(
                    DiagnosticKind::NoContentType,
                    Category::Context,
                ));
            }
            Some(content_type) => {
                if !content_type.is_csv() {
                    self.findings.error(
                        Diagnostic::new(DiagnosticKind::WrongContentType, Category::Context)
                            .with_content(content_type.media_type.clone()),
                    );
                }
                match &content_type.charset {
                    None => {
                        self.findings.warning(Diagnostic::new(
                            DiagnosticKind::NoEncoding,
                            Category::Context,
                        ));
                    }
                    Some(label) => match Encoding::for_label(label.as_bytes()) {
                        Some(encoding) => {
                            self.transport_charset = Some(encoding);
                            if encoding != UTF_8 {
                                self.findings.warning(
                                    Diagnostic::new(DiagnosticKind::Encoding, Category::Context)
                                        .with_content(encoding.name()),
                                );
                            }
                        }
                        None => {
                            self.findings.warning(
                                Diagnostic::new(DiagnosticKind::Encoding, Category::Context)
                                    .with_content(label.clone()),
                            );
                        }
                    },
                }
                if let Some(header_param) = &content_type.header {
                    // "header=absent|present" declares what line 1 holds.
                    self.dialect.header = header_param != "absent";
                    self.assumed_header = false;
                }
            }
        }
        true
    }

    /// Feeds one arriving chunk of raw bytes to the reconstructor.
    pub fn push_chunk(&mut self, bytes: &[u8]) {
        self.begin();
        if self.aborted || self.finished || self.limit_reached {
            return;
        }
        let text = self.decode_chunk(bytes, false);
        self.consume_text(&text);
    }

    /// Terminal pass: flushes any pending fragment and derives the
    /// aggregate end-of-stream diagnostics. Idempotent.
    pub fn finish(&mut self) {
        if self.finished || self.aborted {
            return;
        }
        self.begin();
        self.finished = true;

        if self.decoder.is_some() {
            let tail = self.decode_chunk(&[], true);
            if !tail.is_empty() && !self.limit_reached {
                self.consume_text(&tail);
            }
        }
        if !self.leading.is_empty() && !self.limit_reached {
            let line = mem::take(&mut self.leading);
            self.emit_line(line);
        }

        if self.line_break_styles.iter().unique().count() > 1
            && !self.findings.has_error(&DiagnosticKind::LineBreaks)
        {
            self.findings.error(Diagnostic::new(
                DiagnosticKind::LineBreaks,
                Category::Structure,
            ));
        }
        if let Some(&first) = self.col_counts.first() {
            let mean =
                self.col_counts.iter().sum::<usize>() as f64 / self.col_counts.len() as f64;
            // Known-coarse heuristic: a header shorter than the average row
            // suggests a title line was mistaken for the header.
            if (first as f64) < mean {
                self.findings.warning(Diagnostic::new(
                    DiagnosticKind::TitleRow,
                    Category::Structure,
                ));
            }
        }
        if self.expected_columns == Some(1) {
            self.findings.warning(Diagnostic::new(
                DiagnosticKind::CheckOptions,
                Category::Structure,
            ));
        }
        for column in self.formats.inconsistent_columns() {
            self.findings.warning(
                Diagnostic::new(DiagnosticKind::InconsistentValues, Category::Schema)
                    .at_column(column + 1),
            );
        }
        if let Some(encoding) = self.encoding
            && encoding != UTF_8
            && !self
                .findings
                .warnings
                .iter()
                .any(|d| d.kind == DiagnosticKind::Encoding)
        {
            self.findings.warning(
                Diagnostic::new(DiagnosticKind::Encoding, Category::Context)
                    .with_content(encoding.name()),
            );
        }
        if self.assumed_header && self.dialect.header {
            self.findings.info_message(Diagnostic::new(
                DiagnosticKind::AssumedHeader,
                Category::Structure,
            ));
        }
        if self.schema_applies
            && let Some(schema) = self.schema.as_mut()
        {
            let findings = schema.validate_foreign_keys();
            self.findings.merge(findings);
        }
        debug!(
            "Validation finished after {} line(s): {} error(s), {} warning(s), {} info",
            self.current_line,
            self.findings.errors.len(),
            self.findings.warnings.len(),
            self.findings.info.len()
        );
    }

    /// One-time session setup: decides schema applicability against the
    /// source identifier. A mismatch degrades to "no schema" with a single
    /// warning; it never aborts the run.
    fn begin(&mut self) {
        if self.opened {
            return;
        }
        self.opened = true;
        if let (Some(schema), Some(source)) = (self.schema.as_ref(), self.source_id.as_deref())
            && !schema.table_for(source)
        {
            self.findings.warning(
                Diagnostic::new(DiagnosticKind::SchemaMismatch, Category::Context)
                    .with_content(source),
            );
            self.schema_applies = false;
        }
    }

    fn decode_chunk(&mut self, bytes: &[u8], last: bool) -> String {
        let decoder = match &mut self.decoder {
            Some(decoder) => decoder,
            None => {
                let encoding = Encoding::for_bom(bytes)
                    .map(|(encoding, _)| encoding)
                    .or(self.transport_charset)
                    .unwrap_or(UTF_8);
                self.encoding = Some(encoding);
                // new_decoder strips the BOM itself.
                self.decoder.insert(encoding.new_decoder())
            }
        };

        let mut out = String::new();
        let mut had_errors = false;
        let mut input = bytes;
        loop {
            let needed = decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or(DEFAULT_CHUNK_SIZE);
            out.reserve(needed);
            let (result, read, errors) = decoder.decode_to_string(input, &mut out, last);
            had_errors |= errors;
            input = &input[read..];
            if matches!(result, CoderResult::InputEmpty) {
                break;
            }
        }

        if had_errors && !self.reported_invalid_encoding {
            self.reported_invalid_encoding = true;
            self.findings.error(
                Diagnostic::new(DiagnosticKind::InvalidEncoding, Category::Structure)
                    .at_line(self.current_line + 1),
            );
        }
        out
    }

    fn consume_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let pinned = self.options.row_separator.split_char();
        let mut text = text;
        // A previous buffer ended in a bare CR that was held back: a leading
        // LF now completes the pair, anything else closes the CR line.
        if pinned.is_none()
            && self.leading.ends_with('\r')
            && self.leading.matches(self.options.quote_char).count() % 2 == 0
        {
            if let Some(rest) = text.strip_prefix('\n') {
                self.leading.push('\n');
                text = rest;
            }
            let line = mem::take(&mut self.leading);
            self.emit_line(line);
            if text.is_empty() || self.limit_reached {
                return;
            }
        }
        // Terminator sensing happens once per physical buffer, not per line.
        let split_char = pinned.unwrap_or(if text.contains('\n') { '\n' } else { '\r' });
        // A trailing bare CR is ambiguous until the next buffer arrives.
        let hold_tail_cr = pinned.is_none() && split_char == '\r' && text.ends_with('\r');
        let mut pieces = text.split_inclusive(split_char).peekable();
        while let Some(piece) = pieces.next() {
            if self.limit_reached {
                return;
            }
            self.leading.push_str(piece);
            if !piece.ends_with(split_char) {
                continue;
            }
            // A terminator inside an open quoted field is not a boundary:
            // odd quote parity keeps buffering.
            if self.leading.matches(self.options.quote_char).count() % 2 == 1 {
                continue;
            }
            if hold_tail_cr && pieces.peek().is_none() {
                continue;
            }
            let line = mem::take(&mut self.leading);
            self.emit_line(line);
        }
    }

    fn emit_line(&mut self, line: String) {
        self.current_line += 1;
        self.process_line(&line);
        if let Some(limit) = self.limit
            && self.current_line >= limit
        {
            self.limit_reached = true;
        }
        if let Some(mut hook) = self.hook.take() {
            hook(self);
            self.hook = Some(hook);
        }
    }

    fn process_line(&mut self, line: &str) {
        self.note_line_break(line);
        let row_sep = splitter::resolve_row_sep(line, self.options.row_separator);
        match splitter::split_row(line, &self.options, row_sep) {
            Ok(row) => {
                if self.dialect.header && self.current_line == 1 {
                    let cells = self.process_header(row);
                    self.rows.push(Some(cells));
                } else {
                    self.process_row(&row, line);
                    self.rows.push(Some(row));
                }
            }
            Err(error) => {
                self.report_split_error(error, line);
                self.rows.push(None);
            }
        }
    }

    fn note_line_break(&mut self, line: &str) {
        let style = if line.ends_with("\r\n") {
            "\r\n"
        } else if line.ends_with('\n') {
            "\n"
        } else if line.ends_with('\r') {
            "\r"
        } else {
            // Unterminated final line: no style to record.
            return;
        };
        self.line_break_styles.push(style);
        if style != "\r\n" && !self.reported_nonrfc {
            self.reported_nonrfc = true;
            self.findings.info_message(
                Diagnostic::new(DiagnosticKind::NonRfcLineBreaks, Category::Structure)
                    .at_line(self.current_line),
            );
        }
    }

    fn process_header(&mut self, mut cells: Vec<String>) -> Vec<String> {
        if self.dialect.trim {
            for cell in &mut cells {
                let trimmed = cell.trim().to_string();
                *cell = trimmed;
            }
        }
        let mut seen = HashSet::new();
        for (index, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                self.findings.warning(
                    Diagnostic::new(DiagnosticKind::EmptyColumnName, Category::Structure)
                        .at_line(self.current_line)
                        .at_column(index + 1),
                );
            } else if !seen.insert(cell.clone()) {
                self.findings.warning(
                    Diagnostic::new(DiagnosticKind::DuplicateColumnName, Category::Structure)
                        .at_line(self.current_line)
                        .at_column(index + 1)
                        .with_content(cell.clone()),
                );
            }
        }
        self.col_counts
            .push(cells.iter().filter(|cell| !cell.is_empty()).count());
        if self.schema_applies
            && let Some(schema) = self.schema.as_mut()
        {
            let findings = schema.validate_header(&cells);
            self.findings.merge(findings);
        }
        self.header_cells = Some(cells.clone());
        cells
    }

    fn process_row(&mut self, row: &[String], line: &str) {
        self.formats.record_row(row);
        let populated = row.iter().filter(|cell| !cell.is_empty()).count();
        self.col_counts.push(populated);
        if populated == 0 {
            self.findings.error(
                Diagnostic::new(DiagnosticKind::BlankRows, Category::Structure)
                    .at_line(self.current_line)
                    .with_content(line),
            );
        }
        if self.expected_columns.is_none() {
            self.expected_columns = Some(row.len());
        }
        if self.schema_applies && self.schema.is_some() {
            if let Some(schema) = self.schema.as_mut() {
                let findings = schema.validate_row(row, self.current_line);
                self.findings.merge(findings);
            }
        } else if !row.is_empty() && Some(row.len()) != self.expected_columns {
            self.findings.error(
                Diagnostic::new(DiagnosticKind::RaggedRows, Category::Structure)
                    .at_line(self.current_line)
                    .with_content(line),
            );
        }
    }

    fn report_split_error(&mut self, error: SplitError, line: &str) {
        let kind = error.diagnostic_kind();
        // A quoting failure on a line that never contains the declared row
        // separator means the file uses a different line-break convention,
        // not that its quoting is broken.
        let reclassify = matches!(
            kind,
            DiagnosticKind::StrayQuote | DiagnosticKind::UnclosedQuote
        ) && self
            .options
            .row_separator
            .as_literal()
            .is_some_and(|sep| !line.contains(sep));
        if reclassify {
            if !self.findings.has_error(&DiagnosticKind::LineBreaks) {
                self.findings.error(
                    Diagnostic::new(DiagnosticKind::LineBreaks, Category::Structure)
                        .at_line(self.current_line)
                        .with_content(line),
                );
            }
            return;
        }
        self.findings.error(
            Diagnostic::new(kind, Category::Structure)
                .at_line(self.current_line)
                .with_content(line),
        );
    }
}

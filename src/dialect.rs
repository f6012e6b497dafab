//! Dialect compilation and derived field-splitting options.
//!
//! A session's effective [`Dialect`] is the merge of three partial sources
//! with increasing precedence: built-in defaults, an optional
//! schema-provided dialect, and an optional caller override. Merging has no
//! error path; absent sources simply leave the defaults in place.
//!
//! [`DialectOverrides`] is `Deserialize` so pipelines can feed overrides
//! from JSON using the conventional camelCase option names
//! (`skipInitialSpace`, `lineTerminator`, `quoteChar`, ...).

use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Deserializer, de};

/// Row terminator convention, or `Auto` to infer it from the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineTerminator {
    #[default]
    Auto,
    Cr,
    Lf,
    CrLf,
}

impl LineTerminator {
    /// The literal terminator text, or `None` for auto-detection.
    pub fn as_literal(&self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            Self::Cr => Some("\r"),
            Self::Lf => Some("\n"),
            Self::CrLf => Some("\r\n"),
        }
    }

    /// The character physical buffers are split on when this terminator is
    /// pinned. CRLF splits on `\n` since the pair ends with it.
    pub fn split_char(&self) -> Option<char> {
        match self {
            Self::Auto => None,
            Self::Cr => Some('\r'),
            Self::Lf | Self::CrLf => Some('\n'),
        }
    }
}

impl FromStr for LineTerminator {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "\r" => Ok(Self::Cr),
            "\n" => Ok(Self::Lf),
            "\r\n" => Ok(Self::CrLf),
            other => match other.to_ascii_lowercase().as_str() {
                "cr" => Ok(Self::Cr),
                "lf" => Ok(Self::Lf),
                "crlf" => Ok(Self::CrLf),
                "auto" => Ok(Self::Auto),
                _ => Err(anyhow!("Unknown line terminator {other:?}")),
            },
        }
    }
}

impl<'de> Deserialize<'de> for LineTerminator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Partial dialect: every option optional, later sources override earlier
/// ones key by key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DialectOverrides {
    pub header: Option<bool>,
    pub header_row_count: Option<u32>,
    pub delimiter: Option<char>,
    pub skip_initial_space: Option<bool>,
    pub line_terminator: Option<LineTerminator>,
    pub quote_char: Option<char>,
    pub trim: Option<bool>,
}

impl DialectOverrides {
    pub fn declares_header(&self) -> bool {
        self.header.is_some()
    }
}

/// Fully-populated dialect, immutable once compiled for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Dialect {
    pub header: bool,
    /// Reserved: only a single header row is honored.
    pub header_row_count: u32,
    pub delimiter: char,
    pub skip_initial_space: bool,
    pub line_terminator: LineTerminator,
    pub quote_char: char,
    pub trim: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            header: true,
            header_row_count: 1,
            delimiter: ',',
            skip_initial_space: true,
            line_terminator: LineTerminator::Auto,
            quote_char: '"',
            trim: true,
        }
    }
}

impl Dialect {
    /// Merges default -> schema -> caller, later keys overriding earlier
    /// ones.
    pub fn compile(
        schema: Option<&DialectOverrides>,
        caller: Option<&DialectOverrides>,
    ) -> Self {
        let mut dialect = Dialect::default();
        for overrides in [schema, caller].into_iter().flatten() {
            dialect.apply(overrides);
        }
        dialect
    }

    fn apply(&mut self, overrides: &DialectOverrides) {
        if let Some(header) = overrides.header {
            self.header = header;
        }
        if let Some(count) = overrides.header_row_count {
            self.header_row_count = count;
        }
        if let Some(delimiter) = overrides.delimiter {
            self.delimiter = delimiter;
        }
        if let Some(skip) = overrides.skip_initial_space {
            self.skip_initial_space = skip;
        }
        if let Some(terminator) = overrides.line_terminator {
            self.line_terminator = terminator;
        }
        if let Some(quote) = overrides.quote_char {
            self.quote_char = quote;
        }
        if let Some(trim) = overrides.trim {
            self.trim = trim;
        }
    }

    /// Derives the low-level splitting options. The field separator gains a
    /// trailing space when initial whitespace is significant, so that
    /// delimiter-plus-space sequences are consumed as one separator. Blank
    /// lines are never skipped at this level; blank rows are a diagnosable
    /// condition.
    pub fn split_options(&self) -> SplitOptions {
        let mut field_separator = self.delimiter.to_string();
        if !self.skip_initial_space {
            field_separator.push(' ');
        }
        SplitOptions {
            field_separator,
            row_separator: self.line_terminator,
            quote_char: self.quote_char,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitOptions {
    pub field_separator: String,
    pub row_separator: LineTerminator,
    pub quote_char: char,
}

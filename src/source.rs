//! Input source abstraction and transport metadata.
//!
//! The engine accepts exactly three source capabilities: a fully buffered
//! text blob, an incremental reader, or a remote document behind a
//! transport collaborator. The collaborator supplies status, response
//! headers, and ordered body chunks; retry and timeout policy stay on its
//! side of the seam.

use std::{fmt, io::Read};

use anyhow::Result;

pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Closed capability set for validation input.
pub enum Source {
    Buffered(String),
    Reader(Box<dyn Read>),
    Remote(Box<dyn RemoteDocument>),
}

impl Source {
    pub fn buffered(text: impl Into<String>) -> Self {
        Self::Buffered(text.into())
    }

    pub fn reader(reader: impl Read + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }

    pub fn remote(document: impl RemoteDocument + 'static) -> Self {
        Self::Remote(Box::new(document))
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(text) => f.debug_tuple("Buffered").field(&text.len()).finish(),
            Self::Reader(_) => f.write_str("Reader"),
            Self::Remote(_) => f.write_str("Remote"),
        }
    }
}

/// Transport collaborator for remote CSV resources. Status and headers are
/// available before the first body chunk; chunks arrive in order and end
/// with `None`.
pub trait RemoteDocument {
    fn status(&self) -> u16;
    fn headers(&self) -> &Headers;
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Case-insensitive response-header map.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.insert(name, value);
        }
        headers
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.entries
            .push((name.to_ascii_lowercase(), value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let wanted = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(key, _)| *key == wanted)
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.get("content-type").map(ContentType::parse)
    }
}

/// Parsed `Content-Type` header: media type plus the `charset` and `header`
/// parameters the validator cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub media_type: String,
    pub charset: Option<String>,
    pub header: Option<String>,
}

impl ContentType {
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split(';');
        let media_type = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        let mut charset = None;
        let mut header = None;
        for part in parts {
            let Some((name, value)) = part.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match name.trim().to_ascii_lowercase().as_str() {
                "charset" => charset = Some(value.to_string()),
                "header" => header = Some(value.to_ascii_lowercase()),
                _ => {}
            }
        }
        Self {
            media_type,
            charset,
            header,
        }
    }

    pub fn is_csv(&self) -> bool {
        self.media_type == "text/csv"
    }
}

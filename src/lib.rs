//! Streaming CSV validation engine.
//!
//! `csv-vet` certifies CSV text (in memory, from a reader, or served over a
//! transport collaborator) against RFC-4180-style structural rules and an
//! optional external table schema, producing an ordered, typed list of
//! errors, warnings, and informational findings rather than failing on the
//! first malformed line.
//!
//! ```
//! use csv_vet::{Source, Validator};
//!
//! let mut validator = Validator::new(None, None);
//! validator
//!     .validate(Source::buffered("id,name\n1,alpha\n2,beta\n"))
//!     .unwrap();
//! assert!(validator.is_valid());
//! ```

pub mod dialect;
pub mod diagnostics;
pub mod formats;
pub mod schema;
pub mod source;
pub mod splitter;
pub mod validator;

pub use dialect::{Dialect, DialectOverrides, LineTerminator, SplitOptions};
pub use diagnostics::{Category, Diagnostic, DiagnosticKind, Findings};
pub use formats::{FormatTally, ValueFormat, classify};
pub use schema::SchemaValidator;
pub use source::{ContentType, Headers, RemoteDocument, Source};
pub use validator::Validator;

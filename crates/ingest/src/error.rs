//! Error types produced by the ingest crate.
//!
//! Configuration problems live in [`ConfigError`](crate::ConfigError) and are
//! detected before any file is opened. [`IngestError`] covers everything that
//! can go wrong once the source is being read.
//!
//! | Error | Description |
//! |-------|-------------|
//! | [`Open`](IngestError::Open) | Source file could not be opened |
//! | [`Header`](IngestError::Header) | Header record could not be read |
//! | [`Record`](IngestError::Record) | A data record was malformed or not decodable |
//!
//! All variants carry rendered messages rather than the underlying
//! `std::io::Error` / `csv::Error`, so the enum stays cloneable and comparable.
use thiserror::Error;

/// Errors raised while reading rows from a delimited-text source.
///
/// ```rust
/// use ingest::IngestError;
///
/// let err = IngestError::Record { line: Some(12), message: "invalid utf-8".into() };
/// assert_eq!(err.to_string(), "malformed record at line 12: invalid utf-8");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IngestError {
    #[error("failed to open source {path}: {message}")]
    Open { path: String, message: String },

    #[error("failed to read header record: {0}")]
    Header(String),

    #[error("malformed record at {}: {message}", display_line(.line))]
    Record { line: Option<u64>, message: String },
}

fn display_line(line: &Option<u64>) -> String {
    match line {
        Some(line) => format!("line {line}"),
        None => "unknown line".to_string(),
    }
}

impl IngestError {
    pub(crate) fn from_csv(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line());
        IngestError::Record {
            line,
            message: err.to_string(),
        }
    }
}

//! Configuration types for the ingest pipeline.
//!
//! [`IngestConfig`] carries the options that shape how rows are read and
//! grouped: documents per write call, whether writes are ordered, the column
//! separator, and the text encoding of the source. It is cheap to clone and
//! deserializes from any format the `config` crate understands.
//!
//! Validate once at startup, before any I/O:
//!
//! ```rust
//! use ingest::IngestConfig;
//!
//! let config = IngestConfig::default();
//! config.validate().expect("default configuration is valid");
//! ```
use encoding_rs::{Encoding, REPLACEMENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime configuration for reading and batching a delimited-text source.
///
/// ```json
/// {
///   "batch_size": 1000,
///   "ordered": false,
///   "delimiter": ",",
///   "encoding": "utf-8"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    /// Documents per bulk write call. Must be positive.
    ///
    /// Signed so that a negative value from a config file or environment
    /// variable surfaces as [`ConfigError::InvalidBatchSize`] rather than a
    /// parse failure.
    ///
    /// Default: `1000`
    pub batch_size: i64,

    /// Stop a batch at its first failing document.
    ///
    /// Bulk writes are always unordered so a rejected document never blocks
    /// the rest of its batch; `true` is rejected by [`IngestConfig::validate`].
    ///
    /// Default: `false`
    pub ordered: bool,

    /// Column separator. Must be exactly one ASCII character.
    ///
    /// Default: `","`
    pub delimiter: String,

    /// Text encoding label of the source (WHATWG labels: `utf-8`, `latin1`,
    /// `windows-1252`, `utf-16le`, ...).
    ///
    /// Default: `"utf-8"`
    pub encoding: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            ordered: false,
            delimiter: ",".into(),
            encoding: "utf-8".into(),
        }
    }
}

/// Errors that can occur when validating an [`IngestConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("batch_size must be > 0 (got {0})")]
    InvalidBatchSize(i64),

    #[error("delimiter must be a single ASCII character (got {0:?})")]
    InvalidDelimiter(String),

    #[error("unknown text encoding {0:?}")]
    UnknownEncoding(String),

    #[error("ordered bulk writes are not supported; set ordered = false")]
    OrderedWritesUnsupported,
}

impl IngestConfig {
    /// Check every option, returning the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batch_size()?;
        self.delimiter_byte()?;
        self.text_encoding()?;
        if self.ordered {
            return Err(ConfigError::OrderedWritesUnsupported);
        }
        Ok(())
    }

    /// The batch size as a `usize`, or [`ConfigError::InvalidBatchSize`].
    pub fn batch_size(&self) -> Result<usize, ConfigError> {
        if self.batch_size <= 0 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        usize::try_from(self.batch_size).map_err(|_| ConfigError::InvalidBatchSize(self.batch_size))
    }

    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(ConfigError::InvalidDelimiter(self.delimiter.clone())),
        }
    }

    /// Resolve the encoding label. Labels that map to the WHATWG
    /// `replacement` encoding (e.g. `iso-2022-kr`) decode every input to a
    /// single U+FFFD and are rejected.
    pub fn text_encoding(&self) -> Result<&'static Encoding, ConfigError> {
        Encoding::for_label(self.encoding.trim().as_bytes())
            .filter(|encoding| *encoding != REPLACEMENT)
            .ok_or_else(|| ConfigError::UnknownEncoding(self.encoding.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = IngestConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.batch_size().unwrap(), 1000);
        assert_eq!(cfg.delimiter_byte().unwrap(), b',');
        assert_eq!(cfg.text_encoding().unwrap(), encoding_rs::UTF_8);
    }

    #[test]
    fn zero_and_negative_batch_sizes_rejected() {
        for size in [0, -1, -1000] {
            let cfg = IngestConfig {
                batch_size: size,
                ..Default::default()
            };
            assert_eq!(cfg.validate(), Err(ConfigError::InvalidBatchSize(size)));
        }
    }

    #[test]
    fn multi_char_delimiter_rejected() {
        let cfg = IngestConfig {
            delimiter: ";;".into(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidDelimiter(d)) if d == ";;"
        ));

        let cfg = IngestConfig {
            delimiter: "§".into(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidDelimiter(_))
        ));
    }

    #[test]
    fn tab_delimiter_accepted() {
        let cfg = IngestConfig {
            delimiter: "\t".into(),
            ..Default::default()
        };
        assert_eq!(cfg.delimiter_byte().unwrap(), b'\t');
    }

    #[test]
    fn encoding_labels_resolved() {
        let cfg = IngestConfig {
            encoding: "latin1".into(),
            ..Default::default()
        };
        assert_eq!(cfg.text_encoding().unwrap(), encoding_rs::WINDOWS_1252);

        let cfg = IngestConfig {
            encoding: "klingon".into(),
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::UnknownEncoding("klingon".into()))
        );
    }

    #[test]
    fn replacement_encoding_labels_rejected() {
        for label in ["iso-2022-kr", "replacement", "hz-gb-2312"] {
            let cfg = IngestConfig {
                encoding: label.into(),
                ..Default::default()
            };
            assert_eq!(
                cfg.validate(),
                Err(ConfigError::UnknownEncoding(label.into()))
            );
        }
    }

    #[test]
    fn ordered_writes_rejected() {
        let cfg = IngestConfig {
            ordered: true,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::OrderedWritesUnsupported));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: IngestConfig =
            serde_json::from_str(r#"{"batch_size": 50, "delimiter": ";"}"#).unwrap();
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.delimiter, ";");
        assert_eq!(cfg.encoding, "utf-8");
        assert!(!cfg.ordered);
    }
}

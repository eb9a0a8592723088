//! Lazy delimited-text source.
//!
//! [`CsvSource`] reads one record at a time from a file, decodes it with the
//! configured text encoding, and pairs each cell with its header name. The
//! file handle lives inside the iterator and is released when the iterator
//! is dropped.
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use encoding_rs::{Encoding, UTF_8};
use tracing::debug;

use crate::config::IngestConfig;
use crate::decode::StrictDecodeReader;
use crate::error::IngestError;
use crate::types::RawRow;

/// Iterator over the data records of a delimited-text file.
///
/// The first record is the header. Short rows are accepted: their missing
/// trailing cells come back as `None`. Cells past the header width have no
/// name and are dropped. Blank lines are skipped by the reader.
pub struct CsvSource {
    headers: StringRecord,
    records: StringRecordsIntoIter<Box<dyn Read>>,
    failed: bool,
}

impl CsvSource {
    /// Open `path` using the delimiter and encoding from `cfg`.
    ///
    /// `cfg` is expected to be validated already; an invalid delimiter or
    /// encoding is still reported, as an [`IngestError::Open`].
    pub fn open<P: AsRef<Path>>(path: P, cfg: &IngestConfig) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let open_error = |message: String| IngestError::Open {
            path: path.display().to_string(),
            message,
        };

        let delimiter = cfg.delimiter_byte().map_err(|e| open_error(e.to_string()))?;
        let encoding = cfg.text_encoding().map_err(|e| open_error(e.to_string()))?;
        let file = File::open(path).map_err(|e| open_error(e.to_string()))?;

        debug!(
            path = %path.display(),
            encoding = encoding.name(),
            delimiter = %char::from(delimiter),
            "source_opened"
        );
        Self::from_reader(BufReader::new(file), delimiter, encoding)
    }

    /// Build a source over any byte reader.
    pub fn from_reader<R>(
        reader: R,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<Self, IngestError>
    where
        R: Read + 'static,
    {
        // Invalid bytes surface as record errors, never as U+FFFD. UTF-8 is
        // validated by the CSV reader itself.
        let reader: Box<dyn Read> = if encoding == UTF_8 {
            Box::new(reader)
        } else {
            Box::new(StrictDecodeReader::new(reader, encoding))
        };

        let mut csv_reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| IngestError::Header(e.to_string()))?
            .clone();

        Ok(Self {
            headers,
            records: csv_reader.into_records(),
            failed: false,
        })
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter()
    }

    fn to_row(&self, record: &StringRecord) -> RawRow {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_string(), record.get(idx).map(str::to_string)))
            .collect()
    }
}

impl Iterator for CsvSource {
    type Item = Result<RawRow, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.records.next()? {
            Ok(record) => Some(Ok(self.to_row(&record))),
            Err(err) => {
                // csv cannot reliably resynchronise after an I/O error.
                self.failed = true;
                Some(Err(IngestError::from_csv(err)))
            }
        }
    }
}

impl std::fmt::Debug for CsvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSource")
            .field("headers", &self.headers)
            .field("failed", &self.failed)
            .finish()
    }
}

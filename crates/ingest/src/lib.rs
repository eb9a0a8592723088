//! docload ingest layer
//!
//! This is where rows enter the load pipeline. We read a delimited-text file
//! one record at a time, turn each record into a string-keyed [`Document`],
//! and group documents into bounded [`Batch`]es for the bulk writer.
//!
//! ## What we do here
//!
//! - **Read lazily** - [`CsvSource`] never materializes the file; one record
//!   is decoded per `next()` call.
//! - **Normalize rows** - [`normalize`] drops missing and empty cells and
//!   skips rows with nothing left. Values stay strings, verbatim.
//! - **Batch** - [`batched`] buffers at most `batch_size` documents and
//!   preserves input order.
//! - **Validate config up front** - [`IngestConfig::validate`] catches bad
//!   batch sizes, delimiters and encodings before any file is opened.
//!
//! ## Example
//!
//! ```
//! use ingest::{batched, normalize, CsvSource, IngestConfig};
//! use std::io::Cursor;
//!
//! let cfg = IngestConfig { batch_size: 2, ..Default::default() };
//! cfg.validate().unwrap();
//!
//! let csv = "name,age\nAda,36\n,\nAlan,\nGrace,85\n";
//! let source = CsvSource::from_reader(Cursor::new(csv), b',', encoding_rs::UTF_8).unwrap();
//!
//! let documents = source.filter_map(|row| row.ok()).filter_map(normalize);
//! let batches: Vec<_> = batched(documents, cfg.batch_size().unwrap()).unwrap().collect();
//!
//! assert_eq!(batches.len(), 2);
//! assert_eq!(batches[0].len(), 2);
//! assert_eq!(batches[1].documents()[0].get("name"), Some("Grace"));
//! ```
mod batch;
mod config;
mod decode;
mod error;
mod normalize;
mod source;
mod types;

pub use crate::batch::{batched, Batcher};
pub use crate::config::{ConfigError, IngestConfig};
pub use crate::error::IngestError;
pub use crate::normalize::normalize;
pub use crate::source::CsvSource;
pub use crate::types::{Batch, Document, RawRow};

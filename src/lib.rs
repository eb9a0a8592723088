//! Workspace umbrella crate for docload.
//!
//! This crate wires the ingest layer (CSV source, row normalizer, batcher)
//! to a document store through the [`IngestionDriver`], and adds the
//! surrounding pieces a real load needs: configuration, collection
//! provisioning, per-batch metrics hooks and post-load verification.
//!
//! ```
//! use docload::{run_load, LoadConfig};
//! use std::io::Write;
//!
//! let mut csv = tempfile::NamedTempFile::new().unwrap();
//! writeln!(csv, "Name,Age,Doctor").unwrap();
//! writeln!(csv, "Ada,36,").unwrap();
//! writeln!(csv, ",,").unwrap();
//! writeln!(csv, "Alan,41,Dr. Turing").unwrap();
//!
//! let mut config = LoadConfig::from_toml(
//!     "[store]\nbackend = \"memory\"\ncollection = \"patients\"\n",
//! )
//! .unwrap();
//! config.data_file = Some(csv.path().to_path_buf());
//!
//! let result = run_load(&config).unwrap();
//! assert_eq!(result.inserted_total, 2);
//! assert_eq!(result.rows_skipped, 1);
//! ```

pub use ingest::{
    batched, normalize, Batch, Batcher, ConfigError, CsvSource, Document, IngestConfig,
    IngestError, RawRow,
};
pub use store::{BackendConfig, DocumentStore, InMemoryStore, StoreError};

mod config;
mod driver;
mod error;
mod metrics;
mod provision;
mod verify;
mod writer;

pub use config::{
    BackendKind, ConfigLoadError, LoadConfig, LogFormat, StoreSettings, VerifySettings,
};
pub use driver::{DriverState, IngestionDriver, IngestionResult};
pub use error::LoadError;
pub use metrics::LoadMetrics;
pub use provision::{ProvisionOutcome, Provisioner};
pub use verify::{verify_collection, VerifyError, VerifyReport};
pub use writer::{BulkWriter, WriteOutcome};

/// Load `config.data_file` into the configured collection.
pub fn run_load(config: &LoadConfig) -> Result<IngestionResult, LoadError> {
    let data_file = config
        .data_file
        .as_deref()
        .ok_or_else(|| ConfigLoadError::MissingField("data_file".into()))?;

    IngestionDriver::new(config).run(
        || config.store.backend_config().build(),
        || CsvSource::open(data_file, &config.ingest),
    )
}

/// Run the post-load checks against the configured collection.
pub fn run_verify(config: &LoadConfig) -> Result<VerifyReport, LoadError> {
    config.validate()?;
    let store = config.store.backend_config().build()?;
    let report = verify_collection(store.as_ref(), &config.store.collection, &config.verify);
    if let Err(err) = store.close() {
        tracing::warn!(error = %err, "store_close_failed");
    }
    report
}

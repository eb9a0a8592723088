use std::error::Error;
use std::fmt;

use ingest::{ConfigError, IngestError};
use store::StoreError;

use crate::config::ConfigLoadError;
use crate::driver::{DriverState, IngestionResult};
use crate::verify::VerifyError;

/// Errors that end a load or verify run.
///
/// Failures that happen after ingestion started carry the partial
/// [`IngestionResult`] accumulated up to that point.
#[derive(Debug)]
pub enum LoadError {
    /// Invalid or unreadable configuration. Detected before any I/O.
    Config(ConfigLoadError),
    /// The store could not be reached while connecting or provisioning.
    Provisioning(StoreError),
    /// A batch write failed outright; later batches were not attempted.
    Write {
        cause: StoreError,
        partial: IngestionResult,
    },
    /// The source could not be opened or yielded a bad record.
    Source {
        cause: IngestError,
        partial: IngestionResult,
    },
    Verify(VerifyError),
    /// A store call outside of ingestion failed (e.g. during verify).
    Store(StoreError),
    /// The driver already reached a terminal state.
    AlreadyRan(DriverState),
}

impl LoadError {
    /// The result accumulated before the run aborted, if ingestion started.
    pub fn partial_result(&self) -> Option<&IngestionResult> {
        match self {
            LoadError::Write { partial, .. } | LoadError::Source { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Config(err) => write!(f, "configuration error: {err}"),
            LoadError::Provisioning(err) => write!(f, "provisioning failed: {err}"),
            LoadError::Write { cause, partial } => write!(
                f,
                "bulk write failed after {} documents inserted: {cause}",
                partial.inserted_total
            ),
            LoadError::Source { cause, partial } => write!(
                f,
                "source failed after {} rows read: {cause}",
                partial.rows_read
            ),
            LoadError::Verify(err) => write!(f, "verification failed: {err}"),
            LoadError::Store(err) => write!(f, "store failure: {err}"),
            LoadError::AlreadyRan(state) => {
                write!(f, "driver already finished in state {state:?}")
            }
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::Config(err) => Some(err),
            LoadError::Provisioning(err) | LoadError::Store(err) => Some(err),
            LoadError::Write { cause, .. } => Some(cause),
            LoadError::Source { cause, .. } => Some(cause),
            LoadError::Verify(err) => Some(err),
            LoadError::AlreadyRan(_) => None,
        }
    }
}

impl From<ConfigLoadError> for LoadError {
    fn from(value: ConfigLoadError) -> Self {
        LoadError::Config(value)
    }
}

impl From<ConfigError> for LoadError {
    fn from(value: ConfigError) -> Self {
        LoadError::Config(ConfigLoadError::Invalid(value))
    }
}

impl From<VerifyError> for LoadError {
    fn from(value: VerifyError) -> Self {
        LoadError::Verify(value)
    }
}

impl From<StoreError> for LoadError {
    fn from(value: StoreError) -> Self {
        LoadError::Store(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_reports_partial_total() {
        let err = LoadError::Write {
            cause: StoreError::connectivity("connection reset"),
            partial: IngestionResult {
                inserted_total: 10,
                ..Default::default()
            },
        };
        assert_eq!(
            err.to_string(),
            "bulk write failed after 10 documents inserted: store unreachable: connection reset"
        );
        assert_eq!(err.partial_result().map(|r| r.inserted_total), Some(10));
        assert!(err.source().is_some());
    }

    #[test]
    fn config_errors_have_no_partial_result() {
        let err = LoadError::from(ConfigError::InvalidBatchSize(0));
        assert!(matches!(
            err,
            LoadError::Config(ConfigLoadError::Invalid(ConfigError::InvalidBatchSize(0)))
        ));
        assert!(err.partial_result().is_none());
    }
}

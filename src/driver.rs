//! The ingestion driver: a single-pass state machine that connects,
//! provisions, streams rows through normalize -> batch -> write, and folds
//! every write outcome into an [`IngestionResult`].
//!
//! ```text
//! Idle -> Provisioning -> Ingesting -> Completed
//!              |              |
//!              +--> Aborted <-+
//! ```
//!
//! Configuration is validated while still `Idle`; a bad configuration
//! leaves the driver `Idle` with no connection opened and no row read.
use std::cell::Cell;
use std::sync::Arc;

use ingest::{batched, normalize, IngestError, RawRow};
use serde::Serialize;
use store::{DocumentStore, StoreError};
use tracing::{debug, info, info_span, warn};

use crate::config::LoadConfig;
use crate::error::LoadError;
use crate::metrics::{LoadMetrics, MetricsSpan};
use crate::provision::Provisioner;
use crate::writer::{BulkWriter, WriteOutcome};

/// Lifecycle of one [`IngestionDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Idle,
    Provisioning,
    Ingesting,
    Completed,
    Aborted,
}

impl DriverState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DriverState::Completed | DriverState::Aborted)
    }
}

/// Tally of one run.
///
/// `inserted_total` is a lower bound on persisted documents; it is exact
/// when `uncertain_documents` is zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionResult {
    pub inserted_total: u64,
    /// Documents in batches whose partial failure came without a usable
    /// inserted count. Any of them may or may not have persisted.
    pub uncertain_documents: u64,
    pub rejected_documents: u64,
    pub batches_written: u64,
    /// Batches that ended as partial or uncountable writes.
    pub partial_batches: u64,
    pub rows_read: u64,
    /// Rows with no non-empty field, dropped before batching.
    pub rows_skipped: u64,
}

impl IngestionResult {
    /// Fold one non-fatal write outcome into the tally.
    pub fn record(&mut self, outcome: &WriteOutcome) {
        match outcome {
            WriteOutcome::FullSuccess { inserted } => {
                self.inserted_total += inserted;
            }
            WriteOutcome::PartialSuccess {
                inserted, rejected, ..
            } => {
                self.inserted_total += inserted;
                self.rejected_documents += *rejected as u64;
                self.partial_batches += 1;
            }
            WriteOutcome::Uncountable { attempted, .. } => {
                self.uncertain_documents += *attempted as u64;
                self.partial_batches += 1;
            }
            WriteOutcome::FatalFailure(_) => return,
        }
        self.batches_written += 1;
    }
}

/// Runs one load. A driver is single-use: once it reaches `Completed` or
/// `Aborted` further calls to [`IngestionDriver::run`] fail.
pub struct IngestionDriver<'a> {
    config: &'a LoadConfig,
    metrics: Option<Arc<dyn LoadMetrics>>,
    state: DriverState,
}

impl<'a> IngestionDriver<'a> {
    pub fn new(config: &'a LoadConfig) -> Self {
        Self {
            config,
            metrics: None,
            state: DriverState::Idle,
        }
    }

    pub fn with_metrics(mut self, recorder: Arc<dyn LoadMetrics>) -> Self {
        self.metrics = Some(recorder);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Execute the run.
    ///
    /// `connect` is called once, after validation; `open_source` is called
    /// once, after provisioning succeeded. The store is closed exactly once
    /// when the run ends, whichever way it ends.
    pub fn run<C, S, O, R>(&mut self, connect: C, open_source: O) -> Result<IngestionResult, LoadError>
    where
        C: FnOnce() -> Result<S, StoreError>,
        S: DocumentStore,
        O: FnOnce() -> Result<R, IngestError>,
        R: IntoIterator<Item = Result<RawRow, IngestError>>,
    {
        if self.state != DriverState::Idle {
            return Err(LoadError::AlreadyRan(self.state));
        }
        let config = self.config;
        config.validate()?;
        let batch_size = config.ingest.batch_size()?;

        let collection = config.store.collection.as_str();
        let span = info_span!("docload.run", collection, batch_size);
        let _guard = span.enter();

        self.state = DriverState::Provisioning;
        let store = match connect() {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "store_connect_failed");
                self.state = DriverState::Aborted;
                return Err(LoadError::Provisioning(err));
            }
        };

        let metrics = MetricsSpan::start(self.metrics.as_ref());
        let provisioned = Provisioner::new(&store, &config.store).ensure();
        if let Some(span) = metrics {
            span.record_provision(provisioned.as_ref().copied());
        }
        match provisioned {
            Ok(outcome) => debug!(?outcome, "provisioned"),
            Err(err) => {
                warn!(error = %err, "provisioning_failed");
                self.finish(&store, DriverState::Aborted);
                return Err(LoadError::Provisioning(err));
            }
        }

        self.state = DriverState::Ingesting;
        let mut result = IngestionResult::default();
        let rows = match open_source() {
            Ok(rows) => rows,
            Err(cause) => {
                warn!(error = %cause, "source_open_failed");
                self.finish(&store, DriverState::Aborted);
                return Err(LoadError::Source {
                    cause,
                    partial: result,
                });
            }
        };

        let source_error: Cell<Option<IngestError>> = Cell::new(None);
        let rows_read = Cell::new(0u64);
        let rows_skipped = Cell::new(0u64);

        // The stream stops at the first bad record; everything before it
        // still goes through the batcher and gets written.
        let documents = rows
            .into_iter()
            .map_while(|row| match row {
                Ok(row) => Some(row),
                Err(err) => {
                    source_error.set(Some(err));
                    None
                }
            })
            .inspect(|_| rows_read.set(rows_read.get() + 1))
            .filter_map(|row| {
                let doc = normalize(row);
                if doc.is_none() {
                    rows_skipped.set(rows_skipped.get() + 1);
                }
                doc
            });

        let batches = match batched(documents, batch_size) {
            Ok(batches) => batches,
            Err(err) => {
                self.finish(&store, DriverState::Aborted);
                return Err(err.into());
            }
        };

        let writer = BulkWriter::new(&store, collection);
        let mut fatal = None;
        for batch in batches {
            let metrics = MetricsSpan::start(self.metrics.as_ref());
            let outcome = {
                let _batch = info_span!(
                    "docload.write_batch",
                    batch = result.batches_written + 1,
                    size = batch.len()
                )
                .entered();
                writer.write(&batch)
            };
            if let Some(span) = metrics {
                span.record_batch(&outcome);
            }

            if let WriteOutcome::FatalFailure(err) = &outcome {
                fatal = Some(err.clone());
                break;
            }
            result.record(&outcome);
        }
        result.rows_read = rows_read.get();
        result.rows_skipped = rows_skipped.get();

        if let Some(cause) = fatal {
            warn!(
                error = %cause,
                inserted_total = result.inserted_total,
                "run_aborted"
            );
            self.finish(&store, DriverState::Aborted);
            return Err(LoadError::Write {
                cause,
                partial: result,
            });
        }
        if let Some(cause) = source_error.take() {
            warn!(
                error = %cause,
                inserted_total = result.inserted_total,
                "run_aborted"
            );
            self.finish(&store, DriverState::Aborted);
            return Err(LoadError::Source {
                cause,
                partial: result,
            });
        }

        if result.uncertain_documents > 0 {
            warn!(
                uncertain_documents = result.uncertain_documents,
                "inserted_total_is_lower_bound"
            );
        }
        info!(
            inserted_total = result.inserted_total,
            rejected_documents = result.rejected_documents,
            batches_written = result.batches_written,
            rows_read = result.rows_read,
            "run_completed"
        );
        self.finish(&store, DriverState::Completed);
        Ok(result)
    }

    fn finish(&mut self, store: &dyn DocumentStore, state: DriverState) {
        if let Err(err) = store.close() {
            warn!(error = %err, "store_close_failed");
        }
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_folds_each_outcome_kind() {
        let mut result = IngestionResult::default();
        result.record(&WriteOutcome::FullSuccess { inserted: 4 });
        result.record(&WriteOutcome::PartialSuccess {
            inserted: 3,
            rejected: 2,
            cause: "dup".into(),
        });
        result.record(&WriteOutcome::Uncountable {
            attempted: 5,
            cause: "timeout".into(),
        });
        result.record(&WriteOutcome::FatalFailure(StoreError::connectivity("x")));

        assert_eq!(
            result,
            IngestionResult {
                inserted_total: 7,
                uncertain_documents: 5,
                rejected_documents: 2,
                batches_written: 3,
                partial_batches: 2,
                rows_read: 0,
                rows_skipped: 0,
            }
        );
    }

    #[test]
    fn only_completed_and_aborted_are_terminal() {
        assert!(DriverState::Completed.is_terminal());
        assert!(DriverState::Aborted.is_terminal());
        assert!(!DriverState::Idle.is_terminal());
        assert!(!DriverState::Ingesting.is_terminal());
    }
}

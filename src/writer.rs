use ingest::Batch;
use store::{DocumentStore, StoreError};
use tracing::{debug, warn};

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    FullSuccess {
        inserted: u64,
    },
    /// Some documents were rejected (e.g. duplicate keys); the rest persisted.
    PartialSuccess {
        inserted: u64,
        rejected: usize,
        cause: String,
    },
    /// Some documents failed and the store did not say how many succeeded.
    /// Counts as zero inserted.
    Uncountable {
        attempted: usize,
        cause: String,
    },
    /// The run cannot continue.
    FatalFailure(StoreError),
}

impl WriteOutcome {
    /// Documents known to be persisted by this write.
    pub fn inserted(&self) -> u64 {
        match self {
            WriteOutcome::FullSuccess { inserted } | WriteOutcome::PartialSuccess { inserted, .. } => {
                *inserted
            }
            WriteOutcome::Uncountable { .. } | WriteOutcome::FatalFailure(_) => 0,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, WriteOutcome::FatalFailure(_))
    }
}

/// Writes batches to one collection as unordered bulk inserts.
pub struct BulkWriter<'a> {
    store: &'a dyn DocumentStore,
    collection: &'a str,
}

impl<'a> BulkWriter<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: &'a str) -> Self {
        Self { store, collection }
    }

    /// Submit `batch` in one call. Partial failures are logged and folded
    /// into the outcome; nothing is retried.
    pub fn write(&self, batch: &Batch) -> WriteOutcome {
        let attempted = batch.len();
        match self.store.bulk_insert(self.collection, batch.documents(), false) {
            Ok(inserted) => {
                debug!(attempted, inserted, "batch_written");
                WriteOutcome::FullSuccess { inserted }
            }
            Err(StoreError::PartialWrite {
                inserted: Some(inserted),
                rejected,
                cause,
            }) => {
                let inserted = inserted.min(attempted as u64);
                warn!(attempted, inserted, rejected, %cause, "batch_partial");
                WriteOutcome::PartialSuccess {
                    inserted,
                    rejected,
                    cause,
                }
            }
            Err(StoreError::PartialWrite {
                inserted: None,
                cause,
                ..
            }) => {
                warn!(attempted, %cause, "batch_uncountable");
                WriteOutcome::Uncountable { attempted, cause }
            }
            Err(err) => WriteOutcome::FatalFailure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::{batched, Document};
    use store::InMemoryStore;

    fn batch_of(ids: &[&str]) -> Batch {
        let docs: Vec<Document> = ids
            .iter()
            .map(|id| [("id", *id), ("name", "x")].into_iter().collect())
            .collect();
        batched(docs, ids.len()).unwrap().next().unwrap()
    }

    #[test]
    fn clean_batch_is_full_success() {
        let store = InMemoryStore::new();
        let outcome = BulkWriter::new(&store, "c").write(&batch_of(&["1", "2", "3"]));
        assert_eq!(outcome, WriteOutcome::FullSuccess { inserted: 3 });
    }

    #[test]
    fn duplicate_keys_give_partial_success() {
        let store = InMemoryStore::new();
        store.create_unique_index("c", "id").unwrap();
        store.bulk_insert("c", &batch_of(&["1"]).into_documents(), false).unwrap();

        let outcome = BulkWriter::new(&store, "c").write(&batch_of(&["1", "2", "3", "2", "4"]));
        match outcome {
            WriteOutcome::PartialSuccess {
                inserted, rejected, ..
            } => {
                assert_eq!(inserted, 3);
                assert_eq!(rejected, 2);
            }
            other => panic!("expected partial success, got {other:?}"),
        }
        assert_eq!(store.count_documents("c").unwrap(), 4);
    }

    struct ScriptedStore(StoreError);

    impl DocumentStore for ScriptedStore {
        fn collection_exists(&self, _: &str) -> Result<bool, StoreError> {
            Ok(true)
        }
        fn create_collection(&self, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
        fn create_unique_index(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
        fn bulk_insert(&self, _: &str, _: &[Document], ordered: bool) -> Result<u64, StoreError> {
            assert!(!ordered, "writer must use unordered inserts");
            Err(self.0.clone())
        }
        fn count_documents(&self, _: &str) -> Result<u64, StoreError> {
            Ok(0)
        }
        fn sample_document(&self, _: &str) -> Result<Option<Document>, StoreError> {
            Ok(None)
        }
    }

    #[test]
    fn missing_count_is_uncountable() {
        let store = ScriptedStore(StoreError::PartialWrite {
            inserted: None,
            rejected: 0,
            cause: "write concern timeout".into(),
        });
        let outcome = BulkWriter::new(&store, "c").write(&batch_of(&["1", "2"]));
        assert_eq!(outcome.inserted(), 0);
        assert_eq!(
            outcome,
            WriteOutcome::Uncountable {
                attempted: 2,
                cause: "write concern timeout".into()
            }
        );
    }

    #[test]
    fn overreported_count_is_clamped() {
        let store = ScriptedStore(StoreError::PartialWrite {
            inserted: Some(99),
            rejected: 1,
            cause: "dup".into(),
        });
        let outcome = BulkWriter::new(&store, "c").write(&batch_of(&["1", "2"]));
        assert_eq!(outcome.inserted(), 2);
    }

    #[test]
    fn connectivity_is_fatal() {
        let store = ScriptedStore(StoreError::connectivity("reset"));
        let outcome = BulkWriter::new(&store, "c").write(&batch_of(&["1"]));
        assert!(outcome.is_fatal());
    }
}

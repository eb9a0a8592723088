use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docload::{
    verify_collection, BackendKind, CsvSource, Document, DocumentStore, DriverState,
    InMemoryStore, IngestionDriver, LoadConfig, LoadMetrics, ProvisionOutcome, StoreError,
    VerifySettings, WriteOutcome,
};
use tempfile::NamedTempFile;

fn memory_config(batch_size: i64) -> LoadConfig {
    let mut config = LoadConfig::default();
    config.store.backend = BackendKind::Memory;
    config.store.collection = "patients".into();
    config.ingest.batch_size = batch_size;
    config
}

fn csv_file(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

fn patients_csv(ids: &[&str]) -> NamedTempFile {
    let mut csv = String::from("id,Name,Age,Doctor\n");
    for id in ids {
        csv.push_str(&format!("{id},Patient {id},4{id},\n"));
    }
    csv_file(csv.as_bytes())
}

#[derive(Default)]
struct Recorder {
    provisions: Mutex<Vec<Result<ProvisionOutcome, String>>>,
    batches: Mutex<Vec<WriteOutcome>>,
}

impl LoadMetrics for Recorder {
    fn record_provision(&self, _latency: Duration, result: Result<ProvisionOutcome, &StoreError>) {
        self.provisions
            .lock()
            .unwrap()
            .push(result.map_err(|err| err.to_string()));
    }

    fn record_batch(&self, _latency: Duration, outcome: &WriteOutcome) {
        self.batches.lock().unwrap().push(outcome.clone());
    }
}

/// Answers every bulk insert listed in `uncountable` (1-based call index)
/// with a partial failure that has no inserted count.
struct UncountableStore {
    inner: InMemoryStore,
    uncountable: Vec<usize>,
    bulk_calls: AtomicUsize,
}

impl DocumentStore for UncountableStore {
    fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        self.inner.collection_exists(name)
    }
    fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        self.inner.create_collection(name)
    }
    fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        self.inner.create_unique_index(collection, field)
    }
    fn bulk_insert(
        &self,
        collection: &str,
        documents: &[Document],
        ordered: bool,
    ) -> Result<u64, StoreError> {
        let call = self.bulk_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.uncountable.contains(&call) {
            return Err(StoreError::PartialWrite {
                inserted: None,
                rejected: 0,
                cause: "write concern timeout".into(),
            });
        }
        self.inner.bulk_insert(collection, documents, ordered)
    }
    fn count_documents(&self, collection: &str) -> Result<u64, StoreError> {
        self.inner.count_documents(collection)
    }
    fn sample_document(&self, collection: &str) -> Result<Option<Document>, StoreError> {
        self.inner.sample_document(collection)
    }
}

#[test]
fn csv_file_loads_in_order_across_batches() {
    let ids: Vec<String> = (1..=25).map(|i| i.to_string()).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    let file = patients_csv(&ids);
    let config = memory_config(10);
    let store = Arc::new(InMemoryStore::new());
    let recorder = Arc::new(Recorder::default());

    let mut driver = IngestionDriver::new(&config).with_metrics(recorder.clone());
    let result = driver
        .run(
            || Ok(Arc::clone(&store)),
            || CsvSource::open(file.path(), &config.ingest),
        )
        .unwrap();

    assert_eq!(driver.state(), DriverState::Completed);
    assert_eq!(result.inserted_total, 25);
    assert_eq!(result.batches_written, 3);
    assert_eq!(result.rows_read, 25);
    assert_eq!(result.uncertain_documents, 0);

    let sizes: Vec<u64> = recorder
        .batches
        .lock()
        .unwrap()
        .iter()
        .map(WriteOutcome::inserted)
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);

    let docs = store.documents("patients").unwrap();
    let stored_ids: Vec<&str> = docs.iter().map(|d| d.get("id").unwrap()).collect();
    assert_eq!(stored_ids, ids);
    // The empty Doctor column never reaches the store.
    assert!(docs.iter().all(|d| !d.contains_key("Doctor")));
    assert_eq!(docs[0].keys().collect::<Vec<_>>(), vec!["id", "Name", "Age"]);
}

#[test]
fn blank_rows_are_skipped_not_inserted() {
    let file = csv_file(b"id,Name\n1,Ada\n,\n2,Alan\n,\n");
    let config = memory_config(1000);
    let store = Arc::new(InMemoryStore::new());

    let result = IngestionDriver::new(&config)
        .run(
            || Ok(Arc::clone(&store)),
            || CsvSource::open(file.path(), &config.ingest),
        )
        .unwrap();

    assert_eq!(result.inserted_total, 2);
    assert_eq!(result.rows_read, 4);
    assert_eq!(result.rows_skipped, 2);
    assert_eq!(store.count_documents("patients").unwrap(), 2);
}

#[test]
fn duplicate_keys_are_absorbed_and_the_run_continues() {
    let file = patients_csv(&["1", "2", "1", "3", "2", "4", "5", "6"]);
    let mut config = memory_config(5);
    config.store.unique_fields = vec!["id".into()];
    let store = Arc::new(InMemoryStore::new());
    let recorder = Arc::new(Recorder::default());

    let mut driver = IngestionDriver::new(&config).with_metrics(recorder.clone());
    let result = driver
        .run(
            || Ok(Arc::clone(&store)),
            || CsvSource::open(file.path(), &config.ingest),
        )
        .unwrap();

    assert_eq!(driver.state(), DriverState::Completed);
    assert_eq!(result.inserted_total, 6);
    assert_eq!(result.rejected_documents, 2);
    assert_eq!(result.partial_batches, 1);
    assert_eq!(result.batches_written, 2);
    assert_eq!(store.count_documents("patients").unwrap(), 6);

    let batches = recorder.batches.lock().unwrap();
    assert!(matches!(
        batches[0],
        WriteOutcome::PartialSuccess {
            inserted: 3,
            rejected: 2,
            ..
        }
    ));
    assert_eq!(batches[1], WriteOutcome::FullSuccess { inserted: 3 });
}

#[test]
fn uncountable_batch_contributes_nothing_to_the_total() {
    let ids: Vec<String> = (1..=9).map(|i| i.to_string()).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    let file = patients_csv(&ids);
    let config = memory_config(4);
    let store = Arc::new(UncountableStore {
        inner: InMemoryStore::new(),
        uncountable: vec![2],
        bulk_calls: AtomicUsize::new(0),
    });

    let mut driver = IngestionDriver::new(&config);
    let result = driver
        .run(
            || Ok(Arc::clone(&store)),
            || CsvSource::open(file.path(), &config.ingest),
        )
        .unwrap();

    assert_eq!(driver.state(), DriverState::Completed);
    assert_eq!(result.inserted_total, 5);
    assert_eq!(result.uncertain_documents, 4);
    assert_eq!(result.partial_batches, 1);
    assert_eq!(result.batches_written, 3);
    assert_eq!(store.bulk_calls.load(Ordering::SeqCst), 3);
}

#[test]
fn second_load_finds_the_collection_already_provisioned() {
    let config = memory_config(100);
    let store = Arc::new(InMemoryStore::new());
    let recorder = Arc::new(Recorder::default());

    for ids in [["1", "2"], ["3", "4"]] {
        let file = patients_csv(&ids);
        IngestionDriver::new(&config)
            .with_metrics(recorder.clone())
            .run(
                || Ok(Arc::clone(&store)),
                || CsvSource::open(file.path(), &config.ingest),
            )
            .unwrap();
    }

    assert_eq!(
        *recorder.provisions.lock().unwrap(),
        vec![
            Ok(ProvisionOutcome::Created),
            Ok(ProvisionOutcome::AlreadyExisted)
        ]
    );
    assert_eq!(store.count_documents("patients").unwrap(), 4);
}

#[test]
fn latin1_semicolon_file_round_trips_text() {
    // "München" in ISO-8859-1.
    let file = csv_file(b"City;Ward\nM\xfcnchen;3\n");
    let mut config = memory_config(10);
    config.ingest.delimiter = ";".into();
    config.ingest.encoding = "latin1".into();
    let store = Arc::new(InMemoryStore::new());

    IngestionDriver::new(&config)
        .run(
            || Ok(Arc::clone(&store)),
            || CsvSource::open(file.path(), &config.ingest),
        )
        .unwrap();

    let docs = store.documents("patients").unwrap();
    assert_eq!(docs[0].get("City"), Some("München"));
    assert_eq!(docs[0].get("Ward"), Some("3"));
}

#[test]
fn loaded_collection_passes_verification() {
    let file = patients_csv(&["1", "2", "3"]);
    let config = memory_config(2);
    let store = Arc::new(InMemoryStore::new());

    IngestionDriver::new(&config)
        .run(
            || Ok(Arc::clone(&store)),
            || CsvSource::open(file.path(), &config.ingest),
        )
        .unwrap();

    let settings = VerifySettings {
        expected_fields: vec!["id".into(), "Name".into(), "Age".into()],
        ..Default::default()
    };
    let report = verify_collection(&*store, "patients", &settings).unwrap();
    assert_eq!(report.document_count, 3);
}

#[test]
fn run_load_uses_the_configured_data_file() {
    let file = patients_csv(&["1", "2"]);
    let mut config = memory_config(1);
    config.data_file = Some(file.path().to_path_buf());

    let result = docload::run_load(&config).unwrap();
    assert_eq!(result.inserted_total, 2);
    assert_eq!(result.batches_written, 2);
}

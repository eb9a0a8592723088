use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use ingest::Document;

use crate::{DocumentStore, StoreError};

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
    // (field, value) pairs already taken; a missing field indexes as `None`.
    taken: HashSet<(String, Option<String>)>,
}

impl Collection {
    fn unique_keys(&self, doc: &Document) -> Vec<(String, Option<String>)> {
        self.unique_fields
            .iter()
            .map(|field| (field.clone(), doc.get(field).map(str::to_string)))
            .collect()
    }
}

/// An in-memory store using a `RwLock` around a map of collections.
///
/// Bulk inserts into a missing collection create it, as MongoDB does.
/// Unique fields registered with [`DocumentStore::create_unique_index`]
/// reject duplicates with a `PartialWrite` that always carries an exact
/// inserted count.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of every document in `collection`, in insertion order.
    pub fn documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let guard = self
            .collections
            .read()
            .map_err(|_| StoreError::protocol("poisoned lock"))?;
        Ok(guard
            .get(collection)
            .map(|c| c.documents.clone())
            .unwrap_or_default())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryStore {
    fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let guard = self
            .collections
            .read()
            .map_err(|_| StoreError::protocol("poisoned lock"))?;
        Ok(guard.contains_key(name))
    }

    fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| StoreError::protocol("poisoned lock"))?;
        if guard.contains_key(name) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }
        guard.insert(name.to_string(), Collection::default());
        Ok(())
    }

    fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| StoreError::protocol("poisoned lock"))?;
        let coll = guard.entry(collection.to_string()).or_default();
        if coll.unique_fields.iter().any(|f| f == field) {
            return Ok(());
        }

        let mut taken = HashSet::new();
        for doc in &coll.documents {
            let key = (field.to_string(), doc.get(field).map(str::to_string));
            if !taken.insert(key) {
                return Err(StoreError::protocol(format!(
                    "cannot build unique index on {collection}.{field}: duplicate values present"
                )));
            }
        }
        coll.unique_fields.push(field.to_string());
        coll.taken.extend(taken);
        Ok(())
    }

    fn bulk_insert(
        &self,
        collection: &str,
        documents: &[Document],
        ordered: bool,
    ) -> Result<u64, StoreError> {
        // A single write lock is held for the entire batch.
        let mut guard = self
            .collections
            .write()
            .map_err(|_| StoreError::protocol("poisoned lock"))?;
        let coll = guard.entry(collection.to_string()).or_default();

        let mut inserted = 0u64;
        let mut rejected = 0usize;
        let mut first_cause = None;

        for (idx, doc) in documents.iter().enumerate() {
            let keys = coll.unique_keys(doc);
            if let Some((field, value)) = keys.iter().find(|k| coll.taken.contains(*k)) {
                rejected += 1;
                first_cause.get_or_insert_with(|| {
                    format!(
                        "E11000 duplicate key error at index {idx}: {collection}.{field} = {value:?}"
                    )
                });
                if ordered {
                    // Everything after the first failure counts as not attempted.
                    rejected = documents.len() - idx;
                    break;
                }
                continue;
            }
            coll.taken.extend(keys);
            coll.documents.push(doc.clone());
            inserted += 1;
        }

        match first_cause {
            None => Ok(inserted),
            Some(cause) => Err(StoreError::PartialWrite {
                inserted: Some(inserted),
                rejected,
                cause,
            }),
        }
    }

    fn count_documents(&self, collection: &str) -> Result<u64, StoreError> {
        let guard = self
            .collections
            .read()
            .map_err(|_| StoreError::protocol("poisoned lock"))?;
        Ok(guard
            .get(collection)
            .map(|c| c.documents.len() as u64)
            .unwrap_or(0))
    }

    fn sample_document(&self, collection: &str) -> Result<Option<Document>, StoreError> {
        let guard = self
            .collections
            .read()
            .map_err(|_| StoreError::protocol("poisoned lock"))?;
        // Deterministic pick: the first document stands in for a random sample.
        Ok(guard
            .get(collection)
            .and_then(|c| c.documents.first().cloned()))
    }
}

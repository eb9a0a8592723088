//! # docload store
//!
//! Backend-agnostic access to a document-oriented store. The load pipeline
//! only ever talks to the narrow [`DocumentStore`] capability trait, so the
//! same driver runs against MongoDB in production and against
//! [`InMemoryStore`] in tests.
//!
//! ## Backends
//!
//! - [`InMemoryStore`]: `RwLock`-guarded collections with optional unique
//!   fields, enough to reproduce duplicate-key partial failures.
//! - `MongoStore`: the blocking MongoDB driver (feature `backend-mongo`,
//!   enabled by default).
//!
//! ## Example
//!
//! ```
//! use ingest::Document;
//! use store::{BackendConfig, DocumentStore, StoreError};
//!
//! let store = BackendConfig::in_memory().build().unwrap();
//! store.create_collection("patients").unwrap();
//! store.create_unique_index("patients", "id").unwrap();
//!
//! let docs: Vec<Document> = ["1", "2", "1"]
//!     .into_iter()
//!     .map(|id| [("id", id)].into_iter().collect())
//!     .collect();
//!
//! match store.bulk_insert("patients", &docs, false) {
//!     Err(StoreError::PartialWrite { inserted, rejected, .. }) => {
//!         assert_eq!(inserted, Some(2));
//!         assert_eq!(rejected, 1);
//!     }
//!     other => panic!("expected a partial write, got {other:?}"),
//! }
//! ```
use std::sync::Arc;

use ingest::Document;
use thiserror::Error;

mod memory;
#[cfg(feature = "backend-mongo")]
mod mongo;

pub use memory::InMemoryStore;
#[cfg(feature = "backend-mongo")]
pub use mongo::MongoStore;

/// Capability interface over a document store.
///
/// Implementations are bound to one database at construction time; every
/// method takes the collection name.
pub trait DocumentStore: Send + Sync {
    /// Whether `name` exists in the database.
    fn collection_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Create `name`. Fails with [`StoreError::CollectionExists`] if another
    /// writer created it first.
    fn create_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Ensure a unique index on `field`. Idempotent.
    fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError>;

    /// Insert `documents` in one bulk operation.
    ///
    /// Returns the number inserted when every document was accepted. When
    /// some were rejected the error is [`StoreError::PartialWrite`], whose
    /// `inserted` is `None` if the store could not say how many succeeded.
    /// With `ordered = false` a rejected document does not stop the rest.
    fn bulk_insert(
        &self,
        collection: &str,
        documents: &[Document],
        ordered: bool,
    ) -> Result<u64, StoreError>;

    /// Number of documents in `collection` (may be an estimate).
    fn count_documents(&self, collection: &str) -> Result<u64, StoreError>;

    /// One document picked at random, without the store-assigned `_id`.
    fn sample_document(&self, collection: &str) -> Result<Option<Document>, StoreError>;

    /// Signal the end of a run. Called once when a run ends. Backends
    /// release their resources here or when dropped.
    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// Lets callers hand the driver a `Box<dyn DocumentStore>` or keep an
// `Arc` to inspect the store afterwards.
macro_rules! forward_document_store {
    ($wrapper:ident) => {
        impl<S: DocumentStore + ?Sized> DocumentStore for $wrapper<S> {
            fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
                (**self).collection_exists(name)
            }

            fn create_collection(&self, name: &str) -> Result<(), StoreError> {
                (**self).create_collection(name)
            }

            fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
                (**self).create_unique_index(collection, field)
            }

            fn bulk_insert(
                &self,
                collection: &str,
                documents: &[Document],
                ordered: bool,
            ) -> Result<u64, StoreError> {
                (**self).bulk_insert(collection, documents, ordered)
            }

            fn count_documents(&self, collection: &str) -> Result<u64, StoreError> {
                (**self).count_documents(collection)
            }

            fn sample_document(&self, collection: &str) -> Result<Option<Document>, StoreError> {
                (**self).sample_document(collection)
            }

            fn close(&self) -> Result<(), StoreError> {
                (**self).close()
            }
        }
    };
}

forward_document_store!(Box);
forward_document_store!(Arc);

/// Errors surfaced by [`DocumentStore`] implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// The store could not be reached (network, DNS, server selection, auth).
    #[error("store unreachable: {0}")]
    Connectivity(String),

    /// The store answered but the request failed outright.
    #[error("store protocol error: {0}")]
    Protocol(String),

    /// `create_collection` lost a race, or the collection was already there.
    #[error("collection already exists: {0}")]
    CollectionExists(String),

    /// Some documents of a bulk insert were rejected.
    #[error(
        "bulk write partially failed ({} inserted, {rejected} rejected): {cause}",
        display_inserted(.inserted)
    )]
    PartialWrite {
        inserted: Option<u64>,
        rejected: usize,
        cause: String,
    },
}

fn display_inserted(inserted: &Option<u64>) -> String {
    match inserted {
        Some(n) => n.to_string(),
        None => "unknown".to_string(),
    }
}

impl StoreError {
    pub fn connectivity(message: impl Into<String>) -> Self {
        StoreError::Connectivity(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        StoreError::Protocol(message.into())
    }

    /// Whether the run cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Connectivity(_) | StoreError::Protocol(_))
    }
}

/// Configuration for selecting and building a store backend.
///
/// ```
/// use store::BackendConfig;
///
/// // In-memory (for testing)
/// let config = BackendConfig::in_memory();
///
/// // MongoDB
/// let config = BackendConfig::mongo("mongodb://localhost:27017", "hospital");
/// ```
#[derive(Clone, Debug, Default)]
pub enum BackendConfig {
    /// A MongoDB deployment reached through `uri`, using `database`.
    ///
    /// Requires the `backend-mongo` feature (enabled by default).
    Mongo { uri: String, database: String },
    /// Ephemeral in-process collections. Useful for tests and dry runs.
    #[default]
    InMemory,
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn mongo(uri: impl Into<String>, database: impl Into<String>) -> Self {
        BackendConfig::Mongo {
            uri: uri.into(),
            database: database.into(),
        }
    }

    /// Connect to the configured backend.
    pub fn build(&self) -> Result<Box<dyn DocumentStore>, StoreError> {
        match self {
            BackendConfig::InMemory => Ok(Box::new(InMemoryStore::new())),
            BackendConfig::Mongo { uri, database } => {
                #[cfg(feature = "backend-mongo")]
                {
                    Ok(Box::new(MongoStore::connect(uri, database)?))
                }
                #[cfg(not(feature = "backend-mongo"))]
                {
                    let _ = (uri, database);
                    Err(StoreError::protocol(
                        "mongo backend disabled at compile time",
                    ))
                }
            }
        }
    }
}

//! MongoDB backend built on the driver's blocking API.
//!
//! Error classification:
//! - network, DNS, server selection, pool and auth failures become
//!   [`StoreError::Connectivity`];
//! - a bulk write failure becomes [`StoreError::PartialWrite`], with an
//!   inserted count derived from the per-document write errors when the
//!   server reported no write concern error, and `None` otherwise;
//! - `NamespaceExists` (code 48) on create becomes
//!   [`StoreError::CollectionExists`];
//! - anything else is [`StoreError::Protocol`].
use ingest::Document;
use mongodb::bson::{doc, Bson, Document as BsonDocument};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::{IndexOptions, InsertManyOptions};
use mongodb::sync::{Client, Collection, Database};
use mongodb::IndexModel;
use tracing::debug;

use crate::{DocumentStore, StoreError};

const NAMESPACE_EXISTS: i32 = 48;

/// A [`DocumentStore`] backed by one MongoDB database.
pub struct MongoStore {
    // Kept so the connection pool lives as long as the store.
    _client: Client,
    db: Database,
}

impl MongoStore {
    /// Build a client for `uri` bound to `database`.
    ///
    /// The driver connects lazily, so an unreachable server is reported by
    /// the first operation rather than here.
    pub fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).map_err(classify)?;
        let db = client.database(database);
        debug!(database, "mongo_client_created");
        Ok(Self {
            _client: client,
            db,
        })
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.db.collection::<BsonDocument>(name)
    }
}

impl DocumentStore for MongoStore {
    fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let names = self
            .db
            .list_collection_names(doc! { "name": name })
            .map_err(classify)?;
        Ok(names.iter().any(|n| n == name))
    }

    fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        match self.db.create_collection(name, None) {
            Ok(()) => Ok(()),
            Err(err) => match err.kind.as_ref() {
                ErrorKind::Command(cmd) if cmd.code == NAMESPACE_EXISTS => {
                    Err(StoreError::CollectionExists(name.to_string()))
                }
                _ => Err(classify(err)),
            },
        }
    }

    fn create_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let mut keys = BsonDocument::new();
        keys.insert(field, 1);
        let model = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection(collection)
            .create_index(model, None)
            .map_err(classify)?;
        Ok(())
    }

    fn bulk_insert(
        &self,
        collection: &str,
        documents: &[Document],
        ordered: bool,
    ) -> Result<u64, StoreError> {
        let docs: Vec<BsonDocument> = documents.iter().map(to_bson).collect();
        let options = InsertManyOptions::builder().ordered(ordered).build();

        match self.collection(collection).insert_many(docs, options) {
            Ok(result) => Ok(result.inserted_ids.len() as u64),
            Err(err) => Err(classify_bulk(err, documents.len(), ordered)),
        }
    }

    fn count_documents(&self, collection: &str) -> Result<u64, StoreError> {
        self.collection(collection)
            .estimated_document_count(None)
            .map_err(classify)
    }

    fn sample_document(&self, collection: &str) -> Result<Option<Document>, StoreError> {
        let mut cursor = self
            .collection(collection)
            .aggregate([doc! { "$sample": { "size": 1 } }], None)
            .map_err(classify)?;
        match cursor.next() {
            Some(Ok(raw)) => Ok(Some(from_bson(raw))),
            Some(Err(err)) => Err(classify(err)),
            None => Ok(None),
        }
    }

    /// Nothing to flush. The connection pool is shared by every handle to
    /// the client and is released when the store is dropped.
    fn close(&self) -> Result<(), StoreError> {
        debug!(database = %self.db.name(), "mongo_store_closed");
        Ok(())
    }
}

fn to_bson(doc: &Document) -> BsonDocument {
    let mut out = BsonDocument::new();
    for (key, value) in doc.iter() {
        out.insert(key, value);
    }
    out
}

fn from_bson(raw: BsonDocument) -> Document {
    raw.into_iter()
        .filter(|(key, _)| key != "_id")
        .map(|(key, value)| {
            let value = match value {
                Bson::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

fn classify(err: MongoError) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::Authentication { .. } => StoreError::connectivity(err.to_string()),
        _ => StoreError::protocol(err.to_string()),
    }
}

fn classify_bulk(err: MongoError, attempted: usize, ordered: bool) -> StoreError {
    if let ErrorKind::BulkWrite(failure) = err.kind.as_ref() {
        let rejected = failure.write_errors.as_ref().map_or(0, Vec::len);
        // A write concern error means acknowledged inserts may not be
        // durable, and ordered mode stops at an unknown point.
        let inserted = if failure.write_concern_error.is_none() && !ordered {
            attempted.checked_sub(rejected).map(|n| n as u64)
        } else {
            None
        };
        return StoreError::PartialWrite {
            inserted,
            rejected,
            cause: err.to_string(),
        };
    }
    classify(err)
}

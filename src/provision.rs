use serde::Serialize;
use store::{DocumentStore, StoreError};
use tracing::{debug, info};

use crate::config::StoreSettings;

/// How the destination collection came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    Created,
    AlreadyExisted,
    /// Another writer created the collection between our existence check
    /// and our create call.
    AlreadyExistedRace,
}

/// Ensures the destination collection (and its unique indexes) exist.
pub struct Provisioner<'a> {
    store: &'a dyn DocumentStore,
    settings: &'a StoreSettings,
}

impl<'a> Provisioner<'a> {
    pub fn new(store: &'a dyn DocumentStore, settings: &'a StoreSettings) -> Self {
        Self { store, settings }
    }

    /// Idempotent: every outcome means the collection is ready for writes.
    /// Only connectivity and protocol failures are returned as errors.
    pub fn ensure(&self) -> Result<ProvisionOutcome, StoreError> {
        let name = self.settings.collection.as_str();

        let outcome = if self.store.collection_exists(name)? {
            debug!(collection = name, "collection_exists");
            ProvisionOutcome::AlreadyExisted
        } else {
            match self.store.create_collection(name) {
                Ok(()) => {
                    info!(collection = name, "collection_created");
                    ProvisionOutcome::Created
                }
                Err(StoreError::CollectionExists(_)) => {
                    info!(collection = name, "collection_created_concurrently");
                    ProvisionOutcome::AlreadyExistedRace
                }
                Err(err) => return Err(err),
            }
        };

        for field in &self.settings.unique_fields {
            self.store.create_unique_index(name, field)?;
            debug!(collection = name, field = field.as_str(), "unique_index_ensured");
        }

        Ok(outcome)
    }
}

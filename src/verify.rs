use std::collections::BTreeSet;

use serde::Serialize;
use store::DocumentStore;
use thiserror::Error;
use tracing::info;

use crate::config::VerifySettings;
use crate::error::LoadError;

/// Store-assigned identifier, ignored when comparing field sets.
const ID_FIELD: &str = "_id";

/// Failed post-load expectation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VerifyError {
    #[error("collection {0} has no documents")]
    EmptyCollection(String),

    #[error("sampled document fields {actual:?} differ from expected {expected:?}")]
    FieldMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("sampled document has {actual} fields, expected {expected}")]
    FieldCountMismatch { expected: usize, actual: usize },

    #[error("nothing to verify: set verify.expected_fields or verify.expected_field_count")]
    NoExpectation,
}

/// Summary printed by `docload verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub collection: String,
    pub document_count: u64,
    pub sampled_fields: Vec<String>,
}

/// Check that `collection` is non-empty and that a sampled document has the
/// expected shape.
pub fn verify_collection(
    store: &dyn DocumentStore,
    collection: &str,
    settings: &VerifySettings,
) -> Result<VerifyReport, LoadError> {
    if settings.expected_fields.is_empty() && settings.expected_field_count.is_none() {
        return Err(VerifyError::NoExpectation.into());
    }

    let document_count = store.count_documents(collection)?;
    if document_count == 0 {
        return Err(VerifyError::EmptyCollection(collection.to_string()).into());
    }
    let sample = store
        .sample_document(collection)?
        .ok_or_else(|| VerifyError::EmptyCollection(collection.to_string()))?;

    let sampled_fields: Vec<String> = sample
        .keys()
        .filter(|key| *key != ID_FIELD)
        .map(str::to_string)
        .collect();

    if !settings.expected_fields.is_empty() {
        let expected: BTreeSet<&str> = settings
            .expected_fields
            .iter()
            .map(String::as_str)
            .filter(|key| *key != ID_FIELD)
            .collect();
        let actual: BTreeSet<&str> = sampled_fields.iter().map(String::as_str).collect();
        if expected != actual {
            return Err(VerifyError::FieldMismatch {
                expected: expected.into_iter().map(str::to_string).collect(),
                actual: actual.into_iter().map(str::to_string).collect(),
            }
            .into());
        }
    } else if let Some(expected) = settings.expected_field_count {
        if sampled_fields.len() != expected {
            return Err(VerifyError::FieldCountMismatch {
                expected,
                actual: sampled_fields.len(),
            }
            .into());
        }
    }

    info!(collection, document_count, fields = sampled_fields.len(), "verify_passed");
    Ok(VerifyReport {
        collection: collection.to_string(),
        document_count,
        sampled_fields,
    })
}

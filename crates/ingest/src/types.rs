//! Core data model types for the ingest crate.
//!
//! Rows read from a delimited-text source arrive as [`RawRow`]s, are turned
//! into [`Document`]s by [`normalize`](crate::normalize), and are grouped into
//! [`Batch`]es by the [`Batcher`](crate::Batcher).
//!
//! ```text
//! RawRow  (header -> Option<String>, header order)
//!
//!         ↓ normalize()
//!
//! Document  (field -> non-empty String, header order)
//!
//!         ↓ batched()
//!
//! Batch  (1..=batch_size documents, input order)
//! ```
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One record as produced by a delimited-text reader, keyed by header name.
///
/// A short row maps its missing trailing cells to `None`; an empty cell maps
/// to `Some("")`. Both are dropped during normalization.
pub type RawRow = IndexMap<String, Option<String>>;

/// A string-keyed document ready to be written to the store.
///
/// Field order follows the order in which fields were inserted, which for
/// documents built from a CSV row is the header order.
///
/// Every field holds a non-empty value: [`Document::insert`], the
/// `FromIterator` impl and deserialization silently skip empty strings.
///
/// # Examples
///
/// ```rust
/// use ingest::Document;
///
/// let doc: Document = [("name", "Ada"), ("age", ""), ("city", "London")]
///     .into_iter()
///     .collect();
///
/// assert_eq!(doc.len(), 2);
/// assert_eq!(doc.get("name"), Some("Ada"));
/// assert_eq!(doc.get("age"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "IndexMap<String, String>",
    into = "IndexMap<String, String>"
)]
pub struct Document {
    fields: IndexMap<String, String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, returning `false` when the value is empty and was skipped.
    ///
    /// Re-inserting an existing key replaces its value but keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.is_empty() {
            return false;
        }
        self.fields.insert(key.into(), value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(field, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> IndexMap<String, String> {
        self.fields
    }
}

impl<K, V> FromIterator<(K, V)> for Document
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (key, value) in iter {
            doc.insert(key, value);
        }
        doc
    }
}

impl From<IndexMap<String, String>> for Document {
    fn from(fields: IndexMap<String, String>) -> Self {
        fields.into_iter().collect()
    }
}

impl From<Document> for IndexMap<String, String> {
    fn from(doc: Document) -> Self {
        doc.fields
    }
}

impl IntoIterator for Document {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// An ordered, bounded group of documents submitted to the store together.
///
/// Batches are only produced by the [`Batcher`](crate::Batcher), which
/// guarantees they are never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    documents: Vec<Document>,
}

impl Batch {
    pub(crate) fn new(documents: Vec<Document>) -> Self {
        debug_assert!(!documents.is_empty());
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

impl AsRef<[Document]> for Batch {
    fn as_ref(&self) -> &[Document] {
        &self.documents
    }
}

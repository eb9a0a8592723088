//! Fixed-capacity batching over a lazy document stream.
use std::iter::FusedIterator;

use crate::config::ConfigError;
use crate::types::{Batch, Document};

/// Lazy iterator that groups documents into [`Batch`]es of at most
/// `batch_size` entries.
///
/// Only one batch is buffered at a time. Every batch but the last holds
/// exactly `batch_size` documents; order is preserved within and across
/// batches.
#[derive(Debug)]
pub struct Batcher<I> {
    documents: I,
    batch_size: usize,
    done: bool,
}

/// Group `documents` into batches of `batch_size`.
///
/// Fails with [`ConfigError::InvalidBatchSize`] when `batch_size` is zero;
/// the input is not touched in that case.
///
/// ```rust
/// use ingest::{batched, Document};
///
/// let docs = (0..5).map(|i| [("n", i.to_string())].into_iter().collect::<Document>());
/// let sizes: Vec<usize> = batched(docs, 2).unwrap().map(|b| b.len()).collect();
/// assert_eq!(sizes, vec![2, 2, 1]);
/// ```
pub fn batched<I>(documents: I, batch_size: usize) -> Result<Batcher<I::IntoIter>, ConfigError>
where
    I: IntoIterator<Item = Document>,
{
    if batch_size == 0 {
        return Err(ConfigError::InvalidBatchSize(0));
    }
    Ok(Batcher {
        documents: documents.into_iter(),
        batch_size,
        done: false,
    })
}

impl<I> Batcher<I> {
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl<I> Iterator for Batcher<I>
where
    I: Iterator<Item = Document>,
{
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.done {
            return None;
        }

        let mut buffer = Vec::with_capacity(self.batch_size);
        while buffer.len() < self.batch_size {
            match self.documents.next() {
                Some(doc) => buffer.push(doc),
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if buffer.is_empty() {
            None
        } else {
            Some(Batch::new(buffer))
        }
    }
}

impl<I> FusedIterator for Batcher<I> where I: Iterator<Item = Document> {}

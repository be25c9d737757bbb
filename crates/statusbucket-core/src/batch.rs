//! Batch: groups operations into bulk writes.
//!
//! Bucket updates and station replacements go through the same batcher.
//! Operations accumulate until `batch_size` is reached; the caller then
//! receives the full batch to hand to the store as one bulk write. Whatever
//! is left at the end of a run comes back from [`OperationBatch::flush`].

use crate::types::UpdateOperation;

#[derive(Debug, Clone)]
pub struct OperationBatch<T = UpdateOperation> {
    pending: Vec<T>,
    batch_size: usize,
}

impl<T> OperationBatch<T> {
    /// A `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            pending: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Queue `op`; returns the full batch once `batch_size` is reached.
    pub fn push(&mut self, op: T) -> Option<Vec<T>> {
        self.pending.push(op);
        if self.pending.len() >= self.batch_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Drain a partial batch. `None` when nothing is queued.
    pub fn flush(&mut self) -> Option<Vec<T>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn take(&mut self) -> Vec<T> {
        std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size))
    }
}

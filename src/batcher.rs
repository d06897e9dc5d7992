use crate::validator::ValidatedRecord;
use std::num::NonZeroUsize;

/// Records accumulated in arrival order; classification results are
/// aligned back to it by index.
pub type Batch = Vec<ValidatedRecord>;

pub struct Batcher {
    batch_size: NonZeroUsize,
    records: Batch,
}

impl Batcher {
    pub fn new(batch_size: NonZeroUsize) -> Self {
        Self {
            batch_size,
            records: Vec::new(),
        }
    }

    /// Append a record, returning true once the batch has reached the
    /// threshold and must be flushed.
    pub fn append(&mut self, record: ValidatedRecord) -> bool {
        self.records.push(record);
        self.records.len() >= self.batch_size.get()
    }

    /// Take the current contents, leaving the batcher empty.
    pub fn flush(&mut self) -> Batch {
        std::mem::take(&mut self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }
}

//! Output batching
//!
//! Regroups a "tall" stream of records into fixed-size batches, the inverse
//! of flattening. A batch is emitted the moment the buffer reaches the
//! configured size; the remainder is emitted exactly once at end-of-stream.
//! An empty buffer at end-of-stream emits nothing, never an empty batch.

/// Fixed-size batcher preserving input order
#[derive(Debug)]
pub struct PageBatcher<T> {
    batch_size: usize,
    buffer: Vec<T>,
}

impl<T> PageBatcher<T> {
    /// `batch_size` must be nonzero; the job config validates this before
    /// the batcher is constructed.
    pub fn new(batch_size: usize) -> Self {
        debug_assert!(batch_size > 0, "batch size is validated by the config");
        Self {
            batch_size,
            buffer: Vec::with_capacity(batch_size),
        }
    }

    /// Add one record; returns a full batch when the buffer fills.
    pub fn accumulate(&mut self, record: T) -> Option<Vec<T>> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            Some(std::mem::replace(
                &mut self.buffer,
                Vec::with_capacity(self.batch_size),
            ))
        } else {
            None
        }
    }

    /// Emit the non-empty remainder at end-of-stream.
    pub fn flush(&mut self) -> Option<Vec<T>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Records currently buffered
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_on_full_and_flushes_remainder() {
        let mut batcher = PageBatcher::new(2);
        assert!(batcher.accumulate("A").is_none());
        assert_eq!(batcher.accumulate("B"), Some(vec!["A", "B"]));
        assert!(batcher.accumulate("C").is_none());
        assert_eq!(batcher.flush(), Some(vec!["C"]));
        // A second flush on the drained buffer emits nothing.
        assert_eq!(batcher.flush(), None);
    }

    #[test]
    fn test_flush_of_empty_buffer_emits_nothing() {
        let mut batcher: PageBatcher<&str> = PageBatcher::new(4);
        assert_eq!(batcher.flush(), None);
    }

    #[test]
    fn test_order_preserved_across_batches() {
        let mut batcher = PageBatcher::new(3);
        let mut emitted = Vec::new();
        for i in 0..8 {
            if let Some(batch) = batcher.accumulate(i) {
                emitted.extend(batch);
            }
        }
        if let Some(batch) = batcher.flush() {
            emitted.extend(batch);
        }
        assert_eq!(emitted, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_pending_tracks_buffer() {
        let mut batcher = PageBatcher::new(3);
        batcher.accumulate(1);
        batcher.accumulate(2);
        assert_eq!(batcher.pending(), 2);
        batcher.accumulate(3);
        assert_eq!(batcher.pending(), 0);
    }
}

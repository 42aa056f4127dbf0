//! Fixed-capacity batch packing.
//!
//! [`BatchPacker`] is the in-memory half of batching: it takes each plate's
//! rows in order, fills the current batch up to capacity, seals it, and
//! carries the overflow into the next one. A plate larger than the space left
//! keeps splitting until its rows are used up, so no row is ever dropped.
//! Whatever is left at the end comes back from [`BatchPacker::finish`] as a
//! partial batch. Files and bookkeeping are the batcher's concern.

/// A batch ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct SealedBatch<T> {
    pub number: u32,
    pub rows: Vec<T>,
    /// `false` for the final, under-capacity batch.
    pub complete: bool,
}

impl<T> SealedBatch<T> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Packs ordered row sets into batches of exactly `capacity` rows.
#[derive(Debug, Clone)]
pub struct BatchPacker<T> {
    capacity: usize,
    next_number: u32,
    current: Vec<T>,
}

impl<T> BatchPacker<T> {
    /// Start empty; the first sealed batch gets `next_number`.
    ///
    /// Callers pass a validated capacity (`PipelineConfig::validate` rejects
    /// zero). Zero panics in debug builds and is treated as one otherwise.
    pub fn new(capacity: usize, next_number: u32) -> Self {
        debug_assert!(capacity > 0, "batch capacity must be positive");
        let capacity = capacity.max(1);
        Self {
            capacity,
            next_number,
            current: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number the next sealed batch (complete or partial) will carry.
    pub fn next_number(&self) -> u32 {
        self.next_number
    }

    /// Rows waiting in the current batch.
    pub fn pending(&self) -> &[T] {
        &self.current
    }

    /// Add one plate's rows, returning every batch they completed.
    pub fn push(&mut self, rows: Vec<T>) -> Vec<SealedBatch<T>> {
        let mut sealed = Vec::new();
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            let remaining = self.capacity - self.current.len();
            self.current.extend(rows.by_ref().take(remaining));
            if self.current.len() == self.capacity {
                sealed.push(self.seal(true));
            }
        }
        sealed
    }

    /// Seal whatever is left as a partial batch.
    ///
    /// The partial batch carries the number it will get once complete; the
    /// packer's own numbering does not advance.
    pub fn finish(mut self) -> Option<SealedBatch<T>> {
        if self.current.is_empty() {
            return None;
        }
        Some(self.seal(false))
    }

    fn seal(&mut self, complete: bool) -> SealedBatch<T> {
        let rows = std::mem::replace(&mut self.current, Vec::with_capacity(self.capacity));
        let batch = SealedBatch {
            number: self.next_number,
            rows,
            complete,
        };
        if complete {
            self.next_number += 1;
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate(id: usize, n: usize) -> Vec<(usize, usize)> {
        (0..n).map(|i| (id, i)).collect()
    }

    #[test]
    fn test_split_across_boundary() {
        let mut packer = BatchPacker::new(384, 1);
        assert!(packer.push(plate(1, 300)).is_empty());
        let sealed = packer.push(plate(2, 150));
        assert_eq!(sealed.len(), 1);
        assert_eq!(sealed[0].number, 1);
        assert_eq!(sealed[0].len(), 384);
        assert!(sealed[0].complete);
        assert_eq!(sealed[0].rows[299], (1, 299));
        assert_eq!(sealed[0].rows[300], (2, 0));
        assert_eq!(sealed[0].rows[383], (2, 83));

        let partial = packer.finish().unwrap();
        assert_eq!(partial.number, 2);
        assert!(!partial.complete);
        assert_eq!(partial.len(), 66);
        assert_eq!(partial.rows[0], (2, 84));
    }

    #[test]
    fn test_exact_fill_leaves_no_carryover() {
        let mut packer = BatchPacker::new(10, 1);
        packer.push(plate(1, 4));
        let sealed = packer.push(plate(2, 6));
        assert_eq!(sealed.len(), 1);
        assert!(packer.pending().is_empty());
        assert_eq!(packer.next_number(), 2);
        let sealed = packer.push(plate(3, 3));
        assert!(sealed.is_empty());
        assert_eq!(packer.pending(), plate(3, 3).as_slice());
        assert_eq!(packer.finish().unwrap().number, 2);
    }

    #[test]
    fn test_exact_fill_at_end_has_no_partial() {
        let mut packer = BatchPacker::new(5, 7);
        assert_eq!(packer.push(plate(1, 5)).len(), 1);
        assert!(packer.finish().is_none());
    }

    #[test]
    fn test_oversized_plate_loops() {
        let mut packer = BatchPacker::new(10, 1);
        packer.push(plate(1, 3));
        let sealed = packer.push(plate(2, 25));
        let sizes: Vec<usize> = sealed.iter().map(SealedBatch::len).collect();
        assert_eq!(sizes, vec![10, 10]);
        let numbers: Vec<u32> = sealed.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        let partial = packer.finish().unwrap();
        assert_eq!(partial.len(), 8);
        assert_eq!(partial.rows.last(), Some(&(2, 24)));
    }

    #[test]
    fn test_empty_plate_is_noop() {
        let mut packer: BatchPacker<u8> = BatchPacker::new(4, 1);
        assert!(packer.push(Vec::new()).is_empty());
        assert!(packer.finish().is_none());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_rejected_in_debug() {
        let _packer: BatchPacker<u8> = BatchPacker::new(0, 1);
    }

    #[test]
    fn test_order_preserved() {
        let mut packer = BatchPacker::new(7, 1);
        let mut out = Vec::new();
        let mut expected = Vec::new();
        for (id, n) in [(1, 5), (2, 9), (3, 1), (4, 13)] {
            let rows = plate(id, n);
            expected.extend(rows.clone());
            for batch in packer.push(rows) {
                out.extend(batch.rows);
            }
        }
        if let Some(partial) = packer.finish() {
            out.extend(partial.rows);
        }
        assert_eq!(out, expected);
    }
}

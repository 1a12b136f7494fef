//! Batch stores: fixed-size windowing over backing storage.
//!
//! A batch store keeps the outputs of one named channel, one batch (a fixed
//! number of rows) at a time. Two variants implement the same capability
//! interface:
//!
//! - [`BatchArrayStore`] windows a persisted [`NpyArray`], translating a
//!   batch index into a contiguous leading-dimension slice. Batches must be
//!   inserted contiguously from index 0 and only the last one can be
//!   removed, so the backing file never has holes.
//! - [`MemoryStore`] keeps whole batches in an ordered map with no ordering
//!   constraints, as a lighter-weight alternative.

use crate::npy::NpyArray;
use arraypool_core::{ArrayBuf, Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::trace;

/// Capability interface shared by the store variants.
///
/// The lifecycle methods default to no-ops so stores without backing
/// resources can ignore them; the pool drives them uniformly.
pub trait BatchStore {
    /// Fetch the batch at `index`
    fn get(&self, index: usize) -> Result<ArrayBuf>;

    /// Insert or overwrite the batch at `index`
    fn set(&mut self, index: usize, values: &ArrayBuf) -> Result<()>;

    /// Remove the batch at `index`
    fn remove(&mut self, index: usize) -> Result<()>;

    /// Whether the batch at `index` is present
    fn contains(&self, index: usize) -> bool;

    /// Number of complete batches currently stored
    fn len(&self) -> usize;

    /// Whether no batches are stored
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of batches accounted for by the store.
    ///
    /// For a windowed store this can be smaller than [`len`](BatchStore::len)
    /// when the backing array carries pre-allocated rows.
    fn n_batches(&self) -> usize {
        self.len()
    }

    /// Remove all batches
    fn clear(&mut self) -> Result<()>;

    /// Path of the backing file, if the store is file-backed
    fn backing_path(&self) -> Option<&Path> {
        None
    }

    /// Flush backing storage, if any
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Close backing storage, if any
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Remove backing storage from disk, if any
    fn destroy(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Batch store windowing one persisted array.
///
/// Invariant: batch `i` is present iff `i < n_batches` and the backing
/// array's leading length covers rows `[i * batch_size, (i+1) * batch_size)`.
pub struct BatchArrayStore {
    array: NpyArray,
    batch_size: usize,
    n_batches: usize,
}

impl BatchArrayStore {
    /// Wrap an array, starting with no batches accounted for.
    ///
    /// Rows already present in the array (e.g. pre-allocated space) are
    /// overwritten in place as batches are inserted in order.
    pub fn new(array: NpyArray, batch_size: usize) -> Self {
        BatchArrayStore {
            array,
            batch_size,
            n_batches: 0,
        }
    }

    /// Wrap an array that already holds `n_batches` complete batches
    pub fn resume(array: NpyArray, batch_size: usize, n_batches: usize) -> Self {
        BatchArrayStore {
            array,
            batch_size,
            n_batches,
        }
    }

    /// The backing persisted array
    pub fn array(&self) -> &NpyArray {
        &self.array
    }

    /// Rows per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn slice_bounds(&self, index: usize) -> (usize, usize) {
        (index * self.batch_size, (index + 1) * self.batch_size)
    }
}

impl BatchStore for BatchArrayStore {
    fn contains(&self, index: usize) -> bool {
        let (_, stop) = self.slice_bounds(index);
        index < self.n_batches && stop <= self.array.len()
    }

    fn get(&self, index: usize) -> Result<ArrayBuf> {
        if !self.contains(index) {
            return Err(Error::NotFound { index });
        }
        let (start, stop) = self.slice_bounds(index);
        self.array.read(start, stop)
    }

    fn set(&mut self, index: usize, values: &ArrayBuf) -> Result<()> {
        if values.len() != self.batch_size {
            return Err(Error::ShapeMismatch {
                expected: vec![self.batch_size],
                actual: vec![values.len()],
            });
        }
        let (start, stop) = self.slice_bounds(index);

        if self.contains(index) {
            // Rewriting an existing batch in place.
            self.array.write(start, values)?;
        } else if index == self.n_batches {
            if stop <= self.array.len() {
                // Pre-allocated space covers the slice.
                self.array.write(start, values)?;
            } else if start == self.array.len() {
                self.array.append(values)?;
            } else {
                return Err(Error::InsufficientSpace { index });
            }
            self.n_batches += 1;
            trace!(index, n_batches = self.n_batches, "stored batch");
        } else {
            return Err(Error::OutOfOrder {
                index,
                next: self.n_batches,
            });
        }
        Ok(())
    }

    fn remove(&mut self, index: usize) -> Result<()> {
        if !self.contains(index) {
            return Err(Error::NotFound { index });
        }
        if index + 1 != self.n_batches {
            return Err(Error::MiddleRemoval {
                index,
                last: self.n_batches - 1,
            });
        }
        let (start, _) = self.slice_bounds(index);
        self.array.truncate(start)?;
        self.n_batches -= 1;
        trace!(index, n_batches = self.n_batches, "removed batch");
        Ok(())
    }

    fn len(&self) -> usize {
        self.array.len() / self.batch_size
    }

    fn n_batches(&self) -> usize {
        self.n_batches
    }

    fn clear(&mut self) -> Result<()> {
        self.array.clear()?;
        self.n_batches = 0;
        Ok(())
    }

    fn backing_path(&self) -> Option<&Path> {
        Some(self.array.path())
    }

    fn flush(&mut self) -> Result<()> {
        self.array.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.array.close()
    }

    fn destroy(&mut self) -> Result<()> {
        self.array.delete()
    }
}

/// In-memory batch store: an ordered map from batch index to value.
///
/// Unlike [`BatchArrayStore`] there are no ordering constraints; any index
/// can be set or removed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: BTreeMap<usize, ArrayBuf>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl BatchStore for MemoryStore {
    fn get(&self, index: usize) -> Result<ArrayBuf> {
        self.batches
            .get(&index)
            .cloned()
            .ok_or(Error::NotFound { index })
    }

    fn set(&mut self, index: usize, values: &ArrayBuf) -> Result<()> {
        self.batches.insert(index, values.clone());
        Ok(())
    }

    fn remove(&mut self, index: usize) -> Result<()> {
        self.batches
            .remove(&index)
            .map(|_| ())
            .ok_or(Error::NotFound { index })
    }

    fn contains(&self, index: usize) -> bool {
        self.batches.contains_key(&index)
    }

    fn len(&self) -> usize {
        self.batches.len()
    }

    fn clear(&mut self) -> Result<()> {
        self.batches.clear();
        Ok(())
    }
}

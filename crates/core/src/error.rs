//! Error types for the arraypool storage engine.
//!
//! One taxonomy covers every layer: format and contract violations from the
//! persisted arrays, ordering violations from the batch stores, and
//! configuration errors from the pool. `thiserror` derives the `Display`
//! and `Error` implementations.

use crate::dtype::Dtype;
use std::io;
use thiserror::Error;

/// Result type alias for arraypool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the arraypool storage engine
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unsupported or corrupt file header on open
    #[error("Invalid array format: {0}")]
    Format(String),

    /// Trailing shape of the supplied array does not match the store
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Shape fixed at initialization
        expected: Vec<usize>,
        /// Shape of the offending array
        actual: Vec<usize>,
    },

    /// Dtype of the supplied array does not match the store
    #[error("Dtype mismatch: expected {expected}, got {actual}")]
    DtypeMismatch {
        /// Dtype fixed at initialization
        expected: Dtype,
        /// Dtype of the offending array
        actual: Dtype,
    },

    /// Batch inserted past the next expected index
    #[error("Batch {index} is out of order, next expected index is {next}")]
    OutOfOrder {
        /// Requested batch index
        index: usize,
        /// Next index the store would accept
        next: usize,
    },

    /// Inserting the batch would leave a gap in the backing array
    #[error("Not enough allocated space in the backing array for batch {index}")]
    InsufficientSpace {
        /// Requested batch index
        index: usize,
    },

    /// Only the last stored batch may be removed
    #[error("Cannot remove batch {index}, only the last batch ({last}) can be removed")]
    MiddleRemoval {
        /// Requested batch index
        index: usize,
        /// Index of the last stored batch
        last: usize,
    },

    /// Requested row or batch index is not present in the store
    #[error("Index {index} is not present in the store")]
    NotFound {
        /// Requested index
        index: usize,
    },

    /// The array has no header yet (nothing was ever appended)
    #[error("Array is not initialized")]
    NotInitialized,

    /// The array's file handle has been closed
    #[error("Array has been closed")]
    Closed,

    /// The array's file has been deleted
    #[error("Array has been deleted")]
    Deleted,

    /// Serialized header no longer fits the space reserved at initialization
    #[error("Header overflow: {needed} bytes needed but only {reserved} reserved")]
    HeaderOverflow {
        /// Bytes the serialized header would occupy
        needed: usize,
        /// Bytes reserved at initialization
        reserved: usize,
    },

    /// The pool context can only be set once
    #[error("Context is already set")]
    ContextAlreadySet,

    /// A store could not be created because the pool context is unset
    #[error("Context must be set before stores are created")]
    ContextRequired,

    /// A store is already registered under this output name
    #[error("Store for '{0}' already exists")]
    StoreExists(String),

    /// Array data was persisted but the pool descriptor could not be written
    #[error("Pool descriptor could not be written: {0}")]
    Descriptor(String),
}

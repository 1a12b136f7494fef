//! Core types for the arraypool storage engine.
//!
//! This crate defines the pieces shared by every layer: the error taxonomy,
//! element dtype descriptors, and the owned in-memory array buffer that
//! callers hand to (and receive from) the persisted stores.

pub mod array;
pub mod dtype;
pub mod error;

pub use array::{ArrayBuf, Element};
pub use dtype::Dtype;
pub use error::{Error, Result};

//! Persistent array storage.
//!
//! This crate provides the file-backed layers of the engine:
//!
//! - [`npy`]: the `.npy` v2.0 binary format and [`NpyArray`], a persisted
//!   array whose leading dimension grows in place thanks to an oversized
//!   header reservation.
//! - [`batch`]: the [`BatchStore`] capability interface and its two
//!   variants, the file-backed [`BatchArrayStore`] and the in-memory
//!   [`MemoryStore`].

pub mod batch;
pub mod npy;

pub use batch::{BatchArrayStore, BatchStore, MemoryStore};
pub use npy::{NpyArray, NpyHeader, RowsView, RowsViewMut};

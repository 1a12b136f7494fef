//! Storage layer integration tests.

mod batch_ordering;
mod npy_roundtrip;

//! Arraypool - batch-indexed persistent array storage for simulation outputs
//!
//! Arraypool stores fixed-size batches of numeric array data, keyed by an
//! integer batch index, in growable `.npy` files that any reader of the
//! reference versioned array format can open.
//!
//! # Quick Start
//!
//! ```ignore
//! use arraypool::{ArrayBuf, OutputPool, PoolContext};
//!
//! // A pool with two declared outputs, persisted under ./pools
//! let mut pool = OutputPool::on_disk(["x", "d"], None, None);
//! pool.set_context(PoolContext::new(3, 42))?;
//!
//! let mut batch = arraypool::Batch::new();
//! batch.insert("x".to_string(), ArrayBuf::from_vec(vec![1.0, 2.0, 3.0]));
//! pool.add_batch(&batch, 0)?;
//!
//! let stored = pool.get_batch(0);
//! ```
//!
//! # Architecture
//!
//! Three layers, leaves first: [`NpyArray`] manages one growable binary
//! file; [`BatchArrayStore`] windows it into fixed-size batches;
//! [`OutputPool`] maps named output channels to independent stores sharing
//! one `(batch_size, seed)` context.

pub mod context;
pub mod descriptor;
pub mod pool;

pub use arraypool_core::{ArrayBuf, Dtype, Element, Error, Result};
pub use arraypool_storage::{BatchArrayStore, BatchStore, MemoryStore, NpyArray};

pub use context::PoolContext;
pub use descriptor::{PoolDescriptor, StoreBinding};
pub use pool::{Batch, OutputPool};

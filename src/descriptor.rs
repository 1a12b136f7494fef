//! Pool sidecar descriptor.
//!
//! A file-backed pool directory contains one `.npy` file per realized
//! output plus `pool.json`, which records just enough to reconstruct the
//! pool later: its name, context, and per-output store bindings. The
//! descriptor is intentionally minimal physical metadata; batch contents
//! live only in the array files.

use arraypool_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Descriptor file name inside a pool directory
pub const DESCRIPTOR_FILE: &str = "pool.json";

/// Current descriptor format version
pub const DESCRIPTOR_VERSION: u32 = 1;

/// How one declared output is backed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBinding {
    /// Declared but never realized (or not persistable)
    Unrealized,
    /// Backed by a persisted array file inside the pool directory
    Array {
        /// File name relative to the pool directory
        file: String,
        /// Batches accounted for when the pool was closed
        n_batches: usize,
    },
}

/// Serialized pool metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDescriptor {
    /// Descriptor format version
    pub version: u32,
    /// Pool name (the directory name)
    pub name: String,
    /// Rows per batch
    pub batch_size: usize,
    /// Seed of the run that produced the stored outputs
    pub seed: u64,
    /// Binding per declared output
    pub outputs: BTreeMap<String, StoreBinding>,
}

impl PoolDescriptor {
    /// Write the descriptor into `dir`, atomically via a temp file.
    pub fn store(&self, dir: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Descriptor(e.to_string()))?;
        let path = dir.join(DESCRIPTOR_FILE);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes).map_err(|e| Error::Descriptor(e.to_string()))?;
        fs::rename(&temp_path, &path).map_err(|e| Error::Descriptor(e.to_string()))?;
        Ok(())
    }

    /// Read the descriptor from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let bytes = fs::read(dir.join(DESCRIPTOR_FILE))?;
        let descriptor: PoolDescriptor = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Format(format!("pool descriptor: {}", e)))?;
        if descriptor.version != DESCRIPTOR_VERSION {
            return Err(Error::Format(format!(
                "unsupported pool descriptor version {}",
                descriptor.version
            )));
        }
        Ok(descriptor)
    }
}

//! Output pool: named channels of batch stores.
//!
//! An [`OutputPool`] maps output names to independent batch stores sharing
//! one `(batch_size, seed)` execution context. Stores are realized lazily
//! on first use; the pool exclusively owns the stores it creates, and
//! treats every store uniformly when driving the whole-pool lifecycle of a
//! file-backed pool (flush/close/delete/open).
//!
//! Depending on the inference algorithm, stored values may be reused after
//! changes elsewhere in the model: if all simulations are kept, summaries
//! and distances can be recomputed without rerunning the simulator.

use crate::context::PoolContext;
use crate::descriptor::{PoolDescriptor, StoreBinding, DESCRIPTOR_VERSION};
use arraypool_core::{ArrayBuf, Error, Result};
use arraypool_storage::{BatchArrayStore, BatchStore, MemoryStore, NpyArray};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One batch of values keyed by output name
pub type Batch = BTreeMap<String, ArrayBuf>;

/// Default directory under which file-backed pools are created
pub const DEFAULT_ROOT: &str = "pools";

enum Backing {
    Memory,
    Disk {
        root: PathBuf,
        /// Directory name; derived from the seed on first use when absent
        name: Option<String>,
    },
}

/// A pool of batch stores, one per declared output name.
///
/// The default store for an in-memory pool is a [`MemoryStore`]; a
/// file-backed pool creates one persisted array per output inside its pool
/// directory. Stores supplied through [`add_store`](OutputPool::add_store)
/// are driven through the same capability interface.
pub struct OutputPool {
    stores: BTreeMap<String, Option<Box<dyn BatchStore>>>,
    context: Option<PoolContext>,
    backing: Backing,
}

impl OutputPool {
    /// Pool keeping every output in memory
    pub fn in_memory<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OutputPool {
            stores: outputs.into_iter().map(|n| (n.into(), None)).collect(),
            context: None,
            backing: Backing::Memory,
        }
    }

    /// Pool persisting every output to one `.npy` file per name.
    ///
    /// Files are placed under `<root>/<name>/`; `root` defaults to
    /// [`DEFAULT_ROOT`] and `name` to `pool_<seed>` once the context is
    /// known. Nothing is created on disk until the first store is realized.
    pub fn on_disk<I, S>(outputs: I, name: Option<String>, root: Option<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OutputPool {
            stores: outputs.into_iter().map(|n| (n.into(), None)).collect(),
            context: None,
            backing: Backing::Disk {
                root: root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)),
                name,
            },
        }
    }

    /// Reopen a previously closed file-backed pool from its descriptor.
    pub fn open(name: &str, root: Option<PathBuf>) -> Result<Self> {
        let root = root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
        let dir = root.join(name);
        let descriptor = PoolDescriptor::load(&dir)?;

        let mut stores: BTreeMap<String, Option<Box<dyn BatchStore>>> = BTreeMap::new();
        for (output, binding) in &descriptor.outputs {
            let slot = match binding {
                StoreBinding::Unrealized => None,
                StoreBinding::Array { file, n_batches } => {
                    let path = dir.join(file);
                    if path.exists() {
                        let array = NpyArray::open(&path, false)?;
                        let store = BatchArrayStore::resume(
                            array,
                            descriptor.batch_size,
                            *n_batches,
                        );
                        Some(Box::new(store) as Box<dyn BatchStore>)
                    } else {
                        warn!(
                            pool = name,
                            output = %output,
                            file = %file,
                            "array file recorded in descriptor is missing"
                        );
                        None
                    }
                }
            };
            stores.insert(output.clone(), slot);
        }

        info!(pool = name, outputs = stores.len(), "opened output pool");
        Ok(OutputPool {
            stores,
            context: Some(PoolContext::new(descriptor.batch_size, descriptor.seed)),
            backing: Backing::Disk {
                root,
                name: Some(name.to_string()),
            },
        })
    }

    /// Record the batch size and seed these results are computed for.
    ///
    /// Fails with `ContextAlreadySet` on the second call.
    pub fn set_context(&mut self, context: PoolContext) -> Result<()> {
        if self.context.is_some() {
            return Err(Error::ContextAlreadySet);
        }
        self.context = Some(context);
        Ok(())
    }

    /// The execution context, once set
    pub fn context(&self) -> Option<PoolContext> {
        self.context
    }

    /// Whether the context has been set
    pub fn context_set(&self) -> bool {
        self.context.is_some()
    }

    /// Declared output names
    pub fn outputs(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }

    /// Whether `name` is a declared output (realized or not)
    pub fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// The realized store for `name`, if any
    pub fn get_store(&self, name: &str) -> Option<&dyn BatchStore> {
        self.stores.get(name).and_then(|s| s.as_deref())
    }

    /// Register a store for `name`, or declare the name with a lazily
    /// created default store.
    ///
    /// Fails with `StoreExists` if a realized store is already registered.
    pub fn add_store(&mut self, name: &str, store: Option<Box<dyn BatchStore>>) -> Result<()> {
        if matches!(self.stores.get(name), Some(Some(_))) {
            return Err(Error::StoreExists(name.to_string()));
        }
        let store = match store {
            Some(store) => store,
            None => self.make_default_store(name)?,
        };
        self.stores.insert(name.to_string(), Some(store));
        Ok(())
    }

    /// Detach and return the store registered for `name`.
    ///
    /// The caller takes over any cleanup of the returned store.
    pub fn remove_store(&mut self, name: &str) -> Option<Box<dyn BatchStore>> {
        self.stores.remove(name).flatten()
    }

    /// Collect the batch at `index` from every realized store holding it
    pub fn get_batch(&self, index: usize) -> Batch {
        let names: Vec<&str> = self.outputs();
        self.get_batch_for(index, &names)
    }

    /// Collect the batch at `index` from the named outputs.
    ///
    /// Names without a realized store, or whose store does not hold the
    /// index, are omitted from the result.
    pub fn get_batch_for<S: AsRef<str>>(&self, index: usize, names: &[S]) -> Batch {
        let mut batch = Batch::new();
        for name in names {
            let name = name.as_ref();
            let Some(Some(store)) = self.stores.get(name) else {
                continue;
            };
            if !store.contains(index) {
                continue;
            }
            if let Ok(values) = store.get(index) {
                batch.insert(name.to_string(), values);
            }
        }
        batch
    }

    /// Add the outputs of one batch to their stores.
    ///
    /// Only declared names participate; stores are realized on demand. An
    /// index already present in a store is skipped silently, the output is
    /// expected to be identical.
    pub fn add_batch(&mut self, batch: &Batch, index: usize) -> Result<()> {
        for (name, values) in batch {
            if !self.stores.contains_key(name.as_str()) {
                continue;
            }
            if matches!(self.stores.get(name.as_str()), Some(None)) {
                let store = self.make_default_store(name)?;
                self.stores.insert(name.clone(), Some(store));
            }
            let Some(Some(store)) = self.stores.get_mut(name.as_str()) else {
                continue;
            };
            if store.contains(index) {
                continue;
            }
            store.set(index, values)?;
        }
        Ok(())
    }

    /// Remove the batch at `index` from every realized store holding it
    pub fn remove_batch(&mut self, index: usize) -> Result<()> {
        for store in self.stores.values_mut().flatten() {
            if store.contains(index) {
                store.remove(index)?;
            }
        }
        Ok(())
    }

    /// Largest batch count across all realized stores
    pub fn len(&self) -> usize {
        self.stores
            .values()
            .flatten()
            .map(|store| store.len())
            .max()
            .unwrap_or(0)
    }

    /// Whether no store holds any batch
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether some store holds the batch at `index`
    pub fn contains(&self, index: usize) -> bool {
        index < self.len()
    }

    /// Remove all data from every realized store
    pub fn clear(&mut self) -> Result<()> {
        for store in self.stores.values_mut().flatten() {
            store.clear()?;
        }
        Ok(())
    }

    /// Flush every realized store's backing storage
    pub fn flush(&mut self) -> Result<()> {
        for store in self.stores.values_mut().flatten() {
            store.flush()?;
        }
        Ok(())
    }

    /// Close every realized store and, for a file-backed pool, write the
    /// sidecar descriptor so the pool can be reopened.
    ///
    /// A failure to write the descriptor after the arrays closed cleanly is
    /// reported as `Error::Descriptor`: the data is safely persisted, only
    /// the metadata is missing.
    pub fn close(&mut self) -> Result<()> {
        for store in self.stores.values_mut().flatten() {
            store.close()?;
        }
        if matches!(self.backing, Backing::Memory) {
            return Ok(());
        }
        let Some(context) = self.context else {
            // Nothing was ever realized without a context, so there is no
            // directory to describe.
            return Ok(());
        };

        let dir = self.ensure_dir()?;
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut outputs = BTreeMap::new();
        for (output, slot) in &self.stores {
            let binding = match slot {
                Some(store) => match store.backing_path().and_then(Path::file_name) {
                    Some(file) => StoreBinding::Array {
                        file: file.to_string_lossy().into_owned(),
                        n_batches: store.n_batches(),
                    },
                    None => StoreBinding::Unrealized,
                },
                None => StoreBinding::Unrealized,
            };
            outputs.insert(output.clone(), binding);
        }
        let descriptor = PoolDescriptor {
            version: DESCRIPTOR_VERSION,
            name: name.clone(),
            batch_size: context.batch_size,
            seed: context.seed,
            outputs,
        };
        descriptor.store(&dir)?;
        info!(pool = %name, "closed output pool");
        Ok(())
    }

    /// Close the pool and remove its directory and all data in it.
    ///
    /// For an in-memory pool this just drops all stored batches.
    pub fn delete(&mut self) -> Result<()> {
        if matches!(self.backing, Backing::Memory) {
            return self.clear();
        }
        for store in self.stores.values_mut().flatten() {
            store.close()?;
        }
        if let Some(dir) = self.dir() {
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
                info!(dir = %dir.display(), "deleted output pool");
            }
        }
        Ok(())
    }

    /// Directory holding this pool's files, if file-backed and named
    pub fn dir(&self) -> Option<PathBuf> {
        match &self.backing {
            Backing::Memory => None,
            Backing::Disk { root, name } => name.as_ref().map(|n| root.join(n)),
        }
    }

    /// Resolve (deriving the name from the seed if needed) and create the
    /// pool directory.
    fn ensure_dir(&mut self) -> Result<PathBuf> {
        let context = self.context;
        let Backing::Disk { root, name } = &mut self.backing else {
            return Err(Error::Format(
                "in-memory pools have no directory".to_string(),
            ));
        };
        let dir_name = match name {
            Some(n) => n.clone(),
            None => {
                let context = context.ok_or(Error::ContextRequired)?;
                let derived = format!("pool_{}", context.seed);
                *name = Some(derived.clone());
                derived
            }
        };
        let dir = root.join(dir_name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// All default stores are created through here.
    fn make_default_store(&mut self, name: &str) -> Result<Box<dyn BatchStore>> {
        if matches!(self.backing, Backing::Memory) {
            return Ok(Box::new(MemoryStore::new()));
        }
        let context = self.context.ok_or(Error::ContextRequired)?;
        let dir = self.ensure_dir()?;
        let array = NpyArray::open(dir.join(name), false)?;
        debug!(output = name, path = %array.path().display(), "realized store");
        Ok(Box::new(BatchArrayStore::new(array, context.batch_size)))
    }
}

impl std::fmt::Debug for OutputPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let realized: Vec<&str> = self
            .stores
            .iter()
            .filter(|(_, s)| s.is_some())
            .map(|(n, _)| n.as_str())
            .collect();
        f.debug_struct("OutputPool")
            .field("outputs", &self.outputs())
            .field("realized", &realized)
            .field("context", &self.context)
            .field("dir", &self.dir())
            .finish()
    }
}

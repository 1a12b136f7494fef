//! Pool lifecycle: directory layout, descriptor, flush/close/delete.

use arraypool::{
    ArrayBuf, Batch, MemoryStore, OutputPool, PoolContext, PoolDescriptor, StoreBinding,
};
use tempfile::TempDir;

fn batch(pairs: &[(&str, &[f64])]) -> Batch {
    pairs
        .iter()
        .map(|(name, values)| (name.to_string(), ArrayBuf::from_vec(values.to_vec())))
        .collect()
}

#[test]
fn close_writes_descriptor_and_arrays() {
    let root = TempDir::new().unwrap();
    let mut pool = OutputPool::on_disk(
        ["x", "never_used"],
        Some("mypool".to_string()),
        Some(root.path().to_path_buf()),
    );
    pool.set_context(PoolContext::new(2, 11)).unwrap();
    pool.add_batch(&batch(&[("x", &[1.0, 2.0])]), 0).unwrap();
    pool.close().unwrap();

    let dir = root.path().join("mypool");
    assert!(dir.join("x.npy").exists());
    assert!(!dir.join("never_used.npy").exists());

    let descriptor = PoolDescriptor::load(&dir).unwrap();
    assert_eq!(descriptor.name, "mypool");
    assert_eq!(descriptor.batch_size, 2);
    assert_eq!(descriptor.seed, 11);
    assert_eq!(
        descriptor.outputs["x"],
        StoreBinding::Array {
            file: "x.npy".to_string(),
            n_batches: 1,
        }
    );
    assert_eq!(descriptor.outputs["never_used"], StoreBinding::Unrealized);
}

#[test]
fn flush_persists_without_closing() {
    let root = TempDir::new().unwrap();
    let mut pool = OutputPool::on_disk(
        ["x"],
        Some("flushed".to_string()),
        Some(root.path().to_path_buf()),
    );
    pool.set_context(PoolContext::new(2, 1)).unwrap();
    pool.add_batch(&batch(&[("x", &[1.0, 2.0])]), 0).unwrap();
    pool.flush().unwrap();

    // Still usable after the flush.
    pool.add_batch(&batch(&[("x", &[3.0, 4.0])]), 1).unwrap();
    assert_eq!(pool.len(), 2);
}

#[test]
fn delete_removes_pool_directory() {
    let root = TempDir::new().unwrap();
    let mut pool = OutputPool::on_disk(
        ["x"],
        Some("doomed".to_string()),
        Some(root.path().to_path_buf()),
    );
    pool.set_context(PoolContext::new(1, 5)).unwrap();
    pool.add_batch(&batch(&[("x", &[1.0])]), 0).unwrap();

    let dir = root.path().join("doomed");
    assert!(dir.exists());
    pool.delete().unwrap();
    assert!(!dir.exists());
}

#[test]
fn reopen_tolerates_missing_array_file() {
    let root = TempDir::new().unwrap();
    let mut pool = OutputPool::on_disk(
        ["x", "d"],
        Some("partial".to_string()),
        Some(root.path().to_path_buf()),
    );
    pool.set_context(PoolContext::new(1, 5)).unwrap();
    pool.add_batch(&batch(&[("x", &[1.0]), ("d", &[2.0])]), 0)
        .unwrap();
    pool.close().unwrap();

    std::fs::remove_file(root.path().join("partial").join("d.npy")).unwrap();

    let reopened = OutputPool::open("partial", Some(root.path().to_path_buf())).unwrap();
    let stored = reopened.get_batch(0);
    assert_eq!(stored.len(), 1);
    assert!(stored.contains_key("x"));
}

#[test]
fn memory_pool_lifecycle_is_trivial() {
    let mut pool = OutputPool::in_memory(["x"]);
    pool.add_batch(&batch(&[("x", &[1.0])]), 0).unwrap();
    pool.flush().unwrap();
    pool.close().unwrap();
    pool.delete().unwrap();
    assert!(pool.is_empty());
}

#[test]
fn externally_supplied_store_participates() {
    let mut pool = OutputPool::in_memory(["x"]);
    pool.add_store("extra", Some(Box::new(MemoryStore::new())))
        .unwrap();
    pool.add_batch(&batch(&[("extra", &[1.0]), ("x", &[2.0])]), 0)
        .unwrap();
    assert_eq!(pool.get_batch(0).len(), 2);

    let detached = pool.remove_store("extra").unwrap();
    assert_eq!(detached.len(), 1);
    assert_eq!(pool.get_batch(0).len(), 1);
}

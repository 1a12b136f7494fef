//! End-to-end pool scenario: declare, fill, query, reopen.

use arraypool::{ArrayBuf, Batch, OutputPool, PoolContext};
use tempfile::TempDir;

fn batch(pairs: &[(&str, &[f64])]) -> Batch {
    pairs
        .iter()
        .map(|(name, values)| (name.to_string(), ArrayBuf::from_vec(values.to_vec())))
        .collect()
}

#[test]
fn two_output_disk_pool_full_cycle() {
    let root = TempDir::new().unwrap();
    let root_path = root.path().to_path_buf();

    let mut pool = OutputPool::on_disk(["x", "d"], None, Some(root_path.clone()));
    pool.set_context(PoolContext::new(3, 42)).unwrap();

    pool.add_batch(
        &batch(&[("x", &[1.0, 2.0, 3.0]), ("d", &[0.1, 0.2, 0.3])]),
        0,
    )
    .unwrap();

    let stored = pool.get_batch(0);
    assert_eq!(stored.len(), 2);
    assert_eq!(stored["x"].to_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);
    assert_eq!(stored["d"].to_vec::<f64>().unwrap(), vec![0.1, 0.2, 0.3]);

    pool.add_batch(&batch(&[("x", &[4.0, 5.0, 6.0])]), 1).unwrap();
    assert_eq!(pool.len(), 2);
    assert!(pool.contains(1));

    pool.remove_batch(1).unwrap();
    assert!(pool.get_batch(1).is_empty());

    pool.close().unwrap();

    // The default name derives from the seed.
    let reopened = OutputPool::open("pool_42", Some(root_path)).unwrap();
    assert_eq!(reopened.context().unwrap(), PoolContext::new(3, 42));
    let stored = reopened.get_batch(0);
    assert_eq!(stored["x"].to_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);
    assert_eq!(stored["d"].to_vec::<f64>().unwrap(), vec![0.1, 0.2, 0.3]);
    assert!(reopened.get_batch(1).is_empty());
}

#[test]
fn idempotent_add_keeps_first_value() {
    let root = TempDir::new().unwrap();
    let mut pool = OutputPool::on_disk(["x"], None, Some(root.path().to_path_buf()));
    pool.set_context(PoolContext::new(2, 7)).unwrap();

    pool.add_batch(&batch(&[("x", &[1.0, 2.0])]), 0).unwrap();
    pool.add_batch(&batch(&[("x", &[8.0, 9.0])]), 0).unwrap();
    assert_eq!(
        pool.get_batch(0)["x"].to_vec::<f64>().unwrap(),
        vec![1.0, 2.0]
    );
    pool.delete().unwrap();
}

#[test]
fn partial_batches_are_collected_per_output() {
    let mut pool = OutputPool::in_memory(["x", "d"]);
    pool.add_batch(&batch(&[("x", &[1.0]), ("d", &[2.0])]), 0)
        .unwrap();
    pool.add_batch(&batch(&[("x", &[3.0])]), 1).unwrap();

    assert_eq!(pool.get_batch(0).len(), 2);
    let second = pool.get_batch(1);
    assert_eq!(second.len(), 1);
    assert_eq!(second["x"].to_vec::<f64>().unwrap(), vec![3.0]);

    let only_d = pool.get_batch_for(0, &["d"]);
    assert_eq!(only_d.len(), 1);
    assert!(only_d.contains_key("d"));
}

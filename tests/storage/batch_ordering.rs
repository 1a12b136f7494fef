//! Batch store ordering contract.
//!
//! Batches go in contiguously from index 0 and only the last one comes out.

use arraypool::{ArrayBuf, BatchArrayStore, BatchStore, Error, NpyArray};
use tempfile::TempDir;

fn store(dir: &TempDir, batch_size: usize) -> BatchArrayStore {
    let array = NpyArray::open(dir.path().join("batches"), false).unwrap();
    BatchArrayStore::new(array, batch_size)
}

fn batch(values: &[f64]) -> ArrayBuf {
    ArrayBuf::from_vec(values.to_vec())
}

#[test]
fn set_succeeds_only_at_or_below_next_index() {
    let dir = TempDir::new().unwrap();
    let mut s = store(&dir, 2);

    for i in 0..5 {
        s.set(i, &batch(&[i as f64, i as f64])).unwrap();
    }
    // Every stored index can be rewritten.
    for i in 0..5 {
        s.set(i, &batch(&[0.0, 0.0])).unwrap();
    }
    assert_eq!(s.n_batches(), 5);

    // Skipping ahead always fails, for any gap size.
    for gap in 1..4 {
        let err = s.set(5 + gap, &batch(&[1.0, 1.0])).unwrap_err();
        assert!(matches!(err, Error::OutOfOrder { .. }), "gap {}", gap);
    }
    assert_eq!(s.n_batches(), 5);
}

#[test]
fn removal_allowed_only_for_last_batch() {
    let dir = TempDir::new().unwrap();
    let mut s = store(&dir, 3);
    for i in 0..4 {
        s.set(i, &batch(&[i as f64; 3])).unwrap();
    }

    for i in 0..3 {
        let err = s.remove(i).unwrap_err();
        assert!(
            matches!(err, Error::MiddleRemoval { last: 3, .. }),
            "index {}",
            i
        );
    }

    // Peeling from the end works all the way down.
    for i in (0..4).rev() {
        s.remove(i).unwrap();
        assert_eq!(s.n_batches(), i);
    }
    assert!(matches!(s.remove(0), Err(Error::NotFound { .. })));
}

#[test]
fn removal_frees_backing_rows() {
    let dir = TempDir::new().unwrap();
    let mut s = store(&dir, 2);
    s.set(0, &batch(&[1.0, 2.0])).unwrap();
    s.set(1, &batch(&[3.0, 4.0])).unwrap();
    assert_eq!(s.array().len(), 4);

    s.remove(1).unwrap();
    assert_eq!(s.array().len(), 2);
    assert_eq!(s.len(), 1);
}

#[test]
fn contains_requires_backing_coverage() {
    let dir = TempDir::new().unwrap();
    let array = NpyArray::open(dir.path().join("batches"), false).unwrap();
    // Resume claims two batches, but the backing array is empty.
    let s = BatchArrayStore::resume(array, 2, 2);
    assert!(!s.contains(0));
    assert!(matches!(s.get(0), Err(Error::NotFound { .. })));
}

#[test]
fn survives_close_and_resume() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("batches");
    {
        let array = NpyArray::open(&path, false).unwrap();
        let mut s = BatchArrayStore::new(array, 2);
        s.set(0, &batch(&[1.0, 2.0])).unwrap();
        s.set(1, &batch(&[3.0, 4.0])).unwrap();
        s.close().unwrap();
    }

    let array = NpyArray::open(&path, false).unwrap();
    let s = BatchArrayStore::resume(array, 2, 2);
    assert_eq!(s.n_batches(), 2);
    assert_eq!(s.get(1).unwrap().to_vec::<f64>().unwrap(), vec![3.0, 4.0]);
}

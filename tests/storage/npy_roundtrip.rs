//! Persisted array round-trip tests.
//!
//! Closing and reopening a persisted array must reproduce the exact shape,
//! dtype, and element values; truncate must undo append down to the byte.

use arraypool::{ArrayBuf, Dtype, Error, NpyArray};
use std::fs;
use tempfile::TempDir;

// ============================================================================
// Round-trip
// ============================================================================

#[test]
fn reopen_yields_identical_contents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values");

    let batches: Vec<Vec<f64>> = vec![
        vec![1.0, 2.0, 3.0],
        vec![-0.5, f64::MAX, f64::MIN_POSITIVE],
        vec![0.0, -0.0, 42.42],
    ];
    {
        let mut array = NpyArray::open(&path, false).unwrap();
        for batch in &batches {
            array.append(&ArrayBuf::from_vec(batch.clone())).unwrap();
        }
        array.close().unwrap();
    }

    let array = NpyArray::open(&path, false).unwrap();
    assert_eq!(array.shape().unwrap(), vec![9]);
    assert_eq!(array.dtype(), Some(Dtype::Float64));
    let flat: Vec<f64> = batches.into_iter().flatten().collect();
    assert_eq!(array.read(0, 9).unwrap().to_vec::<f64>().unwrap(), flat);
}

#[test]
fn reopen_multidimensional_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("matrix");

    let rows = ArrayBuf::from_shape_vec(vec![2, 3, 2], (0..12).map(|i| i as f32).collect())
        .unwrap();
    {
        let mut array = NpyArray::open(&path, false).unwrap();
        array.append(&rows).unwrap();
        array.close().unwrap();
    }

    let array = NpyArray::open(&path, false).unwrap();
    assert_eq!(array.shape().unwrap(), vec![2, 3, 2]);
    assert_eq!(array.trailing_shape().unwrap(), &[3, 2]);
    assert_eq!(array.read(0, 2).unwrap(), rows);
}

// ============================================================================
// Truncate / append inverse
// ============================================================================

#[test]
fn truncate_restores_prior_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t");

    let mut array = NpyArray::open(&path, false).unwrap();
    array
        .append(&ArrayBuf::from_vec(vec![10i64, 20, 30]))
        .unwrap();
    array.flush().unwrap();
    let before = fs::read(array.path()).unwrap();

    array
        .append(&ArrayBuf::from_vec(vec![40i64, 50]))
        .unwrap();
    array.truncate(3).unwrap();
    array.flush().unwrap();
    let after = fs::read(array.path()).unwrap();

    assert_eq!(before, after);
    assert_eq!(array.len(), 3);
}

// ============================================================================
// Mismatches leave the store unchanged
// ============================================================================

#[test]
fn dtype_mismatch_leaves_length_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut array = NpyArray::open(dir.path().join("m"), false).unwrap();
    array.append(&ArrayBuf::from_vec(vec![1i32, 2, 3])).unwrap();

    let err = array
        .append(&ArrayBuf::from_vec(vec![1.0f64, 2.0, 3.0]))
        .unwrap_err();
    assert!(matches!(err, Error::DtypeMismatch { .. }));
    assert_eq!(array.len(), 3);
    assert_eq!(
        array.read(0, 3).unwrap().to_vec::<i32>().unwrap(),
        vec![1, 2, 3]
    );
}

#[test]
fn shape_mismatch_leaves_length_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut array = NpyArray::open(dir.path().join("m"), false).unwrap();
    let rows = ArrayBuf::from_shape_vec(vec![2, 4], vec![0.0f64; 8]).unwrap();
    array.append(&rows).unwrap();

    let narrow = ArrayBuf::from_shape_vec(vec![2, 3], vec![0.0f64; 6]).unwrap();
    assert!(matches!(
        array.append(&narrow),
        Err(Error::ShapeMismatch { .. })
    ));
    assert_eq!(array.len(), 2);
}

// ============================================================================
// Live views
// ============================================================================

#[test]
fn view_observes_writes_through_same_object() {
    let dir = TempDir::new().unwrap();
    let mut array = NpyArray::open(dir.path().join("live"), false).unwrap();
    array
        .append(&ArrayBuf::from_vec(vec![1.0f64, 2.0, 3.0]))
        .unwrap();

    array.write(0, &ArrayBuf::from_vec(vec![5.0f64])).unwrap();
    let view = array.slice(0, 3).unwrap();
    assert_eq!(view.as_slice::<f64>().unwrap(), &[5.0, 2.0, 3.0]);
}

#[test]
fn uninitialized_and_closed_reads_fail() {
    let dir = TempDir::new().unwrap();
    let mut array = NpyArray::open(dir.path().join("u"), false).unwrap();
    assert!(matches!(array.read(0, 1), Err(Error::NotInitialized)));

    array.append(&ArrayBuf::from_vec(vec![1u8])).unwrap();
    array.close().unwrap();
    assert!(matches!(array.read(0, 1), Err(Error::Closed)));
}

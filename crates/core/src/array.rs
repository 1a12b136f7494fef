//! Owned in-memory array values.
//!
//! [`ArrayBuf`] is the value type exchanged with the persisted stores: a
//! row-major block of little-endian element bytes together with its dtype
//! and shape. The first ("leading") dimension is the one the stores grow;
//! everything after it is the trailing shape fixed at initialization.

use crate::dtype::Dtype;
use crate::error::{Error, Result};

/// Marker trait for the scalar types an [`ArrayBuf`] can hold.
///
/// Implemented for the fixed-width numeric primitives that have a dtype
/// descriptor. The in-memory byte layout of each implementor matches its
/// on-disk layout on little-endian targets.
pub trait Element: Copy + PartialEq + std::fmt::Debug + 'static {
    /// Dtype tag corresponding to this scalar type
    const DTYPE: Dtype;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(impl Element for $ty {
            const DTYPE: Dtype = $dtype;
        })*
    };
}

impl_element! {
    bool => Dtype::Bool,
    i8 => Dtype::Int8,
    i16 => Dtype::Int16,
    i32 => Dtype::Int32,
    i64 => Dtype::Int64,
    u8 => Dtype::UInt8,
    u16 => Dtype::UInt16,
    u32 => Dtype::UInt32,
    u64 => Dtype::UInt64,
    f32 => Dtype::Float32,
    f64 => Dtype::Float64,
}

/// Owned row-major array value
///
/// Invariant: `data.len() == shape.iter().product::<usize>() * dtype.itemsize()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayBuf {
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl ArrayBuf {
    /// Build a one-dimensional array from a vector of elements
    pub fn from_vec<T: Element>(values: Vec<T>) -> Self {
        let shape = vec![values.len()];
        Self::from_shape_vec(shape, values).expect("1-d shape always matches")
    }

    /// Build an array of the given shape from a flat row-major vector.
    ///
    /// Fails with `ShapeMismatch` if the element count does not match the
    /// shape's product.
    pub fn from_shape_vec<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(Error::ShapeMismatch {
                expected: shape,
                actual: vec![values.len()],
            });
        }
        let byte_len = values.len() * T::DTYPE.itemsize();
        // SAFETY: T is a plain fixed-width scalar, so viewing the vector's
        // contents as bytes is valid for the full byte length.
        let bytes =
            unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, byte_len) };
        Ok(ArrayBuf {
            dtype: T::DTYPE,
            shape,
            data: bytes.to_vec(),
        })
    }

    /// Build an array directly from raw element bytes.
    ///
    /// Fails with `ShapeMismatch` if the byte length does not match
    /// `product(shape) * dtype.itemsize()`.
    pub fn from_raw(dtype: Dtype, shape: Vec<usize>, data: Vec<u8>) -> Result<Self> {
        let expected: usize = shape.iter().product::<usize>() * dtype.itemsize();
        if data.len() != expected {
            return Err(Error::ShapeMismatch {
                expected: shape,
                actual: vec![data.len() / dtype.itemsize()],
            });
        }
        Ok(ArrayBuf { dtype, shape, data })
    }

    /// Zero-filled array of the given dtype and shape
    pub fn zeros(dtype: Dtype, shape: Vec<usize>) -> Self {
        let len: usize = shape.iter().product::<usize>() * dtype.itemsize();
        ArrayBuf {
            dtype,
            shape,
            data: vec![0u8; len],
        }
    }

    /// Element dtype
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Full shape, leading dimension first
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Length of the leading dimension
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Whether the leading dimension is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of one row (everything after the leading dimension)
    pub fn trailing_shape(&self) -> &[usize] {
        &self.shape[1.min(self.shape.len())..]
    }

    /// Bytes occupied by one row
    pub fn row_bytes(&self) -> usize {
        self.trailing_shape().iter().product::<usize>() * self.dtype.itemsize()
    }

    /// Raw little-endian element bytes, row-major
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy the elements out as a typed flat vector.
    ///
    /// Fails with `DtypeMismatch` if `T` does not match the array's dtype.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(Error::DtypeMismatch {
                expected: self.dtype,
                actual: T::DTYPE,
            });
        }
        let n = self.data.len() / self.dtype.itemsize();
        let mut out: Vec<T> = Vec::with_capacity(n);
        // SAFETY: the byte length equals n * size_of::<T>() by the struct
        // invariant, the destination is freshly allocated with capacity n,
        // and a byte-wise copy handles any source alignment.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.data.as_ptr(),
                out.as_mut_ptr() as *mut u8,
                self.data.len(),
            );
            out.set_len(n);
        }
        Ok(out)
    }
}

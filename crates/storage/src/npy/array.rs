//! The persisted growable array.
//!
//! [`NpyArray`] manages one `.npy` file: a fixed header region reserved at
//! initialization followed by a contiguous block of row-major element data.
//! The leading dimension grows by appending raw bytes at the end of the data
//! region and rewriting only the header in place; the data region never
//! moves.
//!
//! Appends update the on-disk header lazily: the in-memory header is marked
//! dirty and written out on the next `flush` (or `close`). Reads go through
//! memory-mapped views over the live file, so a view observes writes made
//! through the same object, with no atomicity guarantees.

use arraypool_core::{ArrayBuf, Dtype, Error, Result};
use memmap2::{Mmap, MmapMut};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

use super::header::{self, NpyHeader, DEFAULT_DIGIT_BUDGET, PREFIX_SIZE};

/// Reserved file extension for persisted arrays
pub const EXTENSION: &str = "npy";

fn with_npy_extension(path: &Path) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(EXTENSION);
        PathBuf::from(name)
    }
}

/// A persisted array backed by one `.npy` file.
///
/// The dtype and trailing shape are fixed by the first appended array; the
/// leading dimension grows with every append and shrinks on truncate. The
/// object exclusively owns its file handle and must be closed (or dropped,
/// which flushes best-effort) on every exit path.
pub struct NpyArray {
    path: PathBuf,
    /// None once closed or deleted
    file: Option<File>,
    /// None until the first append (or until parsed from an existing file)
    header: Option<NpyHeader>,
    /// Variable header region length; data starts at `PREFIX_SIZE + reserved`
    reserved: usize,
    digit_budget: usize,
    dirty: bool,
    deleted: bool,
}

impl NpyArray {
    /// Open or create a persisted array file.
    ///
    /// The `.npy` extension is appended to `path` when missing. If the file
    /// exists and `truncate` is false its header is parsed; a fresh empty
    /// file is created otherwise. A fresh file stays uninitialized until the
    /// first append fixes its dtype and trailing shape.
    pub fn open<P: AsRef<Path>>(path: P, truncate: bool) -> Result<Self> {
        Self::open_with_budget(path, truncate, DEFAULT_DIGIT_BUDGET)
    }

    /// Like [`NpyArray::open`], but with an explicit digit budget for the
    /// leading dimension of freshly initialized files.
    pub fn open_with_budget<P: AsRef<Path>>(
        path: P,
        truncate: bool,
        digit_budget: usize,
    ) -> Result<Self> {
        let path = with_npy_extension(path.as_ref());
        let parse_existing = !truncate && path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(&path)?;

        let (header, reserved) = if parse_existing && file.metadata()?.len() > 0 {
            let (header, reserved) = header::decode(&mut file)?;
            debug!(
                path = %path.display(),
                rows = header.leading_len,
                dtype = %header.dtype,
                "opened persisted array"
            );
            (Some(header), reserved)
        } else {
            debug!(path = %path.display(), "created persisted array file");
            (None, 0)
        };

        Ok(NpyArray {
            path,
            file: Some(file),
            header,
            reserved,
            digit_budget,
            dirty: false,
            deleted: false,
        })
    }

    /// Open a persisted array and, if it is not yet initialized, initialize
    /// it from `initial` and append it, flushing the header.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        initial: &ArrayBuf,
        truncate: bool,
    ) -> Result<Self> {
        let mut array = Self::open(path, truncate)?;
        if array.header.is_none() {
            array.append(initial)?;
            array.flush()?;
        }
        Ok(array)
    }

    /// File path backing this array.
    ///
    /// The path is the only state needed to reconstruct the object later via
    /// [`NpyArray::open`]; callers must [`flush`](NpyArray::flush) first so
    /// the on-disk header is self-consistent.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the leading dimension
    pub fn len(&self) -> usize {
        self.header.as_ref().map_or(0, |h| h.leading_len)
    }

    /// Whether no rows are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element dtype, once initialized
    pub fn dtype(&self) -> Option<Dtype> {
        self.header.as_ref().map(|h| h.dtype)
    }

    /// Fixed trailing shape, once initialized
    pub fn trailing_shape(&self) -> Option<&[usize]> {
        self.header.as_ref().map(|h| h.trailing_shape.as_slice())
    }

    /// Full shape (leading dimension first), once initialized
    pub fn shape(&self) -> Option<Vec<usize>> {
        self.header.as_ref().map(|h| h.shape())
    }

    /// Byte offset where the raw element data begins
    pub fn data_offset(&self) -> usize {
        PREFIX_SIZE + self.reserved
    }

    /// Whether a header exists (something has been appended or parsed)
    pub fn is_initialized(&self) -> bool {
        self.header.is_some() && self.file.is_some()
    }

    /// Whether the file handle has been released
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Whether the backing file has been removed
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn ensure_open(&self) -> Result<()> {
        if self.deleted {
            return Err(Error::Deleted);
        }
        if self.file.is_none() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Fix dtype and trailing shape from the first array and reserve the
    /// oversized header. Writes the 12-byte prefix once; it is never
    /// rewritten afterwards.
    fn init_from(&mut self, array: &ArrayBuf) -> Result<()> {
        let header = NpyHeader {
            dtype: array.dtype(),
            trailing_shape: array.trailing_shape().to_vec(),
            leading_len: 0,
        };
        let reserved = header::reserved_len(header.dtype, &header.trailing_shape, self.digit_budget);
        let prefix = header::encode_prefix(reserved)?;

        let file = self.file.as_mut().ok_or(Error::Closed)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&prefix)?;

        self.header = Some(header);
        self.reserved = reserved;
        self.dirty = true;
        self.write_header()?;

        info!(
            path = %self.path.display(),
            dtype = %array.dtype(),
            trailing = ?array.trailing_shape(),
            reserved,
            "initialized persisted array"
        );
        Ok(())
    }

    /// Rewrite the variable header region in place and clear the dirty flag.
    /// The fixed prefix is left untouched.
    fn write_header(&mut self) -> Result<()> {
        let header = self.header.as_ref().ok_or(Error::NotInitialized)?;
        let bytes = header::encode(header, self.reserved)?;
        let file = self.file.as_mut().ok_or(Error::Closed)?;
        file.seek(SeekFrom::Start(PREFIX_SIZE as u64))?;
        file.write_all(&bytes)?;
        self.dirty = false;
        Ok(())
    }

    fn check_compatible(&self, array: &ArrayBuf) -> Result<()> {
        let header = self.header.as_ref().ok_or(Error::NotInitialized)?;
        if array.trailing_shape() != header.trailing_shape.as_slice() {
            return Err(Error::ShapeMismatch {
                expected: header.trailing_shape.clone(),
                actual: array.trailing_shape().to_vec(),
            });
        }
        if array.dtype() != header.dtype {
            return Err(Error::DtypeMismatch {
                expected: header.dtype,
                actual: array.dtype(),
            });
        }
        Ok(())
    }

    /// Append rows at the end of the array.
    ///
    /// Initializes the array from `array` if this is the first append. The
    /// on-disk header is not touched; it is rewritten on the next flush. A
    /// failed append leaves the observable length unchanged.
    pub fn append(&mut self, array: &ArrayBuf) -> Result<()> {
        self.ensure_open()?;
        if self.header.is_none() {
            self.init_from(array)?;
        }
        self.check_compatible(array)?;

        // Append position derives from the logical length, not the physical
        // end of file, so a previously interrupted write cannot leave a gap.
        let header = self.header.as_ref().ok_or(Error::NotInitialized)?;
        let offset = self.data_offset() as u64 + (header.leading_len * header.row_bytes()) as u64;
        let file = self.file.as_mut().ok_or(Error::Closed)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(array.as_bytes())?;

        let header = self.header.as_mut().ok_or(Error::NotInitialized)?;
        header.leading_len += array.len();
        self.dirty = true;
        trace!(
            path = %self.path.display(),
            rows = array.len(),
            total = header.leading_len,
            "appended rows"
        );
        Ok(())
    }

    /// Overwrite already-allocated rows starting at `start`.
    ///
    /// Valid only for rows below the current leading length; the length is
    /// unchanged.
    pub fn write(&mut self, start: usize, values: &ArrayBuf) -> Result<()> {
        self.ensure_open()?;
        self.check_compatible(values)?;
        let header = self.header.as_ref().ok_or(Error::NotInitialized)?;
        let stop = start + values.len();
        if stop > header.leading_len {
            return Err(Error::NotFound {
                index: stop.saturating_sub(1),
            });
        }
        let offset = self.data_offset() as u64 + (start * header.row_bytes()) as u64;
        let file = self.file.as_mut().ok_or(Error::Closed)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(values.as_bytes())?;
        trace!(path = %self.path.display(), start, rows = values.len(), "overwrote rows");
        Ok(())
    }

    /// Memory-mapped read-only view over rows `[start, stop)`.
    ///
    /// The view is live: it observes writes made through this object while
    /// it exists, with no atomicity guarantee.
    pub fn slice(&self, start: usize, stop: usize) -> Result<RowsView<'_>> {
        let (mmap, offset, rows) = self.map_range(start, stop)?;
        let header = self.header.as_ref().ok_or(Error::NotInitialized)?;
        Ok(RowsView {
            mmap,
            offset,
            rows,
            row_bytes: header.row_bytes(),
            dtype: header.dtype,
            trailing_shape: header.trailing_shape.clone(),
            _owner: PhantomData,
        })
    }

    /// Memory-mapped writable view over rows `[start, stop)`
    pub fn slice_mut(&mut self, start: usize, stop: usize) -> Result<RowsViewMut<'_>> {
        let header = {
            let h = self.header.as_ref().ok_or(Error::NotInitialized)?;
            h.clone()
        };
        let (offset, rows) = self.bounds(start, stop)?;
        let file = self.file.as_ref().ok_or(Error::Closed)?;
        // SAFETY: the file is open read-write and this object is the single
        // writer; the view's lifetime borrows the array mutably, so the file
        // cannot be truncated or closed while the mapping is alive.
        let mmap = unsafe { MmapMut::map_mut(file)? };
        let end = offset + rows * header.row_bytes();
        if end > mmap.len() {
            return Err(Error::Format(
                "file is shorter than its header claims".to_string(),
            ));
        }
        Ok(RowsViewMut {
            mmap,
            offset,
            rows,
            row_bytes: header.row_bytes(),
            dtype: header.dtype,
            trailing_shape: header.trailing_shape,
            _owner: PhantomData,
        })
    }

    /// Copy rows `[start, stop)` out into an owned array
    pub fn read(&self, start: usize, stop: usize) -> Result<ArrayBuf> {
        Ok(self.slice(start, stop)?.to_array())
    }

    fn bounds(&self, start: usize, stop: usize) -> Result<(usize, usize)> {
        self.ensure_open()?;
        let header = self.header.as_ref().ok_or(Error::NotInitialized)?;
        if stop > header.leading_len {
            return Err(Error::NotFound {
                index: stop.saturating_sub(1),
            });
        }
        if start > stop {
            return Err(Error::NotFound { index: start });
        }
        let offset = self.data_offset() + start * header.row_bytes();
        Ok((offset, stop - start))
    }

    fn map_range(&self, start: usize, stop: usize) -> Result<(Mmap, usize, usize)> {
        let (offset, rows) = self.bounds(start, stop)?;
        let header = self.header.as_ref().ok_or(Error::NotInitialized)?;
        let file = self.file.as_ref().ok_or(Error::Closed)?;
        // SAFETY: the mapping is read-only and its lifetime borrows the
        // array, so the file cannot shrink underneath it through this
        // object.
        let mmap = unsafe { Mmap::map(file)? };
        let end = offset + rows * header.row_bytes();
        if end > mmap.len() {
            return Err(Error::Format(
                "file is shorter than its header claims".to_string(),
            ));
        }
        Ok((mmap, offset, rows))
    }

    /// Shrink the leading dimension to `len` rows, rewriting the header and
    /// physically shortening the file
    pub fn truncate(&mut self, len: usize) -> Result<()> {
        self.ensure_open()?;
        let header = self.header.as_mut().ok_or(Error::NotInitialized)?;
        if len > header.leading_len {
            return Err(Error::NotFound { index: len });
        }
        header.leading_len = len;
        let end = (PREFIX_SIZE + self.reserved) as u64 + (len * header.row_bytes()) as u64;
        self.dirty = true;
        self.write_header()?;
        let file = self.file.as_mut().ok_or(Error::Closed)?;
        file.set_len(end)?;
        debug!(path = %self.path.display(), rows = len, "truncated persisted array");
        Ok(())
    }

    /// Remove all rows ([`truncate`](NpyArray::truncate) to zero)
    pub fn clear(&mut self) -> Result<()> {
        self.truncate(0)
    }

    /// Write the header if dirty and fsync the file.
    ///
    /// On failure the dirty flag is left set so a retry can complete the
    /// flush once the underlying condition clears.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.header.is_some() {
            if self.dirty {
                self.write_header()?;
            }
            let file = self.file.as_ref().ok_or(Error::Closed)?;
            file.sync_all()?;
            trace!(path = %self.path.display(), "flushed persisted array");
        }
        Ok(())
    }

    /// Flush (if initialized) and release the file handle. Idempotent;
    /// subsequent operations fail with `Closed`.
    pub fn close(&mut self) -> Result<()> {
        if self.deleted || self.file.is_none() {
            return Ok(());
        }
        if self.header.is_some() {
            self.flush()?;
        }
        self.file = None;
        debug!(path = %self.path.display(), "closed persisted array");
        Ok(())
    }

    /// Close and remove the backing file. Idempotent; subsequent operations
    /// fail with `Deleted`.
    pub fn delete(&mut self) -> Result<()> {
        if self.deleted {
            return Ok(());
        }
        self.close()?;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        self.header = None;
        self.deleted = true;
        info!(path = %self.path.display(), "deleted persisted array");
        Ok(())
    }
}

impl Drop for NpyArray {
    fn drop(&mut self) {
        if self.file.is_some() && self.header.is_some() {
            if let Err(err) = self.flush() {
                warn!(
                    path = %self.path.display(),
                    %err,
                    "failed to flush persisted array on drop"
                );
            }
        }
    }
}

impl std::fmt::Debug for NpyArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NpyArray")
            .field("path", &self.path)
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .field("closed", &self.is_closed())
            .field("deleted", &self.deleted)
            .finish()
    }
}

/// Read-only memory-mapped view over a row range of an [`NpyArray`]
pub struct RowsView<'a> {
    mmap: Mmap,
    offset: usize,
    rows: usize,
    row_bytes: usize,
    dtype: Dtype,
    trailing_shape: Vec<usize>,
    _owner: PhantomData<&'a NpyArray>,
}

impl RowsView<'_> {
    /// Number of rows in the view
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Raw bytes of the viewed rows
    pub fn bytes(&self) -> &[u8] {
        &self.mmap[self.offset..self.offset + self.rows * self.row_bytes]
    }

    /// Typed view of the underlying elements.
    ///
    /// Fails with `DtypeMismatch` if `T` does not match the array's dtype.
    pub fn as_slice<T: arraypool_core::Element>(&self) -> Result<&[T]> {
        if T::DTYPE != self.dtype {
            return Err(Error::DtypeMismatch {
                expected: self.dtype,
                actual: T::DTYPE,
            });
        }
        let bytes = self.bytes();
        // SAFETY: the data region starts on a 64-byte boundary and row
        // offsets are multiples of the itemsize, so the pointer is aligned
        // for T; the byte length is an exact multiple of size_of::<T>().
        let slice = unsafe {
            std::slice::from_raw_parts(
                bytes.as_ptr() as *const T,
                bytes.len() / self.dtype.itemsize(),
            )
        };
        Ok(slice)
    }

    /// Copy the viewed rows into an owned array
    pub fn to_array(&self) -> ArrayBuf {
        let mut shape = Vec::with_capacity(1 + self.trailing_shape.len());
        shape.push(self.rows);
        shape.extend_from_slice(&self.trailing_shape);
        ArrayBuf::from_raw(self.dtype, shape, self.bytes().to_vec())
            .expect("view bounds match its shape")
    }
}

/// Writable memory-mapped view over a row range of an [`NpyArray`]
pub struct RowsViewMut<'a> {
    mmap: MmapMut,
    offset: usize,
    rows: usize,
    row_bytes: usize,
    dtype: Dtype,
    trailing_shape: Vec<usize>,
    _owner: PhantomData<&'a mut NpyArray>,
}

impl RowsViewMut<'_> {
    /// Number of rows in the view
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Raw bytes of the viewed rows
    pub fn bytes(&self) -> &[u8] {
        &self.mmap[self.offset..self.offset + self.rows * self.row_bytes]
    }

    /// Mutable raw bytes of the viewed rows
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap[self.offset..self.offset + self.rows * self.row_bytes]
    }

    /// Overwrite the viewed rows from an owned array.
    ///
    /// The array must match the view's dtype, row count, and trailing shape.
    pub fn copy_from(&mut self, values: &ArrayBuf) -> Result<()> {
        if values.dtype() != self.dtype {
            return Err(Error::DtypeMismatch {
                expected: self.dtype,
                actual: values.dtype(),
            });
        }
        if values.len() != self.rows || values.trailing_shape() != self.trailing_shape.as_slice()
        {
            let mut expected = vec![self.rows];
            expected.extend_from_slice(&self.trailing_shape);
            return Err(Error::ShapeMismatch {
                expected,
                actual: values.shape().to_vec(),
            });
        }
        self.bytes_mut().copy_from_slice(values.as_bytes());
        Ok(())
    }

    /// Copy the viewed rows into an owned array
    pub fn to_array(&self) -> ArrayBuf {
        let mut shape = Vec::with_capacity(1 + self.trailing_shape.len());
        shape.push(self.rows);
        shape.extend_from_slice(&self.trailing_shape);
        ArrayBuf::from_raw(self.dtype, shape, self.bytes().to_vec())
            .expect("view bounds match its shape")
    }
}

//! Element dtype descriptors.
//!
//! Every persisted array stores elements of one fixed-width numeric dtype.
//! On disk the dtype is identified by its descriptor string (`'<i4'`,
//! `'|u1'`, ...): a byte-order character followed by a kind character and
//! the item size in bytes. Only little-endian and single-byte layouts are
//! supported; big-endian descriptors are rejected at parse time.

use crate::error::{Error, Result};
use std::fmt;

/// Fixed-width element dtype of a stored array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    /// Boolean, one byte per element (`|b1`)
    Bool,
    /// Signed 8-bit integer (`|i1`)
    Int8,
    /// Signed 16-bit integer (`<i2`)
    Int16,
    /// Signed 32-bit integer (`<i4`)
    Int32,
    /// Signed 64-bit integer (`<i8`)
    Int64,
    /// Unsigned 8-bit integer (`|u1`)
    UInt8,
    /// Unsigned 16-bit integer (`<u2`)
    UInt16,
    /// Unsigned 32-bit integer (`<u4`)
    UInt32,
    /// Unsigned 64-bit integer (`<u8`)
    UInt64,
    /// 32-bit IEEE float (`<f4`)
    Float32,
    /// 64-bit IEEE float (`<f8`)
    Float64,
}

impl Dtype {
    /// Size of one element in bytes
    pub const fn itemsize(&self) -> usize {
        match self {
            Dtype::Bool | Dtype::Int8 | Dtype::UInt8 => 1,
            Dtype::Int16 | Dtype::UInt16 => 2,
            Dtype::Int32 | Dtype::UInt32 | Dtype::Float32 => 4,
            Dtype::Int64 | Dtype::UInt64 | Dtype::Float64 => 8,
        }
    }

    /// Descriptor string written to the file header
    pub const fn descr(&self) -> &'static str {
        match self {
            Dtype::Bool => "|b1",
            Dtype::Int8 => "|i1",
            Dtype::Int16 => "<i2",
            Dtype::Int32 => "<i4",
            Dtype::Int64 => "<i8",
            Dtype::UInt8 => "|u1",
            Dtype::UInt16 => "<u2",
            Dtype::UInt32 => "<u4",
            Dtype::UInt64 => "<u8",
            Dtype::Float32 => "<f4",
            Dtype::Float64 => "<f8",
        }
    }

    /// Parse a descriptor string from a file header.
    ///
    /// Accepts `<` (little-endian), `|` (not applicable) and `=` (native,
    /// assumed little-endian) byte-order characters. Big-endian data is not
    /// supported.
    pub fn parse_descr(descr: &str) -> Result<Self> {
        let body = match descr.as_bytes().first() {
            Some(b'<') | Some(b'|') | Some(b'=') => &descr[1..],
            Some(b'>') => {
                return Err(Error::Format(format!(
                    "big-endian dtype '{}' is not supported",
                    descr
                )))
            }
            _ => descr,
        };
        match body {
            "b1" => Ok(Dtype::Bool),
            "i1" => Ok(Dtype::Int8),
            "i2" => Ok(Dtype::Int16),
            "i4" => Ok(Dtype::Int32),
            "i8" => Ok(Dtype::Int64),
            "u1" => Ok(Dtype::UInt8),
            "u2" => Ok(Dtype::UInt16),
            "u4" => Ok(Dtype::UInt32),
            "u8" => Ok(Dtype::UInt64),
            "f4" => Ok(Dtype::Float32),
            "f8" => Ok(Dtype::Float64),
            _ => Err(Error::Format(format!("unsupported dtype '{}'", descr))),
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descr())
    }
}

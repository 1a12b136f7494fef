//! Header encode/decode for the `.npy` v2.0 format.
//!
//! The variable region of the header is a Python-dict-shaped ASCII literal.
//! Encoding always produces exactly the reserved number of bytes so the
//! header can be rewritten in place; decoding accepts any conforming file
//! that is row-major and version 2.0.

use arraypool_core::{Dtype, Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

/// Magic bytes identifying a `.npy` file
pub const MAGIC: [u8; 6] = [0x93, b'N', b'U', b'M', b'P', b'Y'];
/// Supported major format version
pub const VERSION_MAJOR: u8 = 2;
/// Supported minor format version
pub const VERSION_MINOR: u8 = 0;
/// Fixed prefix size: magic(6) + version(2) + header_len(4)
pub const PREFIX_SIZE: usize = 12;
/// The data region starts on a multiple of this, keeping mapped views
/// aligned for every supported dtype
pub const HEADER_ALIGN: usize = 64;
/// Default digit budget for the leading dimension: the decimal width of
/// 2^64, the same ceiling the format's reference implementation reserves
pub const DEFAULT_DIGIT_BUDGET: usize = 20;

/// Fill byte used to pad the header up to its reserved length
const FILL: u8 = b' ';

/// Parsed header fields of a persisted array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    /// Element dtype
    pub dtype: Dtype,
    /// Fixed shape of one row (dimensions after the first)
    pub trailing_shape: Vec<usize>,
    /// Current length of the leading dimension
    pub leading_len: usize,
}

impl NpyHeader {
    /// Bytes occupied by one row of the array
    pub fn row_bytes(&self) -> usize {
        self.trailing_shape.iter().product::<usize>() * self.dtype.itemsize()
    }

    /// Full shape, leading dimension first
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = Vec::with_capacity(1 + self.trailing_shape.len());
        shape.push(self.leading_len);
        shape.extend_from_slice(&self.trailing_shape);
        shape
    }
}

fn shape_literal(leading: &str, trailing: &[usize]) -> String {
    if trailing.is_empty() {
        format!("({},)", leading)
    } else {
        let rest: Vec<String> = trailing.iter().map(|d| d.to_string()).collect();
        format!("({}, {})", leading, rest.join(", "))
    }
}

fn dict_literal(dtype: Dtype, trailing: &[usize], leading: &str) -> String {
    format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        dtype.descr(),
        shape_literal(leading, trailing)
    )
}

/// Compute the reserved variable-region length for a header whose leading
/// dimension may grow up to `digit_budget` decimal digits.
///
/// The reservation pads so that `PREFIX_SIZE + reserved` is a multiple of
/// [`HEADER_ALIGN`].
pub fn reserved_len(dtype: Dtype, trailing: &[usize], digit_budget: usize) -> usize {
    let placeholder = "9".repeat(digit_budget.max(1));
    let literal = dict_literal(dtype, trailing, &placeholder);
    let total = PREFIX_SIZE + literal.len() + 1; // trailing newline
    let padded = (total + HEADER_ALIGN - 1) / HEADER_ALIGN * HEADER_ALIGN;
    padded - PREFIX_SIZE
}

/// Encode the fixed 12-byte prefix for the given reserved header length
pub fn encode_prefix(reserved: usize) -> Result<Vec<u8>> {
    let len = u32::try_from(reserved)
        .map_err(|_| Error::Format(format!("header length {} exceeds u32", reserved)))?;
    let mut out = Vec::with_capacity(PREFIX_SIZE);
    out.extend_from_slice(&MAGIC);
    out.push(VERSION_MAJOR);
    out.push(VERSION_MINOR);
    out.write_u32::<LittleEndian>(len)?;
    Ok(out)
}

/// Encode the variable header region, padded to exactly `reserved` bytes.
///
/// Fails with `HeaderOverflow` if the serialized dict no longer fits, which
/// can only happen once the leading length outgrows the digit budget the
/// reservation was computed for.
pub fn encode(header: &NpyHeader, reserved: usize) -> Result<Vec<u8>> {
    let literal = dict_literal(
        header.dtype,
        &header.trailing_shape,
        &header.leading_len.to_string(),
    );
    let needed = literal.len() + 1;
    if needed > reserved {
        return Err(Error::HeaderOverflow { needed, reserved });
    }
    let mut out = Vec::with_capacity(reserved);
    out.extend_from_slice(literal.as_bytes());
    out.resize(reserved - 1, FILL);
    out.push(b'\n');
    Ok(out)
}

/// Decode a header from the start of a file.
///
/// Returns the parsed header and the reserved variable-region length (the
/// data region starts at `PREFIX_SIZE + reserved`).
pub fn decode<R: Read>(reader: &mut R) -> Result<(NpyHeader, usize)> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(Error::Format("missing npy magic bytes".to_string()));
    }
    let major = reader.read_u8()?;
    let minor = reader.read_u8()?;
    if (major, minor) != (VERSION_MAJOR, VERSION_MINOR) {
        return Err(Error::Format(format!(
            "unsupported npy version {}.{}, only {}.{} is supported",
            major, minor, VERSION_MAJOR, VERSION_MINOR
        )));
    }
    let reserved = reader.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; reserved];
    reader.read_exact(&mut buf)?;
    let text = std::str::from_utf8(&buf)
        .map_err(|_| Error::Format("header is not valid ASCII".to_string()))?;

    let descr = str_field(text, "'descr'")?;
    let fortran = bool_field(text, "'fortran_order'")?;
    if fortran {
        return Err(Error::Format(
            "column-major (Fortran-order) files are not supported".to_string(),
        ));
    }
    let shape = tuple_field(text, "'shape'")?;
    if shape.is_empty() {
        return Err(Error::Format(
            "scalar (zero-dimensional) arrays are not supported".to_string(),
        ));
    }

    let header = NpyHeader {
        dtype: Dtype::parse_descr(&descr)?,
        leading_len: shape[0],
        trailing_shape: shape[1..].to_vec(),
    };
    Ok((header, reserved))
}

fn field_value<'a>(text: &'a str, key: &str) -> Result<&'a str> {
    let pos = text
        .find(key)
        .ok_or_else(|| Error::Format(format!("header field {} is missing", key)))?;
    let rest = &text[pos + key.len()..];
    let colon = rest
        .find(':')
        .ok_or_else(|| Error::Format(format!("header field {} has no value", key)))?;
    Ok(rest[colon + 1..].trim_start())
}

fn str_field(text: &str, key: &str) -> Result<String> {
    let value = field_value(text, key)?;
    let inner = value
        .strip_prefix('\'')
        .and_then(|v| v.split('\'').next())
        .ok_or_else(|| Error::Format(format!("header field {} is not a string", key)))?;
    Ok(inner.to_string())
}

fn bool_field(text: &str, key: &str) -> Result<bool> {
    let value = field_value(text, key)?;
    if value.starts_with("True") {
        Ok(true)
    } else if value.starts_with("False") {
        Ok(false)
    } else {
        Err(Error::Format(format!(
            "header field {} is not a boolean",
            key
        )))
    }
}

fn tuple_field(text: &str, key: &str) -> Result<Vec<usize>> {
    let value = field_value(text, key)?;
    let open = value
        .strip_prefix('(')
        .ok_or_else(|| Error::Format(format!("header field {} is not a tuple", key)))?;
    let inner = open
        .split(')')
        .next()
        .ok_or_else(|| Error::Format(format!("header field {} is not a tuple", key)))?;
    let mut dims = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let dim: usize = part
            .parse()
            .map_err(|_| Error::Format(format!("invalid dimension '{}' in shape", part)))?;
        dims.push(dim);
    }
    Ok(dims)
}

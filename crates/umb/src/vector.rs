//! Fixed-width binary vector codec.
//!
//! Every element is stored in exactly [`ELEMENT_WIDTH`] bytes with an
//! explicit byte order, so that the arrays of an archive can be consumed by
//! readers that know nothing about the JSON index.
//!
//! ## Binary Layout
//!
//! ```text
//! Offset  Size    Field
//! ------  ----    -----
//! 0x00    8       element[0] (u64 or f64, byte order per codec parameter)
//! 0x08    8       element[1]
//! ...
//! 8*(N-1) 8       element[N-1]
//! ```
//!
//! There is no header: the element count is `byte_length / 8`.

use crate::error::{Result, UmbError};

/// Width of every encoded element in bytes.
pub const ELEMENT_WIDTH: usize = 8;

/// Element type of an encoded vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// Unsigned 64-bit integer.
    UInt64,
    /// IEEE 754 double precision float.
    Float64,
}

/// Byte order of an encoded vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    #[default]
    Big,
}

/// A dynamically typed scalar, as produced by untyped data sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Unsigned integer.
    UInt(u64),
    /// Signed integer.
    Int(i64),
    /// Floating point value.
    Float(f64),
}

/// A scalar type that can be stored in a vector.
pub trait Element: Copy {
    /// Element type tag written for this scalar.
    const TYPE: ElementType;

    /// Serializes the value in the given byte order.
    fn to_bytes(self, order: ByteOrder) -> [u8; ELEMENT_WIDTH];

    /// Deserializes a value in the given byte order.
    fn from_bytes(bytes: [u8; ELEMENT_WIDTH], order: ByteOrder) -> Self;
}

impl Element for u64 {
    const TYPE: ElementType = ElementType::UInt64;

    fn to_bytes(self, order: ByteOrder) -> [u8; ELEMENT_WIDTH] {
        match order {
            ByteOrder::Little => self.to_le_bytes(),
            ByteOrder::Big => self.to_be_bytes(),
        }
    }

    fn from_bytes(bytes: [u8; ELEMENT_WIDTH], order: ByteOrder) -> Self {
        match order {
            ByteOrder::Little => u64::from_le_bytes(bytes),
            ByteOrder::Big => u64::from_be_bytes(bytes),
        }
    }
}

impl Element for f64 {
    const TYPE: ElementType = ElementType::Float64;

    fn to_bytes(self, order: ByteOrder) -> [u8; ELEMENT_WIDTH] {
        match order {
            ByteOrder::Little => self.to_le_bytes(),
            ByteOrder::Big => self.to_be_bytes(),
        }
    }

    fn from_bytes(bytes: [u8; ELEMENT_WIDTH], order: ByteOrder) -> Self {
        match order {
            ByteOrder::Little => f64::from_le_bytes(bytes),
            ByteOrder::Big => f64::from_be_bytes(bytes),
        }
    }
}

/// Encodes a typed slice.
///
/// # Errors
///
/// Returns `UmbError::Encode` if `values` is empty.
pub fn encode_slice<T: Element>(values: &[T], order: ByteOrder) -> Result<Vec<u8>> {
    if values.is_empty() {
        return Err(UmbError::Encode(format!(
            "cannot encode an empty {:?} vector",
            T::TYPE
        )));
    }

    let mut buf = Vec::with_capacity(values.len() * ELEMENT_WIDTH);
    for value in values {
        buf.extend_from_slice(&value.to_bytes(order));
    }
    Ok(buf)
}

/// Decodes a byte buffer into a typed vector.
///
/// # Errors
///
/// Returns `UmbError::Decode` if the buffer length is not a multiple of
/// [`ELEMENT_WIDTH`].
pub fn decode_slice<T: Element>(bytes: &[u8], order: ByteOrder) -> Result<Vec<T>> {
    check_length(bytes)?;
    Ok(bytes
        .chunks_exact(ELEMENT_WIDTH)
        .map(|chunk| {
            let mut word = [0u8; ELEMENT_WIDTH];
            word.copy_from_slice(chunk);
            T::from_bytes(word, order)
        })
        .collect())
}

/// Encodes dynamically typed values as `element_type`.
///
/// # Errors
///
/// Returns `UmbError::Encode` if `values` is empty or if any value cannot be
/// represented by `element_type` (negative or fractional values under
/// `UInt64`, integers under `Float64`).
pub fn encode(values: &[Number], element_type: ElementType, order: ByteOrder) -> Result<Vec<u8>> {
    match element_type {
        ElementType::UInt64 => {
            let typed = values
                .iter()
                .enumerate()
                .map(|(i, value)| match *value {
                    Number::UInt(v) => Ok(v),
                    Number::Int(v) => u64::try_from(v).map_err(|_| {
                        UmbError::Encode(format!("element {i} ({v}) is not an unsigned integer"))
                    }),
                    Number::Float(v) => Err(UmbError::Encode(format!(
                        "element {i} ({v}) is a float in an UInt64 vector"
                    ))),
                })
                .collect::<Result<Vec<u64>>>()?;
            encode_slice(&typed, order)
        }
        ElementType::Float64 => {
            let typed = values
                .iter()
                .enumerate()
                .map(|(i, value)| match *value {
                    Number::Float(v) => Ok(v),
                    Number::UInt(_) | Number::Int(_) => Err(UmbError::Encode(format!(
                        "element {i} ({value:?}) is an integer in a Float64 vector"
                    ))),
                })
                .collect::<Result<Vec<f64>>>()?;
            encode_slice(&typed, order)
        }
    }
}

/// Decodes a byte buffer into dynamically typed values.
///
/// # Errors
///
/// Returns `UmbError::Decode` if the buffer length is not a multiple of
/// [`ELEMENT_WIDTH`].
pub fn decode(bytes: &[u8], element_type: ElementType, order: ByteOrder) -> Result<Vec<Number>> {
    Ok(match element_type {
        ElementType::UInt64 => decode_slice::<u64>(bytes, order)?
            .into_iter()
            .map(Number::UInt)
            .collect(),
        ElementType::Float64 => decode_slice::<f64>(bytes, order)?
            .into_iter()
            .map(Number::Float)
            .collect(),
    })
}

fn check_length(bytes: &[u8]) -> Result<()> {
    if bytes.len() % ELEMENT_WIDTH != 0 {
        return Err(UmbError::Decode(format!(
            "byte length {} is not a multiple of {}",
            bytes.len(),
            ELEMENT_WIDTH
        )));
    }
    Ok(())
}

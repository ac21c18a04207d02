//! Endian-aware fixed-width reads and writes.
//!
//! The tagged-field format stores `fixed32`/`fixed64` scalars little-endian,
//! while the transport framing (payload length header) and the encrypted
//! envelope (magic, key hash) use big-endian integers. Both go through the
//! [`WireIO`] trait so every read is bounds-checked in one place.
//!
//! # Examples
//!
//! ```rust,ignore
//! use wirescope::wire::io::{read_le_at, put_be};
//!
//! let data = [0x01, 0x00, 0x00, 0x00];
//! let mut offset = 0;
//! let value: u32 = read_le_at(&data, &mut offset)?;
//! assert_eq!(value, 1);
//!
//! let mut out = Vec::new();
//! put_be(&mut out, 0x0011_4514_u32);
//! assert_eq!(out, [0x00, 0x11, 0x45, 0x14]);
//! # Ok::<(), wirescope::Error>(())
//! ```

use crate::Result;

/// Fixed-width integer types that can be read from and written to wire buffers.
pub trait WireIO: Sized + Copy {
    /// Byte array representation of the type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Build the value from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Build the value from big-endian bytes
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
    /// Little-endian byte representation
    fn to_le_bytes(self) -> Self::Bytes;
    /// Big-endian byte representation
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_wire_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl WireIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_wire_io!(u8 => 1, u32 => 4, i32 => 4, u64 => 8, i64 => 8);

fn take<T: WireIO>(data: &[u8], offset: &mut usize) -> Result<T::Bytes> {
    let type_len = std::mem::size_of::<T>();
    let end = offset
        .checked_add(type_len)
        .ok_or_else(|| out_of_bounds_error!())?;
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = <T::Bytes as TryFrom<&[u8]>>::try_from(&data[*offset..end]) else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(read)
}

/// Read a little-endian value at `offset`, advancing it past the value.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value extends past the buffer.
pub fn read_le_at<T: WireIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    take::<T>(data, offset).map(T::from_le_bytes)
}

/// Read a big-endian value at `offset`, advancing it past the value.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value extends past the buffer.
pub fn read_be_at<T: WireIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    take::<T>(data, offset).map(T::from_be_bytes)
}

/// Read a big-endian value from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
pub fn read_be<T: WireIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Append the little-endian representation of `value` to `out`.
pub fn put_le<T: WireIO>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Append the big-endian representation of `value` to `out`.
pub fn put_be<T: WireIO>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_be_bytes().as_ref());
}

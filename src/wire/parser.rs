//! Cursor over a tagged-field byte stream.
//!
//! [`Parser`] keeps a position inside a borrowed buffer and exposes the handful of
//! primitive reads the wire format is made of: base-128 varints, field keys,
//! length-prefixed byte runs and little-endian fixed-width values. Every read is
//! bounds-checked; a read that would run past the end of the buffer fails with
//! [`crate::Error::OutOfBounds`] and leaves the cursor where it was.
//!
//! # Examples
//!
//! ```rust,ignore
//! use wirescope::wire::parser::Parser;
//!
//! // field 1 (varint) = 150
//! let data = [0x08, 0x96, 0x01];
//! let mut parser = Parser::new(&data);
//! let key = parser.read_key()?;
//! assert_eq!(key.number, 1);
//! assert_eq!(parser.read_varint()?, 150);
//! assert!(!parser.has_more_data());
//! # Ok::<(), wirescope::Error>(())
//! ```

use crate::{
    wire::{
        io::{read_le_at, WireIO},
        types::FieldKey,
    },
    Result,
};

/// Longest valid varint: ten 7-bit groups cover 64 bits.
pub const MAX_VARINT_LEN: usize = 10;

/// Bounds-checked reader over a tagged-field byte stream.
pub struct Parser<'a> {
    /// The bytes being parsed
    data: &'a [u8],
    /// Current offset into `data`
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns `true` while unread bytes remain.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Current offset into the buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Read a base-128 varint.
    ///
    /// Bits beyond the 64th are discarded, matching the reference decoders; a varint
    /// that is still continuing after [`MAX_VARINT_LEN`] bytes is malformed.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the buffer ends mid-varint and
    /// [`crate::Error::Malformed`] if the varint is too long.
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0_u64;
        let mut offset = self.position;

        for index in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.data.get(offset) else {
                return Err(out_of_bounds_error!());
            };
            offset += 1;

            value |= u64::from(byte & 0x7F) << (7 * index);
            if byte & 0x80 == 0 {
                self.position = offset;
                return Ok(value);
            }
        }

        Err(malformed_error!(
            "Varint at offset {} exceeds {} bytes",
            self.position,
            MAX_VARINT_LEN
        ))
    }

    /// Read and split a field key.
    ///
    /// # Errors
    /// Propagates varint errors, plus [`crate::Error::Malformed`] for field number 0
    /// or an unknown wire type.
    pub fn read_key(&mut self) -> Result<FieldKey> {
        let start = self.position;
        match self.read_varint().and_then(FieldKey::from_raw) {
            Ok(key) => Ok(key),
            Err(error) => {
                self.position = start;
                Err(error)
            }
        }
    }

    /// Borrow the next `len` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(out_of_bounds_error!());
        }

        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Read a varint length prefix followed by that many bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] when the declared length exceeds the
    /// remaining buffer.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8]> {
        let start = self.position;
        let declared = self.read_varint()?;
        let Ok(len) = usize::try_from(declared) else {
            self.position = start;
            return Err(out_of_bounds_error!());
        };

        match self.read_bytes(len) {
            Ok(bytes) => Ok(bytes),
            Err(error) => {
                self.position = start;
                Err(error)
            }
        }
    }

    /// Read a little-endian fixed-width value.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value extends past the buffer.
    pub fn read_le<T: WireIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }
}

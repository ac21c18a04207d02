use strum::{Display, EnumCount, EnumIter};

use crate::Result;

/// Wire type of a tagged field, stored in the low three bits of the field key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter)]
pub enum WireType {
    /// Base-128 varint (`int32`, `int64`, `uint*`, `bool`, enums)
    Varint,
    /// Little-endian 8 byte value (`fixed64`, `sfixed64`, `double`)
    Fixed64,
    /// Varint length followed by that many bytes (strings, bytes, nested messages)
    LengthDelimited,
    /// Little-endian 4 byte value (`fixed32`, `sfixed32`, `float`)
    Fixed32,
}

impl WireType {
    /// Map the low three bits of a field key to a wire type.
    ///
    /// ## Arguments
    /// * 'bits' - The wire type bits (`key & 0x7`)
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for group markers (3, 4) and the reserved values 6, 7.
    pub fn from_bits(bits: u64) -> Result<Self> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(malformed_error!("Unknown wire type - {}", other)),
        }
    }

    /// The three-bit value written into a field key.
    #[must_use]
    pub fn bits(self) -> u64 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::LengthDelimited => 2,
            WireType::Fixed32 => 5,
        }
    }
}

/// A decoded field key: field number plus wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldKey {
    /// Field number, always non-zero on a well-formed stream
    pub number: u64,
    /// Wire type of the value that follows
    pub wire_type: WireType,
}

impl FieldKey {
    /// Split a raw key varint into field number and wire type.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for field number 0 or an unknown wire type.
    pub fn from_raw(raw: u64) -> Result<Self> {
        let wire_type = WireType::from_bits(raw & 0x7)?;
        let number = raw >> 3;
        if number == 0 {
            return Err(malformed_error!("Field number 0 is not allowed"));
        }

        Ok(FieldKey { number, wire_type })
    }

    /// The raw key varint for this field.
    #[must_use]
    pub fn to_raw(self) -> u64 {
        (self.number << 3) | self.wire_type.bits()
    }
}

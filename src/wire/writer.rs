use crate::wire::{
    io::{put_le, WireIO},
    types::FieldKey,
};

/// Growable output buffer for tagged-field messages.
#[derive(Debug, Default)]
pub struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Writer { buffer: Vec::new() }
    }

    /// Append a base-128 varint in canonical (shortest) form.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buffer.push((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.buffer.push(value as u8);
    }

    /// Append a field key.
    pub fn write_key(&mut self, key: FieldKey) {
        self.write_varint(key.to_raw());
    }

    /// Append a varint length prefix followed by `data`.
    pub fn write_length_delimited(&mut self, data: &[u8]) {
        self.write_varint(data.len() as u64);
        self.buffer.extend_from_slice(data);
    }

    /// Append a little-endian fixed-width value.
    pub fn write_le<T: WireIO>(&mut self, value: T) {
        put_le(&mut self.buffer, value);
    }

    /// The bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return its buffer.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireType;

    #[test]
    fn canonical_varints() {
        let mut writer = Writer::new();
        writer.write_varint(0);
        writer.write_varint(150);
        writer.write_varint(u64::MAX);
        assert_eq!(
            writer.into_inner(),
            [0x00, 0x96, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
        );
    }

    #[test]
    fn key_and_payload() {
        let mut writer = Writer::new();
        writer.write_key(FieldKey {
            number: 25,
            wire_type: WireType::LengthDelimited,
        });
        writer.write_length_delimited(b"ab");
        assert_eq!(writer.as_slice(), [0xCA, 0x01, 0x02, b'a', b'b']);
    }
}

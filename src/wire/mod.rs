//! Tagged-field wire format codec.
//!
//! The host's protocol messages use a compact field-number keyed binary encoding.
//! Each field starts with a varint key `(number << 3) | wire_type` followed by a value
//! whose shape depends on the wire type:
//!
//! | Wire type | Value |
//! |-----------|-------|
//! | 0 varint | base-128 varint |
//! | 1 fixed64 | 8 bytes little-endian |
//! | 2 length-delimited | varint length, then that many bytes |
//! | 5 fixed32 | 4 bytes little-endian |
//!
//! Decoding produces a [`TreeValue::Mapping`] keyed by field numbers. Without a schema a
//! length-delimited payload is ambiguous, so it is classified: printable UTF-8 becomes a
//! string, a payload that parses completely as a message becomes a nested mapping, and
//! anything else stays raw bytes. Encoding reverses this; tagged integers keep their wire
//! type and untagged values infer theirs from their kind.
//!
//! # Examples
//!
//! ```rust
//! use wirescope::wire;
//!
//! // field 1 = 150, field 2 = "hi"
//! let bytes = [0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i'];
//! let tree = wire::decode(&bytes)?;
//! assert_eq!(tree.at("1").and_then(|v| v.as_i64()), Some(150));
//! assert_eq!(tree.at("2").and_then(|v| v.as_str()), Some("hi"));
//! assert_eq!(wire::encode(&tree)?, bytes);
//! # Ok::<(), wirescope::Error>(())
//! ```

pub mod io;
pub mod parser;
mod types;
mod writer;

pub use parser::Parser;
pub use types::{FieldKey, WireType};
pub use writer::Writer;

use crate::{
    config::DecodeConfig,
    tree::{Mapping, Scalar, TreeValue},
    Result,
};

/// Nesting bound for encoding, above anything a decoded or template tree reaches.
const MAX_ENCODE_DEPTH: usize = 128;

/// Decode a wire message with the default [`DecodeConfig`].
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] for truncated input (including a
/// length-delimited field declaring more bytes than remain) and
/// [`crate::Error::Malformed`] for unknown wire types, field number 0 or overlong varints.
pub fn decode(data: &[u8]) -> Result<TreeValue> {
    decode_with(data, &DecodeConfig::default())
}

/// Decode a wire message with explicit limits.
///
/// # Errors
/// See [`decode`].
pub fn decode_with(data: &[u8], config: &DecodeConfig) -> Result<TreeValue> {
    Decoder::new(config).message(data, 0).map(TreeValue::Mapping)
}

/// Encode a tree back into wire bytes.
///
/// The root must be a mapping whose keys are decimal field numbers.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for a non-mapping root, a key that is not a
/// non-zero field number, or a sequence nested directly in a sequence, and
/// [`crate::Error::RecursionLimit`] for trees nested deeper than the encoder allows.
pub fn encode(tree: &TreeValue) -> Result<Vec<u8>> {
    let TreeValue::Mapping(mapping) = tree else {
        return Err(malformed_error!(
            "Message root must be a mapping, got {}",
            tree.kind_name()
        ));
    };

    let mut writer = Writer::new();
    encode_mapping(&mut writer, mapping, 0)?;
    Ok(writer.into_inner())
}

/// Strip the 4-byte big-endian length header some transports put in front of a payload.
///
/// A message never starts with a zero byte (field number 0 is invalid), so a leading
/// zero marks the header. Anything shorter than the header is returned unchanged.
#[must_use]
pub fn unpack_payload(data: &[u8]) -> &[u8] {
    if data.len() < 4 || data[0] != 0 {
        return data;
    }

    if let Ok(declared) = io::read_be::<u32>(data) {
        if declared as usize != data.len() && declared as usize != data.len() - 4 {
            log::trace!(
                "[wire] length header {} disagrees with payload size {}",
                declared,
                data.len()
            );
        }
    }
    &data[4..]
}

/// Returns `true` for payloads that read as human text: valid UTF-8 without control
/// characters other than tab, line feed and carriage return.
#[must_use]
pub fn is_printable_text(data: &[u8]) -> bool {
    match std::str::from_utf8(data) {
        Ok(text) => text
            .chars()
            .all(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r')),
        Err(_) => false,
    }
}

struct Decoder<'c> {
    config: &'c DecodeConfig,
}

impl<'c> Decoder<'c> {
    fn new(config: &'c DecodeConfig) -> Self {
        Decoder { config }
    }

    fn message(&self, data: &[u8], depth: usize) -> Result<Mapping> {
        let mut parser = Parser::new(data);
        let mut mapping = Mapping::new();

        while parser.has_more_data() {
            let key = parser.read_key()?;
            let value = match key.wire_type {
                WireType::Varint => TreeValue::Scalar(Scalar::Varint(parser.read_varint()?)),
                WireType::Fixed64 => TreeValue::Scalar(Scalar::Fixed64(parser.read_le::<u64>()?)),
                WireType::Fixed32 => TreeValue::Scalar(Scalar::Fixed32(parser.read_le::<u32>()?)),
                WireType::LengthDelimited => {
                    let payload = parser.read_length_delimited()?;
                    self.classify(payload, depth)
                }
            };

            mapping.push_repeated(key.number.to_string(), value);
        }

        Ok(mapping)
    }

    fn classify(&self, payload: &[u8], depth: usize) -> TreeValue {
        if is_printable_text(payload) {
            return TreeValue::Scalar(Scalar::String(
                String::from_utf8_lossy(payload).into_owned(),
            ));
        }

        if depth + 1 < self.config.max_depth {
            if let Ok(nested) = self.message(payload, depth + 1) {
                if !nested.is_empty() {
                    return TreeValue::Mapping(nested);
                }
            }
        }

        TreeValue::Scalar(Scalar::Bytes(payload.to_vec()))
    }
}

fn field_number(key: &str) -> Result<u64> {
    match key.parse::<u64>() {
        Ok(0) | Err(_) => Err(malformed_error!("'{}' is not a valid field number", key)),
        Ok(number) if number > (u64::MAX >> 3) => {
            Err(malformed_error!("Field number {} does not fit a key", number))
        }
        Ok(number) => Ok(number),
    }
}

fn encode_mapping(writer: &mut Writer, mapping: &Mapping, depth: usize) -> Result<()> {
    if depth > MAX_ENCODE_DEPTH {
        return Err(crate::Error::RecursionLimit(MAX_ENCODE_DEPTH));
    }

    for (key, value) in mapping.iter() {
        let number = field_number(key)?;
        match value {
            TreeValue::Sequence(items) => {
                for item in items {
                    if matches!(item, TreeValue::Sequence(_)) {
                        return Err(malformed_error!(
                            "Field {} holds a sequence inside a sequence",
                            number
                        ));
                    }
                    encode_field(writer, number, item, depth)?;
                }
            }
            other => encode_field(writer, number, other, depth)?,
        }
    }

    Ok(())
}

#[allow(clippy::cast_sign_loss)]
fn encode_field(writer: &mut Writer, number: u64, value: &TreeValue, depth: usize) -> Result<()> {
    match value {
        TreeValue::Scalar(scalar) => {
            writer.write_key(FieldKey {
                number,
                wire_type: scalar.wire_type(),
            });
            match scalar {
                Scalar::String(text) => writer.write_length_delimited(text.as_bytes()),
                Scalar::Bytes(bytes) => writer.write_length_delimited(bytes),
                Scalar::Integer(value) => writer.write_varint(*value as u64),
                Scalar::Boolean(value) => writer.write_varint(u64::from(*value)),
                Scalar::Varint(value) => writer.write_varint(*value),
                Scalar::Fixed32(value) => writer.write_le(*value),
                Scalar::Fixed64(value) => writer.write_le(*value),
            }
        }
        TreeValue::Mapping(nested) => {
            let mut inner = Writer::new();
            encode_mapping(&mut inner, nested, depth + 1)?;
            writer.write_key(FieldKey {
                number,
                wire_type: WireType::LengthDelimited,
            });
            writer.write_length_delimited(inner.as_slice());
        }
        TreeValue::Sequence(_) => {
            return Err(malformed_error!(
                "Field {} holds a sequence inside a sequence",
                number
            ));
        }
    }

    Ok(())
}

//! Conversion between [`TreeValue`] and `serde_json` values.
//!
//! Packet templates are written as JSON and decoded trees are shown to users as JSON,
//! so both directions go through here. Bytes have no JSON form of their own; they are
//! carried as strings with the [`HEX_PREFIX`] marker followed by lowercase hex.
//!
//! Numbers map as follows when reading JSON:
//!
//! - integers that fit `i64` become untagged [`Scalar::Integer`]
//! - larger unsigned integers become [`Scalar::Varint`]
//! - floating point numbers become [`Scalar::Fixed64`] holding the IEEE-754 bits
//!
//! `null` has no wire representation; mapping entries holding it are dropped and a
//! `null` anywhere else is an error.

use serde_json::{Map, Number, Value};

use crate::{
    tree::{Mapping, Scalar, TreeValue},
    Error, Result,
};

/// Marker for hex-encoded bytes inside string scalars.
pub const HEX_PREFIX: &str = "hex->";

/// Nesting bound for conversions in either direction.
const MAX_JSON_DEPTH: usize = 256;

/// Convert a tree into a JSON value.
///
/// # Errors
/// Returns [`Error::RecursionLimit`] if the tree is nested deeper than the bridge allows.
pub fn to_json(tree: &TreeValue) -> Result<Value> {
    tree_to_value(tree, 0)
}

/// Convert a JSON value into a tree.
///
/// # Errors
/// Returns [`Error::Hex`] for a `hex->` string with invalid hex, [`Error::Malformed`]
/// for `null` outside a mapping and [`Error::RecursionLimit`] for excessive nesting.
pub fn from_json(value: &Value) -> Result<TreeValue> {
    value_to_tree(value, 0)
}

/// Parse JSON text into a tree.
///
/// # Errors
/// Returns [`Error::Json`] for invalid JSON, otherwise as [`from_json`].
pub fn parse(text: &str) -> Result<TreeValue> {
    let value: Value = serde_json::from_str(text)?;
    from_json(&value)
}

/// Render a tree as pretty-printed JSON text.
///
/// # Errors
/// As [`to_json`].
pub fn to_string_pretty(tree: &TreeValue) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_json(tree)?)?)
}

/// Decode a `hex->` string into bytes; `None` if the prefix is missing.
///
/// # Errors
/// Returns [`Error::Hex`] if the remainder is not valid hex.
pub fn decode_hex_scalar(text: &str) -> Result<Option<Vec<u8>>> {
    match text.strip_prefix(HEX_PREFIX) {
        Some(encoded) => Ok(Some(hex::decode(encoded)?)),
        None => Ok(None),
    }
}

/// Render bytes in the `hex->` form.
#[must_use]
pub fn encode_hex_scalar(bytes: &[u8]) -> String {
    format!("{HEX_PREFIX}{}", hex::encode(bytes))
}

fn scalar_to_value(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::String(text) => Value::String(text.clone()),
        Scalar::Bytes(bytes) => Value::String(encode_hex_scalar(bytes)),
        Scalar::Integer(value) => Value::Number(Number::from(*value)),
        Scalar::Boolean(value) => Value::Bool(*value),
        Scalar::Varint(value) | Scalar::Fixed64(value) => Value::Number(Number::from(*value)),
        Scalar::Fixed32(value) => Value::Number(Number::from(*value)),
    }
}

fn tree_to_value(tree: &TreeValue, depth: usize) -> Result<Value> {
    if depth > MAX_JSON_DEPTH {
        return Err(Error::RecursionLimit(MAX_JSON_DEPTH));
    }

    match tree {
        TreeValue::Scalar(scalar) => Ok(scalar_to_value(scalar)),
        TreeValue::Sequence(items) => items
            .iter()
            .map(|item| tree_to_value(item, depth + 1))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        TreeValue::Mapping(mapping) => {
            let mut object = Map::new();
            for (key, value) in mapping.iter() {
                object.insert(key.to_string(), tree_to_value(value, depth + 1)?);
            }
            Ok(Value::Object(object))
        }
    }
}

fn number_to_scalar(number: &Number) -> Scalar {
    if let Some(value) = number.as_i64() {
        Scalar::Integer(value)
    } else if let Some(value) = number.as_u64() {
        Scalar::Varint(value)
    } else {
        Scalar::Fixed64(number.as_f64().unwrap_or_default().to_bits())
    }
}

fn value_to_tree(value: &Value, depth: usize) -> Result<TreeValue> {
    if depth > MAX_JSON_DEPTH {
        return Err(Error::RecursionLimit(MAX_JSON_DEPTH));
    }

    Ok(match value {
        Value::Null => return Err(malformed_error!("null has no wire representation")),
        Value::Bool(flag) => TreeValue::Scalar(Scalar::Boolean(*flag)),
        Value::Number(number) => TreeValue::Scalar(number_to_scalar(number)),
        Value::String(text) => match decode_hex_scalar(text)? {
            Some(bytes) => TreeValue::Scalar(Scalar::Bytes(bytes)),
            None => TreeValue::Scalar(Scalar::String(text.clone())),
        },
        Value::Array(items) => TreeValue::Sequence(
            items
                .iter()
                .map(|item| value_to_tree(item, depth + 1))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(object) => {
            let mut mapping = Mapping::new();
            for (key, item) in object {
                if item.is_null() {
                    continue;
                }
                mapping.insert(key.clone(), value_to_tree(item, depth + 1)?);
            }
            TreeValue::Mapping(mapping)
        }
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn hex_strings_become_bytes() {
        let tree = from_json(&json!({"1": "hex->01ff", "2": "plain"})).unwrap();
        assert_eq!(
            tree.at("1"),
            Some(&TreeValue::Scalar(Scalar::Bytes(vec![0x01, 0xFF])))
        );
        assert_eq!(tree.at("2").and_then(TreeValue::as_str), Some("plain"));

        let back = to_json(&tree).unwrap();
        assert_eq!(back, json!({"1": "hex->01ff", "2": "plain"}));
    }

    #[test]
    fn bad_hex_is_an_error() {
        assert!(matches!(
            from_json(&json!({"1": "hex->zz"})),
            Err(Error::Hex(_))
        ));
    }

    #[test]
    fn numbers_keep_their_range() {
        let tree = parse(r#"{"1": -5, "2": 18446744073709551615, "3": 1.5}"#).unwrap();
        assert_eq!(tree.at("1"), Some(&TreeValue::Scalar(Scalar::Integer(-5))));
        assert_eq!(
            tree.at("2"),
            Some(&TreeValue::Scalar(Scalar::Varint(u64::MAX)))
        );
        assert_eq!(
            tree.at("3"),
            Some(&TreeValue::Scalar(Scalar::Fixed64(1.5_f64.to_bits())))
        );
    }

    #[test]
    fn key_order_is_preserved() {
        let tree = parse(r#"{"9": 1, "1": 2, "5": {"3": 1, "2": 2}}"#).unwrap();
        let root = tree.as_mapping().unwrap();
        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["9", "1", "5"]);
        let text = to_string_pretty(&tree).unwrap();
        assert!(text.find("\"9\"").unwrap() < text.find("\"1\"").unwrap());
    }

    #[test]
    fn nulls_are_dropped_in_objects() {
        let tree = parse(r#"{"1": null, "2": 3}"#).unwrap();
        assert_eq!(tree.as_mapping().unwrap().len(), 1);
        assert!(parse("[null]").is_err());
    }
}

//! Generic decoded representation of tagged-field messages.
//!
//! A [`TreeValue`] is what the wire decoder produces and what the packet synthesizer
//! consumes. It mirrors the three shapes a tagged-field message can take:
//!
//! - [`TreeValue::Scalar`] - a leaf value; integers decoded from the wire keep their wire type
//! - [`TreeValue::Sequence`] - a repeated field, in wire order
//! - [`TreeValue::Mapping`] - a message, keyed by field number rendered as a string
//!
//! # Key Components
//!
//! - [`TreeValue`] / [`Scalar`] / [`Mapping`] - the tree itself
//! - [`json`] - conversion to and from `serde_json` values, honouring the `hex->` convention
//! - [`node`] - the [`node::Node`] view used by cycle-safe, bounded traversals
//!
//! # Examples
//!
//! ```rust
//! use wirescope::tree::{Mapping, Scalar, TreeValue};
//!
//! let mut inner = Mapping::new();
//! inner.insert("2", TreeValue::from("Alice"));
//! let mut root = Mapping::new();
//! root.insert("28", TreeValue::Mapping(inner));
//! let tree = TreeValue::Mapping(root);
//!
//! assert_eq!(tree.at("28.2").and_then(TreeValue::as_str), Some("Alice"));
//! ```

use std::{collections::HashMap, fmt};

use crate::wire::WireType;

pub mod json;
pub mod node;

/// A leaf value of a decoded tree.
///
/// `Varint`, `Fixed32` and `Fixed64` carry the wire type they were decoded from and
/// re-encode with it. `Integer` and `Boolean` are untagged values (typically from a
/// JSON template) and are encoded as varints.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// UTF-8 text carried in a length-delimited field
    String(String),
    /// Raw bytes carried in a length-delimited field
    Bytes(Vec<u8>),
    /// Untagged signed integer
    Integer(i64),
    /// Untagged boolean
    Boolean(bool),
    /// Integer decoded from a varint field
    Varint(u64),
    /// Integer decoded from a fixed32 field
    Fixed32(u32),
    /// Integer decoded from a fixed64 field
    Fixed64(u64),
}

impl Scalar {
    /// The wire type this scalar is encoded with.
    #[must_use]
    pub fn wire_type(&self) -> WireType {
        match self {
            Scalar::String(_) | Scalar::Bytes(_) => WireType::LengthDelimited,
            Scalar::Integer(_) | Scalar::Boolean(_) | Scalar::Varint(_) => WireType::Varint,
            Scalar::Fixed32(_) => WireType::Fixed32,
            Scalar::Fixed64(_) => WireType::Fixed64,
        }
    }

    /// Short name of the value kind, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Scalar::String(_) => "string",
            Scalar::Bytes(_) => "bytes",
            Scalar::Integer(_) => "integer",
            Scalar::Boolean(_) => "boolean",
            Scalar::Varint(_) => "varint",
            Scalar::Fixed32(_) => "fixed32",
            Scalar::Fixed64(_) => "fixed64",
        }
    }

    /// Integer view of the scalar. Varints above `i64::MAX` wrap, the same way a
    /// signed 64-bit field would read them.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(value) => Some(*value),
            Scalar::Boolean(value) => Some(i64::from(*value)),
            Scalar::Varint(value) | Scalar::Fixed64(value) => Some(*value as i64),
            Scalar::Fixed32(value) => Some(i64::from(*value)),
            Scalar::String(text) => text.trim().parse().ok(),
            Scalar::Bytes(_) => None,
        }
    }

    /// Text content for string scalars.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(text) => Some(text),
            _ => None,
        }
    }

    /// Render any scalar as display text; bytes use the `hex->` form.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Scalar::String(text) => text.clone(),
            Scalar::Bytes(bytes) => format!("{}{}", json::HEX_PREFIX, hex::encode(bytes)),
            Scalar::Integer(value) => value.to_string(),
            Scalar::Boolean(value) => value.to_string(),
            Scalar::Varint(value) | Scalar::Fixed64(value) => value.to_string(),
            Scalar::Fixed32(value) => value.to_string(),
        }
    }
}

/// An insertion-ordered message body keyed by field number strings.
///
/// Entries keep their insertion order; a key index next to them makes lookups
/// constant time, so decoding a message stays linear in its field count.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    entries: Vec<(String, TreeValue)>,
    index: HashMap<String, usize>,
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Mapping {
    /// Create an empty mapping
    #[must_use]
    pub fn new() -> Self {
        Mapping {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of distinct keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the mapping has no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    fn append(&mut self, key: String, value: TreeValue) -> usize {
        let position = self.entries.len();
        self.index.insert(key.clone(), position);
        self.entries.push((key, value));
        position
    }

    /// Look up the value stored under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TreeValue> {
        self.position(key).map(|position| &self.entries[position].1)
    }

    /// Mutable lookup of the value stored under `key`
    pub fn get_mut(&mut self, key: &str) -> Option<&mut TreeValue> {
        self.position(key)
            .map(|position| &mut self.entries[position].1)
    }

    /// Returns `true` if `key` is present
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace the value under `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: TreeValue) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => *slot = value,
            None => {
                self.append(key, value);
            }
        }
    }

    /// Add an occurrence of a repeated field.
    ///
    /// The first occurrence is stored as-is; later occurrences turn the entry into a
    /// [`TreeValue::Sequence`] at the position of the first one, preserving wire order.
    pub fn push_repeated(&mut self, key: impl Into<String>, value: TreeValue) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(TreeValue::Sequence(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::replace(existing, TreeValue::Sequence(Vec::new()));
                *existing = TreeValue::Sequence(vec![first, value]);
            }
            None => {
                self.append(key, value);
            }
        }
    }

    /// Return the value under `key`, inserting `default()` first if it is missing.
    pub fn get_or_insert_with(
        &mut self,
        key: &str,
        default: impl FnOnce() -> TreeValue,
    ) -> &mut TreeValue {
        let position = match self.position(key) {
            Some(position) => position,
            None => self.append(key.to_string(), default()),
        };
        &mut self.entries[position].1
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeValue)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Iterate over keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

impl FromIterator<(String, TreeValue)> for Mapping {
    fn from_iter<T: IntoIterator<Item = (String, TreeValue)>>(iter: T) -> Self {
        let mut mapping = Mapping::new();
        for (key, value) in iter {
            mapping.insert(key, value);
        }
        mapping
    }
}

/// The canonical decoded representation of a wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeValue {
    /// A leaf value
    Scalar(Scalar),
    /// A repeated field in wire order
    Sequence(Vec<TreeValue>),
    /// A message keyed by field number
    Mapping(Mapping),
}

impl TreeValue {
    /// Short name of the value kind, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            TreeValue::Scalar(scalar) => scalar.kind_name(),
            TreeValue::Sequence(_) => "sequence",
            TreeValue::Mapping(_) => "mapping",
        }
    }

    /// Field lookup on a mapping
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TreeValue> {
        match self {
            TreeValue::Mapping(mapping) => mapping.get(key),
            _ => None,
        }
    }

    /// Element lookup on a sequence
    #[must_use]
    pub fn index(&self, index: usize) -> Option<&TreeValue> {
        match self {
            TreeValue::Sequence(items) => items.get(index),
            _ => None,
        }
    }

    /// Walk a dotted path such as `25.1.28.2`.
    ///
    /// Each segment is a field key when the current node is a mapping and an element
    /// index when it is a sequence.
    #[must_use]
    pub fn at(&self, path: &str) -> Option<&TreeValue> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| match node {
                TreeValue::Mapping(mapping) => mapping.get(segment),
                TreeValue::Sequence(items) => items.get(segment.parse::<usize>().ok()?),
                TreeValue::Scalar(_) => None,
            })
    }

    /// Mutable variant of [`TreeValue::at`]
    pub fn at_mut(&mut self, path: &str) -> Option<&mut TreeValue> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| match node {
                TreeValue::Mapping(mapping) => mapping.get_mut(segment),
                TreeValue::Sequence(items) => items.get_mut(segment.parse::<usize>().ok()?),
                TreeValue::Scalar(_) => None,
            })
    }

    /// The scalar, if this is a leaf
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            TreeValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Text content for string leaves
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    /// Integer view of a leaf
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(Scalar::as_i64)
    }

    /// The mapping, if this is a message
    #[must_use]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            TreeValue::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    /// The elements, if this is a repeated field
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[TreeValue]> {
        match self {
            TreeValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// View a field as a list: a sequence yields its elements, any other value yields
    /// itself as a single element. A repeated field that occurred once on the wire
    /// decodes without a sequence wrapper, so readers of repeated fields go through this.
    #[must_use]
    pub fn as_repeated(&self) -> &[TreeValue] {
        match self {
            TreeValue::Sequence(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

impl From<&str> for TreeValue {
    fn from(value: &str) -> Self {
        TreeValue::Scalar(Scalar::String(value.to_string()))
    }
}

impl From<String> for TreeValue {
    fn from(value: String) -> Self {
        TreeValue::Scalar(Scalar::String(value))
    }
}

impl From<i64> for TreeValue {
    fn from(value: i64) -> Self {
        TreeValue::Scalar(Scalar::Integer(value))
    }
}

impl From<bool> for TreeValue {
    fn from(value: bool) -> Self {
        TreeValue::Scalar(Scalar::Boolean(value))
    }
}

impl From<Vec<u8>> for TreeValue {
    fn from(value: Vec<u8>) -> Self {
        TreeValue::Scalar(Scalar::Bytes(value))
    }
}

impl From<Mapping> for TreeValue {
    fn from(value: Mapping) -> Self {
        TreeValue::Mapping(value)
    }
}

impl fmt::Display for TreeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match json::to_json(self) {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(text) => f.write_str(&text),
                Err(_) => Err(fmt::Error),
            },
            Err(_) => write!(f, "<{} too deep to render>", self.kind_name()),
        }
    }
}

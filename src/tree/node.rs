//! Read-only structural view used by the pattern scanner.
//!
//! The scanner does not walk [`TreeValue`] directly. It walks anything that implements
//! [`Node`]: decoded trees, but also object graphs layered over them by extensions,
//! which may contain back-references. Every walk in this module therefore tracks the
//! [`Node::identity`] of visited containers and is iterative with explicit bounds.

use std::collections::HashSet;

use crate::tree::TreeValue;

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Mapping key
    Key(String),
    /// Sequence index
    Index(usize),
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Shape of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum NodeKind {
    /// Keyed container
    Mapping,
    /// Indexed container
    Sequence,
    /// Leaf
    Scalar,
}

/// Structural view over a tree-like object graph.
///
/// Implementations are cheap handles (`&TreeValue`, `Rc<...>`), so `Clone` is expected
/// to be inexpensive.
pub trait Node: Clone {
    /// Stable identity of the underlying object, used for cycle detection.
    fn identity(&self) -> usize;

    /// Shape of this node.
    fn kind(&self) -> NodeKind;

    /// Children in their natural order: mapping entries or sequence elements.
    fn children(&self) -> Vec<(Segment, Self)>;

    /// Content of a string leaf.
    fn text(&self) -> Option<String>;

    /// Integer value of a numeric leaf.
    fn integer(&self) -> Option<i64>;

    /// Display text of any leaf.
    fn render(&self) -> Option<String>;

    /// Child of a mapping by key.
    fn field(&self, key: &str) -> Option<Self> {
        if self.kind() != NodeKind::Mapping {
            return None;
        }
        self.children()
            .into_iter()
            .find(|(segment, _)| matches!(segment, Segment::Key(k) if k == key))
            .map(|(_, child)| child)
    }

    /// Child of a sequence by index.
    fn element(&self, index: usize) -> Option<Self> {
        if self.kind() != NodeKind::Sequence {
            return None;
        }
        self.children().into_iter().nth(index).map(|(_, child)| child)
    }

    /// Number of elements of a sequence, 0 for anything else.
    fn len(&self) -> usize {
        match self.kind() {
            NodeKind::Sequence => self.children().len(),
            _ => 0,
        }
    }
}

impl<'a> Node for &'a TreeValue {
    fn identity(&self) -> usize {
        std::ptr::from_ref::<TreeValue>(*self) as usize
    }

    fn kind(&self) -> NodeKind {
        match self {
            TreeValue::Mapping(_) => NodeKind::Mapping,
            TreeValue::Sequence(_) => NodeKind::Sequence,
            TreeValue::Scalar(_) => NodeKind::Scalar,
        }
    }

    fn children(&self) -> Vec<(Segment, Self)> {
        let tree: &'a TreeValue = *self;
        match tree {
            TreeValue::Mapping(mapping) => mapping
                .iter()
                .map(|(key, value)| (Segment::Key(key.to_string()), value))
                .collect(),
            TreeValue::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(index, value)| (Segment::Index(index), value))
                .collect(),
            TreeValue::Scalar(_) => Vec::new(),
        }
    }

    fn text(&self) -> Option<String> {
        self.as_str().map(str::to_string)
    }

    fn integer(&self) -> Option<i64> {
        self.as_i64()
    }

    fn render(&self) -> Option<String> {
        self.as_scalar().map(crate::tree::Scalar::render)
    }

    fn field(&self, key: &str) -> Option<Self> {
        (*self).get(key)
    }

    fn element(&self, index: usize) -> Option<Self> {
        (*self).index(index)
    }

    fn len(&self) -> usize {
        self.as_sequence().map_or(0, <[TreeValue]>::len)
    }
}

/// Set of visited container identities.
#[derive(Debug, Default)]
pub struct Visited {
    seen: HashSet<usize>,
}

impl Visited {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `node`; returns `false` if it was already visited.
    ///
    /// Leaves are never recorded, only containers can close a cycle.
    pub fn enter<N: Node>(&mut self, node: &N) -> bool {
        if node.kind() == NodeKind::Scalar {
            return true;
        }
        self.seen.insert(node.identity())
    }
}

/// Follow a dotted path such as `25.1.28.2`: keys on mappings, indices on sequences.
#[must_use]
pub fn lookup<N: Node>(node: &N, path: &str) -> Option<N> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(node.clone(), |current, segment| match current.kind() {
            NodeKind::Mapping => current.field(segment),
            NodeKind::Sequence => current.element(segment.parse().ok()?),
            NodeKind::Scalar => None,
        })
}

/// Non-empty, trimmed text at `path`. The literal `null` counts as empty.
#[must_use]
pub fn text_at<N: Node>(node: &N, path: &str) -> Option<String> {
    lookup(node, path)
        .and_then(|leaf| leaf.render())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty() && text != "null")
}

/// Flatten a subtree into `(dotted path, rendered leaf)` pairs, in depth-first order.
///
/// Containers deeper than `max_depth` are not entered and at most `max_fields` pairs are
/// produced. Back-references are skipped.
#[must_use]
pub fn flatten<N: Node>(node: &N, max_depth: usize, max_fields: usize) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut visited = Visited::new();
    let mut stack = vec![(node.clone(), String::new(), 0_usize)];

    while let Some((current, prefix, depth)) = stack.pop() {
        if out.len() >= max_fields {
            break;
        }

        if current.kind() == NodeKind::Scalar {
            if let Some(text) = current.render() {
                out.push((prefix, text));
            }
            continue;
        }

        if depth >= max_depth || !visited.enter(&current) {
            continue;
        }

        for (segment, child) in current.children().into_iter().rev() {
            let path = if prefix.is_empty() {
                segment.to_string()
            } else {
                format!("{prefix}.{segment}")
            };
            stack.push((child, path, depth + 1));
        }
    }

    out
}

//! Structural probing of host classes.
//!
//! The resolver never touches the host directly. It asks a [`MetadataProvider`] for a
//! class by name and reads its declared members in declaration order. An embedding that
//! can introspect the host at runtime implements the trait over that introspection;
//! otherwise [`StaticMetadata`] serves descriptor tables prepared ahead of time.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use serde::Deserialize;

use crate::{
    binding::types::{ClassInfo, Modifiers, TypeSig},
    Result,
};

/// Read access to declared members of host classes.
pub trait MetadataProvider: Send + Sync {
    /// Look up a class by dotted name.
    fn class(&self, name: &str) -> Option<Arc<ClassInfo>>;

    /// Direct supertypes of a class: superclass first, then interfaces.
    fn supertypes(&self, name: &str) -> Vec<String> {
        self.class(name)
            .map(|class| {
                class
                    .superclass
                    .iter()
                    .chain(class.interfaces.iter())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns `true` if a value of type `sig` can be assigned to `target`.
    ///
    /// Walks the supertype graph breadth-first; every type is assignable to
    /// `java.lang.Object` except primitives.
    fn is_assignable(&self, sig: &TypeSig, target: &str) -> bool {
        let start = match sig {
            TypeSig::Class(name) => name.as_str(),
            TypeSig::Array(_) => return target == "java.lang.Object",
            TypeSig::Primitive(_) => return false,
        };
        if start == target || target == "java.lang.Object" {
            return true;
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::from([start.to_string()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for parent in self.supertypes(&current) {
                if parent == target {
                    return true;
                }
                queue.push_back(parent);
            }
        }
        false
    }
}

/// Well-known JDK supertypes, so that common shapes (`java.util.List` parameters
/// receiving an `ArrayList`) work without listing the JDK in every table.
const JDK_SUPERTYPES: &[(&str, &[&str])] = &[
    ("java.util.ArrayList", &["java.util.AbstractList", "java.util.List"]),
    ("java.util.LinkedList", &["java.util.AbstractSequentialList", "java.util.List"]),
    ("java.util.AbstractSequentialList", &["java.util.AbstractList"]),
    ("java.util.AbstractList", &["java.util.AbstractCollection", "java.util.List"]),
    ("java.util.List", &["java.util.Collection"]),
    ("java.util.Collection", &["java.lang.Iterable"]),
    ("java.lang.String", &["java.lang.CharSequence"]),
    ("java.lang.Integer", &["java.lang.Number"]),
];

/// Metadata served from descriptor tables.
#[derive(Debug, Default, Clone)]
pub struct StaticMetadata {
    classes: HashMap<String, Arc<ClassInfo>>,
}

#[derive(Deserialize)]
struct TableFile {
    classes: Vec<TableClass>,
}

#[derive(Deserialize)]
struct TableClass {
    name: String,
    #[serde(default)]
    superclass: Option<String>,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    methods: Vec<TableMember>,
    #[serde(default)]
    fields: Vec<TableMember>,
}

#[derive(Deserialize)]
struct TableMember {
    name: String,
    descriptor: String,
    #[serde(default)]
    modifiers: u32,
}

impl StaticMetadata {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a class.
    #[must_use]
    pub fn with_class(mut self, class: ClassInfo) -> Self {
        self.insert(class);
        self
    }

    /// Add (or replace) a class in place.
    pub fn insert(&mut self, class: ClassInfo) {
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    /// Number of classes in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if the table has no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Load descriptor tables from JSON.
    ///
    /// ```json
    /// {"classes": [{
    ///     "name": "mqq.app.msghandle.MsgRespHandler",
    ///     "methods": [{"name": "dispatchRespMsg", "descriptor": "(Lmqq/app/MainService;Ljava/lang/Object;)V", "modifiers": 1}],
    ///     "fields": []
    /// }]}
    /// ```
    ///
    /// # Errors
    /// Returns [`crate::Error::Json`] for invalid JSON and [`crate::Error::Malformed`]
    /// for bad descriptors.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: TableFile = serde_json::from_str(text)?;
        let mut metadata = StaticMetadata::new();

        for table in file.classes {
            let mut class = ClassInfo::new(&table.name);
            if let Some(superclass) = &table.superclass {
                class = class.extends(superclass);
            }
            for interface in &table.interfaces {
                class = class.implements(interface);
            }
            for method in &table.methods {
                class = class.method(
                    &method.name,
                    &method.descriptor,
                    Modifiers::from_bits_truncate(method.modifiers),
                )?;
            }
            for field in &table.fields {
                class = class.field(
                    &field.name,
                    &field.descriptor,
                    Modifiers::from_bits_truncate(field.modifiers),
                )?;
            }
            metadata.insert(class);
        }

        Ok(metadata)
    }
}

impl MetadataProvider for StaticMetadata {
    fn class(&self, name: &str) -> Option<Arc<ClassInfo>> {
        self.classes.get(name).cloned()
    }

    fn supertypes(&self, name: &str) -> Vec<String> {
        if let Some(class) = self.classes.get(name) {
            return class
                .superclass
                .iter()
                .chain(class.interfaces.iter())
                .cloned()
                .collect();
        }

        JDK_SUPERTYPES
            .iter()
            .find(|(class, _)| *class == name)
            .map(|(_, parents)| parents.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }
}

//! `${name}` packet templates.

use std::fmt;

use crate::{
    tree::{json, Mapping, TreeValue},
    Error, Result,
};

/// Values bound to template placeholders.
///
/// Each value is stored as the exact text that replaces `${name}`. Strings are
/// JSON-escaped but not quoted; the template supplies the quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    values: Vec<(String, String)>,
}

impl Substitutions {
    /// No bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to raw JSON text, inserted verbatim.
    #[must_use]
    pub fn raw(mut self, name: &str, text: impl Into<String>) -> Self {
        self.bind(name, text.into());
        self
    }

    /// Bind `name` to an integer.
    #[must_use]
    pub fn int(mut self, name: &str, value: i64) -> Self {
        self.bind(name, value.to_string());
        self
    }

    /// Bind `name` to a string, escaped for use inside a JSON string literal.
    #[must_use]
    pub fn string(mut self, name: &str, value: &str) -> Self {
        self.bind(name, escape(value));
        self
    }

    /// The replacement text for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    fn bind(&mut self, name: &str, value: String) {
        match self.values.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((name.to_string(), value)),
        }
    }
}

fn escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// A named JSON template with `${name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketTemplate {
    name: String,
    source: String,
}

impl PacketTemplate {
    /// Create a template.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        PacketTemplate {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Template name, used in errors and logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Distinct placeholder names in order of first use.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let mut rest = self.source.as_str();
        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                break;
            };
            let name = &after[..end];
            if !names.contains(&name) {
                names.push(name);
            }
            rest = &after[end + 1..];
        }
        names
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Template {
            name: self.name.clone(),
            message: message.into(),
        }
    }

    /// Substitute every placeholder.
    ///
    /// # Errors
    /// Returns [`Error::Template`] for an unbound or unterminated placeholder.
    pub fn substitute(&self, substitutions: &Substitutions) -> Result<String> {
        let mut output = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();

        while let Some(start) = rest.find("${") {
            output.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| self.error("unterminated placeholder"))?;
            let name = &after[..end];
            let value = substitutions
                .get(name)
                .ok_or_else(|| self.error(format!("unbound placeholder ${{{name}}}")))?;
            output.push_str(value);
            rest = &after[end + 1..];
        }
        output.push_str(rest);

        Ok(output)
    }

    /// Substitute and parse into a tree.
    ///
    /// # Errors
    /// Returns [`Error::Template`] for placeholder problems or text that is not valid
    /// JSON after substitution.
    pub fn render(&self, substitutions: &Substitutions) -> Result<TreeValue> {
        let text = self.substitute(substitutions)?;
        json::parse(&text).map_err(|error| self.error(error.to_string()))
    }
}

/// Location of the repeated content field inside a packet, as a dotted key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendSlot {
    path: Vec<String>,
}

impl Default for AppendSlot {
    fn default() -> Self {
        AppendSlot::new("1.3.1.2")
    }
}

impl fmt::Display for AppendSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path.join("."))
    }
}

impl AppendSlot {
    /// Slot at a dotted key path such as `1.3.1.2`.
    #[must_use]
    pub fn new(path: &str) -> Self {
        AppendSlot {
            path: path
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Append `content` to the slot in `tree`.
    ///
    /// Missing intermediate mappings and the target sequence are created. An existing
    /// single mapping at the slot becomes the first element of the sequence. A sequence
    /// is appended element by element, a mapping as one element.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedContentType`] if `content` is a scalar or a sequence
    /// holding anything but mappings, and [`Error::Template`] if the path runs through a
    /// non-mapping value.
    pub fn append(&self, tree: &mut TreeValue, content: TreeValue) -> Result<()> {
        let items = match content {
            TreeValue::Sequence(items) => items,
            TreeValue::Mapping(mapping) => vec![TreeValue::Mapping(mapping)],
            TreeValue::Scalar(scalar) => {
                return Err(Error::UnsupportedContentType(scalar.kind_name()))
            }
        };
        if let Some(item) = items.iter().find(|item| !matches!(item, TreeValue::Mapping(_))) {
            return Err(Error::UnsupportedContentType(item.kind_name()));
        }

        let Some((last, parents)) = self.path.split_last() else {
            return Err(self.error("empty slot path".to_string()));
        };

        let mut current = tree;
        for segment in parents {
            let kind = current.kind_name();
            let TreeValue::Mapping(mapping) = current else {
                return Err(self.error(format!("'{segment}' is inside a {kind}")));
            };
            current = mapping.get_or_insert_with(segment, || TreeValue::Mapping(Mapping::new()));
        }

        let kind = current.kind_name();
        let TreeValue::Mapping(parent) = current else {
            return Err(self.error(format!("'{last}' is inside a {kind}")));
        };
        let slot = parent.get_or_insert_with(last, || TreeValue::Sequence(Vec::new()));
        if let TreeValue::Mapping(_) = slot {
            let single = std::mem::replace(slot, TreeValue::Sequence(Vec::new()));
            *slot = TreeValue::Sequence(vec![single]);
        }

        match slot {
            TreeValue::Sequence(existing) => {
                existing.extend(items);
                Ok(())
            }
            other => Err(self.error(format!("slot holds a {}", other.kind_name()))),
        }
    }

    fn error(&self, message: String) -> Error {
        Error::Template {
            name: format!("slot {self}"),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_and_escaping() {
        let template = PacketTemplate::new("t", r#"{"1": ${uin}, "2": "${uid}", "3": ${uin}}"#);
        assert_eq!(template.placeholders(), ["uin", "uid"]);

        let subs = Substitutions::new()
            .int("uin", 10001)
            .string("uid", "u_\"quoted\"");
        let tree = template.render(&subs).unwrap();
        assert_eq!(tree.at("1").and_then(TreeValue::as_i64), Some(10001));
        assert_eq!(tree.at("2").and_then(TreeValue::as_str), Some("u_\"quoted\""));
    }

    #[test]
    fn unbound_placeholder_fails() {
        let template = PacketTemplate::new("sync", r#"{"1": ${missing}}"#);
        match template.render(&Substitutions::new()) {
            Err(Error::Template { name, message }) => {
                assert_eq!(name, "sync");
                assert!(message.contains("${missing}"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let open = PacketTemplate::new("open", r#"{"1": ${x"#);
        assert!(matches!(
            open.substitute(&Substitutions::new().raw("x", "1")),
            Err(Error::Template { .. })
        ));
    }

    #[test]
    fn append_mapping_into_existing_sequence() {
        let template = PacketTemplate::new("t", r#"{"a": ${x}, "s": [{"p": 1}]}"#);
        let mut tree = template.render(&Substitutions::new().raw("x", "1")).unwrap();
        AppendSlot::new("s")
            .append(&mut tree, json::parse(r#"{"q": 2}"#).unwrap())
            .unwrap();
        assert_eq!(
            json::to_json(tree.at("s").unwrap()).unwrap(),
            serde_json::json!([{"p": 1}, {"q": 2}])
        );
    }

    #[test]
    fn append_creates_missing_path_and_flattens_sequences() {
        let mut tree = json::parse(r#"{"1": {"2": 0}}"#).unwrap();
        AppendSlot::default()
            .append(&mut tree, json::parse(r#"[{"a": 1}, {"b": 2}]"#).unwrap())
            .unwrap();
        AppendSlot::default()
            .append(&mut tree, json::parse(r#"{"c": 3}"#).unwrap())
            .unwrap();
        let items = tree.at("1.3.1.2").and_then(TreeValue::as_sequence).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].at("c").and_then(TreeValue::as_i64), Some(3));
    }

    #[test]
    fn single_mapping_slot_becomes_sequence() {
        let mut tree = json::parse(r#"{"s": {"p": 1}}"#).unwrap();
        AppendSlot::new("s")
            .append(&mut tree, json::parse(r#"{"q": 2}"#).unwrap())
            .unwrap();
        assert_eq!(tree.at("s").and_then(TreeValue::as_sequence).map(<[_]>::len), Some(2));
    }

    #[test]
    fn scalar_content_is_rejected() {
        let mut tree = json::parse(r#"{}"#).unwrap();
        assert!(matches!(
            AppendSlot::default().append(&mut tree, TreeValue::from("text")),
            Err(Error::UnsupportedContentType("string"))
        ));

        let mut tree = json::parse(r#"{"s": [{"p": 1}]}"#).unwrap();
        let slot = AppendSlot::new("s");
        assert!(matches!(
            slot.append(&mut tree, json::parse(r#"[{"q": 2}, 7]"#).unwrap()),
            Err(Error::UnsupportedContentType("integer"))
        ));
        assert!(matches!(
            slot.append(&mut tree, json::parse(r#"[[{"q": 2}]]"#).unwrap()),
            Err(Error::UnsupportedContentType("sequence"))
        ));
        // nothing is appended when an element is rejected
        assert_eq!(tree.at("s").and_then(TreeValue::as_sequence).map(<[_]>::len), Some(1));

        let mut blocked = json::parse(r#"{"1": "leaf"}"#).unwrap();
        assert!(matches!(
            AppendSlot::default().append(&mut blocked, json::parse("{}").unwrap()),
            Err(Error::Template { .. })
        ));
    }
}

//! Synthesis of protocol messages from JSON templates.
//!
//! A [`PacketTemplate`] is JSON text with `${name}` placeholders. Rendering substitutes
//! [`Substitutions`], parses the result through the JSON bridge (so `hex->` strings
//! become bytes) and optionally appends caller-supplied content into the repeated
//! content field named by an [`AppendSlot`]. Building additionally encodes the tree to
//! wire bytes ready for injection.
//!
//! # Examples
//!
//! ```rust
//! use wirescope::synth::{PacketSynthesizer, PacketTemplate, Substitutions};
//! use wirescope::tree::{json, TreeValue};
//!
//! let template = PacketTemplate::new("demo", r#"{"1": {"1": ${uin}, "3": {"1": {"2": [{"p": 1}]}}}}"#);
//! let content = json::parse(r#"{"q": 2}"#)?;
//!
//! let synth = PacketSynthesizer::default();
//! let tree = synth.render(&template, &Substitutions::new().int("uin", 10001), Some(content))?;
//! assert_eq!(tree.at("1.3.1.2").and_then(TreeValue::as_sequence).map(<[_]>::len), Some(2));
//! # Ok::<(), wirescope::Error>(())
//! ```

mod counter;
mod template;

pub use counter::PacketCounter;
pub use template::{AppendSlot, PacketTemplate, Substitutions};

use crate::{tree::TreeValue, wire, Result};

/// Renders templates and encodes the result.
#[derive(Debug, Clone, Default)]
pub struct PacketSynthesizer {
    slot: AppendSlot,
}

impl PacketSynthesizer {
    /// Use `slot` for appended content instead of the default `1.3.1.2`.
    #[must_use]
    pub fn with_slot(slot: AppendSlot) -> Self {
        PacketSynthesizer { slot }
    }

    /// The content slot.
    #[must_use]
    pub fn slot(&self) -> &AppendSlot {
        &self.slot
    }

    /// Render `template` and append `content`, if any.
    ///
    /// # Errors
    /// Returns [`crate::Error::Template`] for rendering failures and
    /// [`crate::Error::UnsupportedContentType`] for scalar content.
    pub fn render(
        &self,
        template: &PacketTemplate,
        substitutions: &Substitutions,
        content: Option<TreeValue>,
    ) -> Result<TreeValue> {
        let mut tree = template.render(substitutions)?;
        if let Some(content) = content {
            self.slot.append(&mut tree, content)?;
        }
        Ok(tree)
    }

    /// Render and encode to wire bytes.
    ///
    /// # Errors
    /// As [`PacketSynthesizer::render`], plus [`crate::Error::Malformed`] if the rendered
    /// tree is not encodable (non-numeric keys, a non-mapping root).
    pub fn build(
        &self,
        template: &PacketTemplate,
        substitutions: &Substitutions,
        content: Option<TreeValue>,
    ) -> Result<Vec<u8>> {
        let tree = self.render(template, substitutions, content)?;
        let bytes = wire::encode(&tree)?;
        log::debug!("[synth] built '{}' ({} bytes)", template.name(), bytes.len());
        Ok(bytes)
    }
}

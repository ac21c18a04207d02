//! Detection of the "pat" gray-tip event inside decoded messages.
//!
//! The event has no fixed location across host versions, so detection is layered,
//! strongest signal first (see [`Layer`]):
//!
//! 1. [`Layer::GrayTip`] - non-empty text at the fixed path `25.1.28.2`; participants
//!    come from `25.1.20`
//! 2. [`Layer::MarkerField`] - the first mapping anywhere holding field `49`; text comes
//!    from that element or its neighbours, or is synthesized as `(type=T,count=C)`
//! 3. [`Layer::Keyword`] - short string leaves containing the event phrases, ranked by
//!    phrase strength and closeness to a short label length
//!
//! The scanner works on any [`Node`] graph. All walks track visited containers and are
//! bounded by [`ScanConfig`], so cyclic graphs and pathological trees terminate.
//!
//! # Examples
//!
//! ```rust
//! use wirescope::{scanner::PatternScanner, tree::json};
//!
//! let tree = json::parse(r#"{"25":{"1":{"28":{"2":"Alice 拍了拍 Bob"}}}}"#)?;
//! let scanner = PatternScanner::default();
//!
//! assert!(scanner.detect(&tree));
//! let info = scanner.extract(&tree).unwrap();
//! assert_eq!(info.text.as_deref(), Some("Alice 拍了拍 Bob"));
//! assert_eq!(info.hit_reason_tag(), "grayTips(25.1.28.2)");
//! # Ok::<(), wirescope::Error>(())
//! ```

mod info;
mod layers;
mod slot;

pub use info::{HitReason, PatInfo};
pub use layers::{Layer, GRAY_TIP_PARTIES_PATH, GRAY_TIP_TEXT_PATH, MARKER_FIELD};
pub use slot::{LastEventSlot, PatEvent};

use strum::IntoEnumIterator;

use crate::{config::ScanConfig, tree::node::Node};

/// Layered pattern detector.
#[derive(Debug, Clone, Default)]
pub struct PatternScanner {
    config: ScanConfig,
}

impl PatternScanner {
    /// Create a scanner with the given heuristics.
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        PatternScanner { config }
    }

    /// The active heuristics.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Returns `true` if any layer fires.
    pub fn detect<N: Node>(&self, root: N) -> bool {
        self.extract(root).is_some()
    }

    /// Run the layers in order and return the first hit.
    pub fn extract<N: Node>(&self, root: N) -> Option<PatInfo> {
        self.extract_for(None, root)
    }

    /// [`PatternScanner::detect`] for a message with a known command.
    pub fn detect_for<N: Node>(&self, command: Option<&str>, root: N) -> bool {
        self.extract_for(command, root).is_some()
    }

    /// [`PatternScanner::extract`] for a message with a known command; the command
    /// scopes the keyword layer under [`crate::config::KeywordPolicy::CommandScoped`].
    pub fn extract_for<N: Node>(&self, command: Option<&str>, root: N) -> Option<PatInfo> {
        let info = Layer::iter().find_map(|layer| layer.run(&root, command, &self.config))?;
        log::debug!("[scanner] {info}");
        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::KeywordPolicy, test::graph::GraphNode, tree::json};

    #[test]
    fn layer_order_prefers_gray_tip() {
        let tree = json::parse(
            r#"{"25":{"1":{"28":{"2":"gray"}}},"5":[{"49":{"1":1,"2":1}},"A 拍了拍 B"]}"#,
        )
        .unwrap();
        let info = PatternScanner::default().extract(&tree).unwrap();
        assert_eq!(info.text.as_deref(), Some("gray"));
    }

    #[test]
    fn empty_gray_tip_falls_through() {
        let tree = json::parse(r#"{"25":{"1":{"28":{"2":""}}},"3":"x 戳一戳 y"}"#).unwrap();
        let info = PatternScanner::default().extract(&tree).unwrap();
        assert_eq!(info.hit_reason_tag(), "keyword(戳一戳)");
    }

    #[test]
    fn nothing_to_find() {
        let tree = json::parse(r#"{"1":{"2":"hello"},"3":[1,2,3]}"#).unwrap();
        assert!(!PatternScanner::default().detect(&tree));
    }

    #[test]
    fn command_scoped_keyword_layer() {
        let tree = json::parse(r#"{"1":"A 拍了拍 B"}"#).unwrap();
        let scanner = PatternScanner::new(
            ScanConfig::default().with_keyword_policy(KeywordPolicy::CommandScoped(vec![
                "trpc.msg.olpush.OlPushService.MsgPush".into(),
            ])),
        );
        assert!(!scanner.detect(&tree));
        assert!(!scanner.detect_for(Some("MessageSvc.PbSendMsg"), &tree));
        assert!(scanner.detect_for(Some("trpc.msg.olpush.OlPushService.MsgPush"), &tree));
    }

    #[test]
    fn deterministic_results() {
        let tree = json::parse(
            r#"{"1":[{"2":"x"},{"49":{"1":3,"2":7}},{"3":"Bob 拍了拍 Carol"}]}"#,
        )
        .unwrap();
        let scanner = PatternScanner::default();
        let first = scanner.extract(&tree);
        for _ in 0..8 {
            assert_eq!(scanner.extract(&tree), first);
        }
    }

    #[test]
    fn cyclic_graph_terminates() {
        // root -> 1 -> 2 -> 3 -> back to 1
        let root = GraphNode::mapping();
        let first = GraphNode::mapping();
        let second = GraphNode::sequence();
        let third = GraphNode::mapping();
        root.put("1", first.clone());
        first.put("2", second.clone());
        second.push(third.clone());
        third.put("back", first.clone());
        third.put("note", GraphNode::text("nothing here"));

        let scanner = PatternScanner::default();
        assert!(!scanner.detect(root.clone()));

        third.put("tip", GraphNode::text("Alice 拍了拍 Bob"));
        let info = scanner.extract(root).unwrap();
        assert_eq!(info.text.as_deref(), Some("Alice 拍了拍 Bob"));
    }
}

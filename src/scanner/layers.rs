//! The detection layers, strongest signal first.
//!
//! Each layer is an independent strategy over a [`Node`] graph and can be run on its
//! own through [`Layer::run`]. The scanner evaluates them in [`Layer`] declaration order
//! and keeps the first hit.

use std::collections::BTreeSet;

use strum::{Display, EnumIter};

use crate::{
    config::ScanConfig,
    scanner::info::{HitReason, PatInfo},
    tree::node::{flatten, lookup, text_at, Node, NodeKind, Segment, Visited},
};

/// Path of the gray-tip text.
pub const GRAY_TIP_TEXT_PATH: &str = "25.1.28.2";

/// Path of the gray-tip container.
pub const GRAY_TIP_PATH: &str = "25.1.28";

/// Path of the gray-tip participants block.
pub const GRAY_TIP_PARTIES_PATH: &str = "25.1.20";

/// Field number marking a pat element.
pub const MARKER_FIELD: &str = "49";

const IDENTIFIER_TOKENS: [&str; 4] = ["uin", "id", "from", "to"];

/// Detection strategies in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Layer {
    /// Fixed-path probe of the gray-tip text
    GrayTip,
    /// Deep scan for a mapping holding the marker field
    MarkerField,
    /// Keyword scan over short string leaves
    Keyword,
}

impl Layer {
    /// Run this layer alone.
    ///
    /// The keyword layer honours [`ScanConfig::keyword_policy`] for `command`.
    pub fn run<N: Node>(self, root: &N, command: Option<&str>, config: &ScanConfig) -> Option<PatInfo> {
        match self {
            Layer::GrayTip => gray_tip(root, config),
            Layer::MarkerField => marker_field(root, config),
            Layer::Keyword => {
                if config.keyword_policy.allows(command) {
                    keyword(root, config)
                } else {
                    None
                }
            }
        }
    }
}

fn join(prefix: &str, segment: &Segment) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

fn gray_tip<N: Node>(root: &N, config: &ScanConfig) -> Option<PatInfo> {
    let text = lookup(root, GRAY_TIP_TEXT_PATH)?.text()?;
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return None;
    }

    let mut info = PatInfo::new(
        GRAY_TIP_PATH,
        HitReason::GrayTips(GRAY_TIP_TEXT_PATH.to_string()),
    );
    info.text = Some(text.to_string());
    info.from = text_at(root, &format!("{GRAY_TIP_PARTIES_PATH}.1"));
    info.to = text_at(root, &format!("{GRAY_TIP_PARTIES_PATH}.2"));
    if let Some(parties) = lookup(root, GRAY_TIP_PARTIES_PATH) {
        info.extras = flatten(&parties, config.flatten_max_depth, config.flatten_max_fields);
    }
    Some(info)
}

struct MarkerHit<N> {
    element: N,
    enclosing: Option<(N, usize)>,
    path: String,
}

fn find_marker<N: Node>(root: &N, max_visits: usize) -> Option<MarkerHit<N>> {
    let mut visited = Visited::new();
    let mut stack: Vec<(N, Option<(N, usize)>, String)> = vec![(root.clone(), None, String::new())];
    let mut visits = 0_usize;

    while let Some((node, enclosing, path)) = stack.pop() {
        visits += 1;
        if visits > max_visits {
            log::debug!("[scanner] marker scan stopped after {max_visits} nodes");
            return None;
        }
        if !visited.enter(&node) {
            continue;
        }

        if node.kind() == NodeKind::Mapping && node.field(MARKER_FIELD).is_some() {
            return Some(MarkerHit {
                element: node,
                enclosing,
                path,
            });
        }

        let in_sequence = node.kind() == NodeKind::Sequence;
        for (segment, child) in node.children().into_iter().rev() {
            if child.kind() == NodeKind::Scalar {
                continue;
            }
            let enclosing = match segment {
                Segment::Index(index) if in_sequence => Some((node.clone(), index)),
                _ => None,
            };
            let child_path = join(&path, &segment);
            stack.push((child, enclosing, child_path));
        }
    }

    None
}

fn element_text<N: Node>(element: &N) -> Option<String> {
    if element.kind() != NodeKind::Mapping {
        return None;
    }
    text_at(element, "1.1").or_else(|| text_at(element, "20.1"))
}

fn marker_field<N: Node>(root: &N, config: &ScanConfig) -> Option<PatInfo> {
    let hit = find_marker(root, config.max_visits)?;

    let mut text = element_text(&hit.element);
    if text.is_none() {
        if let Some((sequence, index)) = &hit.enclosing {
            text = (1..=config.neighbour_radius).find_map(|distance| {
                index
                    .checked_sub(distance)
                    .and_then(|before| sequence.element(before))
                    .and_then(|element| element_text(&element))
                    .or_else(|| {
                        sequence
                            .element(index + distance)
                            .and_then(|element| element_text(&element))
                    })
            });
        }
    }

    let text = text.unwrap_or_else(|| {
        let marker = |field: &str| {
            lookup(&hit.element, &format!("{MARKER_FIELD}.{field}"))
                .and_then(|value| value.integer())
                .unwrap_or(-1)
        };
        format!(
            "{}(type={},count={})",
            config.fallback_label.as_deref().unwrap_or(""),
            marker("1"),
            marker("2")
        )
    });

    let mut info = PatInfo::new(hit.path.clone(), HitReason::MarkerField(hit.path));
    info.text = Some(text);
    attach_identifiers(&mut info, &hit.element, config);
    Some(info)
}

struct Leaf<N> {
    path: String,
    text: String,
    parent: N,
}

fn collect_leaves<N: Node>(root: &N, config: &ScanConfig) -> Vec<Leaf<N>> {
    let mut leaves = Vec::new();
    let mut visited = Visited::new();
    let mut stack: Vec<(N, Option<N>, String)> = vec![(root.clone(), None, String::new())];
    let mut visits = 0_usize;

    while let Some((node, parent, path)) = stack.pop() {
        visits += 1;
        if visits > config.max_visits {
            log::debug!("[scanner] keyword scan stopped after {} nodes", config.max_visits);
            break;
        }

        if node.kind() == NodeKind::Scalar {
            if let (Some(text), Some(parent)) = (node.text(), parent) {
                let trimmed = text.trim();
                if !trimmed.is_empty() && trimmed.chars().count() <= config.max_leaf_len {
                    leaves.push(Leaf {
                        path,
                        text: trimmed.to_string(),
                        parent,
                    });
                }
            }
            continue;
        }

        if !visited.enter(&node) {
            continue;
        }
        for (segment, child) in node.children().into_iter().rev() {
            let child_path = join(&path, &segment);
            stack.push((child, Some(node.clone()), child_path));
        }
    }

    leaves
}

fn phrase_tier<'c>(text: &str, config: &'c ScanConfig) -> Option<(u8, &'c str)> {
    if text.contains(config.primary_phrase.as_str()) {
        return Some((0, config.primary_phrase.as_str()));
    }
    config
        .secondary_phrases
        .iter()
        .find(|phrase| text.contains(phrase.as_str()))
        .map(|phrase| (1, phrase.as_str()))
}

fn keyword<N: Node>(root: &N, config: &ScanConfig) -> Option<PatInfo> {
    let leaves = collect_leaves(root, config);
    let hits: Vec<usize> = leaves
        .iter()
        .enumerate()
        .filter(|(_, leaf)| phrase_tier(&leaf.text, config).is_some())
        .map(|(index, _)| index)
        .collect();
    let first_hit = *hits.first()?;

    let radius = config.neighbour_radius;
    let candidates: BTreeSet<usize> = hits
        .iter()
        .flat_map(|&hit| hit.saturating_sub(radius)..=(hit + radius).min(leaves.len() - 1))
        .collect();

    // primary phrase, then secondary, then length closest to the target, then earliest
    let best = candidates.into_iter().min_by_key(|&index| {
        let leaf = &leaves[index];
        let tier = phrase_tier(&leaf.text, config).map_or(2, |(tier, _)| tier);
        let distance = leaf.text.chars().count().abs_diff(config.target_text_len);
        (tier, distance, index)
    })?;

    let leaf = &leaves[best];
    let phrase = phrase_tier(&leaf.text, config)
        .or_else(|| phrase_tier(&leaves[first_hit].text, config))
        .map(|(_, phrase)| phrase.to_string())
        .unwrap_or_default();

    let mut info = PatInfo::new(leaf.path.clone(), HitReason::Keyword(phrase));
    info.text = Some(leaf.text.clone());
    attach_identifiers(&mut info, &leaf.parent, config);
    Some(info)
}

fn is_identifier_key(path: &str) -> bool {
    let key = path.rsplit('.').next().unwrap_or(path).to_ascii_lowercase();
    IDENTIFIER_TOKENS.iter().any(|token| key.contains(token))
}

fn key_contains(path: &str, token: &str) -> bool {
    path.rsplit('.')
        .next()
        .is_some_and(|key| key.to_ascii_lowercase().contains(token))
}

/// Fill `from`/`to` from identifier-like keys of a bounded flattened view of `anchor`,
/// and keep that view as the extra fields.
fn attach_identifiers<N: Node>(info: &mut PatInfo, anchor: &N, config: &ScanConfig) {
    let flat = flatten(anchor, config.flatten_max_depth, config.flatten_max_fields);
    let identifiers: Vec<&(String, String)> =
        flat.iter().filter(|(path, _)| is_identifier_key(path)).collect();

    let from = identifiers
        .iter()
        .position(|(path, _)| key_contains(path, "from"))
        .or(if identifiers.is_empty() { None } else { Some(0) });
    let to = identifiers
        .iter()
        .enumerate()
        .position(|(index, (path, _))| Some(index) != from && key_contains(path, "to"))
        .or_else(|| {
            identifiers
                .iter()
                .enumerate()
                .position(|(index, _)| Some(index) != from)
        });

    info.from = from.map(|index| identifiers[index].1.clone());
    info.to = to.map(|index| identifiers[index].1.clone());
    info.extras = flat;
}

use std::fmt;

/// Why a detection layer fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitReason {
    /// Text found at the fixed gray-tip path
    GrayTips(String),
    /// A mapping holding the marker field, at the given path
    MarkerField(String),
    /// A string leaf containing the given phrase
    Keyword(String),
}

impl fmt::Display for HitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitReason::GrayTips(path) => write!(f, "grayTips({path})"),
            HitReason::MarkerField(path) => write!(f, "elem49({path})"),
            HitReason::Keyword(phrase) => write!(f, "keyword({phrase})"),
        }
    }
}

/// Result of a successful pattern detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatInfo {
    /// Path of the node the detection is anchored on
    pub source: String,
    /// Human-readable event text, when one could be recovered
    pub text: Option<String>,
    /// Identifier of the acting party
    pub from: Option<String>,
    /// Identifier of the target party
    pub to: Option<String>,
    /// Diagnostic tag of the layer that fired
    pub hit_reason: HitReason,
    /// Additional flattened fields near the hit, bounded and in traversal order
    pub extras: Vec<(String, String)>,
}

impl PatInfo {
    pub(crate) fn new(source: impl Into<String>, hit_reason: HitReason) -> Self {
        PatInfo {
            source: source.into(),
            text: None,
            from: None,
            to: None,
            hit_reason,
            extras: Vec::new(),
        }
    }

    /// Diagnostic tag, e.g. `grayTips(25.1.28.2)`.
    #[must_use]
    pub fn hit_reason_tag(&self) -> String {
        self.hit_reason.to_string()
    }
}

impl fmt::Display for PatInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}: {}",
            self.hit_reason,
            self.source,
            self.text.as_deref().unwrap_or("<no text>")
        )?;
        if let Some(from) = &self.from {
            write!(f, " from={from}")?;
        }
        if let Some(to) = &self.to {
            write!(f, " to={to}")?;
        }
        Ok(())
    }
}

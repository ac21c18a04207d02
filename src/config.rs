//! Configuration for the interception pipeline.
//!
//! This module provides the plain configuration types for each stage of the
//! pipeline: decoding limits, pattern scanning heuristics, binding resolution
//! and the pipeline wiring itself. All of them are `Default`-able and carry
//! builder-style setters, so callers only spell out what they change.
//!
//! Durable values (resolved bindings, the packet counter, passphrases) do not live
//! here; they go through a [`crate::store::ConfigStore`].

/// Default bound for nested message decoding.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Command name used for synthesized inbound pushes.
pub const DEFAULT_PUSH_COMMAND: &str = "trpc.msg.olpush.OlPushService.MsgPush";

/// Limits applied by the wire decoder.
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// Maximum nesting depth at which a length-delimited payload is still tried as
    /// a nested message (default: 64). Deeper payloads stay raw bytes.
    pub max_depth: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecodeConfig {
    /// Creates a decode configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the nested decoding depth bound.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// When the keyword layer of the pattern scanner is allowed to fire.
///
/// A keyword hit on its own is a weak signal. `Permissive` accepts it for every
/// command, `CommandScoped` only for the listed commands, `Disabled` never.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeywordPolicy {
    /// Any keyword hit counts as a detection
    #[default]
    Permissive,
    /// Keyword hits count only for these command names
    CommandScoped(Vec<String>),
    /// The keyword layer is skipped
    Disabled,
}

impl KeywordPolicy {
    /// Whether the keyword layer runs for `command` (`None` when the command is unknown).
    #[must_use]
    pub fn allows(&self, command: Option<&str>) -> bool {
        match self {
            KeywordPolicy::Permissive => true,
            KeywordPolicy::CommandScoped(commands) => {
                command.is_some_and(|command| commands.iter().any(|c| c == command))
            }
            KeywordPolicy::Disabled => false,
        }
    }
}

/// Heuristic knobs of the pattern scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Longest string leaf considered by the keyword layer, in characters (default: 256).
    pub max_leaf_len: usize,

    /// How far around a hit neighbouring elements and leaves are inspected (default: 4).
    pub neighbour_radius: usize,

    /// Preferred text length when ranking keyword candidates (default: 18).
    pub target_text_len: usize,

    /// Maximum depth of the flattened view used for identifier search (default: 4).
    pub flatten_max_depth: usize,

    /// Maximum number of entries in a flattened view (default: 32).
    pub flatten_max_fields: usize,

    /// Upper bound on nodes visited by a single deep scan (default: 200 000).
    pub max_visits: usize,

    /// Phrase that ranks highest in the keyword layer.
    pub primary_phrase: String,

    /// Phrases that rank below the primary one.
    pub secondary_phrases: Vec<String>,

    /// When the keyword layer may fire.
    pub keyword_policy: KeywordPolicy,

    /// Optional label prefixed to the synthesized `(type=T,count=C)` text.
    pub fallback_label: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_leaf_len: 256,
            neighbour_radius: 4,
            target_text_len: 18,
            flatten_max_depth: 4,
            flatten_max_fields: 32,
            max_visits: 200_000,
            primary_phrase: "拍了拍".to_string(),
            secondary_phrases: vec![
                "拍一拍".to_string(),
                "戳了戳".to_string(),
                "戳一戳".to_string(),
            ],
            keyword_policy: KeywordPolicy::Permissive,
            fallback_label: None,
        }
    }
}

impl ScanConfig {
    /// Creates a scan configuration with default heuristics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the keyword layer policy.
    #[must_use]
    pub fn with_keyword_policy(mut self, policy: KeywordPolicy) -> Self {
        self.keyword_policy = policy;
        self
    }

    /// Sets the longest string leaf the keyword layer inspects.
    #[must_use]
    pub fn with_max_leaf_len(mut self, max_leaf_len: usize) -> Self {
        self.max_leaf_len = max_leaf_len;
        self
    }

    /// Sets the bounds of the flattened identifier view.
    #[must_use]
    pub fn with_flatten_limits(mut self, max_depth: usize, max_fields: usize) -> Self {
        self.flatten_max_depth = max_depth;
        self.flatten_max_fields = max_fields;
        self
    }

    /// Sets the label prefixed to synthesized fallback text.
    #[must_use]
    pub fn with_fallback_label(mut self, label: impl Into<String>) -> Self {
        self.fallback_label = Some(label.into());
        self
    }
}

/// Settings of the binding resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Version string of the running host; persisted bindings from other versions
    /// are ignored.
    pub host_version: String,

    /// Persist successful resolutions to the store (default: true).
    pub persist: bool,

    /// Store key prefix for persisted bindings (default: `binding.`).
    pub key_prefix: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            host_version: String::new(),
            persist: true,
            key_prefix: "binding.".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Creates a resolver configuration for the given host version.
    #[must_use]
    pub fn for_host(host_version: impl Into<String>) -> Self {
        Self {
            host_version: host_version.into(),
            ..Self::default()
        }
    }

    /// Enables or disables persistence of resolved bindings.
    #[must_use]
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }
}

/// Configuration of the whole interception pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Decoder limits.
    pub decode: DecodeConfig,

    /// Pattern scanner heuristics.
    pub scan: ScanConfig,

    /// Binding resolver settings.
    pub resolver: ResolverConfig,

    /// Run the pattern scanner on every decoded message (default: true).
    pub detect_patterns: bool,

    /// Command tag for synthesized pushes.
    pub push_command: String,

    /// Store key of the packet sequence counter.
    pub counter_key: String,

    /// First value of the packet sequence counter (default: 1 000 000).
    pub counter_start: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decode: DecodeConfig::default(),
            scan: ScanConfig::default(),
            resolver: ResolverConfig::default(),
            detect_patterns: true,
            push_command: DEFAULT_PUSH_COMMAND.to_string(),
            counter_key: "packet.sequence".to_string(),
            counter_start: 1_000_000,
        }
    }
}

impl PipelineConfig {
    /// Creates a pipeline configuration with defaults everywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the decoder limits.
    #[must_use]
    pub fn with_decode(mut self, decode: DecodeConfig) -> Self {
        self.decode = decode;
        self
    }

    /// Sets the scanner heuristics.
    #[must_use]
    pub fn with_scan(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    /// Sets the resolver settings.
    #[must_use]
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    /// Enables or disables pattern detection on dispatched messages.
    #[must_use]
    pub fn with_pattern_detection(mut self, enabled: bool) -> Self {
        self.detect_patterns = enabled;
        self
    }
}

//! # wirescope Prelude
//!
//! The types and modules most embeddings need, for glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all wirescope operations
pub use crate::Error;

/// The result type used throughout wirescope
pub use crate::Result;

// ================================================================================================
// Wire Format and Tree Model
// ================================================================================================

/// Codec entry points and the JSON bridge
pub use crate::{tree::json, wire};

/// The decoded tree
pub use crate::tree::{Mapping, Scalar, TreeValue};

/// Graph views the scanner runs over
pub use crate::tree::node::Node;

// ================================================================================================
// Configuration and Storage
// ================================================================================================

pub use crate::config::{
    DecodeConfig, KeywordPolicy, PipelineConfig, ResolverConfig, ScanConfig,
};

pub use crate::store::{ConfigStore, JsonFileStore, MemoryStore};

// ================================================================================================
// Pipeline
// ================================================================================================

/// The context object and its builder
pub use crate::pipeline::{InterceptionPoint, Pipeline, PipelineBuilder};

/// Dispatch
pub use crate::dispatch::{CommandDispatcher, DispatchReport, Envelope, RespHandler};

/// Detection
pub use crate::scanner::{LastEventSlot, PatEvent, PatInfo, PatternScanner};

/// Synthesis and injection
pub use crate::{
    inject::{Injector, PushSink},
    synth::{AppendSlot, PacketSynthesizer, PacketTemplate, Substitutions},
};

/// Binding
pub use crate::binding::{
    BindingResolver, BindingTarget, MetadataProvider, ResolvedBinding, StaticMetadata,
};

/// UI boundary
pub use crate::ui::{Notifier, ToastKind, TreeViewer, Ui, UiThread, ViewerKind};

//! The interception pipeline.
//!
//! [`Pipeline`] is the context object the host hook talks to. It owns the dispatcher
//! with the shipped handlers, the pattern scanner and its last-event slot, the
//! injector and the binding resolver. Nothing in the crate is a global; an embedding
//! keeps one `Pipeline` (usually in an `Arc`) for the lifetime of the hook.
//!
//! The flow for one intercepted response:
//!
//! 1. [`Pipeline::on_dispatch`] decodes the inbound payload and fans it out to every
//!    handler registered for its command
//! 2. when pattern detection is on, the decoded tree is scanned and a hit replaces the
//!    content of the last-event slot
//! 3. handlers may synthesize packets and inject them; with the default loopback sink
//!    they come back through step 1
//!
//! # Examples
//!
//! ```rust
//! use wirescope::{dispatch::Envelope, pipeline::Pipeline, tree::json, wire};
//!
//! let pipeline = Pipeline::builder().build();
//! let tree = json::parse(r#"{"25": {"1": {"28": {"2": "Alice 拍了拍 Bob"}}}}"#)?;
//! let payload = wire::encode(&tree)?;
//!
//! let report = pipeline.on_dispatch(&Envelope::push("trpc.msg.olpush.OlPushService.MsgPush", payload));
//! assert!(report.decoded());
//! assert_eq!(pipeline.last_event().latest().map(|e| e.text().to_string()).as_deref(), Some("Alice 拍了拍 Bob"));
//! # Ok::<(), wirescope::Error>(())
//! ```

use std::{fmt, sync::Arc};

use crate::{
    binding::{self, BindingResolver, MemberHandle, MetadataProvider, ResolvedBinding},
    config::PipelineConfig,
    dispatch::{CommandDispatcher, DispatchReport, Envelope, RespHandler},
    handlers::{
        ComposeSlot, ContentComposer, FetchViewer, GroupMsgOpener, HostIdentity, LongMsgProducer,
        PendingSends, RKeyCache, RKeyCapture, SendDisplayFixer, TextOverrides,
    },
    inject::{Injector, LoopbackSink, PushSink},
    scanner::{LastEventSlot, PatEvent, PatternScanner},
    store::{ConfigStore, MemoryStore},
    synth::PacketCounter,
    tree::TreeValue,
    ui::{self, Ui},
    Error, Result,
};

/// Event text used when a detection recovered no text of its own.
pub const PAT_FALLBACK_TEXT: &str = "拍一拍(未取到灰字/未命中elem49文本)";

/// The host members the interception hook is installed on.
#[derive(Debug, Clone)]
pub struct InterceptionPoint {
    /// The inbound dispatch function
    pub dispatch: Arc<MemberHandle>,
    /// The envelope field holding the request
    pub outbound: Arc<MemberHandle>,
    /// The envelope field holding the response
    pub inbound: Arc<MemberHandle>,
}

/// Assembles a [`Pipeline`].
///
/// Every collaborator is optional:
///
/// - without a store, durable values live in a [`MemoryStore`]
/// - without a metadata provider, [`Pipeline::bind`] fails and the hook is not installed
/// - without a push sink, injected packets loop back into the pipeline's own dispatcher
/// - without a host identity, the send display fixer is not registered
/// - without a composer, long message content goes to an internal [`ComposeSlot`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    store: Option<Arc<dyn ConfigStore>>,
    provider: Option<Arc<dyn MetadataProvider>>,
    sink: Option<Arc<dyn PushSink>>,
    ui: Ui,
    identity: Option<Arc<dyn HostIdentity>>,
    composer: Option<Arc<dyn ContentComposer>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        PipelineBuilder {
            config: PipelineConfig::default(),
            store: None,
            provider: None,
            sink: None,
            ui: Ui::default(),
            identity: None,
            composer: None,
        }
    }
}

impl PipelineBuilder {
    /// A builder with default configuration and no collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config`.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist durable values in `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Probe host classes through `provider`.
    #[must_use]
    pub fn with_metadata(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Inject synthesized packets into `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn PushSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Show notifications and viewers through `ui`.
    #[must_use]
    pub fn with_ui(mut self, ui: Ui) -> Self {
        self.ui = ui;
        self
    }

    /// Look up accounts through `identity`; enables the send display fixer.
    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn HostIdentity>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Deliver long message content to `composer`.
    #[must_use]
    pub fn with_composer(mut self, composer: Arc<dyn ContentComposer>) -> Self {
        self.composer = Some(composer);
        self
    }

    /// Build the pipeline and register the shipped handlers.
    #[must_use]
    pub fn build(self) -> Pipeline {
        let config = self.config;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn ConfigStore>);
        let resolver = self.provider.map(|provider| {
            BindingResolver::new(provider, config.resolver.clone()).with_store(Arc::clone(&store))
        });

        let dispatcher = Arc::new(CommandDispatcher::new(config.decode.clone()));
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(LoopbackSink::new(&dispatcher)) as Arc<dyn PushSink>);
        let injector = Injector::new(sink).with_default_command(config.push_command.clone());
        let counter = Arc::new(PacketCounter::load(
            Arc::clone(&store),
            config.counter_key.clone(),
            config.counter_start,
        ));

        let rkeys = Arc::new(RKeyCache::new());
        let overrides = Arc::new(TextOverrides::new());
        let opener = Arc::new(
            GroupMsgOpener::new(Arc::clone(&store), Arc::clone(&overrides), self.ui.clone())
                .with_decode(config.decode.clone()),
        );
        let send_fixer = self.identity.map(|identity| {
            Arc::new(SendDisplayFixer::new(
                Arc::new(PendingSends::new()),
                identity,
                injector.clone(),
                Arc::clone(&counter),
            ))
        });
        let composer = self
            .composer
            .unwrap_or_else(|| Arc::new(ComposeSlot::new()) as Arc<dyn ContentComposer>);

        dispatcher.register(Arc::new(RKeyCapture::new(Arc::clone(&rkeys))));
        if let Some(fixer) = &send_fixer {
            dispatcher.register(Arc::clone(fixer) as Arc<dyn RespHandler>);
        }
        dispatcher.register(Arc::clone(&opener) as Arc<dyn RespHandler>);
        dispatcher.register(Arc::new(FetchViewer::roaming(self.ui.clone())));
        dispatcher.register(Arc::new(LongMsgProducer::new(Arc::clone(&composer))));
        log::debug!("[pipeline] {} handler(s) registered", dispatcher.len());

        Pipeline {
            scanner: PatternScanner::new(config.scan.clone()),
            config,
            store,
            resolver,
            dispatcher,
            last_event: Arc::new(LastEventSlot::new()),
            injector,
            ui: self.ui,
            counter,
            rkeys,
            overrides,
            opener,
            send_fixer,
            composer,
        }
    }
}

/// The wired interception pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn ConfigStore>,
    resolver: Option<BindingResolver>,
    dispatcher: Arc<CommandDispatcher>,
    scanner: PatternScanner,
    last_event: Arc<LastEventSlot>,
    injector: Injector,
    ui: Ui,
    counter: Arc<PacketCounter>,
    rkeys: Arc<RKeyCache>,
    overrides: Arc<TextOverrides>,
    opener: Arc<GroupMsgOpener>,
    send_fixer: Option<Arc<SendDisplayFixer>>,
    composer: Arc<dyn ContentComposer>,
}

impl Pipeline {
    /// Start assembling a pipeline.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Locate the dispatch function and the envelope fields.
    ///
    /// # Errors
    /// Returns [`Error::Unresolved`] naming the first capability that could not be
    /// located, including the dispatch function itself when no metadata provider was
    /// configured. The hook must not be installed in that case.
    pub fn bind(&self) -> Result<InterceptionPoint> {
        let resolver = self
            .resolver
            .as_ref()
            .ok_or_else(|| Error::Unresolved(binding::DISPATCH.to_string()))?;

        let dispatch = resolver.require(&binding::dispatch_target())?;
        let envelope_class = binding::envelope_class(&dispatch)
            .ok_or_else(|| Error::Unresolved(binding::OUTBOUND_RECORD.to_string()))?;
        let outbound = resolver.require(&binding::outbound_record_target(envelope_class))?;
        let inbound = resolver.require(&binding::inbound_record_target(envelope_class))?;

        log::info!("[pipeline] bound to {dispatch}");
        Ok(InterceptionPoint {
            dispatch,
            outbound,
            inbound,
        })
    }

    /// Resolve every independent capability, for diagnostics and optional features.
    ///
    /// Unresolved capabilities are reported, not treated as errors.
    #[must_use]
    pub fn resolve_catalog(&self) -> Vec<(String, ResolvedBinding)> {
        let Some(resolver) = &self.resolver else {
            return Vec::new();
        };
        binding::catalog()
            .iter()
            .map(|target| (target.id().to_string(), resolver.resolve(target)))
            .collect()
    }

    /// Handle one intercepted response.
    ///
    /// Runs on the host's dispatch thread and never fails: decode errors reach the
    /// handlers as a `None` tree and handler failures are contained by the dispatcher.
    pub fn on_dispatch(&self, envelope: &Envelope) -> DispatchReport {
        let report = self.dispatcher.dispatch(envelope);
        if self.config.detect_patterns {
            if let Some(tree) = &report.tree {
                self.detect(envelope.command(), tree);
            }
        }
        report
    }

    fn detect(&self, command: &str, tree: &TreeValue) {
        let Some(mut info) = self.scanner.extract_for(Some(command), tree) else {
            return;
        };
        if info.text.is_none() {
            info.text = Some(PAT_FALLBACK_TEXT.to_string());
        }
        log::warn!(
            "[pat] cmd={command} text={} ({})",
            info.text.as_deref().unwrap_or_default(),
            info.hit_reason
        );
        self.last_event
            .store(PatEvent::new(command, info, tree.clone()));
    }

    /// Register an additional handler after the shipped ones.
    pub fn register(&self, handler: Arc<dyn RespHandler>) -> usize {
        self.dispatcher.register(handler)
    }

    /// Show the most recent pat event, or a hint that none was captured.
    pub fn show_last_event(&self) {
        ui::show_last_event(&self.last_event, &self.ui);
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The durable store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// The binding resolver, if a metadata provider was configured.
    #[must_use]
    pub fn resolver(&self) -> Option<&BindingResolver> {
        self.resolver.as_ref()
    }

    /// The handler registry.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    /// The pattern scanner.
    #[must_use]
    pub fn scanner(&self) -> &PatternScanner {
        &self.scanner
    }

    /// The slot holding the most recent pat event.
    #[must_use]
    pub fn last_event(&self) -> &Arc<LastEventSlot> {
        &self.last_event
    }

    /// The injector handlers push synthesized packets through.
    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// The UI collaborators.
    #[must_use]
    pub fn ui(&self) -> &Ui {
        &self.ui
    }

    /// The synthesized packet counter.
    #[must_use]
    pub fn counter(&self) -> &Arc<PacketCounter> {
        &self.counter
    }

    /// The captured media download keys.
    #[must_use]
    pub fn rkeys(&self) -> &Arc<RKeyCache> {
        &self.rkeys
    }

    /// Texts recovered from sealed messages.
    #[must_use]
    pub fn overrides(&self) -> &Arc<TextOverrides> {
        &self.overrides
    }

    /// The sealed group message opener.
    #[must_use]
    pub fn opener(&self) -> &Arc<GroupMsgOpener> {
        &self.opener
    }

    /// The send display fixer, if a host identity was configured.
    #[must_use]
    pub fn send_fixer(&self) -> Option<&Arc<SendDisplayFixer>> {
        self.send_fixer.as_ref()
    }

    /// The long message content composer.
    #[must_use]
    pub fn composer(&self) -> &Arc<dyn ContentComposer> {
        &self.composer
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("handlers", &self.dispatcher.len())
            .field("bound", &self.resolver.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        handlers::{RKEY_COMMAND, SEND_MSG_COMMAND},
        scanner::HitReason,
        test::ui::{RecordingUi, UiEvent},
        tree::json,
        ui::{ToastKind, ViewerKind, NO_EVENT_MESSAGE},
        wire,
    };

    fn push(command: &str, text: &str) -> Envelope {
        let payload = wire::encode(&json::parse(text).unwrap()).unwrap();
        Envelope::push(command, payload)
    }

    #[test]
    fn shipped_handlers() {
        let pipeline = Pipeline::builder().build();
        assert_eq!(pipeline.dispatcher().len(), 4);
        assert_eq!(pipeline.dispatcher().handlers_for(RKEY_COMMAND), ["rkey"]);
        assert!(pipeline.dispatcher().handlers_for(SEND_MSG_COMMAND).is_empty());
        assert!(pipeline.send_fixer().is_none());
        assert!(matches!(pipeline.bind(), Err(Error::Unresolved(_))));
        assert!(pipeline.resolve_catalog().is_empty());
    }

    #[test]
    fn marker_detection_without_text_uses_fallback() {
        let pipeline = Pipeline::builder().build();
        // an element carrying only the marker's type and count yields the synthesized text
        pipeline.on_dispatch(&push("X", r#"{"2": [{"49": {"1": 3, "2": 7}}, {"5": 1}]}"#));
        let event = pipeline.last_event().latest().unwrap();
        assert_eq!(event.text(), "(type=3,count=7)");
        assert!(matches!(event.info.hit_reason, HitReason::MarkerField(_)));
        assert_eq!(event.command, "X");
    }

    #[test]
    fn detection_can_be_disabled() {
        let pipeline = Pipeline::builder()
            .with_config(PipelineConfig::new().with_pattern_detection(false))
            .build();
        let report =
            pipeline.on_dispatch(&push("X", r#"{"25": {"1": {"28": {"2": "A 拍了拍 B"}}}}"#));
        assert!(report.decoded());
        assert!(pipeline.last_event().latest().is_none());
    }

    #[test]
    fn last_event_menu_action() {
        let recording = Arc::new(RecordingUi::default());
        let pipeline = Pipeline::builder().with_ui(recording.ui()).build();

        pipeline.show_last_event();
        pipeline.on_dispatch(&push("X", r#"{"25": {"1": {"28": {"2": "A 拍了拍 B"}}}}"#));
        pipeline.show_last_event();

        let events = recording.events();
        assert_eq!(events[0], UiEvent::Toast(ToastKind::Error, NO_EVENT_MESSAGE.to_string()));
        assert!(matches!(events[1], UiEvent::Viewer(ViewerKind::Json, _)));
        assert_eq!(events[2], UiEvent::Toast(ToastKind::Success, "A 拍了拍 B".to_string()));
    }
}

//! Re-injection of synthesized packets into the host's inbound path.
//!
//! The host exposes a push entry point that accepts `(command, payload, extra info)`
//! and processes the packet as if it had arrived from the network. [`PushSink`] is
//! that boundary. [`Injector`] is what handlers hold; [`LoopbackSink`] feeds packets
//! straight back into a [`CommandDispatcher`] for headless runs.

use std::sync::{Arc, Weak};

use crate::{
    config::DEFAULT_PUSH_COMMAND,
    dispatch::{CommandDispatcher, Envelope},
    Error, Result,
};

/// Push metadata accompanying an injected packet; the host's default instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushExtraInfo;

/// The host's inbound push entry point.
pub trait PushSink: Send + Sync {
    /// Deliver `payload` as an inbound packet for `command`.
    ///
    /// # Errors
    /// Returns an error if the host rejected the packet.
    fn push(&self, command: &str, payload: &[u8], extra: PushExtraInfo) -> Result<()>;
}

/// Sends synthesized packets to a [`PushSink`].
#[derive(Clone)]
pub struct Injector {
    sink: Arc<dyn PushSink>,
    default_command: String,
}

impl Injector {
    /// Inject through `sink`, tagging packets with the online push command by default.
    #[must_use]
    pub fn new(sink: Arc<dyn PushSink>) -> Self {
        Injector {
            sink,
            default_command: DEFAULT_PUSH_COMMAND.to_string(),
        }
    }

    /// Use another default command.
    #[must_use]
    pub fn with_default_command(mut self, command: impl Into<String>) -> Self {
        self.default_command = command.into();
        self
    }

    /// The command used by [`Injector::push`].
    #[must_use]
    pub fn default_command(&self) -> &str {
        &self.default_command
    }

    /// Inject `payload` tagged with `command`.
    ///
    /// # Errors
    /// As the sink.
    pub fn inject(&self, command: &str, payload: &[u8]) -> Result<()> {
        log::debug!("[inject] {command} ({} bytes)", payload.len());
        self.sink.push(command, payload, PushExtraInfo)
    }

    /// Inject `payload` tagged with the default command.
    ///
    /// # Errors
    /// As the sink.
    pub fn push(&self, payload: &[u8]) -> Result<()> {
        self.inject(&self.default_command, payload)
    }
}

/// A sink that dispatches injected packets to a dispatcher on the calling thread.
///
/// Holds the dispatcher weakly so a dispatcher may own handlers that inject into it.
pub struct LoopbackSink {
    dispatcher: Weak<CommandDispatcher>,
}

impl LoopbackSink {
    /// Loop packets back into `dispatcher`.
    #[must_use]
    pub fn new(dispatcher: &Arc<CommandDispatcher>) -> Self {
        LoopbackSink {
            dispatcher: Arc::downgrade(dispatcher),
        }
    }
}

impl PushSink for LoopbackSink {
    fn push(&self, command: &str, payload: &[u8], _extra: PushExtraInfo) -> Result<()> {
        let dispatcher = self
            .dispatcher
            .upgrade()
            .ok_or_else(|| Error::Error("loopback dispatcher dropped".to_string()))?;
        let report = dispatcher.dispatch(&Envelope::push(command, payload.to_vec()));
        log::trace!(
            "[inject] loopback {command}: {} handler(s), {} failed",
            report.invoked,
            report.failed.len()
        );
        Ok(())
    }
}

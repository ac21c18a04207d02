//! Content production for uploaded long messages.
//!
//! The packet helper uploads a long message and waits for its resource id. The upload
//! response carries it at `2.3`; [`LongMsgProducer`] turns it into sendable content in
//! the form the composer asked for and hands it back.

use std::sync::{Arc, Mutex};

use crate::{
    dispatch::{Envelope, RespHandler},
    handlers::LONG_MSG_COMMAND,
    longmsg::{ContentMode, ForwardCard},
    tree::TreeValue,
    Result,
};

/// What the composer wants built from the next resource id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeRequest {
    /// Content form
    pub mode: ContentMode,
    /// Preview text of card forms
    pub hint: String,
    /// Body line of card forms
    pub desc: String,
}

impl ComposeRequest {
    /// Request `mode` with empty texts.
    #[must_use]
    pub fn new(mode: ContentMode) -> Self {
        ComposeRequest {
            mode,
            hint: String::new(),
            desc: String::new(),
        }
    }

    /// Set the card texts.
    #[must_use]
    pub fn with_texts(mut self, hint: impl Into<String>, desc: impl Into<String>) -> Self {
        self.hint = hint.into();
        self.desc = desc.into();
        self
    }

    fn card(&self, resid: &str) -> ForwardCard {
        let card = ForwardCard::new(resid).with_desc(self.desc.as_str());
        if self.hint.is_empty() {
            card
        } else {
            card.with_hint(self.hint.as_str())
        }
    }
}

/// The packet composer the produced content goes to.
pub trait ContentComposer: Send + Sync {
    /// The pending request, if the composer is waiting for a resource id.
    fn request(&self) -> Option<ComposeRequest>;

    /// Receive the content built for the request.
    fn set_content(&self, mode: ContentMode, content: TreeValue);
}

/// A composer that keeps one request and the last produced content.
#[derive(Debug, Default)]
pub struct ComposeSlot {
    request: Mutex<Option<ComposeRequest>>,
    content: Mutex<Option<(ContentMode, TreeValue)>>,
}

impl ComposeSlot {
    /// An idle slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the next resource id.
    pub fn request_content(&self, request: ComposeRequest) {
        *lock!(self.request) = Some(request);
    }

    /// Take the produced content.
    pub fn take_content(&self) -> Option<(ContentMode, TreeValue)> {
        lock!(self.content).take()
    }
}

impl ContentComposer for ComposeSlot {
    fn request(&self) -> Option<ComposeRequest> {
        lock!(self.request).clone()
    }

    fn set_content(&self, mode: ContentMode, content: TreeValue) {
        lock!(self.request).take();
        *lock!(self.content) = Some((mode, content));
    }
}

/// Handles [`LONG_MSG_COMMAND`] responses.
pub struct LongMsgProducer {
    composer: Arc<dyn ContentComposer>,
}

impl LongMsgProducer {
    /// Deliver content to `composer`.
    #[must_use]
    pub fn new(composer: Arc<dyn ContentComposer>) -> Self {
        LongMsgProducer { composer }
    }
}

impl RespHandler for LongMsgProducer {
    fn command(&self) -> &str {
        LONG_MSG_COMMAND
    }

    fn name(&self) -> &str {
        "long-msg-producer"
    }

    fn on_handle(&self, tree: Option<&TreeValue>, _envelope: &Envelope) -> Result<()> {
        let Some(tree) = tree else {
            return Ok(());
        };
        let resid = tree
            .at("2.3")
            .and_then(TreeValue::as_str)
            .ok_or_else(|| malformed_error!("long message response lacks a resource id"))?;
        log::debug!("[longmsg] resid {resid}");

        let Some(request) = self.composer.request() else {
            return Ok(());
        };
        let content = request.card(resid).build(request.mode)?;
        self.composer.set_content(request.mode, content);
        Ok(())
    }
}

//! Opening of passphrase-sealed group messages.
//!
//! The user picks a sealed message and asks for it to be opened; the host then fetches
//! that message with [`GROUP_MSG_COMMAND`]. Opening is armed with a [`DecryptRequest`]
//! before the fetch, and the next response is consumed by [`GroupMsgOpener`]:
//!
//! 1. the sealed blob is read from element 2 of `6.3.1.2`, field `1.12.1`
//! 2. it is opened with the stored passphrase (see [`crate::crypto`])
//! 3. the plaintext is decoded; a text message replaces the displayed text through
//!    [`TextOverrides`], anything else is shown raw
//!
//! Responses that arrive while nothing is armed are plain fetch results and are shown
//! in the fetch viewer.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use dashmap::DashMap;

use crate::{
    config::DecodeConfig,
    crypto::Sealer,
    dispatch::{Envelope, RespHandler},
    handlers::{repeated_at, GROUP_MSG_COMMAND},
    store::ConfigStore,
    tree::{json, Scalar, TreeValue},
    ui::{ToastKind, Ui, ViewerKind},
    wire, Error, Result,
};

/// Store key of the envelope passphrase.
pub const PASSPHRASE_KEY: &str = "envelope.passphrase";

/// Passphrase used when none was configured.
pub const DEFAULT_PASSPHRASE: &str = "ono";

const NOT_ENCRYPTED_MESSAGE: &str = "非加密消息";
const KEY_MISMATCH_MESSAGE: &str = "密钥不匹配";
const DECRYPTED_MESSAGE: &str = "解密成功重新进入本界面生效";
const UNSUPPORTED_MESSAGE: &str = "不支持的消息类型, 已打开原 PB";

/// The message an open request is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptRequest {
    /// Group peer id
    pub peer_uid: String,
    /// Message sequence in the group
    pub msg_seq: String,
    /// Sender account
    pub sender_uin: String,
}

impl DecryptRequest {
    /// Describe the message to open.
    pub fn new(
        peer_uid: impl Into<String>,
        msg_seq: impl Into<String>,
        sender_uin: impl Into<String>,
    ) -> Self {
        DecryptRequest {
            peer_uid: peer_uid.into(),
            msg_seq: msg_seq.into(),
            sender_uin: sender_uin.into(),
        }
    }

    /// Key of the message in [`TextOverrides`]: `peerUid:msgSeq:senderUin`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.peer_uid, self.msg_seq, self.sender_uin)
    }
}

/// Replacement texts for displayed messages, keyed by [`DecryptRequest::key`].
#[derive(Debug, Default)]
pub struct TextOverrides {
    texts: DashMap<String, String>,
}

impl TextOverrides {
    /// No overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the text of the message at `key`.
    pub fn insert(&self, key: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(key.into(), text.into());
    }

    /// The replacement text for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.texts.get(key).map(|text| text.value().clone())
    }

    /// Drop the replacement for `key`.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.texts.remove(key).map(|(_, text)| text)
    }

    /// Number of overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// Returns `true` if there are no overrides.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Handles [`GROUP_MSG_COMMAND`] responses.
pub struct GroupMsgOpener {
    armed: Mutex<Option<DecryptRequest>>,
    store: Arc<dyn ConfigStore>,
    sealer: Sealer,
    overrides: Arc<TextOverrides>,
    ui: Ui,
    decode: DecodeConfig,
}

impl GroupMsgOpener {
    /// Create an opener reading the passphrase from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>, overrides: Arc<TextOverrides>, ui: Ui) -> Self {
        GroupMsgOpener {
            armed: Mutex::new(None),
            store,
            sealer: Sealer::default(),
            overrides,
            ui,
            decode: DecodeConfig::default(),
        }
    }

    /// Open with another sealer.
    #[must_use]
    pub fn with_sealer(mut self, sealer: Sealer) -> Self {
        self.sealer = sealer;
        self
    }

    /// Decode opened payloads with `decode`.
    #[must_use]
    pub fn with_decode(mut self, decode: DecodeConfig) -> Self {
        self.decode = decode;
        self
    }

    /// Treat the next response as the sealed message described by `request`.
    pub fn arm(&self, request: DecryptRequest) {
        *lock!(self.armed) = Some(request);
    }

    /// Whether an open request is pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        lock!(self.armed).is_some()
    }

    /// The configured passphrase, or the default one if none was stored.
    #[must_use]
    pub fn passphrase(&self) -> String {
        self.store
            .get_string(PASSPHRASE_KEY)
            .unwrap_or_else(|| DEFAULT_PASSPHRASE.to_string())
    }

    fn open(&self, request: &DecryptRequest, tree: &TreeValue) -> Result<()> {
        let passphrase = self.passphrase();
        if passphrase.trim().is_empty() {
            log::debug!("[decrypt] no passphrase configured");
            return Ok(());
        }

        let Some(blob) = sealed_blob(tree)? else {
            self.ui.toast(ToastKind::Error, NOT_ENCRYPTED_MESSAGE);
            return Ok(());
        };

        let plain = match self.sealer.open(&passphrase, &blob) {
            Ok(plain) => plain,
            Err(Error::NotEncrypted) => {
                self.ui.toast(ToastKind::Error, NOT_ENCRYPTED_MESSAGE);
                return Ok(());
            }
            Err(Error::KeyMismatch) => {
                self.ui.toast(ToastKind::Error, KEY_MISMATCH_MESSAGE);
                return Ok(());
            }
            Err(error) => return Err(error),
        };

        let inner = wire::decode_with(wire::unpack_payload(&plain), &self.decode)?;
        match repeated_at(&inner, "1.2", 2, "1.1").and_then(TreeValue::as_str) {
            Some(text) => {
                log::debug!("[decrypt] opened {}", request.key());
                self.overrides.insert(request.key(), text);
                self.ui.toast(ToastKind::Success, DECRYPTED_MESSAGE);
            }
            None => {
                self.ui
                    .show_with_toast(ViewerKind::Json, &inner, ToastKind::Success, UNSUPPORTED_MESSAGE);
            }
        }
        Ok(())
    }
}

/// The sealed blob of a fetched group message, as bytes or a `hex->` string.
fn sealed_blob(tree: &TreeValue) -> Result<Option<Vec<u8>>> {
    match repeated_at(tree, "6.3.1.2", 2, "1.12.1").and_then(TreeValue::as_scalar) {
        Some(Scalar::Bytes(bytes)) => Ok(Some(bytes.clone())),
        Some(Scalar::String(text)) => json::decode_hex_scalar(text),
        _ => Ok(None),
    }
}

impl fmt::Debug for GroupMsgOpener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupMsgOpener")
            .field("armed", &self.is_armed())
            .field("overrides", &self.overrides.len())
            .finish_non_exhaustive()
    }
}

impl RespHandler for GroupMsgOpener {
    fn command(&self) -> &str {
        GROUP_MSG_COMMAND
    }

    fn name(&self) -> &str {
        "group-msg-opener"
    }

    fn on_handle(&self, tree: Option<&TreeValue>, _envelope: &Envelope) -> Result<()> {
        // an undecodable response leaves a pending request armed
        let Some(tree) = tree else {
            return Ok(());
        };

        let request = lock!(self.armed).take();
        match request {
            Some(request) => self.open(&request, tree),
            None => {
                self.ui.show(ViewerKind::FetchResult, tree);
                Ok(())
            }
        }
    }
}

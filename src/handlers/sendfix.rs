//! Local echo of messages sent through the packet helper.
//!
//! A message sent to a user by raw packet is delivered but never shown in the sender's
//! own chat. When the server acknowledges the send, [`SendDisplayFixer`] synthesizes
//! the two sync pushes the host would have received for a regular send and injects
//! them: a conversation update, then the message itself with the sent content appended
//! to its element list.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use crate::{
    dispatch::{Envelope, RespHandler},
    handlers::SEND_MSG_COMMAND,
    inject::Injector,
    synth::{PacketCounter, PacketSynthesizer, PacketTemplate, Substitutions},
    tree::{json, TreeValue},
    Result,
};

/// Conversation update for the sender's own session.
const SELF_SYNC_TEMPLATE: &str = r#"{
  "1": {
    "1": {"1": ${uin}, "2": "${uid}", "5": ${uin}, "6": "${uid}"},
    "2": {"1": 528, "2": 8, "3": 8, "4": 0, "5": 0, "6": ${msgtime}, "12": 0},
    "3": {
      "1": {},
      "2": {"1": {"1": "${toPeerid}", "2": ${msgtime}, "20": 0, "21": 0, "9": 0, "11": 0}}
    }
  }
}"#;

/// The sent message as seen by the sender; content goes into `1.3.1.2`.
const PEER_SYNC_TEMPLATE: &str = r#"{
  "1": {
    "1": {"1": ${uin}, "2": "${uid}", "3": 1001, "5": ${toUin}, "6": "${toPeerid}"},
    "2": {
      "1": 166, "3": 11, "4": 0, "5": ${pbSendCount}, "6": ${msgtime}, "7": 1,
      "11": ${seq}, "28": ${pbSendCount}, "12": 0, "14": 0
    },
    "3": {
      "1": {
        "1": {
          "1": 0, "2": ${msgtime}, "3": 1490340800, "4": 0, "5": 10,
          "6": 0, "7": 134, "8": 2, "9": "宋体"
        },
        "2": [
          {"37": {"17": 105342, "1": 10896, "19": {"96": 0, "34": 0, "102": {"1": {"1": 0, "2": 0, "3": 0, "4": 0}}, "73": {"2": 0, "6": 6}, "25": 0, "90": {"1": ${seq}, "2": 0}, "30": 0, "31": 0, "15": 65536}}},
          {"9": {"1": 2021111, "12": 65536}}
        ]
      }
    }
  },
  "3": 1,
  "4": {"1": "0.0.0.0", "2": 20222, "3": {"2": 166, "3": 11600, "4": 0, "7": 1, "8": ${uin}}}
}"#;

/// Account lookups the fixer needs from the host.
pub trait HostIdentity: Send + Sync {
    /// Numeric id of the logged-in account.
    fn current_uin(&self) -> i64;

    /// Opaque peer id of an account.
    fn uid_for_uin(&self, uin: i64) -> String;

    /// Numeric id behind an opaque peer id, if known.
    fn uin_for_uid(&self, uid: &str) -> Option<i64>;
}

/// A raw-packet send waiting for its acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    /// Peer the message went to; numeric for groups, opaque for users
    pub peer_id: String,
    /// The sent elements as JSON, a single element or an array of them
    pub content: String,
}

impl PendingSend {
    /// Record a send.
    pub fn new(peer_id: impl Into<String>, content: impl Into<String>) -> Self {
        PendingSend {
            peer_id: peer_id.into(),
            content: content.into(),
        }
    }

    /// Whether the peer is a group (numeric id); group sends need no local echo.
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.peer_id.trim().parse::<i64>().is_ok()
    }
}

/// Sends awaiting acknowledgement, most recent last.
#[derive(Debug, Default)]
pub struct PendingSends {
    queue: Mutex<Vec<PendingSend>>,
}

impl PendingSends {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a send.
    pub fn push(&self, send: PendingSend) {
        lock!(self.queue).push(send);
    }

    /// The most recent send.
    #[must_use]
    pub fn last(&self) -> Option<PendingSend> {
        lock!(self.queue).last().cloned()
    }

    /// Drop the most recent send.
    pub fn pop(&self) -> Option<PendingSend> {
        lock!(self.queue).pop()
    }

    /// Number of queued sends.
    #[must_use]
    pub fn len(&self) -> usize {
        lock!(self.queue).len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock!(self.queue).is_empty()
    }
}

/// Injects the sync pushes for acknowledged raw-packet sends to users.
pub struct SendDisplayFixer {
    enabled: AtomicBool,
    pending: Arc<PendingSends>,
    identity: Arc<dyn HostIdentity>,
    synth: PacketSynthesizer,
    injector: Injector,
    counter: Arc<PacketCounter>,
    self_sync: PacketTemplate,
    peer_sync: PacketTemplate,
}

impl SendDisplayFixer {
    /// Create a disabled fixer.
    #[must_use]
    pub fn new(
        pending: Arc<PendingSends>,
        identity: Arc<dyn HostIdentity>,
        injector: Injector,
        counter: Arc<PacketCounter>,
    ) -> Self {
        SendDisplayFixer {
            enabled: AtomicBool::new(false),
            pending,
            identity,
            synth: PacketSynthesizer::default(),
            injector,
            counter,
            self_sync: PacketTemplate::new("self-sync", SELF_SYNC_TEMPLATE),
            peer_sync: PacketTemplate::new("peer-sync", PEER_SYNC_TEMPLATE),
        }
    }

    /// Switch the fixer on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether the fixer acts on acknowledgements.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// The queue of sends awaiting acknowledgement.
    #[must_use]
    pub fn pending(&self) -> &Arc<PendingSends> {
        &self.pending
    }

    fn substitutions(&self, send: &PendingSend, msgtime: i64, seq: i64) -> Substitutions {
        let uin = self.identity.current_uin();
        Substitutions::new()
            .int("uin", uin)
            .string("uid", &self.identity.uid_for_uin(uin))
            .string("toPeerid", &send.peer_id)
            .int("toUin", self.identity.uin_for_uid(&send.peer_id).unwrap_or(0))
            .int("msgtime", msgtime)
            .int("seq", seq)
            .int("pbSendCount", self.counter.current())
    }
}

impl fmt::Debug for SendDisplayFixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendDisplayFixer")
            .field("enabled", &self.is_enabled())
            .field("pending", &self.pending.len())
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

impl RespHandler for SendDisplayFixer {
    fn command(&self) -> &str {
        SEND_MSG_COMMAND
    }

    fn name(&self) -> &str {
        "send-display-fixer"
    }

    fn on_handle(&self, tree: Option<&TreeValue>, _envelope: &Envelope) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let (Some(tree), Some(send)) = (tree, self.pending.last()) else {
            return Ok(());
        };
        if send.is_group() {
            self.pending.pop();
            log::debug!("[sendfix] peer {} is a group, nothing to echo", send.peer_id);
            return Ok(());
        }

        let msgtime = tree
            .at("3")
            .and_then(TreeValue::as_i64)
            .ok_or_else(|| malformed_error!("send acknowledgement lacks the message time"))?;
        let seq = tree
            .at("14")
            .and_then(TreeValue::as_i64)
            .ok_or_else(|| malformed_error!("send acknowledgement lacks the sequence"))?;

        let substitutions = self.substitutions(&send, msgtime, seq);
        let content = json::parse(send.content.trim_start())?;

        let update = self.synth.build(&self.self_sync, &substitutions, None)?;
        let message = self.synth.build(&self.peer_sync, &substitutions, Some(content))?;

        // a send is echoed at most once, even if an injection below fails
        self.pending.pop();
        self.injector.push(&update)?;
        self.injector.push(&message)?;

        let tag = self.counter.advance()?;
        log::debug!("[sendfix] echoed send to {} as #{tag}", send.peer_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::{ConfigStore, MemoryStore},
        inject::{PushExtraInfo, PushSink},
        test::sink::RecordingSink,
        wire,
    };
    use std::sync::atomic::AtomicUsize;

    struct FixedIdentity;

    impl HostIdentity for FixedIdentity {
        fn current_uin(&self) -> i64 {
            10001
        }

        fn uid_for_uin(&self, uin: i64) -> String {
            format!("u_self_{uin}")
        }

        fn uin_for_uid(&self, uid: &str) -> Option<i64> {
            (uid == "u_peer").then_some(20002)
        }
    }

    fn fixer(sink: &Arc<RecordingSink>) -> (SendDisplayFixer, Arc<dyn ConfigStore>) {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        let counter = Arc::new(PacketCounter::load(Arc::clone(&store), "packet.sequence", 1_000_000));
        let fixer = SendDisplayFixer::new(
            Arc::new(PendingSends::new()),
            Arc::new(FixedIdentity),
            Injector::new(sink.clone()),
            counter,
        );
        (fixer, store)
    }

    fn ack() -> (TreeValue, Envelope) {
        let tree = json::parse(r#"{"1": 0, "3": 1700000000, "14": 4242}"#).unwrap();
        let bytes = wire::encode(&tree).unwrap();
        (wire::decode(&bytes).unwrap(), Envelope::push(SEND_MSG_COMMAND, bytes))
    }

    #[test]
    fn templates_parse_once_bound() {
        let (fixer, _) = fixer(&Arc::new(RecordingSink::default()));
        let subs = fixer.substitutions(&PendingSend::new("u_peer", "{}"), 1, 2);
        assert!(fixer.self_sync.render(&subs).is_ok());
        let peer = fixer.peer_sync.render(&subs).unwrap();
        assert_eq!(peer.at("1.1.5").and_then(TreeValue::as_i64), Some(20002));
        assert_eq!(peer.at("1.3.1.1.9").and_then(TreeValue::as_str), Some("宋体"));
    }

    #[test]
    fn echoes_user_send() {
        let sink = Arc::new(RecordingSink::default());
        let (fixer, store) = fixer(&sink);
        fixer.set_enabled(true);
        fixer
            .pending()
            .push(PendingSend::new("u_peer", r#"[{"1": {"1": "hello"}}, {"1": {"1": "world"}}]"#));

        let (tree, envelope) = ack();
        fixer.on_handle(Some(&tree), &envelope).unwrap();

        let packets = sink.packets();
        assert_eq!(packets.len(), 2);
        assert!(packets
            .iter()
            .all(|(command, _)| command == crate::config::DEFAULT_PUSH_COMMAND));

        let trees = sink.trees();
        assert_eq!(trees[0].at("1.3.2.1.1").and_then(TreeValue::as_str), Some("u_peer"));
        assert_eq!(trees[0].at("1.2.6").and_then(TreeValue::as_i64), Some(1_700_000_000));

        let message = &trees[1];
        assert_eq!(message.at("1.2.5").and_then(TreeValue::as_i64), Some(1_000_000));
        assert_eq!(message.at("1.2.11").and_then(TreeValue::as_i64), Some(4242));
        let elements = message.at("1.3.1.2").and_then(TreeValue::as_sequence).unwrap();
        assert_eq!(elements.len(), 4);
        assert_eq!(elements[3].at("1.1").and_then(TreeValue::as_str), Some("world"));

        assert!(fixer.pending().is_empty());
        assert_eq!(store.get_int("packet.sequence"), Some(1_000_001));
    }

    #[test]
    fn skips_when_disabled_or_group() {
        let sink = Arc::new(RecordingSink::default());
        let (fixer, _) = fixer(&sink);
        let (tree, envelope) = ack();

        fixer.pending().push(PendingSend::new("u_peer", "{}"));
        fixer.on_handle(Some(&tree), &envelope).unwrap();
        assert!(sink.packets().is_empty());

        fixer.set_enabled(true);
        fixer.pending().push(PendingSend::new("123456", "{}"));
        fixer.on_handle(Some(&tree), &envelope).unwrap();
        assert!(sink.packets().is_empty());
        // the group send is consumed, the earlier user send stays queued
        assert_eq!(fixer.pending().len(), 1);
        assert_eq!(fixer.pending().last().map(|send| send.peer_id), Some("u_peer".to_string()));
    }

    /// Accepts the first packet and rejects every later one.
    #[derive(Default)]
    struct FirstOnlySink {
        accepted: AtomicUsize,
    }

    impl PushSink for FirstOnlySink {
        fn push(&self, _command: &str, _payload: &[u8], _extra: PushExtraInfo) -> Result<()> {
            if self.accepted.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(())
            } else {
                Err(crate::Error::Error("push rejected".to_string()))
            }
        }
    }

    #[test]
    fn failed_injection_is_not_replayed() {
        let sink = Arc::new(FirstOnlySink::default());
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        let fixer = SendDisplayFixer::new(
            Arc::new(PendingSends::new()),
            Arc::new(FixedIdentity),
            Injector::new(sink.clone()),
            Arc::new(PacketCounter::load(store, "packet.sequence", 1_000_000)),
        );
        fixer.set_enabled(true);
        fixer.pending().push(PendingSend::new("u_peer", r#"{"1": {"1": "hi"}}"#));

        let (tree, envelope) = ack();
        assert!(fixer.on_handle(Some(&tree), &envelope).is_err());
        assert!(fixer.pending().is_empty());

        fixer.on_handle(Some(&tree), &envelope).unwrap();
        assert_eq!(sink.accepted.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn scalar_content_is_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let (fixer, _) = fixer(&sink);
        fixer.set_enabled(true);
        fixer.pending().push(PendingSend::new("u_peer", "42"));

        let (tree, envelope) = ack();
        assert!(matches!(
            fixer.on_handle(Some(&tree), &envelope),
            Err(crate::Error::UnsupportedContentType(_))
        ));
        assert_eq!(fixer.pending().len(), 1);
        assert!(sink.packets().is_empty());
    }
}

//! The response handlers shipped with the pipeline.
//!
//! Each handler is bound to one command name and implements
//! [`crate::dispatch::RespHandler`]:
//!
//! | Command                                                   | Handler              |
//! |-----------------------------------------------------------|----------------------|
//! | `OidbSvcTrpcTcp.0x9067_202`                               | [`RKeyCapture`]      |
//! | `MessageSvc.PbSendMsg`                                    | [`SendDisplayFixer`] |
//! | `MessageSvc.PbGetGroupMsg`                                | [`GroupMsgOpener`]   |
//! | `MessageSvc.PbGetOneDayRoamMsg`                           | [`FetchViewer`]      |
//! | `trpc.group.long_msg_interface.MsgService.SsoSendLongMsg` | [`LongMsgProducer`]  |
//!
//! The handlers own no host objects. What they need from the embedding application
//! comes in through small traits ([`HostIdentity`], [`ContentComposer`]) and the
//! shared [`crate::ui::Ui`], [`crate::inject::Injector`] and [`crate::store::ConfigStore`].

mod decrypt;
mod fetch;
mod longmsg;
mod rkey;
mod sendfix;

pub use decrypt::{DecryptRequest, GroupMsgOpener, TextOverrides, DEFAULT_PASSPHRASE, PASSPHRASE_KEY};
pub use fetch::FetchViewer;
pub use longmsg::{ComposeRequest, ComposeSlot, ContentComposer, LongMsgProducer};
pub use rkey::{RKeyCache, RKeyCapture};
pub use sendfix::{HostIdentity, PendingSend, PendingSends, SendDisplayFixer};

use crate::tree::TreeValue;

/// Media download key refresh.
pub const RKEY_COMMAND: &str = "OidbSvcTrpcTcp.0x9067_202";

/// Acknowledgement of an outgoing message.
pub const SEND_MSG_COMMAND: &str = "MessageSvc.PbSendMsg";

/// Group message fetch.
pub const GROUP_MSG_COMMAND: &str = "MessageSvc.PbGetGroupMsg";

/// One-day roaming message fetch.
pub const ROAM_MSG_COMMAND: &str = "MessageSvc.PbGetOneDayRoamMsg";

/// Long message upload.
pub const LONG_MSG_COMMAND: &str = "trpc.group.long_msg_interface.MsgService.SsoSendLongMsg";

/// Element `index` of the repeated field at `path`, then `rest` below it.
///
/// A repeated field seen once on the wire decodes without a sequence wrapper, so the
/// element lookup goes through [`TreeValue::as_repeated`].
pub(crate) fn repeated_at<'a>(
    tree: &'a TreeValue,
    path: &str,
    index: usize,
    rest: &str,
) -> Option<&'a TreeValue> {
    tree.at(path)?.as_repeated().get(index)?.at(rest)
}

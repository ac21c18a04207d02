//! Adaptive discovery of host interception points.
//!
//! The host is obfuscated and its internal layout changes with every release, so
//! interception points are described by what they look like rather than by name.
//! A [`BindingTarget`] lists candidate classes and a structural [`MemberShape`];
//! the [`BindingResolver`] probes the candidates through a [`MetadataProvider`],
//! caches the first success for the process lifetime and persists it per host
//! version so later starts skip probing.
//!
//! # Key Components
//!
//! - [`types`] - JVM type model: descriptors, members, modifiers
//! - [`metadata`] - The probing boundary and a table-backed provider
//! - [`target`] - Declarative shapes of sought members
//! - [`resolver`] - Cached, persisted, exact-then-relaxed resolution
//!
//! The functions in this module build the targets the pipeline itself needs.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use wirescope::binding::{self, BindingResolver, StaticMetadata, MetadataProvider};
//! use wirescope::config::ResolverConfig;
//!
//! let table = r#"{"classes": [{"name": "mqq.app.msghandle.MsgRespHandler", "methods": [
//!     {"name": "dispatchRespMsg", "descriptor": "(Lmqq/app/MainService;Lmqq/app/RespPair;)V", "modifiers": 1}
//! ]}]}"#;
//! let provider: Arc<dyn MetadataProvider> = Arc::new(StaticMetadata::from_json(table)?);
//! let resolver = BindingResolver::new(provider, ResolverConfig::for_host("9.0.0"));
//!
//! let dispatch = resolver.require(&binding::dispatch_target())?;
//! assert_eq!(binding::envelope_class(&dispatch), Some("mqq.app.RespPair"));
//! # Ok::<(), wirescope::Error>(())
//! ```

pub mod metadata;
pub mod resolver;
pub mod target;
pub mod types;

pub use metadata::{MetadataProvider, StaticMetadata};
pub use resolver::{BindingResolver, Member, MemberHandle, ResolvedBinding, ResolverStats};
pub use target::{BindingTarget, Marker, MemberShape, TypeMatcher};
pub use types::{ClassInfo, FieldInfo, MethodInfo, Modifiers, Primitive, TypeSig};

/// Capability id of the inbound dispatch function.
pub const DISPATCH: &str = "dispatch_resp_msg";
/// Capability id of the outbound record field of the envelope.
pub const OUTBOUND_RECORD: &str = "envelope_outbound";
/// Capability id of the inbound record field of the envelope.
pub const INBOUND_RECORD: &str = "envelope_inbound";
/// Capability id of the message bubble update method.
pub const MSG_VIEW_UPDATE: &str = "msg_view_update";
/// Capability id of the menu component's message accessor.
pub const MENU_MESSAGE: &str = "menu_message_item";
/// Capability id of the menu component's abstract item list accessor.
pub const MENU_ITEMS: &str = "menu_item_list";

const DISPATCH_CLASS: &str = "mqq.app.msghandle.MsgRespHandler";
const BUBBLE_VB_CLASS: &str = "com.tencent.mobileqq.aio.msglist.holder.AIOBubbleMsgItemVB";
const CONTENT_COMPONENT_CLASS: &str =
    "com.tencent.mobileqq.aio.msglist.holder.component.BaseContentComponent";
const MSG_ITEM_CLASS: &str = "com.tencent.mobileqq.aio.msg.AIOMsgItem";

/// The function through which the host hands every inbound response to its handlers.
///
/// Parameter types are not pinned; the envelope is the second argument.
#[must_use]
pub fn dispatch_target() -> BindingTarget {
    BindingTarget::method(DISPATCH)
        .in_class(DISPATCH_CLASS)
        .named("dispatchRespMsg")
        .forbids(Modifiers::ABSTRACT)
}

/// The class of the envelope argument of a resolved dispatch function.
#[must_use]
pub fn envelope_class(dispatch: &MemberHandle) -> Option<&str> {
    match &dispatch.member {
        Member::Method(method) => method.params.get(1).and_then(TypeSig::class_name),
        Member::Field(_) => None,
    }
}

/// The outbound record (`toServiceMsg`) field of the envelope class.
#[must_use]
pub fn outbound_record_target(envelope_class: &str) -> BindingTarget {
    BindingTarget::field(OUTBOUND_RECORD)
        .in_class(envelope_class)
        .named("toServiceMsg")
        .forbids(Modifiers::STATIC)
        .inherited()
}

/// The inbound record (`fromServiceMsg`) field of the envelope class.
#[must_use]
pub fn inbound_record_target(envelope_class: &str) -> BindingTarget {
    BindingTarget::field(INBOUND_RECORD)
        .in_class(envelope_class)
        .named("fromServiceMsg")
        .forbids(Modifiers::STATIC)
        .inherited()
}

/// The bubble update method: `void` with four parameters among which a `Bundle`, a
/// `List` and, on most host versions, an `int`.
#[must_use]
pub fn msg_view_update_target() -> BindingTarget {
    BindingTarget::method(MSG_VIEW_UPDATE)
        .in_class(BUBBLE_VB_CLASS)
        .returns(TypeMatcher::void())
        .param_count(4)
        .optional_marker(TypeMatcher::IntOrBoxed)
        .marker(TypeMatcher::exact("android.os.Bundle"))
        .marker(TypeMatcher::assignable("java.util.List"))
}

/// The no-argument accessor returning the message item of a content component.
#[must_use]
pub fn menu_message_target() -> BindingTarget {
    BindingTarget::method(MENU_MESSAGE)
        .in_class(CONTENT_COMPONENT_CLASS)
        .returns(TypeMatcher::exact(MSG_ITEM_CLASS))
        .param_count(0)
}

/// The abstract no-argument method returning the menu item list of a content component.
#[must_use]
pub fn menu_items_target() -> BindingTarget {
    BindingTarget::method(MENU_ITEMS)
        .in_class(CONTENT_COMPONENT_CLASS)
        .returns(TypeMatcher::exact("java.util.List"))
        .param_count(0)
        .requires(Modifiers::ABSTRACT)
}

/// Every target whose location does not depend on another resolution.
#[must_use]
pub fn catalog() -> Vec<BindingTarget> {
    vec![
        dispatch_target(),
        msg_view_update_target(),
        menu_message_target(),
        menu_items_target(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique() {
        let mut ids: Vec<String> = catalog().iter().map(|t| t.id().to_string()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn envelope_class_from_dispatch() {
        let handle = MemberHandle {
            capability: DISPATCH.to_string(),
            class_name: DISPATCH_CLASS.to_string(),
            member: Member::Method(
                MethodInfo::from_descriptor(
                    "dispatchRespMsg",
                    "(Lmqq/app/MainService;Lmqq/app/RespPair;)V",
                    Modifiers::PUBLIC,
                )
                .unwrap(),
            ),
        };
        assert_eq!(envelope_class(&handle), Some("mqq.app.RespPair"));
        assert_eq!(
            outbound_record_target("mqq.app.RespPair").candidates(),
            ["mqq.app.RespPair".to_string()]
        );
    }
}

//! Lazy, cached resolution of [`BindingTarget`]s against host metadata.
//!
//! Resolution order for a capability:
//!
//! 1. The process cache (first success is kept for the process lifetime)
//! 2. A persisted `(host version, member descriptor)` record in the [`ConfigStore`]
//! 3. The exact probe over every candidate class
//! 4. The relaxed probe, dropping one optional marker at a time
//!
//! Failures are never cached, so a later call may still succeed once more metadata
//! is available.

use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};

use crate::{
    binding::{
        metadata::MetadataProvider,
        target::{BindingTarget, MemberShape},
        types::{ClassInfo, FieldInfo, MethodInfo},
    },
    config::ResolverConfig,
    store::ConfigStore,
    Error, Result,
};

/// The located member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// A method
    Method(MethodInfo),
    /// A field
    Field(FieldInfo),
}

impl Member {
    /// Declared member name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Member::Method(method) => &method.name,
            Member::Field(field) => &field.name,
        }
    }

    /// Method descriptor or field type descriptor.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            Member::Method(method) => method.descriptor(),
            Member::Field(field) => field.field_type.descriptor(),
        }
    }
}

/// A resolved host capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberHandle {
    /// Capability id of the target this resolves
    pub capability: String,
    /// Class declaring the member
    pub class_name: String,
    /// The member itself
    pub member: Member,
}

impl MemberHandle {
    /// Fully qualified descriptor, `pkg.Class.name(params)ret` or `pkg.Class.name:type`.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match &self.member {
            Member::Method(method) => {
                format!("{}.{}{}", self.class_name, method.name, method.descriptor())
            }
            Member::Field(field) => format!(
                "{}.{}:{}",
                self.class_name,
                field.name,
                field.field_type.descriptor()
            ),
        }
    }
}

impl fmt::Display for MemberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.capability, self.descriptor())
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone)]
pub enum ResolvedBinding {
    /// The capability was located
    Resolved(Arc<MemberHandle>),
    /// No candidate matched; the dependent feature is skipped
    Unresolved,
}

impl ResolvedBinding {
    /// Returns `true` if the capability was located.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolvedBinding::Resolved(_))
    }

    /// The handle, if resolved.
    #[must_use]
    pub fn handle(&self) -> Option<&Arc<MemberHandle>> {
        match self {
            ResolvedBinding::Resolved(handle) => Some(handle),
            ResolvedBinding::Unresolved => None,
        }
    }
}

/// Diagnostic counters of a resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Structural probes run (exact and relaxed passes count once together)
    pub probes: usize,
    /// Resolutions answered from the process cache
    pub cache_hits: usize,
    /// Resolutions answered from a persisted record
    pub persisted_hits: usize,
    /// Resolutions that ended `Unresolved`
    pub failures: usize,
}

#[derive(Serialize, Deserialize)]
struct PersistedBinding {
    host_version: String,
    class: String,
    name: String,
    descriptor: String,
}

/// Resolves binding targets through a [`MetadataProvider`].
pub struct BindingResolver {
    provider: Arc<dyn MetadataProvider>,
    store: Option<Arc<dyn ConfigStore>>,
    config: ResolverConfig,
    cache: DashMap<String, Arc<MemberHandle>>,
    probes: AtomicUsize,
    cache_hits: AtomicUsize,
    persisted_hits: AtomicUsize,
    failures: AtomicUsize,
}

impl BindingResolver {
    /// Create a resolver without persistence.
    #[must_use]
    pub fn new(provider: Arc<dyn MetadataProvider>, config: ResolverConfig) -> Self {
        BindingResolver {
            provider,
            store: None,
            config,
            cache: DashMap::new(),
            probes: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            persisted_hits: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Persist resolutions into `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The metadata provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn MetadataProvider> {
        &self.provider
    }

    /// Snapshot of the diagnostic counters.
    #[must_use]
    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            probes: self.probes.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            persisted_hits: self.persisted_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// The cached handle for a capability id, without resolving.
    #[must_use]
    pub fn cached(&self, id: &str) -> Option<Arc<MemberHandle>> {
        self.cache.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Resolve a target. Repeated calls for a resolved capability return the same `Arc`.
    pub fn resolve(&self, target: &BindingTarget) -> ResolvedBinding {
        if let Some(handle) = self.cached(target.id()) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return ResolvedBinding::Resolved(handle);
        }

        // Probing and store I/O run without a cache guard; the first handle inserted
        // wins and every caller shares it.
        let (handle, restored) = match self.restore(target) {
            Some(handle) => (handle, true),
            None => match self.probe(target) {
                Some(handle) => (handle, false),
                None => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    log::warn!(
                        "[binding] unable to resolve '{}' ({}); candidates: {}",
                        target.id(),
                        target.shape(),
                        self.candidate_signatures(target)
                    );
                    return ResolvedBinding::Unresolved;
                }
            },
        };

        let winner = match self.cache.entry(target.id().to_string()) {
            Entry::Occupied(entry) => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                return ResolvedBinding::Resolved(Arc::clone(entry.get()));
            }
            Entry::Vacant(entry) => Arc::clone(entry.insert(handle).value()),
        };

        if restored {
            self.persisted_hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("[binding] restored {winner}");
        } else {
            log::info!("[binding] resolved {winner}");
            self.persist(&winner);
        }
        ResolvedBinding::Resolved(winner)
    }

    /// Resolve a target, turning failure into an error.
    ///
    /// # Errors
    /// Returns [`Error::Unresolved`] with the capability id.
    pub fn require(&self, target: &BindingTarget) -> Result<Arc<MemberHandle>> {
        match self.resolve(target) {
            ResolvedBinding::Resolved(handle) => Ok(handle),
            ResolvedBinding::Unresolved => Err(Error::Unresolved(target.id().to_string())),
        }
    }

    fn store_key(&self, id: &str) -> String {
        format!("{}{id}", self.config.key_prefix)
    }

    fn restore(&self, target: &BindingTarget) -> Option<Arc<MemberHandle>> {
        let store = self.store.as_ref()?;
        let raw = store.get_string(&self.store_key(target.id()))?;
        let record: PersistedBinding = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(error) => {
                log::debug!("[binding] ignoring unreadable record for '{}': {error}", target.id());
                return None;
            }
        };

        if record.host_version != self.config.host_version {
            log::debug!(
                "[binding] record for '{}' is from host {} (running {}), re-resolving",
                target.id(),
                record.host_version,
                self.config.host_version
            );
            return None;
        }

        let class = self.provider.class(&record.class)?;
        let member = match target.shape() {
            MemberShape::Method { .. } => class
                .methods
                .iter()
                .find(|m| m.name == record.name && m.descriptor() == record.descriptor)
                .cloned()
                .map(Member::Method),
            MemberShape::Field { .. } => class
                .fields
                .iter()
                .find(|f| f.name == record.name && f.field_type.descriptor() == record.descriptor)
                .cloned()
                .map(Member::Field),
        }?;

        Some(Arc::new(MemberHandle {
            capability: target.id().to_string(),
            class_name: record.class,
            member,
        }))
    }

    fn persist(&self, handle: &MemberHandle) {
        if !self.config.persist {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };

        let record = PersistedBinding {
            host_version: self.config.host_version.clone(),
            class: handle.class_name.clone(),
            name: handle.member.name().to_string(),
            descriptor: handle.member.descriptor(),
        };
        let result = serde_json::to_string(&record)
            .map_err(Error::from)
            .and_then(|json| store.set_string(&self.store_key(&handle.capability), &json));
        if let Err(error) = result {
            log::warn!("[binding] failed to persist '{}': {error}", handle.capability);
        }
    }

    fn probe(&self, target: &BindingTarget) -> Option<Arc<MemberHandle>> {
        self.probes.fetch_add(1, Ordering::Relaxed);

        if let Some(handle) = self.probe_shape(target, target.shape()) {
            return Some(handle);
        }
        for shape in target.relaxed_shapes() {
            if let Some(handle) = self.probe_shape(target, &shape) {
                log::debug!("[binding] '{}' matched relaxed shape {shape}", target.id());
                return Some(handle);
            }
        }
        None
    }

    fn probe_shape(&self, target: &BindingTarget, shape: &MemberShape) -> Option<Arc<MemberHandle>> {
        let provider = self.provider.as_ref();
        for candidate in target.candidates() {
            let Some(class) = self.provider.class(candidate) else {
                log::debug!("[binding] candidate {candidate} not found");
                continue;
            };

            let found = match shape {
                MemberShape::Method { .. } => class
                    .methods
                    .iter()
                    .find(|method| shape.matches_method(method, provider))
                    .map(|method| (class.name.clone(), Member::Method(method.clone()))),
                MemberShape::Field { inherited, .. } => {
                    self.probe_field(&class, shape, *inherited)
                }
            };

            if let Some((class_name, member)) = found {
                return Some(Arc::new(MemberHandle {
                    capability: target.id().to_string(),
                    class_name,
                    member,
                }));
            }
        }
        None
    }

    fn probe_field(
        &self,
        class: &Arc<ClassInfo>,
        shape: &MemberShape,
        inherited: bool,
    ) -> Option<(String, Member)> {
        let provider = self.provider.as_ref();
        let mut seen = HashSet::new();
        let mut current = Some(Arc::clone(class));

        while let Some(class) = current {
            if !seen.insert(class.name.clone()) {
                break;
            }
            if let Some(field) = class
                .fields
                .iter()
                .find(|field| shape.matches_field(field, provider))
            {
                return Some((class.name.clone(), Member::Field(field.clone())));
            }
            if !inherited {
                break;
            }
            current = class
                .superclass
                .as_deref()
                .and_then(|name| self.provider.class(name));
        }
        None
    }

    fn candidate_signatures(&self, target: &BindingTarget) -> String {
        let signatures: Vec<String> = target
            .candidates()
            .iter()
            .map(|candidate| match self.provider.class(candidate) {
                None => format!("{candidate}: <missing>"),
                Some(class) => {
                    let members: Vec<String> = match target.shape() {
                        MemberShape::Method { .. } => {
                            class.methods.iter().map(ToString::to_string).collect()
                        }
                        MemberShape::Field { .. } => {
                            class.fields.iter().map(ToString::to_string).collect()
                        }
                    };
                    format!("{candidate}: [{}]", members.join("; "))
                }
            })
            .collect();
        signatures.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binding::{metadata::StaticMetadata, target::TypeMatcher, types::Modifiers},
        store::MemoryStore,
    };

    const VB: &str = "com.example.aio.BubbleItemVB";

    fn metadata() -> Arc<dyn MetadataProvider> {
        let table = r#"{"classes": [
            {"name": "com.example.aio.BubbleItemVB", "methods": [
                {"name": "a", "descriptor": "(Landroid/os/Bundle;)V", "modifiers": 1},
                {"name": "b", "descriptor": "(ZLandroid/os/Bundle;Ljava/util/List;Ljava/lang/Object;)V", "modifiers": 1},
                {"name": "c", "descriptor": "(ZLandroid/os/Bundle;Ljava/util/ArrayList;Ljava/lang/Object;)V", "modifiers": 1}
            ]},
            {"name": "com.example.Base", "fields": [
                {"name": "toServiceMsg", "descriptor": "Lcom/example/ToServiceMsg;", "modifiers": 1}
            ]},
            {"name": "com.example.Pair", "superclass": "com.example.Base"}
        ]}"#;
        Arc::new(StaticMetadata::from_json(table).unwrap())
    }

    fn view_update() -> BindingTarget {
        BindingTarget::method("msg_view_update")
            .in_class("com.example.Missing")
            .in_class(VB)
            .returns(TypeMatcher::void())
            .param_count(4)
            .optional_marker(TypeMatcher::IntOrBoxed)
            .marker(TypeMatcher::exact("android.os.Bundle"))
            .marker(TypeMatcher::assignable("java.util.List"))
    }

    #[test]
    fn relaxed_probe_and_first_declared_wins() {
        let resolver = BindingResolver::new(metadata(), ResolverConfig::for_host("9.0.0"));
        let handle = resolver.require(&view_update()).unwrap();
        assert_eq!(handle.class_name, VB);
        assert_eq!(handle.member.name(), "b");
        assert_eq!(
            handle.descriptor(),
            "com.example.aio.BubbleItemVB.b(ZLandroid/os/Bundle;Ljava/util/List;Ljava/lang/Object;)V"
        );
    }

    #[test]
    fn second_resolution_is_cached() {
        let resolver = BindingResolver::new(metadata(), ResolverConfig::default());
        let first = resolver.require(&view_update()).unwrap();
        let second = resolver.require(&view_update()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = resolver.stats();
        assert_eq!(stats.probes, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    /// Looks into the resolver's cache while a resolution is in flight.
    struct ReentrantMetadata {
        inner: Arc<dyn MetadataProvider>,
        resolver: std::sync::OnceLock<std::sync::Weak<BindingResolver>>,
        lookups: AtomicUsize,
    }

    impl MetadataProvider for ReentrantMetadata {
        fn class(&self, name: &str) -> Option<Arc<ClassInfo>> {
            if let Some(resolver) = self.resolver.get().and_then(std::sync::Weak::upgrade) {
                assert!(resolver.cached("msg_view_update").is_none());
                self.lookups.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.class(name)
        }
    }

    #[test]
    fn resolution_holds_no_cache_guard() {
        let provider = Arc::new(ReentrantMetadata {
            inner: metadata(),
            resolver: std::sync::OnceLock::new(),
            lookups: AtomicUsize::new(0),
        });
        let resolver = Arc::new(
            BindingResolver::new(provider.clone(), ResolverConfig::for_host("9.0.0"))
                .with_store(Arc::new(MemoryStore::new())),
        );
        assert!(provider.resolver.set(Arc::downgrade(&resolver)).is_ok());

        let handle = resolver.require(&view_update()).unwrap();
        assert!(provider.lookups.load(Ordering::SeqCst) > 0);
        assert!(Arc::ptr_eq(&handle, &resolver.cached("msg_view_update").unwrap()));
    }

    #[test]
    fn failures_are_not_cached() {
        let resolver = BindingResolver::new(metadata(), ResolverConfig::default());
        let target = BindingTarget::method("nothing")
            .in_class(VB)
            .returns(TypeMatcher::exact("int"));
        assert!(!resolver.resolve(&target).is_resolved());
        assert!(matches!(resolver.require(&target), Err(Error::Unresolved(id)) if id == "nothing"));
        assert_eq!(resolver.stats().probes, 2);
        assert_eq!(resolver.stats().failures, 2);
        assert!(resolver.cached("nothing").is_none());
    }

    #[test]
    fn persisted_record_respects_host_version() {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
        let first = BindingResolver::new(metadata(), ResolverConfig::for_host("9.0.0"))
            .with_store(Arc::clone(&store));
        first.require(&view_update()).unwrap();
        assert!(store.get_string("binding.msg_view_update").is_some());

        let same = BindingResolver::new(metadata(), ResolverConfig::for_host("9.0.0"))
            .with_store(Arc::clone(&store));
        assert_eq!(same.require(&view_update()).unwrap().member.name(), "b");
        assert_eq!(same.stats().persisted_hits, 1);
        assert_eq!(same.stats().probes, 0);

        let upgraded = BindingResolver::new(metadata(), ResolverConfig::for_host("9.1.0"))
            .with_store(Arc::clone(&store));
        upgraded.require(&view_update()).unwrap();
        assert_eq!(upgraded.stats().persisted_hits, 0);
        assert_eq!(upgraded.stats().probes, 1);
    }

    #[test]
    fn inherited_fields() {
        let resolver = BindingResolver::new(metadata(), ResolverConfig::default());
        let own = BindingTarget::field("to_service")
            .in_class("com.example.Pair")
            .named("toServiceMsg")
            .forbids(Modifiers::STATIC);
        assert!(!resolver.resolve(&own).is_resolved());

        let inherited = own.clone().inherited();
        let handle = resolver.require(&inherited).unwrap();
        assert_eq!(handle.class_name, "com.example.Base");
        assert_eq!(
            handle.descriptor(),
            "com.example.Base.toServiceMsg:Lcom/example/ToServiceMsg;"
        );
    }
}

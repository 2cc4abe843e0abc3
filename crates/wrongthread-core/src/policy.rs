//! Eligibility policy: pure predicate logic deciding, per attribute, whether
//! interception is safe and meaningful.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cache::InterceptCache;
use crate::callable::Callable;
use crate::surface::{ClassDef, Namespace};

/// The owner of an attribute under consideration.
#[derive(Debug, Clone, Copy)]
pub enum OwnerRef<'a> {
    Namespace(&'a Namespace),
    Class(&'a ClassDef),
}

impl OwnerRef<'_> {
    /// Stable identity used for cache lookups.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match self {
            Self::Namespace(ns) => ns.name().to_string(),
            Self::Class(class) => class.qualified_name(),
        }
    }

    /// Namespace path the owner is defined in, matched against the allow-list.
    #[must_use]
    pub fn defining_module(&self) -> &str {
        match self {
            Self::Namespace(ns) => ns.name(),
            Self::Class(class) => class.module(),
        }
    }
}

/// A policy-level view of an attribute value.
#[derive(Clone)]
pub enum AttrView<'a> {
    Callable(&'a Arc<dyn Callable>),
    /// Declared-safe signal/event-emission primitive.
    Signal,
    Class(&'a ClassDef),
    /// Namespace/module re-export.
    Namespace,
}

/// Default defensive ban-list: attribute-access protocol members,
/// identity/representation members, declared-thread-safe primitives, and
/// thread-safe-by-design class names.
#[must_use]
pub fn default_ban_list() -> BTreeSet<String> {
    [
        "init",
        "repr",
        "hash",
        "getattr",
        "setattr",
        "emit",        // safe by the framework's own contract
        "single_shot", // safe by the framework's own contract
        "Thread",
        "MutexLocker",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Allow-list of namespace prefixes plus ban-list of attribute names.
///
/// Membership rules are configuration, not fixed semantics; the ban-list
/// always overrides the allow-list.
#[derive(Debug, Clone)]
pub struct InterceptPolicy {
    allow_prefixes: Vec<String>,
    ban_list: BTreeSet<String>,
}

impl InterceptPolicy {
    #[must_use]
    pub fn new(
        allow_prefixes: impl IntoIterator<Item = impl Into<String>>,
        ban_list: BTreeSet<String>,
    ) -> Self {
        Self {
            allow_prefixes: allow_prefixes.into_iter().map(Into::into).collect(),
            ban_list,
        }
    }

    /// Policy with the given allow-list and the default defensive ban-list.
    #[must_use]
    pub fn with_default_bans(
        allow_prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(allow_prefixes, default_ban_list())
    }

    #[must_use]
    pub fn ban_list(&self) -> &BTreeSet<String> {
        &self.ban_list
    }

    /// Whether a defining namespace path is covered by the allow-list.
    #[must_use]
    pub fn allows_module(&self, module: &str) -> bool {
        self.allow_prefixes
            .iter()
            .any(|prefix| module.starts_with(prefix.as_str()))
    }

    /// Decide whether `(owner, attr, value)` is a candidate for interception.
    ///
    /// Pure function of its inputs and the cache's current contents. Rules,
    /// in order: ban-list, allow-list, cache idempotence, declared-safe
    /// signal, namespace re-export, class capability marker, callable.
    #[must_use]
    pub fn should_intercept(
        &self,
        owner: &OwnerRef<'_>,
        attr: &str,
        value: &AttrView<'_>,
        cache: &InterceptCache,
    ) -> bool {
        if self.ban_list.contains(attr) {
            return false;
        }
        if !self.allows_module(owner.defining_module()) {
            return false;
        }
        if cache.contains(&owner.qualified_name(), attr) {
            return false;
        }
        match value {
            AttrView::Signal => false,
            AttrView::Namespace => false,
            AttrView::Class(class) => class.affinity_marker(),
            AttrView::Callable(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::NativeFn;
    use crate::cache::PatchOutcome;
    use crate::value::Value;

    fn policy() -> InterceptPolicy {
        InterceptPolicy::with_default_bans(["toolkit"])
    }

    fn noop() -> Arc<dyn Callable> {
        Arc::new(NativeFn::new("noop", |_| Ok(Value::Null)))
    }

    #[test]
    fn ban_list_overrides_everything() {
        let policy = policy();
        let cache = InterceptCache::new();
        let class = ClassDef::new("toolkit.widgets", "Widget", true);
        let callable = noop();
        for banned in policy.ban_list().clone() {
            assert!(!policy.should_intercept(
                &OwnerRef::Class(&class),
                &banned,
                &AttrView::Callable(&callable),
                &cache,
            ));
        }
    }

    #[test]
    fn owner_outside_allow_list_is_rejected() {
        let policy = policy();
        let cache = InterceptCache::new();
        let class = ClassDef::new("vendor.ffi", "Buffer", true);
        let callable = noop();
        assert!(!policy.should_intercept(
            &OwnerRef::Class(&class),
            "write",
            &AttrView::Callable(&callable),
            &cache,
        ));
    }

    #[test]
    fn cached_attribute_is_never_reconsidered() {
        let policy = policy();
        let cache = InterceptCache::new();
        let class = ClassDef::new("toolkit.widgets", "Widget", true);
        let callable = noop();
        let owner = OwnerRef::Class(&class);
        assert!(policy.should_intercept(&owner, "set_text", &AttrView::Callable(&callable), &cache));
        cache.record(&owner.qualified_name(), "set_text", PatchOutcome::Wrapped);
        assert!(!policy.should_intercept(&owner, "set_text", &AttrView::Callable(&callable), &cache));
    }

    #[test]
    fn signals_and_reexports_are_rejected() {
        let policy = policy();
        let cache = InterceptCache::new();
        let class = ClassDef::new("toolkit.widgets", "Widget", true);
        let owner = OwnerRef::Class(&class);
        assert!(!policy.should_intercept(&owner, "clicked", &AttrView::Signal, &cache));
        assert!(!policy.should_intercept(&owner, "widgets", &AttrView::Namespace, &cache));
    }

    #[test]
    fn class_eligibility_requires_affinity_marker() {
        let policy = policy();
        let cache = InterceptCache::new();
        let ns = Namespace::new("toolkit.widgets");
        let owner = OwnerRef::Namespace(&ns);
        let marked = ClassDef::new("toolkit.widgets", "Widget", true);
        let unmarked = ClassDef::new("toolkit.widgets", "Palette", false);
        assert!(policy.should_intercept(&owner, "Widget", &AttrView::Class(&marked), &cache));
        assert!(!policy.should_intercept(&owner, "Palette", &AttrView::Class(&unmarked), &cache));
    }
}

//! Traversal engine and the process-scoped interception context.
//!
//! Installation runs once, single-threaded, before the target program or any
//! worker thread starts. The interception cache makes repeated installs
//! idempotent, and a wrap failure for one member is never fatal to the pass.

use std::fmt;
use std::sync::Arc;

use crate::cache::{InterceptCache, PatchOutcome};
use crate::dispatch::{MessageHeuristic, MismatchHeuristic};
use crate::guard::{DesignatedThread, DiagnosticSink, ThreadGuard};
use crate::policy::{AttrView, InterceptPolicy, OwnerRef};
use crate::proxy::WrappedDescriptor;
use crate::surface::{ClassAttr, ClassDef, Member, Namespace, TargetSurface};

/// Result of one installation pass.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Qualified paths of attributes that received a proxy.
    pub wrapped: Vec<String>,
    /// Qualified path plus failure reason for every wrap failure.
    pub failed: Vec<(String, String)>,
    /// Number of classes newly visited by this pass.
    pub visited_classes: usize,
}

impl InstallReport {
    #[must_use]
    pub fn wrapped_count(&self) -> usize {
        self.wrapped.len()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wrapped {} attribute(s) across {} class(es), {} wrap failure(s)",
            self.wrapped.len(),
            self.visited_classes,
            self.failed.len()
        )
    }
}

/// Process-scoped interception context: policy, cache, guard, and the
/// dispatch heuristic, constructed once at startup and passed explicitly.
pub struct Interceptor {
    policy: InterceptPolicy,
    cache: InterceptCache,
    guard: Arc<ThreadGuard>,
    heuristic: Arc<dyn MismatchHeuristic>,
}

impl Interceptor {
    /// Build a context whose designated thread is the current one.
    #[must_use]
    pub fn new(policy: InterceptPolicy, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self::with_heuristic(policy, sink, Arc::new(MessageHeuristic::default()))
    }

    #[must_use]
    pub fn with_heuristic(
        policy: InterceptPolicy,
        sink: Arc<dyn DiagnosticSink>,
        heuristic: Arc<dyn MismatchHeuristic>,
    ) -> Self {
        let guard = Arc::new(ThreadGuard::new(DesignatedThread::current(), sink));
        Self {
            policy,
            cache: InterceptCache::new(),
            guard,
            heuristic,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &InterceptCache {
        &self.cache
    }

    #[must_use]
    pub fn guard(&self) -> &Arc<ThreadGuard> {
        &self.guard
    }

    /// Walk the declared root namespaces and wrap every eligible callable.
    ///
    /// Idempotent: attributes already recorded in the cache are skipped, so a
    /// second pass wraps nothing new.
    pub fn install(&self, surface: &TargetSurface) -> InstallReport {
        let mut report = InstallReport::default();
        for namespace in surface.namespaces() {
            self.visit_namespace(namespace, &mut report);
        }
        report
    }

    fn visit_namespace(&self, namespace: &Arc<Namespace>, report: &mut InstallReport) {
        let owner = OwnerRef::Namespace(namespace);
        for (name, member) in namespace.members_snapshot() {
            match member {
                Member::Class(class) => {
                    let view = AttrView::Class(&class);
                    if self.policy.should_intercept(&owner, &name, &view, &self.cache) {
                        self.visit_class(&class, report);
                    }
                }
                Member::Callable(slot) => {
                    let view = AttrView::Callable(&slot.callable);
                    if !self.policy.should_intercept(&owner, &name, &view, &self.cache) {
                        continue;
                    }
                    let proxy = WrappedDescriptor::new(
                        None,
                        name.clone(),
                        slot.callable,
                        Arc::clone(&self.guard),
                        Arc::clone(&self.heuristic),
                    );
                    let path = format!("{}.{name}", namespace.name());
                    match namespace.replace_callable(&name, Arc::new(proxy)) {
                        Ok(()) => {
                            self.cache.record(namespace.name(), &name, PatchOutcome::Wrapped);
                            report.wrapped.push(path);
                        }
                        Err(err) => {
                            self.cache.record(namespace.name(), &name, PatchOutcome::Failed);
                            report.failed.push((path, err.to_string()));
                        }
                    }
                }
                Member::Reexport(_) => {
                    // Re-exports are never descended into; nothing to record.
                }
            }
        }
    }

    fn visit_class(&self, class: &Arc<ClassDef>, report: &mut InstallReport) {
        let qualified = class.qualified_name();
        if !self.cache.mark_class_visited(&qualified) {
            return;
        }
        report.visited_classes += 1;

        let owner = OwnerRef::Class(class);
        for (attr, value) in class.attrs_snapshot() {
            match value {
                ClassAttr::Method(slot) => {
                    let view = AttrView::Callable(&slot.callable);
                    if !self.policy.should_intercept(&owner, &attr, &view, &self.cache) {
                        continue;
                    }
                    let proxy = WrappedDescriptor::new(
                        Some(Arc::clone(class)),
                        attr.clone(),
                        slot.callable,
                        Arc::clone(&self.guard),
                        Arc::clone(&self.heuristic),
                    );
                    let path = format!("{qualified}.{attr}");
                    match class.replace_method(&attr, Arc::new(proxy)) {
                        Ok(()) => {
                            self.cache.record(&qualified, &attr, PatchOutcome::Wrapped);
                            report.wrapped.push(path);
                        }
                        Err(err) => {
                            self.cache.record(&qualified, &attr, PatchOutcome::Failed);
                            report.failed.push((path, err.to_string()));
                        }
                    }
                }
                ClassAttr::Nested(nested) => {
                    let view = AttrView::Class(&nested);
                    if self.policy.should_intercept(&owner, &attr, &view, &self.cache) {
                        self.visit_class(&nested, report);
                    }
                }
                ClassAttr::Signal(_) => {
                    // Declared-safe emission primitives stay untouched.
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::{Callable, NativeFn};
    use crate::errors::CallError;
    use crate::guard::MemorySink;
    use crate::surface::Instance;
    use crate::value::Value;
    use std::collections::BTreeMap;

    fn policy() -> InterceptPolicy {
        InterceptPolicy::with_default_bans(["toolkit"])
    }

    fn set_text() -> Arc<dyn Callable> {
        Arc::new(NativeFn::new("set_text", |call| {
            match (call.receiver.as_ref(), call.positional.first()) {
                (Some(_), Some(Value::Str(text))) => Ok(Value::Str(text.clone())),
                _ => Err(CallError::raised("set_text", "bad call shape")),
            }
        }))
    }

    fn widget_class() -> Arc<ClassDef> {
        let class = ClassDef::new("toolkit.widgets", "Widget", true);
        class.define_native_method(set_text(), true);
        class.define_native_method(
            Arc::new(NativeFn::new("init", |_| Ok(Value::Null))),
            true,
        );
        class
    }

    fn surface_with(class: Arc<ClassDef>) -> TargetSurface {
        let ns = Namespace::new("toolkit.widgets");
        ns.define_class(class);
        TargetSurface::new(vec![ns])
    }

    #[test]
    fn install_wraps_eligible_methods_and_skips_banned_ones() {
        let sink = Arc::new(MemorySink::new());
        let interceptor = Interceptor::new(policy(), sink);
        let class = widget_class();
        let report = interceptor.install(&surface_with(class.clone()));

        assert_eq!(report.wrapped, vec!["toolkit.widgets.Widget.set_text".to_string()]);
        assert!(report.failed.is_empty());
        assert!(interceptor.cache().contains("toolkit.widgets.Widget", "set_text"));
        assert!(!interceptor.cache().contains("toolkit.widgets.Widget", "init"));
    }

    #[test]
    fn install_twice_wraps_nothing_new() {
        let sink = Arc::new(MemorySink::new());
        let interceptor = Interceptor::new(policy(), sink);
        let class = widget_class();
        let surface = surface_with(class);

        let first = interceptor.install(&surface);
        let second = interceptor.install(&surface);
        assert_eq!(first.wrapped_count(), 1);
        assert_eq!(second.wrapped_count(), 0);
        assert_eq!(second.visited_classes, 0);
        assert_eq!(interceptor.cache().len(), 1);
    }

    #[test]
    fn wrap_failure_is_recorded_and_never_fatal() {
        let sink = Arc::new(MemorySink::new());
        let interceptor = Interceptor::new(policy(), sink);
        let class = ClassDef::new("toolkit.widgets", "Widget", true);
        class.define_method(
            Arc::new(NativeFn::new("repaint", |_| Ok(Value::Null))),
            false,
        );
        class.define_native_method(set_text(), true);

        let report = interceptor.install(&surface_with(class));
        assert_eq!(report.wrapped, vec!["toolkit.widgets.Widget.set_text".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("Widget.repaint"));
        assert_eq!(
            interceptor.cache().outcome("toolkit.widgets.Widget", "repaint"),
            Some(PatchOutcome::Failed)
        );
    }

    #[test]
    fn cyclic_class_graph_terminates_with_each_class_visited_once() {
        let sink = Arc::new(MemorySink::new());
        let interceptor = Interceptor::new(policy(), sink);

        let widget = widget_class();
        let label = ClassDef::new("toolkit.widgets", "Label", true);
        label.define_native_method(set_text(), true);
        widget.define_nested("label_class", Arc::clone(&label));
        label.define_nested("widget_class", Arc::clone(&widget));

        let report = interceptor.install(&surface_with(widget));
        assert_eq!(report.visited_classes, 2);
        assert!(interceptor.cache().class_visited("toolkit.widgets.Widget"));
        assert!(interceptor.cache().class_visited("toolkit.widgets.Label"));
    }

    #[test]
    fn wrapped_call_reports_violation_off_thread_and_forwards_result() {
        let sink = Arc::new(MemorySink::new());
        let interceptor = Interceptor::new(policy(), sink.clone());
        let class = widget_class();
        interceptor.install(&surface_with(class.clone()));

        // Designated thread: transparent, no diagnostic.
        let instance = Instance::new(Arc::clone(&class), "w");
        let result = instance
            .call("set_text", vec![Value::from("hello")], BTreeMap::new())
            .unwrap();
        assert_eq!(result, Value::Str("hello".to_string()));
        assert!(sink.is_empty());

        // Worker thread: same result, exactly one diagnostic.
        let worker_instance = instance.clone();
        let result = std::thread::Builder::new()
            .name("worker-1".to_string())
            .spawn(move || {
                worker_instance.call("set_text", vec![Value::from("hi")], BTreeMap::new())
            })
            .unwrap()
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(result, Value::Str("hi".to_string()));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].callee, "set_text");
        assert_eq!(records[0].thread_name, "worker-1");
    }

    #[test]
    fn namespace_level_functions_are_wrapped_too() {
        let sink = Arc::new(MemorySink::new());
        let interceptor = Interceptor::new(policy(), sink.clone());
        let ns = Namespace::new("toolkit.gui");
        ns.define_callable(
            Arc::new(NativeFn::new("message_beep", |_| Ok(Value::Null))),
            true,
        );
        ns.define_reexport("widgets", "toolkit.widgets");
        let surface = TargetSurface::new(vec![ns]);

        let report = interceptor.install(&surface);
        assert_eq!(report.wrapped, vec!["toolkit.gui.message_beep".to_string()]);

        let ns = surface.find_namespace("toolkit.gui").unwrap();
        std::thread::Builder::new()
            .name("worker-2".to_string())
            .spawn({
                let ns = Arc::clone(ns);
                move || ns.invoke("message_beep", Vec::new(), BTreeMap::new()).unwrap()
            })
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].callee, "message_beep");
    }
}

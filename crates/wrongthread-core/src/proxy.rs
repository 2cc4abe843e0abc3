//! The wrapped descriptor installed in place of an original callable.
//!
//! Transparent to callers and to introspection: name and metadata attributes
//! are forwarded to the wrapped original, the owning class and the original
//! callable remain reachable, and the call itself is forwarded unchanged
//! after the thread-affinity check.

use std::sync::Arc;

use crate::callable::{CallArgs, Callable};
use crate::dispatch::{MismatchHeuristic, classify, invoke_with_fallback};
use crate::errors::CallError;
use crate::guard::ThreadGuard;
use crate::surface::ClassDef;
use crate::value::Value;

/// Proxy callable owning the original exclusively once installed.
pub struct WrappedDescriptor {
    /// Owning class; absent for namespace-level functions.
    owner: Option<Arc<ClassDef>>,
    attr: String,
    original: Arc<dyn Callable>,
    guard: Arc<ThreadGuard>,
    heuristic: Arc<dyn MismatchHeuristic>,
}

impl WrappedDescriptor {
    #[must_use]
    pub fn new(
        owner: Option<Arc<ClassDef>>,
        attr: impl Into<String>,
        original: Arc<dyn Callable>,
        guard: Arc<ThreadGuard>,
        heuristic: Arc<dyn MismatchHeuristic>,
    ) -> Self {
        Self {
            owner,
            attr: attr.into(),
            original,
            guard,
            heuristic,
        }
    }

    /// The owning class, when wrapped from a class attribute.
    #[must_use]
    pub fn owner(&self) -> Option<&Arc<ClassDef>> {
        self.owner.as_ref()
    }

    /// The wrapped original callable.
    #[must_use]
    pub fn original(&self) -> &Arc<dyn Callable> {
        &self.original
    }
}

impl Callable for WrappedDescriptor {
    fn name(&self) -> &str {
        self.original.name()
    }

    fn invoke(&self, call: &CallArgs) -> Result<Value, CallError> {
        self.guard.observe(self.original.name(), call);
        let form = classify(self.owner.as_deref(), &self.attr, call.receiver.as_ref());
        invoke_with_fallback(&self.original, &form, call, self.heuristic.as_ref())
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.original.attr(name)
    }
}

//! The callable seam between the engine and the instrumented framework.

use std::collections::BTreeMap;
use std::panic::Location;

use crate::errors::CallError;
use crate::surface::Instance;
use crate::value::Value;

/// A callable member of the target surface.
///
/// Framework natives, namespace-level functions, and wrapped proxies all sit
/// behind this trait. `attr` is the introspection pass-through: a proxy must
/// forward it to the wrapped original so that unrelated code inspecting the
/// attribute still works.
pub trait Callable: Send + Sync {
    /// Declared name of the callable.
    fn name(&self) -> &str;

    /// Invoke with the supplied call shape.
    fn invoke(&self, call: &CallArgs) -> Result<Value, CallError>;

    /// Introspectable metadata attribute (documentation string, signature
    /// text, and so on). Defaults to none.
    fn attr(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Caller context captured at the public invocation boundary.
///
/// The location is taken via `#[track_caller]`, so it already points at the
/// first frame outside the instrumentation layer; no stack walking is needed.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Source location of the invoking call.
    pub location: &'static Location<'static>,
    /// Synthesized textual form of the call expression.
    pub expression: String,
}

impl CallSite {
    /// Capture the immediate caller's location with a rendered expression.
    #[track_caller]
    #[must_use]
    pub fn here(expression: String) -> Self {
        Self {
            location: Location::caller(),
            expression,
        }
    }

    /// `file[line:column]` form used in diagnostic records.
    #[must_use]
    pub fn render_location(&self) -> String {
        format!(
            "{}[{}:{}]",
            self.location.file(),
            self.location.line(),
            self.location.column()
        )
    }
}

/// The full shape of one call through the target surface.
#[derive(Debug, Clone)]
pub struct CallArgs {
    /// Receiver instance for bound dispatch, absent for unbound/static calls.
    pub receiver: Option<Instance>,
    pub positional: Vec<Value>,
    pub keyword: BTreeMap<String, Value>,
    pub site: CallSite,
}

impl CallArgs {
    /// Positional arguments rendered for display only.
    #[must_use]
    pub fn rendered_positional(&self) -> Vec<String> {
        self.positional.iter().map(ToString::to_string).collect()
    }

    /// Keyword arguments rendered for display only.
    #[must_use]
    pub fn rendered_keyword(&self) -> BTreeMap<String, String> {
        self.keyword
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

/// Render a `target(arg, ..., key=value)` call expression for diagnostics.
#[must_use]
pub fn render_call_expression(
    target: &str,
    positional: &[Value],
    keyword: &BTreeMap<String, Value>,
) -> String {
    let mut parts: Vec<String> = positional.iter().map(ToString::to_string).collect();
    parts.extend(keyword.iter().map(|(k, v)| format!("{k}={v}")));
    format!("{target}({})", parts.join(", "))
}

/// Closure-backed framework native.
type NativeBody = dyn Fn(&CallArgs) -> Result<Value, CallError> + Send + Sync;

/// A native callable backed by a closure, used by embedders and tests to
/// model framework members.
pub struct NativeFn {
    name: String,
    attrs: BTreeMap<String, String>,
    body: Box<NativeBody>,
}

impl NativeFn {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
            body: Box::new(body),
        }
    }

    /// Attach an introspectable metadata attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }
}

impl Callable for NativeFn {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, call: &CallArgs) -> Result<Value, CallError> {
        (self.body)(call)
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.attrs.get(name).cloned()
    }
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFn").field("name", &self.name).finish()
    }
}

//! Built-in sample thread-affine widget toolkit.
//!
//! Stands in for the instrumented third-party framework: a handful of
//! namespaces, marker-carrying classes with native members, signals,
//! thread-safe-by-design types, a read-only slot, and a vendor namespace
//! outside the allow-list. Widget state lives in a shared store so calls stay
//! observable across bound and unbound dispatch forms.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use wrongthread_core::{
    CallArgs, CallError, ClassDef, Instance, InterceptPolicy, Namespace, NativeFn,
    SignatureError, TargetSurface, Value,
};

type TextStore = Arc<RwLock<BTreeMap<String, String>>>;

/// The sample object model plus its observable widget state.
pub struct Toolkit {
    surface: TargetSurface,
    store: TextStore,
}

impl Toolkit {
    /// Build the full sample surface.
    #[must_use]
    pub fn build() -> Self {
        let store: TextStore = Arc::new(RwLock::new(BTreeMap::new()));

        let widgets = Namespace::new("toolkit.widgets");
        let widget = widget_class(&store);
        let label = label_class(&store);
        widget.define_nested("label_class", Arc::clone(&label));
        label.define_nested("widget_class", Arc::clone(&widget));
        widgets.define_class(widget);
        widgets.define_class(label);
        // No affinity marker: a plain value type, never wrapped.
        widgets.define_class(ClassDef::new("toolkit.widgets", "Palette", false));

        let gui = Namespace::new("toolkit.gui");
        gui.define_class(screen_class());
        gui.define_callable(
            Arc::new(NativeFn::new("message_beep", |_| Ok(Value::Null))),
            true,
        );

        let core = Namespace::new("toolkit.core");
        core.define_class(timer_class());
        core.define_class(trivial_class("toolkit.core", "Thread", "run"));
        core.define_class(trivial_class("toolkit.core", "MutexLocker", "relock"));
        core.define_reexport("widgets", "toolkit.widgets");

        let vendor = Namespace::new("vendor.ffi");
        vendor.define_class(trivial_class("vendor.ffi", "Buffer", "write"));

        Self {
            surface: TargetSurface::new(vec![widgets, gui, core, vendor]),
            store,
        }
    }

    /// Default interception policy for this toolkit.
    #[must_use]
    pub fn policy() -> InterceptPolicy {
        InterceptPolicy::with_default_bans(["toolkit"])
    }

    #[must_use]
    pub fn surface(&self) -> &TargetSurface {
        &self.surface
    }

    /// Current text of a widget instance, if any was set.
    #[must_use]
    pub fn text_of(&self, label: &str) -> Option<String> {
        self.store.read().get(label).cloned()
    }
}

fn require_receiver<'a>(call: &'a CallArgs, callee: &str) -> Result<&'a Instance, CallError> {
    call.receiver.as_ref().ok_or_else(|| {
        SignatureError::MissingReceiver {
            callee: callee.to_string(),
        }
        .into()
    })
}

fn widget_class(store: &TextStore) -> Arc<ClassDef> {
    let class = ClassDef::new("toolkit.widgets", "Widget", true);

    let set_store = Arc::clone(store);
    class.define_native_method(
        Arc::new(
            NativeFn::new("set_text", move |call| {
                let receiver = require_receiver(call, "set_text")?;
                let text = match call.positional.first() {
                    Some(Value::Str(text)) => text.clone(),
                    Some(other) => {
                        return Err(SignatureError::ArgumentType {
                            callee: "set_text".to_string(),
                            index: 1,
                            got: other.type_name().to_string(),
                        }
                        .into());
                    }
                    None => {
                        return Err(SignatureError::Arity {
                            callee: "set_text".to_string(),
                            expected: 1,
                            got: 0,
                        }
                        .into());
                    }
                };
                if text.is_empty() {
                    return Err(CallError::raised("set_text", "text must not be empty"));
                }
                set_store.write().insert(receiver.label().to_string(), text);
                Ok(Value::Null)
            })
            .with_attr("doc", "sets the widget text"),
        ),
        true,
    );

    let get_store = Arc::clone(store);
    class.define_native_method(
        Arc::new(NativeFn::new("text", move |call| {
            let receiver = require_receiver(call, "text")?;
            let text = get_store
                .read()
                .get(receiver.label())
                .cloned()
                .unwrap_or_default();
            Ok(Value::Str(text))
        })),
        true,
    );

    // Read-only at the framework level: wrapping this slot always fails.
    class.declare_native_member("repaint");
    class.define_method(Arc::new(NativeFn::new("repaint", |_| Ok(Value::Null))), false);

    class.define_native_method(Arc::new(NativeFn::new("init", |_| Ok(Value::Null))), true);
    class.define_signal(Arc::new(NativeFn::new("clicked", |_| Ok(Value::Null))));
    class
}

fn label_class(store: &TextStore) -> Arc<ClassDef> {
    let class = ClassDef::new("toolkit.widgets", "Label", true);
    let set_store = Arc::clone(store);
    class.define_native_method(
        Arc::new(NativeFn::new("set_text", move |call| {
            let receiver = require_receiver(call, "set_text")?;
            match call.positional.first() {
                Some(Value::Str(text)) => {
                    set_store
                        .write()
                        .insert(receiver.label().to_string(), text.clone());
                    Ok(Value::Null)
                }
                _ => Err(SignatureError::NoOverload {
                    callee: "set_text".to_string(),
                }
                .into()),
            }
        })),
        true,
    );
    class
}

fn screen_class() -> Arc<ClassDef> {
    let class = ClassDef::new("toolkit.gui", "Screen", true);

    // Unbound-convention native: rejects an implicit receiver and expects the
    // instance as its leading argument, exercising the dispatch retry.
    class.define_native_method(
        Arc::new(NativeFn::new("geometry", |call| {
            if call.receiver.is_some() {
                return Err(SignatureError::UnexpectedReceiver {
                    callee: "geometry".to_string(),
                }
                .into());
            }
            match call.positional.first() {
                Some(Value::Instance(instance)) => Ok(Value::Str(format!(
                    "0,0 1920x1080 ({})",
                    instance.label()
                ))),
                _ => Err(SignatureError::NoOverload {
                    callee: "geometry".to_string(),
                }
                .into()),
            }
        })),
        true,
    );

    class.define_native_method(
        Arc::new(NativeFn::new("primary", |_| Ok(Value::Str("screen-0".to_string())))),
        true,
    );
    class
}

fn timer_class() -> Arc<ClassDef> {
    let class = ClassDef::new("toolkit.core", "Timer", true);
    // Thread-safe by the framework's own contract; banned by name.
    class.define_native_method(
        Arc::new(NativeFn::new("single_shot", |_| Ok(Value::Null))),
        true,
    );
    class.define_native_method(
        Arc::new(NativeFn::new("start", |call| {
            require_receiver(call, "start")?;
            Ok(Value::Str("started".to_string()))
        })),
        true,
    );
    class
}

fn trivial_class(module: &str, name: &str, method: &str) -> Arc<ClassDef> {
    let class = ClassDef::new(module, name, true);
    class.define_native_method(
        Arc::new(NativeFn::new(method.to_string(), |_| Ok(Value::Null))),
        true,
    );
    class
}

//! Explicit target-surface capability table.
//!
//! Instead of reflection-driven namespace walking, the instrumented framework
//! is described by an enumerable table built once at startup: root namespaces,
//! their classes and callables, per-class native member names, and the
//! thread-affinity capability marker. Attribute tables are mutated exactly
//! once (during installation) and thereafter only read.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::callable::{CallArgs, CallSite, Callable, render_call_expression};
use crate::errors::{CallError, WrapError};
use crate::value::Value;

/// A callable attribute slot. `writable: false` models attributes that are
/// read-only at the framework level; replacing such a slot is a wrap failure.
#[derive(Clone)]
pub struct Slot {
    pub callable: Arc<dyn Callable>,
    pub writable: bool,
}

impl Slot {
    #[must_use]
    pub fn new(callable: Arc<dyn Callable>) -> Self {
        Self {
            callable,
            writable: true,
        }
    }

    #[must_use]
    pub fn read_only(callable: Arc<dyn Callable>) -> Self {
        Self {
            callable,
            writable: false,
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.callable.name())
            .field("writable", &self.writable)
            .finish()
    }
}

/// A member of a root namespace.
#[derive(Debug, Clone)]
pub enum Member {
    Class(Arc<ClassDef>),
    Callable(Slot),
    /// A non-structural re-export of another namespace; never descended into.
    Reexport(String),
}

/// A class participating in the target framework's object model.
pub struct ClassDef {
    name: String,
    module: String,
    affinity_marker: bool,
    native_members: RwLock<BTreeSet<String>>,
    attrs: RwLock<BTreeMap<String, ClassAttr>>,
}

/// A declared member of a class.
#[derive(Debug, Clone)]
pub enum ClassAttr {
    Method(Slot),
    /// Declared-safe signal/event-emission primitive; never wrapped.
    Signal(Arc<dyn Callable>),
    /// Nested class reference; may form cycles between classes.
    Nested(Arc<ClassDef>),
}

impl fmt::Debug for dyn Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<callable {}>", self.name())
    }
}

// Shallow on purpose: nested class references may form cycles.
impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("affinity_marker", &self.affinity_marker)
            .finish_non_exhaustive()
    }
}

impl ClassDef {
    #[must_use]
    pub fn new(module: impl Into<String>, name: impl Into<String>, affinity_marker: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            module: module.into(),
            affinity_marker,
            native_members: RwLock::new(BTreeSet::new()),
            attrs: RwLock::new(BTreeMap::new()),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Defining namespace path, used by the allow-list check.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Stable identity used as the interception cache key.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    /// Whether this class participates in the single-thread-affine event
    /// system.
    #[must_use]
    pub fn affinity_marker(&self) -> bool {
        self.affinity_marker
    }

    /// Declare a framework-native member name (meta-object metadata).
    pub fn declare_native_member(&self, name: &str) {
        self.native_members.write().insert(name.to_string());
    }

    /// Whether `name` is a framework-declared native member of this class.
    #[must_use]
    pub fn is_native_member(&self, name: &str) -> bool {
        self.native_members.read().contains(name)
    }

    /// Define a method under the callable's declared name.
    pub fn define_method(&self, callable: Arc<dyn Callable>, writable: bool) {
        let name = callable.name().to_string();
        let slot = Slot { callable, writable };
        self.attrs.write().insert(name, ClassAttr::Method(slot));
    }

    /// Define a method and declare it native in one step.
    pub fn define_native_method(&self, callable: Arc<dyn Callable>, writable: bool) {
        self.declare_native_member(callable.name());
        self.define_method(callable, writable);
    }

    /// Define a signal-emission primitive under the callable's declared name.
    pub fn define_signal(&self, callable: Arc<dyn Callable>) {
        let name = callable.name().to_string();
        self.attrs.write().insert(name, ClassAttr::Signal(callable));
    }

    /// Define a nested class reference.
    pub fn define_nested(&self, name: impl Into<String>, class: Arc<ClassDef>) {
        self.attrs.write().insert(name.into(), ClassAttr::Nested(class));
    }

    /// Current attribute for `name`, if declared.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<ClassAttr> {
        self.attrs.read().get(name).cloned()
    }

    /// Deterministic snapshot of declared members.
    #[must_use]
    pub fn attrs_snapshot(&self) -> Vec<(String, ClassAttr)> {
        self.attrs
            .read()
            .iter()
            .map(|(name, attr)| (name.clone(), attr.clone()))
            .collect()
    }

    /// Replace a method slot with another callable (the installed proxy).
    pub fn replace_method(
        &self,
        name: &str,
        callable: Arc<dyn Callable>,
    ) -> Result<(), WrapError> {
        let mut attrs = self.attrs.write();
        match attrs.get_mut(name) {
            Some(ClassAttr::Method(slot)) => {
                if !slot.writable {
                    return Err(WrapError::ReadOnlyAttribute {
                        owner: self.qualified_name(),
                        attr: name.to_string(),
                    });
                }
                slot.callable = callable;
                Ok(())
            }
            Some(_) => Err(WrapError::NotCallable {
                owner: self.qualified_name(),
                attr: name.to_string(),
            }),
            None => Err(WrapError::NoSuchAttribute {
                owner: self.qualified_name(),
                attr: name.to_string(),
            }),
        }
    }

    /// Invoke a method at class level (unbound/static dispatch).
    #[track_caller]
    pub fn invoke(
        &self,
        attr: &str,
        positional: Vec<Value>,
        keyword: BTreeMap<String, Value>,
    ) -> Result<Value, CallError> {
        let expression = render_call_expression(
            &format!("{}.{attr}", self.name),
            &positional,
            &keyword,
        );
        let site = CallSite::here(expression);
        let callable = self.callable_for(attr)?;
        callable.invoke(&CallArgs {
            receiver: None,
            positional,
            keyword,
            site,
        })
    }

    fn callable_for(&self, attr: &str) -> Result<Arc<dyn Callable>, CallError> {
        match self.attr(attr) {
            Some(ClassAttr::Method(slot)) => Ok(slot.callable),
            Some(ClassAttr::Signal(callable)) => Ok(callable),
            Some(ClassAttr::Nested(_)) => Err(CallError::raised(
                self.qualified_name(),
                format!("'{attr}' is a class, not a callable"),
            )),
            None => Err(CallError::MissingMember {
                owner: self.qualified_name(),
                name: attr.to_string(),
            }),
        }
    }
}

/// A live object of a surface class.
#[derive(Clone)]
pub struct Instance {
    class: Arc<ClassDef>,
    label: String,
}

impl Instance {
    #[must_use]
    pub fn new(class: Arc<ClassDef>, label: impl Into<String>) -> Self {
        Self {
            class,
            label: label.into(),
        }
    }

    #[must_use]
    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Invoke a method through this instance (bound dispatch candidate).
    #[track_caller]
    pub fn call(
        &self,
        attr: &str,
        positional: Vec<Value>,
        keyword: BTreeMap<String, Value>,
    ) -> Result<Value, CallError> {
        let expression = render_call_expression(
            &format!("{}.{attr}", self.label),
            &positional,
            &keyword,
        );
        let site = CallSite::here(expression);
        let callable = self.class.callable_for(attr)?;
        callable.invoke(&CallArgs {
            receiver: Some(self.clone()),
            positional,
            keyword,
            site,
        })
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.class, &other.class) && self.label == other.label
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {:?}>", self.class.name(), self.label)
    }
}

/// A root namespace of the target surface.
#[derive(Debug)]
pub struct Namespace {
    name: String,
    members: RwLock<BTreeMap<String, Member>>,
}

impl Namespace {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            members: RwLock::new(BTreeMap::new()),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a class under its declared name.
    pub fn define_class(&self, class: Arc<ClassDef>) {
        self.members
            .write()
            .insert(class.name().to_string(), Member::Class(class));
    }

    /// Register a namespace-level callable under its declared name.
    pub fn define_callable(&self, callable: Arc<dyn Callable>, writable: bool) {
        let name = callable.name().to_string();
        self.members
            .write()
            .insert(name, Member::Callable(Slot { callable, writable }));
    }

    /// Register a non-structural re-export of another namespace.
    pub fn define_reexport(&self, name: impl Into<String>, target: impl Into<String>) {
        self.members
            .write()
            .insert(name.into(), Member::Reexport(target.into()));
    }

    /// Current member for `name`, if declared.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Member> {
        self.members.read().get(name).cloned()
    }

    /// Deterministic snapshot of declared members.
    #[must_use]
    pub fn members_snapshot(&self) -> Vec<(String, Member)> {
        self.members
            .read()
            .iter()
            .map(|(name, member)| (name.clone(), member.clone()))
            .collect()
    }

    /// Replace a namespace-level callable with another (the installed proxy).
    pub fn replace_callable(
        &self,
        name: &str,
        callable: Arc<dyn Callable>,
    ) -> Result<(), WrapError> {
        let mut members = self.members.write();
        match members.get_mut(name) {
            Some(Member::Callable(slot)) => {
                if !slot.writable {
                    return Err(WrapError::ReadOnlyAttribute {
                        owner: self.name.clone(),
                        attr: name.to_string(),
                    });
                }
                slot.callable = callable;
                Ok(())
            }
            Some(_) => Err(WrapError::NotCallable {
                owner: self.name.clone(),
                attr: name.to_string(),
            }),
            None => Err(WrapError::NoSuchAttribute {
                owner: self.name.clone(),
                attr: name.to_string(),
            }),
        }
    }

    /// Invoke a namespace-level callable.
    #[track_caller]
    pub fn invoke(
        &self,
        name: &str,
        positional: Vec<Value>,
        keyword: BTreeMap<String, Value>,
    ) -> Result<Value, CallError> {
        let expression = render_call_expression(
            &format!("{}.{name}", self.name),
            &positional,
            &keyword,
        );
        let site = CallSite::here(expression);
        let callable = match self.get(name) {
            Some(Member::Callable(slot)) => slot.callable,
            Some(_) => {
                return Err(CallError::raised(
                    self.name.clone(),
                    format!("'{name}' is not a callable member"),
                ));
            }
            None => {
                return Err(CallError::MissingMember {
                    owner: self.name.clone(),
                    name: name.to_string(),
                });
            }
        };
        callable.invoke(&CallArgs {
            receiver: None,
            positional,
            keyword,
            site,
        })
    }
}

/// The configured set of root namespaces.
#[derive(Debug, Default)]
pub struct TargetSurface {
    namespaces: Vec<Arc<Namespace>>,
}

impl TargetSurface {
    #[must_use]
    pub fn new(namespaces: Vec<Arc<Namespace>>) -> Self {
        Self { namespaces }
    }

    #[must_use]
    pub fn namespaces(&self) -> &[Arc<Namespace>] {
        &self.namespaces
    }

    #[must_use]
    pub fn find_namespace(&self, name: &str) -> Option<&Arc<Namespace>> {
        self.namespaces.iter().find(|ns| ns.name() == name)
    }
}

//! Interception engine for single-thread-affine object models.
//!
//! This crate provides:
//! - Target surface: an explicit, enumerable capability table describing the
//!   namespaces, classes, and callables eligible for instrumentation.
//! - Eligibility policy: allow-list/ban-list filtering of the surface.
//! - Proxy factory: wraps each eligible callable with a transparent descriptor.
//! - Thread guard: reports (never blocks) calls made off the designated thread.
//! - Traversal engine: installs the instrumentation once, idempotently.

#![forbid(unsafe_code)]

pub mod cache;
pub mod callable;
pub mod dispatch;
pub mod errors;
pub mod guard;
pub mod install;
pub mod policy;
pub mod proxy;
pub mod surface;
pub mod value;

pub use cache::{InterceptCache, PatchOutcome};
pub use callable::{CallArgs, CallSite, Callable, NativeFn};
pub use dispatch::{MessageHeuristic, MismatchHeuristic, ResolvedForm};
pub use errors::{CallError, SignatureError, WrapError};
pub use guard::{DesignatedThread, DiagnosticSink, JsonlSink, MemorySink, ThreadGuard, ViolationRecord};
pub use install::{InstallReport, Interceptor};
pub use policy::{AttrView, InterceptPolicy, OwnerRef, default_ban_list};
pub use proxy::WrappedDescriptor;
pub use surface::{ClassAttr, ClassDef, Instance, Member, Namespace, Slot, TargetSurface};
pub use value::Value;

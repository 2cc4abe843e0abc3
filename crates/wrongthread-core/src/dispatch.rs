//! Dispatch classification and the bound-first/unbound-retry call policy.
//!
//! The target framework's native callables do not reliably expose their
//! calling convention through static reflection. Classification uses the
//! framework-declared native member names first; at call time, a bound
//! attempt that fails with a mismatch-shaped error is retried once in the
//! unbound form with the receiver passed as the leading argument.

use std::sync::Arc;

use crate::callable::{CallArgs, Callable};
use crate::errors::CallError;
use crate::surface::{ClassDef, Instance};
use crate::value::Value;

/// Dispatch form selected at attachment time.
#[derive(Debug, Clone)]
pub enum ResolvedForm {
    /// Invoke with an implicit receiver instance.
    Bound(Instance),
    /// Invoke without a receiver.
    Unbound,
}

/// Select the dispatch form for `attr` accessed on `owner`.
///
/// A receiver plus a framework-declared native member name selects bound
/// dispatch; everything else is unbound. Namespace-level functions have no
/// owner class and are always unbound.
#[must_use]
pub fn classify(
    owner: Option<&ClassDef>,
    attr: &str,
    receiver: Option<&Instance>,
) -> ResolvedForm {
    match (owner, receiver) {
        (Some(class), Some(instance)) if class.is_native_member(attr) => {
            ResolvedForm::Bound(instance.clone())
        }
        _ => ResolvedForm::Unbound,
    }
}

/// The single narrow seam for dispatch-convention inference from errors.
///
/// Swap the implementation per target framework; nothing else in the engine
/// inspects error text.
pub trait MismatchHeuristic: Send + Sync {
    /// Whether `err` looks like a signature/overload-resolution failure that
    /// justifies one unbound retry.
    fn is_dispatch_mismatch(&self, err: &CallError) -> bool;
}

/// Default heuristic: structured signature errors always match; opaque
/// callee-raised errors match only a fixed set of overload-resolution message
/// patterns shaped like the target framework's wording.
#[derive(Debug, Clone)]
pub struct MessageHeuristic {
    patterns: Vec<String>,
}

impl MessageHeuristic {
    #[must_use]
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for MessageHeuristic {
    fn default() -> Self {
        Self::new([
            "did not match any overloaded call",
            "incompatible type",
            "too many arguments",
            "not enough arguments",
            "unexpected keyword argument",
        ])
    }
}

impl MismatchHeuristic for MessageHeuristic {
    fn is_dispatch_mismatch(&self, err: &CallError) -> bool {
        match err {
            CallError::Signature(_) => true,
            CallError::Raised { message, .. } => self
                .patterns
                .iter()
                .any(|pattern| message.contains(pattern.as_str())),
            CallError::MissingMember { .. } => false,
        }
    }
}

/// Invoke `original` under the resolved form with the two-attempt policy.
///
/// Bound dispatch attempts the implicit-receiver form first; when that fails
/// with a mismatch-shaped error, the call is retried exactly once unbound,
/// with the receiver prepended as the leading positional argument. If the
/// retry also fails, the original error is propagated unchanged. Any other
/// error propagates immediately.
pub fn invoke_with_fallback(
    original: &Arc<dyn Callable>,
    form: &ResolvedForm,
    call: &CallArgs,
    heuristic: &dyn MismatchHeuristic,
) -> Result<Value, CallError> {
    match form {
        ResolvedForm::Bound(instance) => {
            let bound = CallArgs {
                receiver: Some(instance.clone()),
                positional: call.positional.clone(),
                keyword: call.keyword.clone(),
                site: call.site.clone(),
            };
            match original.invoke(&bound) {
                Ok(value) => Ok(value),
                Err(err) if heuristic.is_dispatch_mismatch(&err) => {
                    let mut positional = Vec::with_capacity(call.positional.len() + 1);
                    positional.push(Value::Instance(instance.clone()));
                    positional.extend(call.positional.iter().cloned());
                    let unbound = CallArgs {
                        receiver: None,
                        positional,
                        keyword: call.keyword.clone(),
                        site: call.site.clone(),
                    };
                    original.invoke(&unbound).map_err(|_| err)
                }
                Err(err) => Err(err),
            }
        }
        ResolvedForm::Unbound => {
            let unbound = CallArgs {
                receiver: None,
                positional: call.positional.clone(),
                keyword: call.keyword.clone(),
                site: call.site.clone(),
            };
            original.invoke(&unbound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::{CallSite, NativeFn};
    use crate::errors::SignatureError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn call_with(receiver: Option<Instance>, positional: Vec<Value>) -> CallArgs {
        CallArgs {
            receiver,
            positional,
            keyword: BTreeMap::new(),
            site: CallSite::here("test()".to_string()),
        }
    }

    fn widget_instance() -> Instance {
        let class = ClassDef::new("toolkit.widgets", "Widget", true);
        class.declare_native_member("set_text");
        Instance::new(class, "w")
    }

    #[test]
    fn classify_selects_bound_for_native_member_with_receiver() {
        let instance = widget_instance();
        let form = classify(Some(instance.class()), "set_text", Some(&instance));
        assert!(matches!(form, ResolvedForm::Bound(_)));
    }

    #[test]
    fn classify_selects_unbound_without_receiver_or_declaration() {
        let instance = widget_instance();
        assert!(matches!(
            classify(Some(instance.class()), "set_text", None),
            ResolvedForm::Unbound
        ));
        assert!(matches!(
            classify(Some(instance.class()), "helper", Some(&instance)),
            ResolvedForm::Unbound
        ));
        assert!(matches!(classify(None, "beep", None), ResolvedForm::Unbound));
    }

    #[test]
    fn heuristic_matches_structured_and_patterned_errors_only() {
        let heuristic = MessageHeuristic::default();
        let structured = CallError::Signature(SignatureError::NoOverload {
            callee: "f".to_string(),
        });
        let patterned = CallError::raised("f", "call failed: too many arguments");
        let unrelated = CallError::raised("f", "text must not be empty");
        assert!(heuristic.is_dispatch_mismatch(&structured));
        assert!(heuristic.is_dispatch_mismatch(&patterned));
        assert!(!heuristic.is_dispatch_mismatch(&unrelated));
    }

    #[test]
    fn bound_mismatch_retries_unbound_with_leading_receiver() {
        let instance = widget_instance();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let native: Arc<dyn Callable> = Arc::new(NativeFn::new("geometry", move |call| {
            counter.fetch_add(1, Ordering::SeqCst);
            if call.receiver.is_some() {
                return Err(SignatureError::UnexpectedReceiver {
                    callee: "geometry".to_string(),
                }
                .into());
            }
            match call.positional.first() {
                Some(Value::Instance(instance)) => {
                    Ok(Value::Str(format!("geometry of {}", instance.label())))
                }
                _ => Err(SignatureError::NoOverload {
                    callee: "geometry".to_string(),
                }
                .into()),
            }
        }));

        let form = ResolvedForm::Bound(instance.clone());
        let call = call_with(Some(instance), Vec::new());
        let result =
            invoke_with_fallback(&native, &form, &call, &MessageHeuristic::default()).unwrap();
        assert_eq!(result, Value::Str("geometry of w".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unrelated_error_propagates_without_retry() {
        let instance = widget_instance();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let native: Arc<dyn Callable> = Arc::new(NativeFn::new("set_text", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CallError::raised("set_text", "text must not be empty"))
        }));

        let form = ResolvedForm::Bound(instance.clone());
        let call = call_with(Some(instance), vec![Value::from("")]);
        let err =
            invoke_with_fallback(&native, &form, &call, &MessageHeuristic::default()).unwrap_err();
        assert_eq!(err.to_string(), "set_text: text must not be empty");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_retry_propagates_the_original_error() {
        let instance = widget_instance();
        let native: Arc<dyn Callable> = Arc::new(NativeFn::new("set_text", |call| {
            if call.receiver.is_some() {
                Err(SignatureError::NoOverload {
                    callee: "set_text".to_string(),
                }
                .into())
            } else {
                Err(CallError::raised("set_text", "retry also failed"))
            }
        }));

        let form = ResolvedForm::Bound(instance.clone());
        let call = call_with(Some(instance), Vec::new());
        let err =
            invoke_with_fallback(&native, &form, &call, &MessageHeuristic::default()).unwrap_err();
        assert!(matches!(
            err,
            CallError::Signature(SignatureError::NoOverload { .. })
        ));
    }
}

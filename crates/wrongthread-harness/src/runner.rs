//! Script execution engine.
//!
//! Runs a loaded target program against the (already instrumented) toolkit
//! surface. Steps execute in order; designated-thread steps run inline on the
//! calling thread, named-thread steps run on a spawned worker that is joined
//! before the next step. Errors raised by the program's own calls are never
//! caught here; they surface as the program's outcome.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use thiserror::Error;

use wrongthread_core::{CallError, ClassDef, Instance, Member, Namespace, Value};

use crate::script::{Script, Step, substitute_argv};
use crate::toolkit::Toolkit;

/// Failure while executing a target program.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("unknown call target '{target}'")]
    UnknownTarget { target: String },
    #[error("step {step}: unsupported argument: {detail}")]
    UnsupportedArgument { step: usize, detail: String },
    #[error("worker thread '{name}' could not be started: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker thread '{name}' panicked")]
    ThreadPanic { name: String },
    /// The program's own call failed; surfaced unchanged.
    #[error("step {step} ({target}) failed: {source}")]
    Program {
        step: usize,
        target: String,
        #[source]
        source: CallError,
    },
}

/// A resolved call target on the toolkit surface.
#[derive(Clone)]
enum CallTarget {
    Function {
        namespace: Arc<Namespace>,
        name: String,
    },
    Method {
        class: Arc<ClassDef>,
        method: String,
    },
}

fn resolve_target(toolkit: &Toolkit, target: &str) -> Option<CallTarget> {
    // Longest namespace prefix wins; the remainder is `function` or
    // `Class.method`.
    let mut best: Option<(&Arc<Namespace>, &str)> = None;
    for namespace in toolkit.surface().namespaces() {
        let prefix = format!("{}.", namespace.name());
        if let Some(rest) = target.strip_prefix(&prefix) {
            let longer = best.is_none_or(|(current, _)| namespace.name().len() > current.name().len());
            if longer {
                best = Some((namespace, rest));
            }
        }
    }
    let (namespace, rest) = best?;
    let segments: Vec<&str> = rest.split('.').collect();
    match segments.as_slice() {
        [function] => match namespace.get(function) {
            Some(Member::Callable(_)) => Some(CallTarget::Function {
                namespace: Arc::clone(namespace),
                name: (*function).to_string(),
            }),
            _ => None,
        },
        [class_name, method] => match namespace.get(class_name) {
            Some(Member::Class(class)) => Some(CallTarget::Method {
                class,
                method: (*method).to_string(),
            }),
            _ => None,
        },
        _ => None,
    }
}

fn to_value(json: &serde_json::Value) -> Result<Value, String> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(format!("unrepresentable number {n}"))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
        serde_json::Value::Array(items) => Ok(Value::List(
            items.iter().map(to_value).collect::<Result<Vec<_>, _>>()?,
        )),
        serde_json::Value::Object(_) => Err("objects are not supported as call arguments".to_string()),
    }
}

fn invoke_target(
    target: &CallTarget,
    instance: Option<&Instance>,
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
) -> Result<Value, CallError> {
    match target {
        CallTarget::Function { namespace, name } => namespace.invoke(name, positional, keyword),
        CallTarget::Method { class, method } => match instance {
            Some(instance) => instance.call(method, positional, keyword),
            None => class.invoke(method, positional, keyword),
        },
    }
}

/// Execute a target program, returning its exit code.
///
/// `argv` is the program's own argument vector (`argv[0]` is the script
/// path); `$N` placeholders in string arguments are substituted from it.
pub fn run_script(toolkit: &Toolkit, script: &Script, argv: &[String]) -> Result<i32, RunError> {
    let mut instances: BTreeMap<String, Instance> = BTreeMap::new();

    for (idx, step) in script.steps.iter().enumerate() {
        let (thread_name, target, instance, args, kwargs) = match step {
            Step::Exit { code } => return Ok(*code),
            Step::Call {
                thread,
                target,
                instance,
                args,
                kwargs,
            } => (thread, target, instance, args, kwargs),
        };

        let resolved = resolve_target(toolkit, target).ok_or_else(|| RunError::UnknownTarget {
            target: target.clone(),
        })?;

        let convert = |json: &serde_json::Value| -> Result<Value, RunError> {
            to_value(&substitute_argv(json, argv)).map_err(|detail| {
                RunError::UnsupportedArgument { step: idx, detail }
            })
        };
        let positional = args.iter().map(convert).collect::<Result<Vec<_>, _>>()?;
        let keyword = kwargs
            .iter()
            .map(|(k, v)| Ok((k.clone(), convert(v)?)))
            .collect::<Result<BTreeMap<_, _>, RunError>>()?;

        let bound = match (&resolved, instance) {
            (CallTarget::Method { class, .. }, Some(label)) => {
                let key = format!("{}#{label}", class.qualified_name());
                Some(
                    instances
                        .entry(key)
                        .or_insert_with(|| Instance::new(Arc::clone(class), label.clone()))
                        .clone(),
                )
            }
            _ => None,
        };

        let outcome = match thread_name {
            None => invoke_target(&resolved, bound.as_ref(), positional, keyword),
            Some(name) => {
                let worker_target = resolved.clone();
                let worker_bound = bound.clone();
                let handle = thread::Builder::new()
                    .name(name.clone())
                    .spawn(move || {
                        invoke_target(&worker_target, worker_bound.as_ref(), positional, keyword)
                    })
                    .map_err(|source| RunError::ThreadSpawn {
                        name: name.clone(),
                        source,
                    })?;
                handle.join().map_err(|_| RunError::ThreadPanic {
                    name: name.clone(),
                })?
            }
        };

        outcome.map_err(|source| RunError::Program {
            step: idx,
            target: target.clone(),
            source,
        })?;
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_target_finds_functions_and_methods() {
        let toolkit = Toolkit::build();
        assert!(matches!(
            resolve_target(&toolkit, "toolkit.gui.message_beep"),
            Some(CallTarget::Function { .. })
        ));
        assert!(matches!(
            resolve_target(&toolkit, "toolkit.widgets.Widget.set_text"),
            Some(CallTarget::Method { .. })
        ));
        assert!(resolve_target(&toolkit, "toolkit.widgets.Missing.method").is_none());
        assert!(resolve_target(&toolkit, "elsewhere.f").is_none());
    }

    #[test]
    fn run_script_reuses_instances_across_steps() {
        let toolkit = Toolkit::build();
        let script = Script::from_json(
            r#"{
                "version": "v1",
                "name": "reuse",
                "steps": [
                    {"op": "call", "target": "toolkit.widgets.Widget.set_text",
                     "instance": "w1", "args": ["first"]},
                    {"op": "call", "target": "toolkit.widgets.Widget.set_text",
                     "instance": "w1", "args": ["second"]}
                ]
            }"#,
        )
        .unwrap();

        let code = run_script(&toolkit, &script, &["reuse.json".to_string()]).unwrap();
        assert_eq!(code, 0);
        assert_eq!(toolkit.text_of("w1").as_deref(), Some("second"));
    }

    #[test]
    fn run_script_substitutes_program_arguments() {
        let toolkit = Toolkit::build();
        let script = Script::from_json(
            r#"{
                "version": "v1",
                "name": "argv",
                "steps": [
                    {"op": "call", "target": "toolkit.widgets.Widget.set_text",
                     "instance": "w1", "args": ["$1"]}
                ]
            }"#,
        )
        .unwrap();

        let argv = vec!["argv.json".to_string(), "from-argv".to_string()];
        run_script(&toolkit, &script, &argv).unwrap();
        assert_eq!(toolkit.text_of("w1").as_deref(), Some("from-argv"));
    }

    #[test]
    fn exit_step_short_circuits_with_its_code() {
        let toolkit = Toolkit::build();
        let script = Script::from_json(
            r#"{
                "version": "v1",
                "name": "exit",
                "steps": [
                    {"op": "exit", "code": 7},
                    {"op": "call", "target": "toolkit.widgets.Widget.set_text",
                     "instance": "w1", "args": ["never"]}
                ]
            }"#,
        )
        .unwrap();

        let code = run_script(&toolkit, &script, &["exit.json".to_string()]).unwrap();
        assert_eq!(code, 7);
        assert_eq!(toolkit.text_of("w1"), None);
    }

    #[test]
    fn program_error_is_surfaced_unchanged() {
        let toolkit = Toolkit::build();
        let script = Script::from_json(
            r#"{
                "version": "v1",
                "name": "boom",
                "steps": [
                    {"op": "call", "target": "toolkit.widgets.Widget.set_text",
                     "instance": "w1", "args": [""]}
                ]
            }"#,
        )
        .unwrap();

        let err = run_script(&toolkit, &script, &["boom.json".to_string()]).unwrap_err();
        let RunError::Program { step, source, .. } = err else {
            panic!("expected program error, got {err}");
        };
        assert_eq!(step, 0);
        assert_eq!(source.to_string(), "set_text: text must not be empty");
    }
}

//! Script loading: JSON "target programs" executed against the toolkit.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One step of a target program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Invoke a member of the instrumented surface.
    Call {
        /// Worker thread name; absent means the designated (main) thread.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread: Option<String>,
        /// `Namespace.Class.method` or `Namespace.function`.
        target: String,
        /// Instance label for bound calls; absent means class-level access.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance: Option<String>,
        #[serde(default)]
        args: Vec<serde_json::Value>,
        #[serde(default)]
        kwargs: BTreeMap<String, serde_json::Value>,
    },
    /// Terminate the program with an explicit exit code.
    Exit { code: i32 },
}

/// A loaded target program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// Schema version.
    pub version: String,
    /// Program name, used in error reporting.
    pub name: String,
    pub steps: Vec<Step>,
}

/// Failure to load a target program.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Script {
    /// Load a script from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a script from a file path.
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Substitute `$N` placeholders with the program's own argument vector.
///
/// Only whole-string placeholders are substituted (`"$1"`, not `"x$1"`);
/// out-of-range indices are left for the program to deal with.
#[must_use]
pub fn substitute_argv(value: &serde_json::Value, argv: &[String]) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => match parse_placeholder(s) {
            Some(idx) if idx < argv.len() => serde_json::Value::String(argv[idx].clone()),
            _ => value.clone(),
        },
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items.iter().map(|item| substitute_argv(item, argv)).collect(),
        ),
        _ => value.clone(),
    }
}

fn parse_placeholder(s: &str) -> Option<usize> {
    let digits = s.strip_prefix('$')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_round_trips_through_json() {
        let script = Script::from_json(
            r#"{
                "version": "v1",
                "name": "smoke",
                "steps": [
                    {"op": "call", "target": "toolkit.widgets.Widget.set_text",
                     "instance": "w1", "args": ["hello"]},
                    {"op": "call", "thread": "worker-1",
                     "target": "toolkit.widgets.Widget.set_text",
                     "instance": "w1", "args": ["offside"]},
                    {"op": "exit", "code": 3}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.name, "smoke");
        assert_eq!(script.steps.len(), 3);
        assert!(matches!(
            &script.steps[1],
            Step::Call { thread: Some(name), .. } if name == "worker-1"
        ));
        assert!(matches!(script.steps[2], Step::Exit { code: 3 }));
    }

    #[test]
    fn substitute_argv_replaces_whole_string_placeholders_only() {
        let argv = vec!["prog.json".to_string(), "hello".to_string()];
        let value = serde_json::json!(["$1", "x$1", "$9", 7]);
        let substituted = substitute_argv(&value, &argv);
        assert_eq!(substituted, serde_json::json!(["hello", "x$1", "$9", 7]));
    }

    #[test]
    fn malformed_script_fails_to_parse() {
        let err = Script::from_json("{\"version\": \"v1\"}").unwrap_err();
        assert!(matches!(err, ScriptError::Parse(_)));
    }
}

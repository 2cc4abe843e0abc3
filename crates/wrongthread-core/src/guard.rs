//! Thread guard: the per-call affinity check and its diagnostic sink.
//!
//! The guard is strictly an observer. It compares the invoking thread against
//! the designated thread, emits one warning record per violating call, and
//! always lets the call proceed unchanged.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use serde::Serialize;

use crate::callable::CallArgs;

/// The single execution context all affinity checks compare against.
///
/// Captured once at process start, never reassigned.
#[derive(Debug, Clone)]
pub struct DesignatedThread {
    id: ThreadId,
    name: String,
}

impl DesignatedThread {
    /// Capture the currently executing thread as the designated context.
    #[must_use]
    pub fn current() -> Self {
        let current = thread::current();
        Self {
            id: current.id(),
            name: current.name().unwrap_or("main").to_string(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One structured record per violating call. Ephemeral; argument values are
/// rendered for display only and never retained.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ViolationRecord {
    /// `file[line:column]` of the first frame outside the instrumentation.
    pub source_location: String,
    /// Identity of the invoking thread.
    pub thread_name: String,
    /// Textual form of the call expression.
    pub call_expression: String,
    /// Declared name of the wrapped callable.
    pub callee: String,
    pub positional_args: Vec<String>,
    pub keyword_args: BTreeMap<String, String>,
}

/// External collaborator receiving violation reports.
///
/// Implementations must not block the calling thread for an unbounded time
/// and must not panic; many threads may emit concurrently.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, record: &ViolationRecord);
}

#[derive(Serialize)]
struct DiagnosticLine<'a> {
    level: &'static str,
    event: &'static str,
    #[serde(flatten)]
    record: &'a ViolationRecord,
}

/// JSONL sink writing one warning line per violation.
///
/// I/O failures are swallowed; a broken sink never affects the guarded call.
pub struct JsonlSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonlSink {
    /// Sink writing to standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Sink writing to a file.
    pub fn to_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self {
            writer: Mutex::new(Box::new(file)),
        })
    }

    /// Sink writing to an arbitrary writer.
    #[must_use]
    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl DiagnosticSink for JsonlSink {
    fn emit(&self, record: &ViolationRecord) {
        let line = DiagnosticLine {
            level: "warn",
            event: "thread_affinity_violation",
            record,
        };
        let Ok(json) = serde_json::to_string(&line) else {
            return;
        };
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "{json}");
        let _ = writer.flush();
    }
}

/// In-memory sink for tests and harness assertions.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ViolationRecord>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all records emitted so far.
    #[must_use]
    pub fn records(&self) -> Vec<ViolationRecord> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, record: &ViolationRecord) {
        self.records.lock().push(record.clone());
    }
}

/// The runtime affinity check executed before every intercepted call.
pub struct ThreadGuard {
    designated: DesignatedThread,
    sink: Arc<dyn DiagnosticSink>,
}

impl ThreadGuard {
    #[must_use]
    pub fn new(designated: DesignatedThread, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { designated, sink }
    }

    #[must_use]
    pub fn designated(&self) -> &DesignatedThread {
        &self.designated
    }

    /// Compare the current thread to the designated context; on mismatch emit
    /// one diagnostic record. Always returns so the call proceeds.
    pub fn observe(&self, callee: &str, call: &CallArgs) {
        let current = thread::current();
        if current.id() == self.designated.id {
            return;
        }
        let thread_name = match current.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", current.id()),
        };
        let record = ViolationRecord {
            source_location: call.site.render_location(),
            thread_name,
            call_expression: call.site.expression.clone(),
            callee: callee.to_string(),
            positional_args: call.rendered_positional(),
            keyword_args: call.rendered_keyword(),
        };
        self.sink.emit(&record);
    }
}

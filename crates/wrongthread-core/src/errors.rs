//! Error taxonomy for interception and intercepted calls.

use thiserror::Error;

/// Structured dispatch-mismatch errors.
///
/// These are the framework's way of saying "this call shape did not match any
/// overload"; the dispatch classifier treats every variant as a retry signal.
/// Message wording mirrors the target framework's own diagnostics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("{callee}(): arguments did not match any overloaded call")]
    NoOverload { callee: String },
    #[error("{callee}() takes {expected} argument(s) but {got} were given")]
    Arity {
        callee: String,
        expected: usize,
        got: usize,
    },
    #[error("{callee}(): argument {index} has incompatible type '{got}'")]
    ArgumentType {
        callee: String,
        index: usize,
        got: String,
    },
    #[error("{callee}() got an unexpected keyword argument '{keyword}'")]
    UnexpectedKeyword { callee: String, keyword: String },
    #[error("{callee}() requires a receiver instance")]
    MissingReceiver { callee: String },
    #[error("{callee}() takes no receiver instance")]
    UnexpectedReceiver { callee: String },
}

/// An error produced by invoking a callable on the target surface.
#[derive(Debug, Error)]
pub enum CallError {
    /// Structured signature/overload-resolution failure.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// Opaque error raised by the callee's own logic. Never retried unless its
    /// message matches the narrow dispatch heuristic.
    #[error("{callee}: {message}")]
    Raised { callee: String, message: String },
    /// The requested member does not exist on the owner.
    #[error("'{owner}' has no member '{name}'")]
    MissingMember { owner: String, name: String },
}

impl CallError {
    /// Convenience constructor for callee-raised errors.
    #[must_use]
    pub fn raised(callee: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            callee: callee.into(),
            message: message.into(),
        }
    }
}

/// Failure to replace an attribute with its proxy.
///
/// Always recovered locally: the traversal engine records the failure in the
/// interception cache and continues with remaining members.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WrapError {
    #[error("attribute '{owner}.{attr}' is read-only at the framework level")]
    ReadOnlyAttribute { owner: String, attr: String },
    #[error("attribute '{owner}.{attr}' does not exist")]
    NoSuchAttribute { owner: String, attr: String },
    #[error("attribute '{owner}.{attr}' is not a callable slot")]
    NotCallable { owner: String, attr: String },
}

//! Harness for the wrongthread interception engine.
//!
//! This crate provides:
//! - A built-in sample thread-affine widget toolkit standing in for the
//!   instrumented framework.
//! - Script loading: JSON "target programs" describing calls against the
//!   toolkit, including which thread performs each call.
//! - A runner that installs instrumentation, executes a script, and maps its
//!   outcome to a process exit status.

#![forbid(unsafe_code)]

pub mod runner;
pub mod script;
pub mod toolkit;

pub use runner::{RunError, run_script};
pub use script::{Script, ScriptError, Step};
pub use toolkit::Toolkit;

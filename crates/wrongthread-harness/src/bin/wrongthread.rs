//! Command-line entry point: instrument the toolkit, then run a target
//! program under observation.
//!
//! Exit status: the program's own exit code on completion (0 unless the
//! program ends with an explicit exit step), 1 on usage or program errors,
//! 2 when the script cannot be loaded or instrumentation cannot start.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use wrongthread_core::{Interceptor, JsonlSink};
use wrongthread_harness::{Script, Toolkit, run_script};

#[derive(Parser)]
#[command(
    name = "wrongthread",
    version,
    about = "Run a target program with thread-affinity interception installed"
)]
struct Cli {
    /// Target program (JSON script) to execute.
    script: PathBuf,

    /// Arguments passed through to the target program.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Write diagnostics to this file instead of stderr.
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Bare invocation gets a one-line usage hint, before any
        // instrumentation is set up.
        Err(err) if err.kind() == clap::error::ErrorKind::MissingRequiredArgument => {
            eprintln!("usage: wrongthread <script> [args...]");
            process::exit(1);
        }
        Err(err) => err.exit(),
    };

    let sink = match &cli.log {
        Some(path) => match JsonlSink::to_file(path) {
            Ok(sink) => sink,
            Err(err) => {
                eprintln!("wrongthread: cannot open log file {}: {err}", path.display());
                process::exit(2);
            }
        },
        None => JsonlSink::stderr(),
    };

    let toolkit = Toolkit::build();
    // The thread that sets up interception becomes the designated thread.
    let interceptor = Interceptor::new(Toolkit::policy(), Arc::new(sink));
    let report = interceptor.install(toolkit.surface());
    for (path, reason) in &report.failed {
        eprintln!("wrongthread: could not wrap {path}: {reason}");
    }

    let script = match Script::from_file(&cli.script) {
        Ok(script) => script,
        Err(err) => {
            eprintln!("wrongthread: {}: {err}", cli.script.display());
            process::exit(2);
        }
    };

    let mut argv = vec![cli.script.display().to_string()];
    argv.extend(cli.args.iter().cloned());

    match run_script(&toolkit, &script, &argv) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("wrongthread: {err}");
            process::exit(1);
        }
    }
}

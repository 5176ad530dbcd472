//! CLI entrypoint for the envim editor client.
//!
//! The binary delegates to [`envim_cli::run`], which loads configuration,
//! installs telemetry, starts an editor session and prints a probe of typed
//! calls.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    envim_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}

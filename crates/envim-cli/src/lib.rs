//! Command-line runtime for the envim editor client.
//!
//! [`run`] loads configuration, installs telemetry, starts an editor session
//! and prints one line per probed call. The IO streams are parameters so
//! tests can capture them.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use envim_config::Config;
use envim_rpc::{NvimConfig, Session};
use tokio::runtime::Builder;
use tracing::{error, info};

mod config;
mod errors;
mod probe;
pub mod telemetry;

use config::{ConfigLoader, OrthoConfigLoader};
use errors::AppError;

/// Log target for the CLI runtime.
const CLI_TARGET: &str = "envim_cli";

/// Runs the CLI using the provided arguments and IO handles.
///
/// Failed probe calls are reported on stdout and do not change the exit
/// code; configuration, telemetry and spawn failures do.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

fn run_with_loader<I, W, E, L>(args: I, stdout: &mut W, stderr: &mut E, loader: &L) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let arguments: Vec<OsString> = args.into_iter().collect();
    match loader.load(&arguments).and_then(|config| execute(&config, stdout)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            report(stderr, &failure);
            ExitCode::FAILURE
        }
    }
}

fn execute<W: Write>(config: &Config, stdout: &mut W) -> Result<(), AppError> {
    telemetry::initialise(config)?;
    let nvim = NvimConfig::from(config);
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;

    let report = runtime.block_on(async {
        let session = Session::spawn(&nvim)?;
        info!(target: CLI_TARGET, pid = ?session.pid(), "editor started");
        let probed = probe::collect(&session).await;
        session.shutdown();
        Ok::<_, AppError>(probed)
    })?;

    report.write_to(stdout).map_err(AppError::WriteOutput)
}

fn report<E: Write>(stderr: &mut E, failure: &AppError) {
    if let Err(write_error) = writeln!(stderr, "envim: {failure}") {
        error!(target: CLI_TARGET, %failure, %write_error, "failed to report error");
    }
}

//! Supervision of the editor process.
//!
//! [`spawn`] launches the editor with piped stdio and returns its stdin plus
//! a channel of [`ProcessEvent`]s. Reader tasks forward stdout and stderr
//! chunks as they arrive and a waiter task reports the exit. The
//! [`ProcessHandle`] owns the process: dropping it kills the editor.

use std::io;
use std::process::Stdio;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::NvimConfig;
use crate::error::SpawnError;

/// Log target for process supervision.
pub(crate) const PROCESS_TARGET: &str = "envim_rpc::process";

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Lifecycle and data events emitted by a supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The process is running.
    Started {
        /// Operating system process id.
        pid: u32,
    },
    /// A chunk of stdout data.
    Stdout(Bytes),
    /// A chunk of stderr data.
    Stderr(Bytes),
    /// The process terminated.
    Exited {
        /// Exit code, absent when the process was killed by a signal.
        code: Option<i32>,
    },
}

/// Ownership of a running process.
///
/// Dropping the handle kills the process.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    /// Operating system process id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Asks the waiter task to kill the process. Later calls do nothing.
    pub fn kill(&mut self) {
        if let Some(kill) = self.kill.take()
            && kill.send(()).is_err()
        {
            debug!(target: PROCESS_TARGET, pid = self.pid, "process already exited");
        }
    }

    /// A handle that supervises nothing, for exercising session bookkeeping.
    #[cfg(test)]
    pub(crate) const fn detached(pid: u32) -> Self {
        Self { pid, kill: None }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.kill();
    }
}

/// A freshly launched process.
#[derive(Debug)]
pub struct SpawnedProcess {
    /// Ownership of the process.
    pub handle: ProcessHandle,
    /// The process's standard input.
    pub stdin: ChildStdin,
    /// Lifecycle and output events; closes once the process has exited and
    /// its output is drained.
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

/// Launches the editor described by `config`.
///
/// Must be called from within a Tokio runtime: the reader and waiter tasks
/// are spawned onto it.
///
/// # Errors
///
/// Returns [`SpawnError::BinaryNotFound`] when the program does not exist
/// and [`SpawnError::SpawnFailed`] for any other launch failure.
pub fn spawn(config: &NvimConfig) -> Result<SpawnedProcess, SpawnError> {
    debug!(
        target: PROCESS_TARGET,
        program = %config.program.display(),
        args = ?config.args,
        "spawning editor process"
    );

    let mut command = Command::new(&config.program);
    command
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            SpawnError::BinaryNotFound {
                command: config.program.display().to_string(),
                source,
            }
        } else {
            SpawnError::SpawnFailed {
                message: source.to_string(),
                source,
            }
        }
    })?;

    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
    let pid = child.id().ok_or_else(|| SpawnError::SpawnFailed {
        message: "process exited before its id could be read".to_owned(),
        source: io::Error::other("missing process id"),
    })?;

    let (events_tx, events) = mpsc::unbounded_channel();
    let (kill_tx, kill_rx) = oneshot::channel();

    // Started goes out before any reader can queue data.
    if events_tx.send(ProcessEvent::Started { pid }).is_err() {
        debug!(target: PROCESS_TARGET, pid, "event receiver dropped during spawn");
    }
    tokio::spawn(forward_output(
        stdout,
        events_tx.clone(),
        ProcessEvent::Stdout,
    ));
    tokio::spawn(forward_output(
        stderr,
        events_tx.clone(),
        ProcessEvent::Stderr,
    ));
    tokio::spawn(supervise(child, pid, kill_rx, events_tx));

    info!(target: PROCESS_TARGET, pid, "editor process started");
    Ok(SpawnedProcess {
        handle: ProcessHandle {
            pid,
            kill: Some(kill_tx),
        },
        stdin,
        events,
    })
}

fn missing_pipe(name: &str) -> SpawnError {
    SpawnError::SpawnFailed {
        message: format!("failed to capture {name}"),
        source: io::Error::other(format!("{name} not captured")),
    }
}

async fn forward_output<R>(
    mut reader: R,
    events: mpsc::UnboundedSender<ProcessEvent>,
    wrap: fn(Bytes) -> ProcessEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = BytesMut::with_capacity(READ_CHUNK_SIZE);
    loop {
        chunk.reserve(READ_CHUNK_SIZE);
        match reader.read_buf(&mut chunk).await {
            Ok(0) => break,
            Ok(_) => {
                if events.send(wrap(chunk.split().freeze())).is_err() {
                    break;
                }
            }
            Err(error) => {
                warn!(target: PROCESS_TARGET, %error, "failed to read process output");
                break;
            }
        }
    }
}

async fn supervise(
    mut child: Child,
    pid: u32,
    kill: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill => None,
    };
    let status = match exited {
        Some(outcome) => outcome,
        None => {
            debug!(target: PROCESS_TARGET, pid, "terminating process with its owner");
            if let Err(error) = child.kill().await {
                warn!(target: PROCESS_TARGET, pid, %error, "failed to kill process");
            }
            child.wait().await
        }
    };
    let code = match status {
        Ok(exit) => exit.code(),
        Err(error) => {
            warn!(target: PROCESS_TARGET, pid, %error, "failed to collect exit status");
            None
        }
    };
    info!(target: PROCESS_TARGET, pid, ?code, "editor process exited");
    if events.send(ProcessEvent::Exited { code }).is_err() {
        debug!(target: PROCESS_TARGET, pid, "no listener for exit event");
    }
}

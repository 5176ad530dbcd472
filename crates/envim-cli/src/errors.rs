//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use envim_rpc::SessionError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to start the async runtime: {0}")]
    Runtime(io::Error),
    #[error("failed to start the editor: {0}")]
    StartSession(#[from] SessionError),
    #[error("failed to write probe output: {0}")]
    WriteOutput(io::Error),
}

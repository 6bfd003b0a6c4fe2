//! Error types for the CLI runtime.

use std::io;
use std::path::PathBuf;

use pydeobf_core::{PipelineError, RegistryError};
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    CliUsage(#[from] clap::Error),
    #[error("failed to load schemas: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to read {}: {source}", path.display())]
    ReadInput { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", path.display())]
    WriteOutput { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Pipeline(PipelineError),
    #[error("failed to serialise report: {0}")]
    SerialiseReport(#[from] serde_json::Error),
    #[error("failed to emit output: {0}")]
    Emit(#[source] io::Error),
}

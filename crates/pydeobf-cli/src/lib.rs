//! Command-line runtime for `pydeobf`.
//!
//! The runtime parses arguments, installs telemetry, reads the input file,
//! runs the dispatch pipeline over the built-in schemas and reports the
//! outcome. IO streams are parameters so tests can capture them.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use pydeobf_core::{Deobfuscated, Pipeline, PipelineError, SchemaRegistry};
use pydeobf_schemas::default_registry;

mod cli;
mod errors;
mod report;
pub mod telemetry;

pub use cli::ReportFormat;
use cli::Cli;
use errors::AppError;
use report::{RunReport, write_postmortem};

/// Exit status for command-line usage errors, as clap reports them.
const USAGE_EXIT: u8 = 2;

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let result = default_registry()
        .map_err(AppError::from)
        .and_then(|registry| execute(args, &registry, stdout, stderr));
    match result {
        Ok(exit_code) => exit_code,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            emit(stdout, format_args!("{}", error.render()));
            ExitCode::SUCCESS
        }
        Err(AppError::CliUsage(error)) => {
            emit(stderr, format_args!("{}", error.render()));
            ExitCode::from(USAGE_EXIT)
        }
        Err(error) => {
            emit(stderr, format_args!("{error}\n"));
            ExitCode::FAILURE
        }
    }
}

fn execute<I, W, E>(
    args: I,
    registry: &SchemaRegistry,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<ExitCode, AppError>
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = Cli::parse_with_schemas(args, registry)?;
    telemetry::initialise(&cli.logging())?;
    let source = read_source(&cli.path)?;
    tracing::debug!(path = %cli.path.display(), len = source.len(), "read input");

    let outcome = Pipeline::new(registry)
        .with_selection(cli.selection.clone())
        .skip_scan(cli.skip_scan)
        .run(&source);
    match outcome {
        Ok(result) => {
            deliver(&cli, &result, stdout)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(PipelineError::AllFailed(aggregate)) => {
            match cli.format {
                ReportFormat::Human => write_postmortem(stderr, &aggregate).map_err(AppError::Emit)?,
                ReportFormat::Json => {
                    write_json(stdout, &RunReport::failure(&aggregate))?;
                }
            }
            Ok(ExitCode::FAILURE)
        }
        Err(error) => Err(AppError::Pipeline(error)),
    }
}

/// Reads the input as text, replacing invalid UTF-8.
fn read_source(path: &Path) -> Result<String, AppError> {
    let bytes = fs::read(path).map_err(|source| AppError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Sends a successful result to `--output` or standard output.
fn deliver<W: Write>(cli: &Cli, result: &Deobfuscated, stdout: &mut W) -> Result<(), AppError> {
    tracing::info!(schema = %result.schema, "deobfuscated");
    let rendered = match cli.format {
        ReportFormat::Human => format!("{}\n", result.output),
        ReportFormat::Json => json_line(&RunReport::success(result))?,
    };
    match &cli.output {
        Some(path) => {
            fs::write(path, rendered).map_err(|source| AppError::WriteOutput {
                path: path.clone(),
                source,
            })?;
            tracing::info!(path = %path.display(), "output written");
            Ok(())
        }
        None => stdout.write_all(rendered.as_bytes()).map_err(AppError::Emit),
    }
}

fn json_line(report: &RunReport<'_>) -> Result<String, AppError> {
    let mut rendered = serde_json::to_string_pretty(report)?;
    rendered.push('\n');
    Ok(rendered)
}

fn write_json<W: Write>(out: &mut W, report: &RunReport<'_>) -> Result<(), AppError> {
    out.write_all(json_line(report)?.as_bytes())
        .map_err(AppError::Emit)
}

/// Writes a message on a best-effort basis; the stream may already be gone.
fn emit<W: Write>(out: &mut W, message: fmt::Arguments<'_>) {
    if let Err(error) = out.write_fmt(message) {
        tracing::debug!(%error, "failed to write message");
    }
}

#[cfg(test)]
mod tests;

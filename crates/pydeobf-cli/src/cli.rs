//! Command-line argument definitions.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser, ValueEnum};
use pydeobf_config::{LogFormat, LoggingConfig};
use pydeobf_core::registry::AUTO;
use pydeobf_core::{SchemaRegistry, Selection};

/// How the result of a run is reported.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum ReportFormat {
    /// The deobfuscated text, or a failure postmortem on standard error.
    #[default]
    Human,
    /// A single JSON document describing the run.
    Json,
}

/// Deobfuscates Python programs without running them.
#[derive(Parser, Debug)]
#[command(name = "pydeobf", version)]
pub(crate) struct Cli {
    /// Obfuscated Python file.
    #[arg(value_name = "PATH")]
    pub(crate) path: PathBuf,
    /// Schemas to try: `auto`, or names such as `hyperion,vare_1`.
    #[arg(short = 't', long = "type", value_name = "SCHEMAS", default_value = AUTO)]
    pub(crate) selection: Selection,
    /// Writes the result to a file instead of standard output.
    #[arg(short, long, value_name = "FILE")]
    pub(crate) output: Option<PathBuf>,
    /// Tries every selected schema without running its scanner first.
    #[arg(short, long)]
    pub(crate) skip_scan: bool,
    /// Lowers the default log filter to `debug`.
    #[arg(short, long)]
    pub(crate) debug: bool,
    /// Shows warnings that are part of normal operation.
    #[arg(long)]
    pub(crate) show_expected: bool,
    /// Log output format.
    #[arg(long, env = "PYDEOBF_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    pub(crate) log_format: LogFormat,
    /// Log filter expression; takes precedence over `--debug`.
    #[arg(long, env = "PYDEOBF_LOG_FILTER")]
    pub(crate) log_filter: Option<String>,
    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Human)]
    pub(crate) format: ReportFormat,
}

impl Cli {
    /// Parses `args`, listing the registered schemas in the help text.
    pub(crate) fn parse_with_schemas<I>(
        args: I,
        registry: &SchemaRegistry,
    ) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = OsString>,
    {
        let listed: Vec<String> = registry
            .entries()
            .iter()
            .map(|entry| format!("  {}_{}", entry.name(), entry.version()))
            .collect();
        let mut command =
            Self::command().after_help(format!("Schemas:\n{}", listed.join("\n")));
        let matches = command.try_get_matches_from_mut(args)?;
        Self::from_arg_matches(&matches).map_err(|error| error.format(&mut command))
    }

    pub(crate) fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            filter: self.log_filter.clone(),
            format: self.log_format,
            debug: self.debug,
            show_expected: self.show_expected,
        }
    }
}

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::defaults::{DEBUG_LOG_FILTER, EXPECTED_TARGET, default_log_filter};

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Logging settings collected from the command line and environment.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit filter expression; overrides the debug switch.
    pub filter: Option<String>,
    /// Output format.
    pub format: LogFormat,
    /// Lowers the default filter to `debug`.
    pub debug: bool,
    /// Keeps warnings emitted during normal operation.
    pub show_expected: bool,
}

impl LoggingConfig {
    /// The `EnvFilter` expression to install.
    ///
    /// Events on the `expected` target are switched off unless
    /// [`LoggingConfig::show_expected`] is set.
    #[must_use]
    pub fn effective_filter(&self) -> String {
        let base = match (&self.filter, self.debug) {
            (Some(filter), _) => filter.as_str(),
            (None, true) => DEBUG_LOG_FILTER,
            (None, false) => default_log_filter(),
        };
        if self.show_expected {
            base.to_owned()
        } else {
            format!("{base},{EXPECTED_TARGET}=off")
        }
    }

    /// Output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.format
    }
}

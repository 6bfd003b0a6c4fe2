//! Shared configuration for the `pydeobf` binary.
//!
//! Logging is the only configurable concern: the output format, the filter
//! expression, and whether routine warnings are shown.

mod defaults;
mod logging;

pub use defaults::{
    DEBUG_LOG_FILTER, DEFAULT_LOG_FILTER, EXPECTED_TARGET, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError, LoggingConfig};

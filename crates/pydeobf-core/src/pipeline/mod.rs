//! Top-level dispatch: select candidates, try them in order, keep the first
//! success.
//!
//! Registry errors abort the request before any schema runs. A schema's
//! [`DeobfuscationFailure`] only ends that schema's attempt: it is kept as an
//! [`Attempt`] and the next candidate runs. When every candidate fails the
//! attempts are returned together as an [`AggregateFailure`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::RegistryError;
use crate::failure::DeobfuscationFailure;
use crate::registry::{AUTO, SchemaEntry, SchemaRegistry, scan_entries};

/// Which schemas the pipeline may try.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Every registered schema.
    #[default]
    Auto,
    /// A comma-separated list of `name` or `name_version` tokens.
    Explicit(String),
}

impl Selection {
    /// The selection as a registry option string.
    #[must_use]
    pub fn as_option(&self) -> &str {
        match self {
            Self::Auto => AUTO,
            Self::Explicit(option) => option,
        }
    }
}

impl FromStr for Selection {
    type Err = std::convert::Infallible;

    fn from_str(option: &str) -> Result<Self, Self::Err> {
        Ok(if option.trim().eq_ignore_ascii_case(AUTO) {
            Self::Auto
        } else {
            Self::Explicit(option.to_owned())
        })
    }
}

/// One failed schema attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// Schema label, such as `hyperion v1`.
    pub schema: String,
    /// Why the attempt failed.
    pub failure: DeobfuscationFailure,
}

/// Every candidate failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateFailure {
    /// Attempts in the order they ran.
    pub attempts: Vec<Attempt>,
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .attempts
            .iter()
            .map(|attempt| attempt.schema.as_str())
            .collect();
        write!(f, "every candidate schema failed: {}", names.join(", "))
    }
}

/// Errors that end a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The selection string was rejected.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No selected schema accepted the input during scanning.
    #[error("no schema recognised the input")]
    NoCandidates,

    /// Every candidate schema failed.
    #[error("{0}")]
    AllFailed(AggregateFailure),
}

/// A successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deobfuscated {
    /// Label of the schema that succeeded.
    pub schema: String,
    /// Formatted output.
    pub output: String,
    /// Attempts that failed before the successful one.
    pub attempts: Vec<Attempt>,
}

/// Runs candidate schemas against a source text.
#[derive(Debug, Clone)]
pub struct Pipeline<'r> {
    registry: &'r SchemaRegistry,
    selection: Selection,
    skip_scan: bool,
}

impl<'r> Pipeline<'r> {
    /// Creates a pipeline over every schema with scanning enabled.
    #[must_use]
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            selection: Selection::Auto,
            skip_scan: false,
        }
    }

    /// Restricts the schemas the pipeline may try.
    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Treats every selected schema as a candidate without scanning.
    #[must_use]
    pub const fn skip_scan(mut self, skip: bool) -> Self {
        self.skip_scan = skip;
        self
    }

    /// Builds the ordered candidate list.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Registry`] when the selection does not
    /// resolve.
    pub fn candidates(&self, source: &str) -> Result<Vec<&'r SchemaEntry>, PipelineError> {
        let selected = self.registry.resolve(self.selection.as_option())?;
        if self.skip_scan {
            return Ok(selected);
        }
        Ok(scan_entries(selected, source))
    }

    /// Tries each candidate in order and returns the first formatted output.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Registry`] for a bad selection,
    /// [`PipelineError::NoCandidates`] when scanning leaves nothing to try,
    /// and [`PipelineError::AllFailed`] with every attempt's diagnostics when
    /// no candidate succeeds.
    pub fn run(&self, source: &str) -> Result<Deobfuscated, PipelineError> {
        let candidates = self.candidates(source)?;
        if candidates.is_empty() {
            return Err(PipelineError::NoCandidates);
        }
        let labels: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        tracing::info!(candidates = %labels.join(", "), "schema list");

        let mut attempts = Vec::new();
        for entry in candidates {
            let schema = entry.to_string();
            tracing::info!(%schema, "running deobfuscation");
            match entry.run(source) {
                Ok(output) => {
                    tracing::info!(%schema, "deobfuscation succeeded");
                    return Ok(Deobfuscated {
                        schema,
                        output,
                        attempts,
                    });
                }
                Err(failure) => {
                    tracing::warn!(%schema, kind = %failure.kind(), %failure, "deobfuscation failed");
                    attempts.push(Attempt { schema, failure });
                }
            }
        }
        Err(PipelineError::AllFailed(AggregateFailure { attempts }))
    }
}

#[cfg(test)]
mod tests;

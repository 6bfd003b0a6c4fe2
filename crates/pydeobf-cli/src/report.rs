//! Rendering of successful runs and failure postmortems.

use std::io::{self, Write};

use pydeobf_core::{AggregateFailure, Attempt, Deobfuscated};
use serde::Serialize;

/// JSON view of a run.
#[derive(Debug, Serialize)]
pub(crate) struct RunReport<'a> {
    pub(crate) succeeded: bool,
    pub(crate) schema: Option<&'a str>,
    pub(crate) output: Option<&'a str>,
    pub(crate) attempts: Vec<AttemptReport<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptReport<'a> {
    schema: &'a str,
    kind: String,
    message: &'a str,
    diagnostics: Vec<DiagnosticReport<'a>>,
}

#[derive(Debug, Serialize)]
struct DiagnosticReport<'a> {
    name: &'a str,
    value: String,
}

impl<'a> From<&'a Attempt> for AttemptReport<'a> {
    fn from(attempt: &'a Attempt) -> Self {
        Self {
            schema: &attempt.schema,
            kind: attempt.failure.kind().to_string(),
            message: attempt.failure.message(),
            diagnostics: attempt
                .failure
                .diagnostics()
                .iter()
                .map(|(name, value)| DiagnosticReport {
                    name,
                    value: value.to_string(),
                })
                .collect(),
        }
    }
}

impl<'a> RunReport<'a> {
    pub(crate) fn success(result: &'a Deobfuscated) -> Self {
        Self {
            succeeded: true,
            schema: Some(&result.schema),
            output: Some(&result.output),
            attempts: result.attempts.iter().map(AttemptReport::from).collect(),
        }
    }

    pub(crate) fn failure(aggregate: &'a AggregateFailure) -> Self {
        Self {
            succeeded: false,
            schema: None,
            output: None,
            attempts: aggregate.attempts.iter().map(AttemptReport::from).collect(),
        }
    }
}

/// Writes one block per failed attempt: the schema and message, then every
/// diagnostic as `name:` followed by its indented value.
pub(crate) fn write_postmortem<W: Write>(out: &mut W, aggregate: &AggregateFailure) -> io::Result<()> {
    writeln!(out, "{aggregate}")?;
    for attempt in &aggregate.attempts {
        writeln!(out)?;
        writeln!(
            out,
            "[{}] {}: {}",
            attempt.schema,
            attempt.failure.kind(),
            attempt.failure.message()
        )?;
        for (name, value) in attempt.failure.diagnostics() {
            writeln!(out, "  {name}:")?;
            for line in value.to_string().lines() {
                writeln!(out, "    {line}")?;
            }
        }
    }
    Ok(())
}

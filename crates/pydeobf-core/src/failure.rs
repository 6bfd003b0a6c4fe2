//! Structured outcome of a failed deobfuscation attempt.
//!
//! A [`DeobfuscationFailure`] is inspected rather than merely displayed: the
//! pipeline keeps its diagnostics so the caller can print a postmortem for
//! every schema it tried without running anything twice.

use std::fmt;

use indexmap::IndexMap;
use pydeobf_syntax::{SyntaxError, repr_bytes};
use strum::Display;
use thiserror::Error;

/// Why a schema attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// The payload could not be decoded.
    Payload,
    /// A marker the schema depends on is absent.
    MissingMarker,
    /// Several candidates were found where exactly one was expected.
    Ambiguous,
    /// An intermediate layer is not valid Python.
    Syntax,
    /// No layer shape matches the current tree.
    UnrecognizedLayer,
    /// The matched layer produced no next tree.
    LayerNotLocated,
    /// The layer loop hit its iteration cap.
    IterationLimitExceeded,
}

/// A diagnostic value attached to a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticValue {
    /// Free text, such as partially deobfuscated source.
    Text(String),
    /// A byte buffer, rendered as a Python bytes literal.
    Bytes(Vec<u8>),
    /// Several values, rendered one per line.
    List(Vec<DiagnosticValue>),
}

impl fmt::Display for DiagnosticValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Bytes(bytes) => f.write_str(&repr_bytes(bytes)),
            Self::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for DiagnosticValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for DiagnosticValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for DiagnosticValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for DiagnosticValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<Vec<Vec<u8>>> for DiagnosticValue {
    fn from(buffers: Vec<Vec<u8>>) -> Self {
        Self::List(buffers.into_iter().map(Self::Bytes).collect())
    }
}

/// A failed schema attempt with its diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DeobfuscationFailure {
    kind: FailureKind,
    message: String,
    diagnostics: IndexMap<String, DiagnosticValue>,
}

impl DeobfuscationFailure {
    /// Creates a failure without diagnostics.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            diagnostics: IndexMap::new(),
        }
    }

    /// Creates a [`FailureKind::Payload`] failure.
    #[must_use]
    pub fn payload(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Payload, message)
    }

    /// Creates a [`FailureKind::MissingMarker`] failure.
    #[must_use]
    pub fn missing_marker(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MissingMarker, message)
    }

    /// Creates a [`FailureKind::Ambiguous`] failure.
    #[must_use]
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Ambiguous, message)
    }

    /// Attaches a named diagnostic, replacing any previous value.
    #[must_use]
    pub fn with_diagnostic(
        mut self,
        name: impl Into<String>,
        value: impl Into<DiagnosticValue>,
    ) -> Self {
        self.diagnostics.insert(name.into(), value.into());
        self
    }

    /// Why the attempt stopped.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Diagnostics in insertion order.
    #[must_use]
    pub const fn diagnostics(&self) -> &IndexMap<String, DiagnosticValue> {
        &self.diagnostics
    }

    /// Looks a diagnostic up by name.
    #[must_use]
    pub fn diagnostic(&self, name: &str) -> Option<&DiagnosticValue> {
        self.diagnostics.get(name)
    }
}

impl From<SyntaxError> for DeobfuscationFailure {
    fn from(error: SyntaxError) -> Self {
        Self::new(FailureKind::Syntax, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn diagnostics_keep_insertion_order() {
        let failure = DeobfuscationFailure::ambiguous("two payloads")
            .with_diagnostic("second", b"b".as_slice())
            .with_diagnostic("first", b"a".as_slice());
        let names: Vec<&str> = failure.diagnostics().keys().map(String::as_str).collect();
        assert_eq!(names, ["second", "first"]);
        assert_eq!(failure.kind(), FailureKind::Ambiguous);
        assert_eq!(failure.to_string(), "two payloads");
    }

    #[rstest]
    #[case(DiagnosticValue::from("x = 1"), "x = 1")]
    #[case(DiagnosticValue::from(b"\x00'".to_vec()), "b\"\\x00'\"")]
    #[case(
        DiagnosticValue::List(vec![DiagnosticValue::from(b"a".to_vec()), DiagnosticValue::from("b")]),
        "b'a'\nb"
    )]
    fn diagnostic_values_render_like_python(#[case] value: DiagnosticValue, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[test]
    fn syntax_errors_convert() {
        let failure = DeobfuscationFailure::from(SyntaxError::invalid_syntax(2, 4, "bad"));
        assert_eq!(failure.kind(), FailureKind::Syntax);
        assert!(failure.message().contains("bad"));
    }

    #[test]
    fn kinds_display_in_snake_case() {
        assert_eq!(
            FailureKind::IterationLimitExceeded.to_string(),
            "iteration_limit_exceeded"
        );
    }
}

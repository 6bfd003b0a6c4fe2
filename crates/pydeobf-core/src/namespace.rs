//! Name resolution scope for symbolic evaluation.

use std::collections::HashMap;

use crate::mock::MockValue;
use crate::mock::builtins::base_table;

/// A local scope chained over a fixed base of builtin mocks.
///
/// Writes always land in the local scope and shadow the base. A namespace is
/// created per layer attempt and dropped with it.
#[derive(Debug, Clone)]
pub struct Namespace {
    locals: HashMap<String, MockValue>,
    base: HashMap<&'static str, MockValue>,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespace {
    /// Creates an empty local scope over a fresh builtin table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locals: HashMap::new(),
            base: base_table(),
        }
    }

    /// Resolves a name, local bindings first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MockValue> {
        self.locals.get(name).or_else(|| self.base.get(name))
    }

    /// Returns a binding made in the local scope.
    #[must_use]
    pub fn local(&self, name: &str) -> Option<&MockValue> {
        self.locals.get(name)
    }

    /// Binds a name in the local scope, returning any previous local binding.
    pub fn insert(&mut self, name: impl Into<String>, value: MockValue) -> Option<MockValue> {
        let key = name.into();
        tracing::debug!(name = %key, %value, "binding name");
        self.locals.insert(key, value)
    }

    /// Number of local bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locals.len()
    }

    /// Whether no local bindings have been made.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }
}

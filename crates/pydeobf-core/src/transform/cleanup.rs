//! Turning mocks back into syntax.

use pydeobf_syntax::ast::{Expr, Module};
use pydeobf_syntax::fold::{self, Fold};

use crate::mock::{Handle, MockTag, MockValue};
use crate::namespace::Namespace;

/// Renders a mock as the expression it stands for.
///
/// Concrete values become literals and code objects become the `compile`
/// call that would rebuild them. Symbolic mocks become a reference to the
/// object they model; a builtin the model has no well-known name for is
/// still rendered by name, with an info event so the gap is visible.
#[must_use]
pub fn revert(mock: &MockValue) -> Expr {
    match (mock.handle(), mock.payload()) {
        (None, Some(payload)) if mock.tag() == MockTag::Code => Expr::call(
            Expr::name("compile"),
            vec![payload.to_expr(), Expr::str("<string>"), Expr::str("exec")],
        ),
        (None, Some(payload)) => payload.to_expr(),
        (Some(Handle::Scope(scope)), _) => Expr::call(Expr::name(scope.name()), Vec::new()),
        (Some(Handle::NamespaceGetter(scope)), _) => Expr::Lambda {
            params: "*_".to_owned(),
            body: Box::new(Expr::call(Expr::name(scope.name()), Vec::new())),
        },
        (Some(Handle::Module(module)), _) => {
            Expr::call(Expr::name("__import__"), vec![Expr::str(module.name())])
        }
        (Some(Handle::Method(method)), Some(receiver)) => {
            Expr::attribute(receiver.to_expr(), method.name())
        }
        (Some(Handle::Builtin(builtin)), _) => {
            if !builtin.is_well_known() {
                tracing::info!(builtin = builtin.name(), "reverting builtin by name");
            }
            Expr::name(builtin.name())
        }
        _ => {
            tracing::info!(mock = %mock, "could not identify mock, reverting by name");
            Expr::name(mock.name())
        }
    }
}

/// Final pass that substitutes names still bound in the local scope.
///
/// The symbolic pass resolves names in the order it meets them, so a use
/// that precedes its binding in the text survives it, while the scope write
/// that made the binding has already been removed. Every such name is
/// replaced with the reverted mock: literals for concrete values and the
/// modelled object (`str`, `globals()`, `__import__('m')`) for symbolic
/// ones.
#[derive(Debug)]
pub struct MockCleanup<'a> {
    namespace: &'a Namespace,
}

impl<'a> MockCleanup<'a> {
    /// Creates a cleanup pass over the bindings in `namespace`.
    #[must_use]
    pub const fn new(namespace: &'a Namespace) -> Self {
        Self { namespace }
    }

    /// Runs the pass over a module.
    pub fn clean(&mut self, module: Module) -> Module {
        self.fold_module(module)
    }
}

impl Fold for MockCleanup<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Name(id) => match self.namespace.local(&id) {
                Some(mock) => revert(mock),
                None => Expr::Name(id),
            },
            other => fold::walk_expr(self, other),
        }
    }
}

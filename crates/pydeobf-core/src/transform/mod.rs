//! Symbolic evaluation over the syntax tree.
//!
//! [`SymbolicTransformer`] folds every subexpression whose value is fully
//! determined by the mock model: literals, builtin references, whitelisted
//! operators, and calls to mocks with behaviour. `exec` and `eval` of a known
//! source string are expanded inline, and writes into the `globals()` scope
//! are recorded in the layer's [`Namespace`] instead of being kept.
//!
//! Resolution returns a [`Resolved`] so a parent node can keep working with a
//! mock its child produced. A mock only becomes syntax again when it is
//! embedded in a node that cannot be folded, through [`revert`].

mod cleanup;

use num_bigint::BigInt;
use pydeobf_syntax::ast::{BinaryOp, BoolOp, Constant, Expr, Keyword, Module, Stmt};
use pydeobf_syntax::fold::{self, Fold};
use pydeobf_syntax::{parse_expression, parse_module, unparse_expr};

use crate::error::MockError;
use crate::mock::{Builtin, Handle, MockTag, MockValue};
use crate::namespace::Namespace;
use crate::value::PyValue;

pub use self::cleanup::{MockCleanup, revert};

/// Nested `exec`/`eval` expansions followed before giving up.
pub const MAX_NESTING: usize = 32;

/// A node the transformer had to leave alone, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldIssue {
    /// Why folding stopped.
    pub error: MockError,
    /// The unfolded node, rendered as source.
    pub node: String,
}

/// Outcome of resolving one expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The expression evaluates to a known mock.
    Mock(MockValue),
    /// The expression stays symbolic.
    Expr(Expr),
}

impl Resolved {
    /// Returns the mock, if the expression folded.
    #[must_use]
    pub const fn as_mock(&self) -> Option<&MockValue> {
        match self {
            Self::Mock(mock) => Some(mock),
            Self::Expr(_) => None,
        }
    }

    /// Converts back to syntax, reverting a mock to a literal or reference.
    #[must_use]
    pub fn into_expr(self) -> Expr {
        match self {
            Self::Mock(mock) => revert(&mock),
            Self::Expr(expr) => expr,
        }
    }

    fn value(&self) -> Option<&PyValue> {
        self.as_mock()
            .filter(|mock| mock.tag() != MockTag::Code)
            .and_then(MockValue::value)
    }

    fn int_like(&self) -> Option<&PyValue> {
        self.value()
            .filter(|value| matches!(value, PyValue::Int(_) | PyValue::Bool(_)))
    }
}

/// Folds statically known expressions into mocks.
#[derive(Debug, Default)]
pub struct SymbolicTransformer {
    namespace: Namespace,
    issues: Vec<FoldIssue>,
    depth: usize,
}

impl SymbolicTransformer {
    /// Creates a transformer over a fresh namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transformer that resolves names through `namespace`.
    #[must_use]
    pub fn with_namespace(namespace: Namespace) -> Self {
        Self {
            namespace,
            issues: Vec::new(),
            depth: 0,
        }
    }

    /// The namespace, including bindings recorded so far.
    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Nodes left unresolved so far.
    #[must_use]
    pub fn issues(&self) -> &[FoldIssue] {
        &self.issues
    }

    /// Consumes the transformer, returning its namespace and issues.
    #[must_use]
    pub fn into_parts(self) -> (Namespace, Vec<FoldIssue>) {
        (self.namespace, self.issues)
    }

    /// Folds a whole module.
    pub fn transform(&mut self, module: Module) -> Module {
        self.fold_module(module)
    }

    /// Resolves an expression to a mock where the model allows it.
    pub fn resolve(&mut self, expr: Expr) -> Resolved {
        match expr {
            Expr::Constant(constant) => {
                match PyValue::from_constant(&constant).map(MockValue::from_value) {
                    Some(Ok(mock)) => Resolved::Mock(mock),
                    Some(Err(error)) => {
                        tracing::trace!(%error, "leaving constant as written");
                        Resolved::Expr(Expr::Constant(constant))
                    }
                    None => Resolved::Expr(Expr::Constant(constant)),
                }
            }
            Expr::Name(id) => match self.namespace.get(&id) {
                Some(mock) => Resolved::Mock(mock.clone()),
                None => Resolved::Expr(Expr::Name(id)),
            },
            Expr::Subscript { value, slice } => self.resolve_subscript(*value, *slice),
            Expr::UnaryOp { op, operand } => {
                let inner = self.resolve(*operand);
                if let Some(value) = inner.int_like() {
                    match value.unary(op) {
                        Ok(result) => return wrap(result),
                        Err(error) => self.record(error.into(), &inner),
                    }
                }
                Resolved::Expr(Expr::UnaryOp {
                    op,
                    operand: Box::new(inner.into_expr()),
                })
            }
            Expr::BinOp { left, op, right } => {
                let lhs = self.resolve(*left);
                let rhs = self.resolve(*right);
                if matches!(op, BinaryOp::Add | BinaryOp::Sub)
                    && let (Some(lhs_value), Some(rhs_value)) = (lhs.int_like(), rhs.int_like())
                {
                    match lhs_value.binary(op, rhs_value) {
                        Ok(result) => return wrap(result),
                        Err(error) => self.record(error.into(), &lhs),
                    }
                }
                Resolved::Expr(Expr::BinOp {
                    left: Box::new(lhs.into_expr()),
                    op,
                    right: Box::new(rhs.into_expr()),
                })
            }
            Expr::BoolOp { op, values } => {
                let operands: Vec<Resolved> =
                    values.into_iter().map(|value| self.resolve(value)).collect();
                if operands.iter().all(|operand| operand.int_like().is_some()) {
                    return short_circuit(op, operands);
                }
                Resolved::Expr(Expr::BoolOp {
                    op,
                    values: operands.into_iter().map(Resolved::into_expr).collect(),
                })
            }
            Expr::Attribute { value, attr } => {
                let object = self.resolve(*value);
                if let Resolved::Mock(mock) = &object {
                    match mock.get_attr(&attr) {
                        Ok(member) => return Resolved::Mock(member),
                        Err(error) => self.record(error, &object),
                    }
                }
                Resolved::Expr(Expr::Attribute {
                    value: Box::new(object.into_expr()),
                    attr,
                })
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let callee = self.resolve(*func);
                let positional = args.into_iter().map(|arg| self.resolve_arg(arg)).collect();
                let named = keywords
                    .into_iter()
                    .map(|keyword| (keyword.arg, self.resolve(keyword.value)))
                    .collect();
                self.resolve_call(callee, positional, named)
            }
            Expr::List(items) => {
                let resolved: Vec<Resolved> =
                    items.into_iter().map(|item| self.resolve(item)).collect();
                if let Some(values) = resolved
                    .iter()
                    .map(|item| item.value().cloned())
                    .collect::<Option<Vec<_>>>()
                {
                    return wrap(PyValue::List(values));
                }
                Resolved::Expr(Expr::List(
                    resolved.into_iter().map(Resolved::into_expr).collect(),
                ))
            }
            Expr::Lambda { params, body } => {
                let result = self.resolve(*body);
                if let Some(scope) = result.as_mock().and_then(MockValue::as_scope)
                    && is_ignored_params(&params)
                {
                    return Resolved::Mock(MockValue::namespace_getter(scope));
                }
                Resolved::Expr(Expr::Lambda {
                    params,
                    body: Box::new(result.into_expr()),
                })
            }
            other => Resolved::Expr(fold::walk_expr(self, other)),
        }
    }

    fn resolve_arg(&mut self, arg: Expr) -> Resolved {
        match arg {
            Expr::Starred(value) => {
                Resolved::Expr(Expr::Starred(Box::new(self.fold_expr(*value))))
            }
            other => self.resolve(other),
        }
    }

    fn resolve_subscript(&mut self, value: Expr, slice: Expr) -> Resolved {
        let object = self.resolve(value);
        if let Expr::Slice { lower, upper, step } = slice {
            let bounds = [lower, upper, step].map(|bound| bound.map(|expr| self.resolve(*expr)));
            if let Some(sequence) = object.value()
                && let Some([lo, hi, st]) = slice_bounds(&bounds)
            {
                match sequence.slice(lo.as_ref(), hi.as_ref(), st.as_ref()) {
                    Ok(result) => return wrap(result),
                    Err(error) => self.record(error.into(), &object),
                }
            }
            let [lower, upper, step] =
                bounds.map(|bound| bound.map(|resolved| Box::new(resolved.into_expr())));
            return Resolved::Expr(Expr::Subscript {
                value: Box::new(object.into_expr()),
                slice: Box::new(Expr::Slice { lower, upper, step }),
            });
        }

        let key = self.resolve(slice);
        if let (Resolved::Mock(mock), Resolved::Mock(index)) = (&object, &key) {
            let outcome = match (mock.value(), index.value()) {
                (Some(sequence), Some(position @ (PyValue::Int(_) | PyValue::Bool(_)))) => sequence
                    .index(position)
                    .map_err(MockError::from)
                    .and_then(MockValue::from_value),
                _ => match index.as_str() {
                    Some(name) => mock.get_item(name, &self.namespace),
                    None => Err(MockError::key_not_found(
                        mock.name(),
                        index.value().map_or_else(|| index.name().to_owned(), PyValue::py_repr),
                    )),
                },
            };
            match outcome {
                Ok(found) => return Resolved::Mock(found),
                Err(error) => self.record(error, &object),
            }
        }
        Resolved::Expr(Expr::Subscript {
            value: Box::new(object.into_expr()),
            slice: Box::new(key.into_expr()),
        })
    }

    fn resolve_call(
        &mut self,
        callee: Resolved,
        args: Vec<Resolved>,
        keywords: Vec<(Option<String>, Resolved)>,
    ) -> Resolved {
        if let Resolved::Mock(function) = &callee {
            if function.handle() == Some(Handle::Builtin(Builtin::Eval))
                && keywords.is_empty()
                && let [Resolved::Mock(argument)] = args.as_slice()
                && let Some(source) = argument.as_source()
            {
                match self.expand_eval(source) {
                    Ok(resolved) => return resolved,
                    Err(error) => self.record(error, &callee),
                }
            } else if !function.has_behaviour() {
                self.record(MockError::not_callable(function.name()), &callee);
            } else if let Some((positional, named)) = mock_arguments(&args, &keywords) {
                match function.call(&positional, &named) {
                    Ok(Some(result)) => return Resolved::Mock(result),
                    Ok(None) => {}
                    Err(error) => self.record(error, &callee),
                }
            }
        }
        Resolved::Expr(rebuild_call(callee, args, keywords))
    }

    fn expand_eval(&mut self, source: &str) -> Result<Resolved, MockError> {
        if self.depth >= MAX_NESTING {
            return Err(MockError::invalid_arguments("eval", "nesting too deep"));
        }
        let expr = parse_expression(source.trim())
            .map_err(|error| MockError::invalid_arguments("eval", error.to_string()))?;
        tracing::debug!(depth = self.depth, "expanding eval");
        self.depth += 1;
        let resolved = self.resolve(expr);
        self.depth -= 1;
        Ok(resolved)
    }

    fn expand_exec(&mut self, source: &str) -> Result<Vec<Stmt>, MockError> {
        if self.depth >= MAX_NESTING {
            return Err(MockError::invalid_arguments("exec", "nesting too deep"));
        }
        let module = parse_module(source)
            .map_err(|error| MockError::invalid_arguments("exec", error.to_string()))?;
        tracing::debug!(
            depth = self.depth,
            statements = module.body.len(),
            "expanding exec"
        );
        self.depth += 1;
        let body = self.fold_body(module.body);
        self.depth -= 1;
        Ok(body)
    }

    /// Folds `exec(<known source>)` in statement position.
    fn fold_exec_stmt(&mut self, func: Expr, args: Vec<Expr>, keywords: Vec<Keyword>) -> Vec<Stmt> {
        let callee = self.resolve(func);
        let positional: Vec<Resolved> =
            args.into_iter().map(|arg| self.resolve_arg(arg)).collect();
        let named: Vec<(Option<String>, Resolved)> = keywords
            .into_iter()
            .map(|keyword| (keyword.arg, self.resolve(keyword.value)))
            .collect();
        if named.is_empty()
            && callee.as_mock().and_then(MockValue::handle) == Some(Handle::Builtin(Builtin::Exec))
            && let [Resolved::Mock(argument)] = positional.as_slice()
            && let Some(source) = argument.as_source()
        {
            match self.expand_exec(source) {
                Ok(body) => return body,
                Err(error) => {
                    self.record(error, &callee);
                    return vec![Stmt::Expr(rebuild_call(callee, positional, named))];
                }
            }
        }
        vec![Stmt::Expr(self.resolve_call(callee, positional, named).into_expr())]
    }

    /// Records `scope[key] = value` in the namespace when all three are known.
    fn fold_scope_store(&mut self, target: Expr, value: Expr) -> Vec<Stmt> {
        let stored = self.resolve(value);
        let Expr::Subscript {
            value: container,
            slice,
        } = target
        else {
            return vec![Stmt::Assign {
                targets: vec![self.fold_target(target)],
                value: stored.into_expr(),
            }];
        };
        let object = self.resolve(*container);
        let key = self.resolve(*slice);
        if let (Resolved::Mock(scope), Resolved::Mock(key_mock), Resolved::Mock(bound)) =
            (&object, &key, &stored)
            && scope.as_scope().is_some()
            && let Some(name) = key_mock.as_str()
        {
            self.namespace.insert(name, bound.clone());
            return Vec::new();
        }
        vec![Stmt::Assign {
            targets: vec![Expr::Subscript {
                value: Box::new(object.into_expr()),
                slice: Box::new(key.into_expr()),
            }],
            value: stored.into_expr(),
        }]
    }

    fn record(&mut self, error: MockError, node: &Resolved) {
        let rendered = match node {
            Resolved::Mock(mock) => mock.to_string(),
            Resolved::Expr(expr) => unparse_expr(expr),
        };
        tracing::warn!(target: "expected", %error, node = %rendered, "left node unresolved");
        self.issues.push(FoldIssue {
            error,
            node: rendered,
        });
    }
}

impl Fold for SymbolicTransformer {
    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        match stmt {
            Stmt::Expr(Expr::Call {
                func,
                args,
                keywords,
            }) => self.fold_exec_stmt(*func, args, keywords),
            Stmt::Assign { targets, value } => match <[Expr; 1]>::try_from(targets) {
                Ok([target]) => self.fold_scope_store(target, value),
                Err(targets) => vec![fold::walk_stmt(self, Stmt::Assign { targets, value })],
            },
            other => vec![fold::walk_stmt(self, other)],
        }
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        self.resolve(expr).into_expr()
    }
}

/// Wraps a computed value, keeping `None` as a literal.
fn wrap(value: PyValue) -> Resolved {
    if matches!(value, PyValue::None) {
        return Resolved::Expr(value.to_expr());
    }
    MockValue::from_value(value).map_or_else(
        |_| Resolved::Expr(Expr::Constant(Constant::None)),
        Resolved::Mock,
    )
}

/// `and`/`or` over known operands, yielding the deciding operand.
fn short_circuit(op: BoolOp, operands: Vec<Resolved>) -> Resolved {
    let decides = |operand: &Resolved| {
        let truthy = operand.value().is_some_and(PyValue::truthy);
        match op {
            BoolOp::And => !truthy,
            BoolOp::Or => truthy,
        }
    };
    let count = operands.len();
    operands
        .into_iter()
        .enumerate()
        .find(|(index, operand)| decides(operand) || index + 1 == count)
        .map_or_else(
            || Resolved::Expr(Expr::BoolOp { op, values: Vec::new() }),
            |(_, operand)| operand,
        )
}

fn rebuild_call(
    callee: Resolved,
    args: Vec<Resolved>,
    keywords: Vec<(Option<String>, Resolved)>,
) -> Expr {
    Expr::Call {
        func: Box::new(callee.into_expr()),
        args: args.into_iter().map(Resolved::into_expr).collect(),
        keywords: keywords
            .into_iter()
            .map(|(arg, value)| Keyword {
                arg,
                value: value.into_expr(),
            })
            .collect(),
    }
}

/// Slice bounds that are absent or known integers.
fn slice_bounds(
    bounds: &[Option<Resolved>; 3],
) -> Option<[Option<BigInt>; 3]> {
    let mut out: [Option<BigInt>; 3] = [None, None, None];
    for (slot, bound) in out.iter_mut().zip(bounds) {
        if let Some(resolved) = bound {
            *slot = Some(resolved.int_like()?.as_int()?);
        }
    }
    Some(out)
}

/// Positional and keyword arguments, when every one of them is a mock.
fn mock_arguments(
    args: &[Resolved],
    keywords: &[(Option<String>, Resolved)],
) -> Option<(Vec<MockValue>, Vec<(String, MockValue)>)> {
    let positional = args
        .iter()
        .map(|arg| arg.as_mock().cloned())
        .collect::<Option<Vec<_>>>()?;
    let named = keywords
        .iter()
        .map(|(name, value)| Some((name.clone()?, value.as_mock()?.clone())))
        .collect::<Option<Vec<_>>>()?;
    Some((positional, named))
}

/// Whether a lambda parameter list discards its arguments: empty, one plain
/// name, or a single `*name`.
fn is_ignored_params(params: &str) -> bool {
    let trimmed = params.trim();
    let name = trimmed.strip_prefix('*').unwrap_or(trimmed);
    trimmed.is_empty()
        || (!name.is_empty()
            && !name.starts_with('*')
            && name.chars().all(|c| c == '_' || c.is_alphanumeric()))
}

#[cfg(test)]
mod tests;

//! Owned tree rewriting.
//!
//! A [`Fold`] consumes nodes and returns their replacements. Every method has a
//! default that rebuilds the node from its folded children through the
//! matching `walk_*` function, so an implementation overrides only the node
//! kinds it rewrites and calls the walker to keep descending.
//!
//! Statements fold to a `Vec<Stmt>`: returning an empty vector removes the
//! statement and returning several splices them in its place.

use crate::ast::{Comprehension, ExceptHandler, Expr, Keyword, Module, Stmt};

/// Owned rewriter over the syntax tree.
pub trait Fold {
    /// Folds a whole module.
    fn fold_module(&mut self, module: Module) -> Module {
        walk_module(self, module)
    }

    /// Folds a statement list, flattening the per-statement results.
    fn fold_body(&mut self, body: Vec<Stmt>) -> Vec<Stmt> {
        walk_body(self, body)
    }

    /// Folds one statement into zero or more statements.
    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        vec![walk_stmt(self, stmt)]
    }

    /// Folds an expression in load position.
    fn fold_expr(&mut self, expr: Expr) -> Expr {
        walk_expr(self, expr)
    }

    /// Folds an assignment target.
    ///
    /// Bare names are left alone; the loads nested inside subscript and
    /// attribute targets go through [`Fold::fold_expr`].
    fn fold_target(&mut self, target: Expr) -> Expr {
        walk_target(self, target)
    }
}

/// Folds every statement of a module.
pub fn walk_module<F: Fold + ?Sized>(folder: &mut F, module: Module) -> Module {
    Module::new(folder.fold_body(module.body))
}

/// Folds each statement in order and concatenates the results.
pub fn walk_body<F: Fold + ?Sized>(folder: &mut F, body: Vec<Stmt>) -> Vec<Stmt> {
    body.into_iter()
        .flat_map(|stmt| folder.fold_stmt(stmt))
        .collect()
}

fn fold_opt<F: Fold + ?Sized>(folder: &mut F, expr: Option<Expr>) -> Option<Expr> {
    expr.map(|expr| folder.fold_expr(expr))
}

fn fold_exprs<F: Fold + ?Sized>(folder: &mut F, exprs: Vec<Expr>) -> Vec<Expr> {
    exprs.into_iter().map(|expr| folder.fold_expr(expr)).collect()
}

fn fold_boxed<F: Fold + ?Sized>(folder: &mut F, expr: Box<Expr>) -> Box<Expr> {
    Box::new(folder.fold_expr(*expr))
}

/// Rebuilds a statement from its folded children.
pub fn walk_stmt<F: Fold + ?Sized>(folder: &mut F, stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Expr(value) => Stmt::Expr(folder.fold_expr(value)),
        Stmt::Assign { targets, value } => {
            let folded = folder.fold_expr(value);
            Stmt::Assign {
                targets: targets
                    .into_iter()
                    .map(|target| folder.fold_target(target))
                    .collect(),
                value: folded,
            }
        }
        Stmt::AugAssign { target, op, value } => Stmt::AugAssign {
            value: folder.fold_expr(value),
            target: folder.fold_target(target),
            op,
        },
        Stmt::Return(value) => Stmt::Return(fold_opt(folder, value)),
        Stmt::Delete(targets) => Stmt::Delete(
            targets
                .into_iter()
                .map(|target| folder.fold_target(target))
                .collect(),
        ),
        Stmt::Raise { exc, cause } => Stmt::Raise {
            exc: fold_opt(folder, exc),
            cause: fold_opt(folder, cause),
        },
        Stmt::Assert { test, msg } => Stmt::Assert {
            test: folder.fold_expr(test),
            msg: fold_opt(folder, msg),
        },
        Stmt::If { test, body, orelse } => Stmt::If {
            test: folder.fold_expr(test),
            body: folder.fold_body(body),
            orelse: folder.fold_body(orelse),
        },
        Stmt::While { test, body, orelse } => Stmt::While {
            test: folder.fold_expr(test),
            body: folder.fold_body(body),
            orelse: folder.fold_body(orelse),
        },
        Stmt::For {
            target,
            iter,
            body,
            orelse,
            is_async,
        } => Stmt::For {
            iter: folder.fold_expr(iter),
            target: folder.fold_target(target),
            body: folder.fold_body(body),
            orelse: folder.fold_body(orelse),
            is_async,
        },
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            is_star,
        } => Stmt::Try {
            body: folder.fold_body(body),
            handlers: handlers
                .into_iter()
                .map(|handler| ExceptHandler {
                    type_: fold_opt(folder, handler.type_),
                    name: handler.name,
                    body: folder.fold_body(handler.body),
                })
                .collect(),
            orelse: folder.fold_body(orelse),
            finalbody: folder.fold_body(finalbody),
            is_star,
        },
        Stmt::With {
            items,
            body,
            is_async,
        } => Stmt::With {
            items,
            body: folder.fold_body(body),
            is_async,
        },
        Stmt::FunctionDef(mut def) => {
            def.decorators = fold_exprs(folder, std::mem::take(&mut def.decorators));
            def.body = folder.fold_body(std::mem::take(&mut def.body));
            Stmt::FunctionDef(def)
        }
        Stmt::ClassDef(mut def) => {
            def.decorators = fold_exprs(folder, std::mem::take(&mut def.decorators));
            def.bases = fold_exprs(folder, std::mem::take(&mut def.bases));
            def.keywords = fold_keywords(folder, std::mem::take(&mut def.keywords));
            def.body = folder.fold_body(std::mem::take(&mut def.body));
            Stmt::ClassDef(def)
        }
        other @ (Stmt::Pass
        | Stmt::Break
        | Stmt::Continue
        | Stmt::Global(_)
        | Stmt::Nonlocal(_)
        | Stmt::Import(_)
        | Stmt::ImportFrom { .. }
        | Stmt::Raw(_)) => other,
    }
}

fn fold_keywords<F: Fold + ?Sized>(folder: &mut F, keywords: Vec<Keyword>) -> Vec<Keyword> {
    keywords
        .into_iter()
        .map(|keyword| Keyword {
            arg: keyword.arg,
            value: folder.fold_expr(keyword.value),
        })
        .collect()
}

fn fold_generators<F: Fold + ?Sized>(
    folder: &mut F,
    generators: Vec<Comprehension>,
) -> Vec<Comprehension> {
    generators
        .into_iter()
        .map(|generator| Comprehension {
            iter: folder.fold_expr(generator.iter),
            target: folder.fold_target(generator.target),
            ifs: fold_exprs(folder, generator.ifs),
            is_async: generator.is_async,
        })
        .collect()
}

/// Rebuilds an expression from its folded children.
pub fn walk_expr<F: Fold + ?Sized>(folder: &mut F, expr: Expr) -> Expr {
    match expr {
        Expr::Attribute { value, attr } => Expr::Attribute {
            value: fold_boxed(folder, value),
            attr,
        },
        Expr::Subscript { value, slice } => Expr::Subscript {
            value: fold_boxed(folder, value),
            slice: fold_boxed(folder, slice),
        },
        Expr::Slice { lower, upper, step } => Expr::Slice {
            lower: lower.map(|expr| fold_boxed(folder, expr)),
            upper: upper.map(|expr| fold_boxed(folder, expr)),
            step: step.map(|expr| fold_boxed(folder, expr)),
        },
        Expr::Call {
            func,
            args,
            keywords,
        } => Expr::Call {
            func: fold_boxed(folder, func),
            args: fold_exprs(folder, args),
            keywords: fold_keywords(folder, keywords),
        },
        Expr::BinOp { left, op, right } => Expr::BinOp {
            left: fold_boxed(folder, left),
            op,
            right: fold_boxed(folder, right),
        },
        Expr::UnaryOp { op, operand } => Expr::UnaryOp {
            op,
            operand: fold_boxed(folder, operand),
        },
        Expr::BoolOp { op, values } => Expr::BoolOp {
            op,
            values: fold_exprs(folder, values),
        },
        Expr::Compare {
            left,
            ops,
            comparators,
        } => Expr::Compare {
            left: fold_boxed(folder, left),
            ops,
            comparators: fold_exprs(folder, comparators),
        },
        Expr::IfExp { test, body, orelse } => Expr::IfExp {
            test: fold_boxed(folder, test),
            body: fold_boxed(folder, body),
            orelse: fold_boxed(folder, orelse),
        },
        Expr::Lambda { params, body } => Expr::Lambda {
            params,
            body: fold_boxed(folder, body),
        },
        Expr::NamedExpr { target, value } => Expr::NamedExpr {
            target,
            value: fold_boxed(folder, value),
        },
        Expr::List(items) => Expr::List(fold_exprs(folder, items)),
        Expr::Tuple(items) => Expr::Tuple(fold_exprs(folder, items)),
        Expr::Set(items) => Expr::Set(fold_exprs(folder, items)),
        Expr::Dict { keys, values } => Expr::Dict {
            keys: keys.into_iter().map(|key| fold_opt(folder, key)).collect(),
            values: fold_exprs(folder, values),
        },
        Expr::Starred(value) => Expr::Starred(fold_boxed(folder, value)),
        Expr::ListComp { elt, generators } => {
            let folded = fold_generators(folder, generators);
            Expr::ListComp {
                elt: fold_boxed(folder, elt),
                generators: folded,
            }
        }
        Expr::SetComp { elt, generators } => {
            let folded = fold_generators(folder, generators);
            Expr::SetComp {
                elt: fold_boxed(folder, elt),
                generators: folded,
            }
        }
        Expr::GeneratorExp { elt, generators } => {
            let folded = fold_generators(folder, generators);
            Expr::GeneratorExp {
                elt: fold_boxed(folder, elt),
                generators: folded,
            }
        }
        Expr::DictComp {
            key,
            value,
            generators,
        } => {
            let folded = fold_generators(folder, generators);
            Expr::DictComp {
                key: fold_boxed(folder, key),
                value: fold_boxed(folder, value),
                generators: folded,
            }
        }
        Expr::Await(value) => Expr::Await(fold_boxed(folder, value)),
        other @ (Expr::Name(_) | Expr::Constant(_) | Expr::Raw(_)) => other,
    }
}

/// Folds the load positions inside an assignment target.
pub fn walk_target<F: Fold + ?Sized>(folder: &mut F, target: Expr) -> Expr {
    match target {
        Expr::Tuple(items) => Expr::Tuple(
            items
                .into_iter()
                .map(|item| folder.fold_target(item))
                .collect(),
        ),
        Expr::List(items) => Expr::List(
            items
                .into_iter()
                .map(|item| folder.fold_target(item))
                .collect(),
        ),
        Expr::Starred(value) => Expr::Starred(Box::new(folder.fold_target(*value))),
        Expr::Subscript { value, slice } => Expr::Subscript {
            value: fold_boxed(folder, value),
            slice: fold_boxed(folder, slice),
        },
        Expr::Attribute { value, attr } => Expr::Attribute {
            value: fold_boxed(folder, value),
            attr,
        },
        other => other,
    }
}

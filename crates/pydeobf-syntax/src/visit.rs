//! Read-only traversal.
//!
//! Scanners use [`Visit`] to look for marker shapes without cloning the tree.
//! Overridden methods call the matching `walk_*` function to keep descending.

use crate::ast::{Comprehension, Expr, Keyword, Module, Stmt};

/// Borrowing visitor over the syntax tree, in source order.
pub trait Visit {
    /// Visits a statement.
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    /// Visits an expression.
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

/// Visits every top-level statement of a module.
pub fn walk_module<V: Visit + ?Sized>(visitor: &mut V, module: &Module) {
    walk_body(visitor, &module.body);
}

/// Visits each statement of a body in order.
pub fn walk_body<V: Visit + ?Sized>(visitor: &mut V, body: &[Stmt]) {
    for stmt in body {
        visitor.visit_stmt(stmt);
    }
}

fn visit_all<'a, V: Visit + ?Sized>(visitor: &mut V, exprs: impl IntoIterator<Item = &'a Expr>) {
    for expr in exprs {
        visitor.visit_expr(expr);
    }
}

fn visit_keywords<V: Visit + ?Sized>(visitor: &mut V, keywords: &[Keyword]) {
    visit_all(visitor, keywords.iter().map(|keyword| &keyword.value));
}

fn visit_generators<V: Visit + ?Sized>(visitor: &mut V, generators: &[Comprehension]) {
    for generator in generators {
        visitor.visit_expr(&generator.target);
        visitor.visit_expr(&generator.iter);
        visit_all(visitor, &generator.ifs);
    }
}

/// Visits the children of a statement.
pub fn walk_stmt<V: Visit + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Expr(value) => visitor.visit_expr(value),
        Stmt::Assign { targets, value } => {
            visit_all(visitor, targets);
            visitor.visit_expr(value);
        }
        Stmt::AugAssign { target, value, .. } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        Stmt::Return(value) => visit_all(visitor, value),
        Stmt::Delete(targets) => visit_all(visitor, targets),
        Stmt::Raise { exc, cause } => {
            visit_all(visitor, exc);
            visit_all(visitor, cause);
        }
        Stmt::Assert { test, msg } => {
            visitor.visit_expr(test);
            visit_all(visitor, msg);
        }
        Stmt::If { test, body, orelse } | Stmt::While { test, body, orelse } => {
            visitor.visit_expr(test);
            walk_body(visitor, body);
            walk_body(visitor, orelse);
        }
        Stmt::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            visitor.visit_expr(target);
            visitor.visit_expr(iter);
            walk_body(visitor, body);
            walk_body(visitor, orelse);
        }
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        } => {
            walk_body(visitor, body);
            for handler in handlers {
                visit_all(visitor, &handler.type_);
                walk_body(visitor, &handler.body);
            }
            walk_body(visitor, orelse);
            walk_body(visitor, finalbody);
        }
        Stmt::With { body, .. } => walk_body(visitor, body),
        Stmt::FunctionDef(def) => {
            visit_all(visitor, &def.decorators);
            walk_body(visitor, &def.body);
        }
        Stmt::ClassDef(def) => {
            visit_all(visitor, &def.decorators);
            visit_all(visitor, &def.bases);
            visit_keywords(visitor, &def.keywords);
            walk_body(visitor, &def.body);
        }
        Stmt::Pass
        | Stmt::Break
        | Stmt::Continue
        | Stmt::Global(_)
        | Stmt::Nonlocal(_)
        | Stmt::Import(_)
        | Stmt::ImportFrom { .. }
        | Stmt::Raw(_) => {}
    }
}

/// Visits the children of an expression.
pub fn walk_expr<V: Visit + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Attribute { value, .. } | Expr::Starred(value) | Expr::Await(value) => {
            visitor.visit_expr(value);
        }
        Expr::Subscript { value, slice } => {
            visitor.visit_expr(value);
            visitor.visit_expr(slice);
        }
        Expr::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                visitor.visit_expr(part);
            }
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            visitor.visit_expr(func);
            visit_all(visitor, args);
            visit_keywords(visitor, keywords);
        }
        Expr::BinOp { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::UnaryOp { operand, .. } => visitor.visit_expr(operand),
        Expr::BoolOp { values, .. } => visit_all(visitor, values),
        Expr::Compare {
            left, comparators, ..
        } => {
            visitor.visit_expr(left);
            visit_all(visitor, comparators);
        }
        Expr::IfExp { test, body, orelse } => {
            visitor.visit_expr(test);
            visitor.visit_expr(body);
            visitor.visit_expr(orelse);
        }
        Expr::Lambda { body, .. } | Expr::NamedExpr { value: body, .. } => {
            visitor.visit_expr(body);
        }
        Expr::List(items) | Expr::Tuple(items) | Expr::Set(items) => visit_all(visitor, items),
        Expr::Dict { keys, values } => {
            visit_all(visitor, keys.iter().flatten());
            visit_all(visitor, values);
        }
        Expr::ListComp { elt, generators }
        | Expr::SetComp { elt, generators }
        | Expr::GeneratorExp { elt, generators } => {
            visitor.visit_expr(elt);
            visit_generators(visitor, generators);
        }
        Expr::DictComp {
            key,
            value,
            generators,
        } => {
            visitor.visit_expr(key);
            visitor.visit_expr(value);
            visit_generators(visitor, generators);
        }
        Expr::Name(_) | Expr::Constant(_) | Expr::Raw(_) => {}
    }
}

//! Rendering of the owned AST back to Python source.
//!
//! Output follows `ast.unparse`: four-space indentation, minimal parentheses
//! driven by operator precedence, and `repr()` for constants. Bodies emptied
//! by a rewrite are rendered as `pass` so the output stays valid Python.

use crate::ast::{
    Alias, BinaryOp, BoolOp, ClassDef, Comprehension, Constant, ExceptHandler, Expr, FunctionDef,
    Keyword, Module, Stmt, UnaryOp,
};
use crate::literal::{repr_bytes, repr_float, repr_str};

const INDENT: &str = "    ";
const INFINITY: &str = "1e309";

/// Renders a module as Python source, without a trailing newline.
#[must_use]
pub fn unparse(module: &Module) -> String {
    let mut printer = Printer::default();
    printer.statements(&module.body);
    printer.lines.join("\n")
}

/// Renders a single expression.
#[must_use]
pub fn unparse_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, Precedence::Test);
    out
}

/// Binding strength of expression forms, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    NamedExpr,
    Tuple,
    Yield,
    Test,
    Or,
    And,
    Not,
    Cmp,
    BitOr,
    BitXor,
    BitAnd,
    Shift,
    Arith,
    Term,
    Factor,
    Power,
    Await,
    Atom,
}

impl Precedence {
    const fn next(self) -> Self {
        match self {
            Self::NamedExpr => Self::Tuple,
            Self::Tuple => Self::Yield,
            Self::Yield => Self::Test,
            Self::Test => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Not,
            Self::Not => Self::Cmp,
            Self::Cmp => Self::BitOr,
            Self::BitOr => Self::BitXor,
            Self::BitXor => Self::BitAnd,
            Self::BitAnd => Self::Shift,
            Self::Shift => Self::Arith,
            Self::Arith => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Power,
            Self::Power => Self::Await,
            Self::Await | Self::Atom => Self::Atom,
        }
    }

    const fn of_binary(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add | BinaryOp::Sub => Self::Arith,
            BinaryOp::Mult
            | BinaryOp::MatMult
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::FloorDiv => Self::Term,
            BinaryOp::Pow => Self::Power,
            BinaryOp::LShift | BinaryOp::RShift => Self::Shift,
            BinaryOp::BitOr => Self::BitOr,
            BinaryOp::BitXor => Self::BitXor,
            BinaryOp::BitAnd => Self::BitAnd,
        }
    }
}

#[derive(Default)]
struct Printer {
    lines: Vec<String>,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        self.lines.push(format!("{}{text}", INDENT.repeat(self.depth)));
    }

    fn blank_line(&mut self) {
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
    }

    fn statements(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.statement(stmt);
        }
    }

    fn block(&mut self, header: &str, body: &[Stmt]) {
        self.line(header);
        self.depth += 1;
        if body.is_empty() {
            self.line("pass");
        } else {
            self.statements(body);
        }
        self.depth -= 1;
    }

    fn statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(value) => self.line(&expr_at(value, Precedence::Yield)),
            Stmt::Assign { targets, value } => {
                let mut text = String::new();
                for target in targets {
                    write_expr(&mut text, target, Precedence::Tuple);
                    text.push_str(" = ");
                }
                write_expr(&mut text, value, Precedence::Test);
                self.line(&text);
            }
            Stmt::AugAssign { target, op, value } => {
                let text = format!(
                    "{} {}= {}",
                    expr_at(target, Precedence::Tuple),
                    op.symbol(),
                    expr_at(value, Precedence::Test)
                );
                self.line(&text);
            }
            Stmt::Return(value) => match value {
                Some(value) => self.line(&format!("return {}", expr_at(value, Precedence::Test))),
                None => self.line("return"),
            },
            Stmt::Delete(targets) => self.line(&format!("del {}", comma_list(targets))),
            Stmt::Raise { exc, cause } => {
                let mut text = "raise".to_owned();
                if let Some(exc) = exc {
                    text.push(' ');
                    write_expr(&mut text, exc, Precedence::Test);
                }
                if let Some(cause) = cause {
                    text.push_str(" from ");
                    write_expr(&mut text, cause, Precedence::Test);
                }
                self.line(&text);
            }
            Stmt::Assert { test, msg } => {
                let mut text = format!("assert {}", expr_at(test, Precedence::Test));
                if let Some(msg) = msg {
                    text.push_str(", ");
                    write_expr(&mut text, msg, Precedence::Test);
                }
                self.line(&text);
            }
            Stmt::Pass => self.line("pass"),
            Stmt::Break => self.line("break"),
            Stmt::Continue => self.line("continue"),
            Stmt::Global(names) => self.line(&format!("global {}", names.join(", "))),
            Stmt::Nonlocal(names) => self.line(&format!("nonlocal {}", names.join(", "))),
            Stmt::Import(names) => self.line(&format!("import {}", aliases(names))),
            Stmt::ImportFrom {
                module,
                level,
                names,
            } => {
                let text = format!(
                    "from {}{} import {}",
                    ".".repeat(*level),
                    module.as_deref().unwrap_or_default(),
                    aliases(names)
                );
                self.line(&text);
            }
            Stmt::If { test, body, orelse } => self.if_chain("if", test, body, orelse),
            Stmt::While { test, body, orelse } => {
                self.block(&format!("while {}:", expr_at(test, Precedence::Test)), body);
                self.else_block(orelse);
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                is_async,
            } => {
                let header = format!(
                    "{}for {} in {}:",
                    if *is_async { "async " } else { "" },
                    expr_at(target, Precedence::Tuple),
                    expr_at(iter, Precedence::Test)
                );
                self.block(&header, body);
                self.else_block(orelse);
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                is_star,
            } => {
                self.block("try:", body);
                for handler in handlers {
                    self.handler(handler, *is_star);
                }
                self.else_block(orelse);
                if !finalbody.is_empty() {
                    self.block("finally:", finalbody);
                }
            }
            Stmt::With {
                items,
                body,
                is_async,
            } => {
                let header = format!("{}with {items}:", if *is_async { "async " } else { "" });
                self.block(&header, body);
            }
            Stmt::FunctionDef(def) => self.function(def),
            Stmt::ClassDef(def) => self.class(def),
            Stmt::Raw(text) => {
                for raw_line in text.split('\n') {
                    if raw_line.trim().is_empty() {
                        self.lines.push(String::new());
                    } else {
                        self.line(raw_line);
                    }
                }
            }
        }
    }

    fn if_chain(&mut self, keyword: &str, test: &Expr, body: &[Stmt], orelse: &[Stmt]) {
        self.block(&format!("{keyword} {}:", expr_at(test, Precedence::Test)), body);
        match orelse {
            [Stmt::If { test, body, orelse }] => self.if_chain("elif", test, body, orelse),
            _ => self.else_block(orelse),
        }
    }

    fn else_block(&mut self, orelse: &[Stmt]) {
        if !orelse.is_empty() {
            self.block("else:", orelse);
        }
    }

    fn handler(&mut self, handler: &ExceptHandler, is_star: bool) {
        let mut header = if is_star { "except*" } else { "except" }.to_owned();
        if let Some(type_) = &handler.type_ {
            header.push(' ');
            write_expr(&mut header, type_, Precedence::Test);
        }
        if let Some(name) = &handler.name {
            header.push_str(" as ");
            header.push_str(name);
        }
        header.push(':');
        self.block(&header, &handler.body);
    }

    fn decorators(&mut self, decorators: &[Expr]) {
        self.blank_line();
        for decorator in decorators {
            self.line(&format!("@{}", expr_at(decorator, Precedence::Test)));
        }
    }

    fn function(&mut self, def: &FunctionDef) {
        self.decorators(&def.decorators);
        let returns = def
            .returns
            .as_ref()
            .map(|returns| format!(" -> {returns}"))
            .unwrap_or_default();
        let header = format!(
            "{}def {}{}{returns}:",
            if def.is_async { "async " } else { "" },
            def.name,
            def.params
        );
        self.block(&header, &def.body);
    }

    fn class(&mut self, def: &ClassDef) {
        self.decorators(&def.decorators);
        let mut header = format!("class {}", def.name);
        if !def.bases.is_empty() || !def.keywords.is_empty() {
            header.push('(');
            write_arguments(&mut header, &def.bases, &def.keywords);
            header.push(')');
        }
        header.push(':');
        self.block(&header, &def.body);
    }
}

fn aliases(names: &[Alias]) -> String {
    names
        .iter()
        .map(|alias| match &alias.asname {
            Some(asname) => format!("{} as {asname}", alias.name),
            None => alias.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn comma_list(items: &[Expr]) -> String {
    let mut out = String::new();
    write_items(&mut out, items, Precedence::Test);
    out
}

fn expr_at(expr: &Expr, context: Precedence) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, context);
    out
}

fn write_items(out: &mut String, items: &[Expr], context: Precedence) {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_expr(out, item, context);
    }
}

fn write_arguments(out: &mut String, args: &[Expr], keywords: &[Keyword]) {
    write_items(out, args, Precedence::Test);
    for (index, keyword) in keywords.iter().enumerate() {
        if index > 0 || !args.is_empty() {
            out.push_str(", ");
        }
        match &keyword.arg {
            Some(arg) => {
                out.push_str(arg);
                out.push('=');
                write_expr(out, &keyword.value, Precedence::Test);
            }
            None => {
                out.push_str("**");
                write_expr(out, &keyword.value, Precedence::BitOr);
            }
        }
    }
}

/// Writes `inner` wrapped in parentheses when `own` binds looser than the
/// surrounding `context` requires.
fn parenthesize(
    out: &mut String,
    own: Precedence,
    context: Precedence,
    inner: impl FnOnce(&mut String),
) {
    let wrap = own < context;
    if wrap {
        out.push('(');
    }
    inner(out);
    if wrap {
        out.push(')');
    }
}

fn write_expr(out: &mut String, expr: &Expr, context: Precedence) {
    match expr {
        Expr::Name(id) => out.push_str(id),
        Expr::Constant(constant) => write_constant(out, constant, context),
        Expr::Attribute { value, attr } => {
            let is_int = matches!(value.as_ref(), Expr::Constant(Constant::Int(_)));
            write_expr(out, value, Precedence::Atom);
            if is_int {
                out.push(' ');
            }
            out.push('.');
            out.push_str(attr);
        }
        Expr::Subscript { value, slice } => {
            write_expr(out, value, Precedence::Atom);
            out.push('[');
            match slice.as_ref() {
                Expr::Tuple(items) if !items.is_empty() => {
                    write_items(out, items, Precedence::Test);
                    if items.len() == 1 {
                        out.push(',');
                    }
                }
                other => write_expr(out, other, Precedence::Tuple),
            }
            out.push(']');
        }
        Expr::Slice { lower, upper, step } => {
            if let Some(lower) = lower {
                write_expr(out, lower, Precedence::Test);
            }
            out.push(':');
            if let Some(upper) = upper {
                write_expr(out, upper, Precedence::Test);
            }
            if let Some(step) = step {
                out.push(':');
                write_expr(out, step, Precedence::Test);
            }
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            write_expr(out, func, Precedence::Atom);
            out.push('(');
            write_arguments(out, args, keywords);
            out.push(')');
        }
        Expr::BinOp { left, op, right } => {
            let own = Precedence::of_binary(*op);
            let (left_ctx, right_ctx) = if *op == BinaryOp::Pow {
                (own.next(), own)
            } else {
                (own, own.next())
            };
            parenthesize(out, own, context, |out| {
                write_expr(out, left, left_ctx);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                write_expr(out, right, right_ctx);
            });
        }
        Expr::UnaryOp { op, operand } => {
            let own = if *op == UnaryOp::Not {
                Precedence::Not
            } else {
                Precedence::Factor
            };
            parenthesize(out, own, context, |out| {
                out.push_str(op.symbol());
                if *op == UnaryOp::Not {
                    out.push(' ');
                }
                write_expr(out, operand, own);
            });
        }
        Expr::BoolOp { op, values } => {
            let own = if *op == BoolOp::And {
                Precedence::And
            } else {
                Precedence::Or
            };
            parenthesize(out, own, context, |out| {
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        out.push(' ');
                        out.push_str(op.symbol());
                        out.push(' ');
                    }
                    write_expr(out, value, own.next());
                }
            });
        }
        Expr::Compare {
            left,
            ops,
            comparators,
        } => {
            parenthesize(out, Precedence::Cmp, context, |out| {
                write_expr(out, left, Precedence::Cmp.next());
                for (op, comparator) in ops.iter().zip(comparators) {
                    out.push(' ');
                    out.push_str(op.symbol());
                    out.push(' ');
                    write_expr(out, comparator, Precedence::Cmp.next());
                }
            });
        }
        Expr::IfExp { test, body, orelse } => {
            parenthesize(out, Precedence::Test, context, |out| {
                write_expr(out, body, Precedence::Test.next());
                out.push_str(" if ");
                write_expr(out, test, Precedence::Test.next());
                out.push_str(" else ");
                write_expr(out, orelse, Precedence::Test);
            });
        }
        Expr::Lambda { params, body } => {
            parenthesize(out, Precedence::Test, context, |out| {
                out.push_str("lambda");
                if !params.is_empty() {
                    out.push(' ');
                    out.push_str(params);
                }
                out.push_str(": ");
                write_expr(out, body, Precedence::Test);
            });
        }
        Expr::NamedExpr { target, value } => {
            parenthesize(out, Precedence::NamedExpr, context, |out| {
                out.push_str(target);
                out.push_str(" := ");
                write_expr(out, value, Precedence::Atom);
            });
        }
        Expr::List(items) => {
            out.push('[');
            write_items(out, items, Precedence::Test);
            out.push(']');
        }
        Expr::Tuple(items) => {
            let wrap = items.is_empty() || context > Precedence::Tuple;
            if wrap {
                out.push('(');
            }
            write_items(out, items, Precedence::Test);
            if items.len() == 1 {
                out.push(',');
            }
            if wrap {
                out.push(')');
            }
        }
        Expr::Set(items) => {
            if items.is_empty() {
                out.push_str("{*()}");
            } else {
                out.push('{');
                write_items(out, items, Precedence::Test);
                out.push('}');
            }
        }
        Expr::Dict { keys, values } => {
            out.push('{');
            for (index, (key, value)) in keys.iter().zip(values).enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                match key {
                    Some(key) => {
                        write_expr(out, key, Precedence::Test);
                        out.push_str(": ");
                        write_expr(out, value, Precedence::Test);
                    }
                    None => {
                        out.push_str("**");
                        write_expr(out, value, Precedence::BitOr);
                    }
                }
            }
            out.push('}');
        }
        Expr::Starred(value) => {
            out.push('*');
            write_expr(out, value, Precedence::BitOr);
        }
        Expr::ListComp { elt, generators } => {
            out.push('[');
            write_expr(out, elt, Precedence::Test);
            write_generators(out, generators);
            out.push(']');
        }
        Expr::SetComp { elt, generators } => {
            out.push('{');
            write_expr(out, elt, Precedence::Test);
            write_generators(out, generators);
            out.push('}');
        }
        Expr::GeneratorExp { elt, generators } => {
            out.push('(');
            write_expr(out, elt, Precedence::Test);
            write_generators(out, generators);
            out.push(')');
        }
        Expr::DictComp {
            key,
            value,
            generators,
        } => {
            out.push('{');
            write_expr(out, key, Precedence::Test);
            out.push_str(": ");
            write_expr(out, value, Precedence::Test);
            write_generators(out, generators);
            out.push('}');
        }
        Expr::Await(value) => {
            parenthesize(out, Precedence::Await, context, |out| {
                out.push_str("await ");
                write_expr(out, value, Precedence::Atom);
            });
        }
        Expr::Raw(text) => {
            if is_atomic(text) {
                out.push_str(text);
            } else {
                out.push('(');
                out.push_str(text);
                out.push(')');
            }
        }
    }
}

fn write_generators(out: &mut String, generators: &[Comprehension]) {
    for generator in generators {
        out.push_str(if generator.is_async { " async for " } else { " for " });
        write_expr(out, &generator.target, Precedence::Tuple);
        out.push_str(" in ");
        write_expr(out, &generator.iter, Precedence::Test.next());
        for condition in &generator.ifs {
            out.push_str(" if ");
            write_expr(out, condition, Precedence::Test.next());
        }
    }
}

fn write_constant(out: &mut String, constant: &Constant, context: Precedence) {
    match constant {
        Constant::None => out.push_str("None"),
        Constant::Bool(true) => out.push_str("True"),
        Constant::Bool(false) => out.push_str("False"),
        Constant::Ellipsis => out.push_str("..."),
        Constant::Str(value) => out.push_str(&repr_str(value)),
        Constant::Bytes(value) => out.push_str(&repr_bytes(value)),
        Constant::Int(value) => {
            let text = value.to_string();
            let negative = text.starts_with('-');
            parenthesize(out, negative_aware(negative), context, |out| out.push_str(&text));
        }
        Constant::Float(value) => {
            let text = if value.is_nan() {
                format!("({INFINITY}-{INFINITY})")
            } else {
                repr_float(*value).replace("inf", INFINITY)
            };
            let negative = text.starts_with('-');
            parenthesize(out, negative_aware(negative), context, |out| out.push_str(&text));
        }
    }
}

/// Negative literals print with a leading minus and bind like unary minus.
const fn negative_aware(negative: bool) -> Precedence {
    if negative {
        Precedence::Factor
    } else {
        Precedence::Atom
    }
}

/// Raw text that is safe to splice without parentheses: identifiers, dotted
/// names, numbers and single string literals.
fn is_atomic(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.contains('\n') {
        return false;
    }
    if let Some(quote_at) = trimmed.find(['\'', '"']) {
        let (prefix, rest) = trimmed.split_at(quote_at);
        let quote = rest.chars().next().unwrap_or('\'');
        return prefix.chars().all(|c| c.is_ascii_alphabetic())
            && rest.len() >= 2
            && rest.ends_with(quote)
            && !rest.get(1..rest.len() - 1).is_some_and(|inner| inner.contains(quote));
    }
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.'))
}

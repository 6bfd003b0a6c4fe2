//! Lowering from the Tree-sitter concrete tree to the owned AST.
//!
//! The walk is total: every node kind that has no AST counterpart becomes a
//! `Raw` node carrying its source text, dedented to the column the node
//! starts at so it can be re-indented when unparsed.

use tree_sitter::Node;

use crate::ast::{
    Alias, BinaryOp, BoolOp, ClassDef, CmpOp, Comprehension, Constant, ExceptHandler, Expr,
    FunctionDef, Keyword, Module, Stmt, UnaryOp,
};
use crate::literal::{StringLiteral, decode_string_literal, parse_float_literal, parse_int_literal};

/// Lowers a `module` node into an owned [`Module`].
pub(crate) fn lower_module(root: Node<'_>, source: &str) -> Module {
    let lowerer = Lowerer { source };
    Module::new(lowerer.statements(root))
}

struct Lowerer<'s> {
    source: &'s str,
}

/// Named, non-extra children of `node` (comments are extras).
fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

/// All non-extra children of `node`, anonymous tokens included.
fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

fn starts_with_token(node: Node<'_>, token: &str) -> bool {
    children(node).first().is_some_and(|child| child.kind() == token)
}

impl<'s> Lowerer<'s> {
    fn text(&self, node: Node<'_>) -> &'s str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }

    /// Source text of `node` with continuation lines dedented by the node's
    /// start column.
    fn dedented(&self, node: Node<'_>) -> String {
        let column = node.start_position().column;
        let mut lines = self.text(node).split('\n');
        let mut out = lines.next().unwrap_or_default().to_owned();
        for line in lines {
            out.push('\n');
            let indent = line
                .char_indices()
                .take_while(|(index, c)| *index < column && (*c == ' ' || *c == '\t'))
                .count();
            out.push_str(line.get(indent..).unwrap_or(line));
        }
        out
    }

    fn raw_stmt(&self, node: Node<'_>) -> Stmt {
        Stmt::Raw(self.dedented(node))
    }

    fn raw_expr(&self, node: Node<'_>) -> Expr {
        Expr::Raw(self.dedented(node))
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn statements(&self, node: Node<'_>) -> Vec<Stmt> {
        named_children(node)
            .into_iter()
            .map(|child| self.statement(child))
            .collect()
    }

    fn body(&self, node: Option<Node<'_>>) -> Vec<Stmt> {
        node.map(|block| self.statements(block)).unwrap_or_default()
    }

    fn statement(&self, node: Node<'_>) -> Stmt {
        match node.kind() {
            "expression_statement" => self.expression_statement(node),
            "pass_statement" => Stmt::Pass,
            "break_statement" => Stmt::Break,
            "continue_statement" => Stmt::Continue,
            "return_statement" => Stmt::Return(
                named_children(node)
                    .first()
                    .map(|value| self.expr(*value)),
            ),
            "delete_statement" => Stmt::Delete(
                named_children(node)
                    .into_iter()
                    .flat_map(|target| self.flatten_tuple(target))
                    .collect(),
            ),
            "raise_statement" => self.raise_statement(node),
            "assert_statement" => {
                let parts = named_children(node);
                match parts.as_slice() {
                    [test] => Stmt::Assert {
                        test: self.expr(*test),
                        msg: None,
                    },
                    [test, msg] => Stmt::Assert {
                        test: self.expr(*test),
                        msg: Some(self.expr(*msg)),
                    },
                    _ => self.raw_stmt(node),
                }
            }
            "global_statement" => Stmt::Global(self.identifiers(node)),
            "nonlocal_statement" => Stmt::Nonlocal(self.identifiers(node)),
            "import_statement" => Stmt::Import(self.import_names(node)),
            "import_from_statement" => self.import_from(node),
            "future_import_statement" => Stmt::ImportFrom {
                module: Some("__future__".to_owned()),
                level: 0,
                names: self.import_names(node),
            },
            "if_statement" => self.if_statement(node),
            "for_statement" => self.for_statement(node),
            "while_statement" => Stmt::While {
                test: self.field_expr(node, "condition"),
                body: self.body(node.child_by_field_name("body")),
                orelse: self.else_body(node.child_by_field_name("alternative")),
            },
            "try_statement" => self.try_statement(node),
            "with_statement" => self.with_statement(node),
            "function_definition" => self
                .function_def(node, Vec::new())
                .unwrap_or_else(|| self.raw_stmt(node)),
            "class_definition" => self
                .class_def(node, Vec::new())
                .unwrap_or_else(|| self.raw_stmt(node)),
            "decorated_definition" => self
                .decorated(node)
                .unwrap_or_else(|| self.raw_stmt(node)),
            _ => self.raw_stmt(node),
        }
    }

    fn expression_statement(&self, node: Node<'_>) -> Stmt {
        let parts = named_children(node);
        match parts.as_slice() {
            [single] => match single.kind() {
                "assignment" => self
                    .assignment(*single)
                    .unwrap_or_else(|| self.raw_stmt(node)),
                "augmented_assignment" => self
                    .augmented_assignment(*single)
                    .unwrap_or_else(|| self.raw_stmt(node)),
                "yield" => self.raw_stmt(node),
                _ => Stmt::Expr(self.expr(*single)),
            },
            [] => self.raw_stmt(node),
            many => Stmt::Expr(Expr::Tuple(many.iter().map(|part| self.expr(*part)).collect())),
        }
    }

    fn assignment(&self, node: Node<'_>) -> Option<Stmt> {
        if node.child_by_field_name("type").is_some() {
            return None;
        }
        let mut targets = Vec::new();
        let mut current = node;
        loop {
            targets.push(self.target(current.child_by_field_name("left")?));
            let right = current.child_by_field_name("right")?;
            match right.kind() {
                "assignment" => {
                    if right.child_by_field_name("type").is_some() {
                        return None;
                    }
                    current = right;
                }
                "augmented_assignment" | "yield" => return None,
                _ => {
                    return Some(Stmt::Assign {
                        targets,
                        value: self.expr(right),
                    });
                }
            }
        }
    }

    fn augmented_assignment(&self, node: Node<'_>) -> Option<Stmt> {
        let operator = node.child_by_field_name("operator")?;
        let right = node.child_by_field_name("right")?;
        if right.kind() == "yield" {
            return None;
        }
        Some(Stmt::AugAssign {
            target: self.target(node.child_by_field_name("left")?),
            op: BinaryOp::from_symbol(operator.kind())?,
            value: self.expr(right),
        })
    }

    fn raise_statement(&self, node: Node<'_>) -> Stmt {
        let cause = node.child_by_field_name("cause");
        let exc = named_children(node)
            .into_iter()
            .find(|child| Some(*child) != cause)
            .map(|child| self.expr(child));
        Stmt::Raise {
            exc,
            cause: cause.map(|child| self.expr(child)),
        }
    }

    fn identifiers(&self, node: Node<'_>) -> Vec<String> {
        named_children(node)
            .into_iter()
            .map(|child| self.text(child).to_owned())
            .collect()
    }

    fn import_names(&self, node: Node<'_>) -> Vec<Alias> {
        field_children(node, "name")
            .into_iter()
            .map(|name| self.alias(name))
            .collect()
    }

    fn alias(&self, node: Node<'_>) -> Alias {
        if node.kind() == "aliased_import" {
            Alias {
                name: node
                    .child_by_field_name("name")
                    .map(|n| self.dotted(n))
                    .unwrap_or_default(),
                asname: node
                    .child_by_field_name("alias")
                    .map(|n| self.text(n).to_owned()),
            }
        } else {
            Alias {
                name: self.dotted(node),
                asname: None,
            }
        }
    }

    /// Dotted names may contain whitespace around the dots; drop it.
    fn dotted(&self, node: Node<'_>) -> String {
        self.text(node).split_whitespace().collect()
    }

    fn import_from(&self, node: Node<'_>) -> Stmt {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return self.raw_stmt(node);
        };
        let (module, level) = if module_node.kind() == "relative_import" {
            let mut level = 0;
            let mut module = None;
            for child in named_children(module_node) {
                if child.kind() == "import_prefix" {
                    level = self.text(child).chars().filter(|c| *c == '.').count();
                } else {
                    module = Some(self.dotted(child));
                }
            }
            (module, level)
        } else {
            (Some(self.dotted(module_node)), 0)
        };

        let wildcard = named_children(node)
            .into_iter()
            .any(|child| child.kind() == "wildcard_import");
        let names = if wildcard {
            vec![Alias {
                name: "*".to_owned(),
                asname: None,
            }]
        } else {
            self.import_names(node)
        };
        Stmt::ImportFrom {
            module,
            level,
            names,
        }
    }

    fn if_statement(&self, node: Node<'_>) -> Stmt {
        let alternatives = field_children(node, "alternative");
        Stmt::If {
            test: self.field_expr(node, "condition"),
            body: self.body(node.child_by_field_name("consequence")),
            orelse: self.elif_chain(&alternatives),
        }
    }

    fn elif_chain(&self, alternatives: &[Node<'_>]) -> Vec<Stmt> {
        let Some((first, rest)) = alternatives.split_first() else {
            return Vec::new();
        };
        match first.kind() {
            "elif_clause" => vec![Stmt::If {
                test: self.field_expr(*first, "condition"),
                body: self.body(first.child_by_field_name("consequence")),
                orelse: self.elif_chain(rest),
            }],
            _ => self.else_body(Some(*first)),
        }
    }

    fn else_body(&self, node: Option<Node<'_>>) -> Vec<Stmt> {
        node.map(|clause| self.body(clause.child_by_field_name("body")))
            .unwrap_or_default()
    }

    fn for_statement(&self, node: Node<'_>) -> Stmt {
        let Some(left) = node.child_by_field_name("left") else {
            return self.raw_stmt(node);
        };
        Stmt::For {
            target: self.target(left),
            iter: self.field_expr(node, "right"),
            body: self.body(node.child_by_field_name("body")),
            orelse: self.else_body(node.child_by_field_name("alternative")),
            is_async: starts_with_token(node, "async"),
        }
    }

    fn try_statement(&self, node: Node<'_>) -> Stmt {
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();
        let mut is_star = false;
        for child in named_children(node) {
            match child.kind() {
                "except_clause" => handlers.push(self.except_handler(child)),
                "except_group_clause" => {
                    is_star = true;
                    handlers.push(self.except_handler(child));
                }
                "else_clause" => orelse = self.body(child.child_by_field_name("body")),
                "finally_clause" => {
                    finalbody = named_children(child)
                        .into_iter()
                        .find(|n| n.kind() == "block")
                        .map(|block| self.statements(block))
                        .unwrap_or_default();
                }
                _ => {}
            }
        }
        Stmt::Try {
            body: self.body(node.child_by_field_name("body")),
            handlers,
            orelse,
            finalbody,
            is_star,
        }
    }

    fn except_handler(&self, node: Node<'_>) -> ExceptHandler {
        let mut body = Vec::new();
        let mut parts = Vec::new();
        for child in named_children(node) {
            if child.kind() == "block" {
                body = self.statements(child);
            } else {
                parts.push(child);
            }
        }

        let (type_, name) = match parts.as_slice() {
            [] => (None, None),
            [pattern] if pattern.kind() == "as_pattern" => {
                let inner = named_children(*pattern);
                let value = inner.first().map(|n| self.expr(*n));
                let alias = pattern
                    .child_by_field_name("alias")
                    .or_else(|| inner.get(1).copied())
                    .map(|n| self.text(n).to_owned());
                (value, alias)
            }
            [value] => (Some(self.expr(*value)), None),
            [value, alias, ..] => (Some(self.expr(*value)), Some(self.text(*alias).to_owned())),
        };
        ExceptHandler { type_, name, body }
    }

    fn with_statement(&self, node: Node<'_>) -> Stmt {
        let Some(clause) = named_children(node)
            .into_iter()
            .find(|child| child.kind() == "with_clause")
        else {
            return self.raw_stmt(node);
        };
        Stmt::With {
            items: self.dedented(clause),
            body: self.body(node.child_by_field_name("body")),
            is_async: starts_with_token(node, "async"),
        }
    }

    fn function_def(&self, node: Node<'_>, decorators: Vec<Expr>) -> Option<Stmt> {
        if node.child_by_field_name("type_parameters").is_some() {
            return None;
        }
        Some(Stmt::FunctionDef(Box::new(FunctionDef {
            name: self.text(node.child_by_field_name("name")?).to_owned(),
            params: self.dedented(node.child_by_field_name("parameters")?),
            returns: node
                .child_by_field_name("return_type")
                .map(|n| self.dedented(n)),
            body: self.body(node.child_by_field_name("body")),
            decorators,
            is_async: starts_with_token(node, "async"),
        })))
    }

    fn class_def(&self, node: Node<'_>, decorators: Vec<Expr>) -> Option<Stmt> {
        if node.child_by_field_name("type_parameters").is_some() {
            return None;
        }
        let (bases, keywords) = node
            .child_by_field_name("superclasses")
            .map(|args| self.arguments(args))
            .unwrap_or_default();
        Some(Stmt::ClassDef(Box::new(ClassDef {
            name: self.text(node.child_by_field_name("name")?).to_owned(),
            bases,
            keywords,
            body: self.body(node.child_by_field_name("body")),
            decorators,
        })))
    }

    fn decorated(&self, node: Node<'_>) -> Option<Stmt> {
        let decorators = named_children(node)
            .into_iter()
            .filter(|child| child.kind() == "decorator")
            .filter_map(|decorator| named_children(decorator).first().map(|e| self.expr(*e)))
            .collect();
        let definition = node.child_by_field_name("definition")?;
        match definition.kind() {
            "function_definition" => self.function_def(definition, decorators),
            "class_definition" => self.class_def(definition, decorators),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Targets
    // -----------------------------------------------------------------------

    fn target(&self, node: Node<'_>) -> Expr {
        match node.kind() {
            "pattern_list" | "tuple_pattern" => Expr::Tuple(self.targets(node)),
            "list_pattern" => Expr::List(self.targets(node)),
            "list_splat_pattern" => named_children(node)
                .first()
                .map_or_else(|| self.raw_expr(node), |inner| Expr::Starred(Box::new(self.target(*inner)))),
            _ => self.expr(node),
        }
    }

    fn targets(&self, node: Node<'_>) -> Vec<Expr> {
        named_children(node)
            .into_iter()
            .map(|child| self.target(child))
            .collect()
    }

    fn flatten_tuple(&self, node: Node<'_>) -> Vec<Expr> {
        match self.expr(node) {
            Expr::Tuple(items) if node.kind() == "expression_list" => items,
            other => vec![other],
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn field_expr(&self, node: Node<'_>, field: &str) -> Expr {
        let parts = field_children(node, field);
        match parts.as_slice() {
            [single] => self.expr(*single),
            [] => self.raw_expr(node),
            many => Expr::Tuple(many.iter().map(|part| self.expr(*part)).collect()),
        }
    }

    fn boxed(&self, node: Node<'_>, field: &str) -> Box<Expr> {
        Box::new(self.field_expr(node, field))
    }

    fn expr(&self, node: Node<'_>) -> Expr {
        match node.kind() {
            "identifier" => Expr::Name(self.text(node).to_owned()),
            "true" => Expr::Constant(Constant::Bool(true)),
            "false" => Expr::Constant(Constant::Bool(false)),
            "none" => Expr::Constant(Constant::None),
            "ellipsis" => Expr::Constant(Constant::Ellipsis),
            "integer" => parse_int_literal(self.text(node))
                .map_or_else(|| self.raw_expr(node), |value| Expr::Constant(Constant::Int(value))),
            "float" => parse_float_literal(self.text(node))
                .map_or_else(|| self.raw_expr(node), |value| Expr::Constant(Constant::Float(value))),
            "string" => self.string(&[node]).unwrap_or_else(|| self.raw_expr(node)),
            "concatenated_string" => self
                .string(&named_children(node))
                .unwrap_or_else(|| self.raw_expr(node)),
            "parenthesized_expression" => match named_children(node).as_slice() {
                [inner] if inner.kind() != "yield" => self.expr(*inner),
                _ => self.raw_expr(node),
            },
            "attribute" => match node.child_by_field_name("attribute") {
                Some(attr) => Expr::Attribute {
                    value: self.boxed(node, "object"),
                    attr: self.text(attr).to_owned(),
                },
                None => self.raw_expr(node),
            },
            "subscript" => Expr::Subscript {
                value: self.boxed(node, "value"),
                slice: self.boxed(node, "subscript"),
            },
            "slice" => self.slice(node),
            "call" => self.call(node),
            "binary_operator" => {
                let op = node
                    .child_by_field_name("operator")
                    .and_then(|op| BinaryOp::from_symbol(op.kind()));
                match op {
                    Some(op) => Expr::BinOp {
                        left: self.boxed(node, "left"),
                        op,
                        right: self.boxed(node, "right"),
                    },
                    None => self.raw_expr(node),
                }
            }
            "unary_operator" => {
                let op = match node.child_by_field_name("operator").map(|op| op.kind()) {
                    Some("-") => UnaryOp::USub,
                    Some("+") => UnaryOp::UAdd,
                    Some("~") => UnaryOp::Invert,
                    _ => return self.raw_expr(node),
                };
                Expr::UnaryOp {
                    op,
                    operand: self.boxed(node, "argument"),
                }
            }
            "not_operator" => Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: self.boxed(node, "argument"),
            },
            "boolean_operator" => self.boolean_operator(node),
            "comparison_operator" => self.comparison(node),
            "conditional_expression" => match named_children(node).as_slice() {
                [body, test, orelse] => Expr::IfExp {
                    test: Box::new(self.expr(*test)),
                    body: Box::new(self.expr(*body)),
                    orelse: Box::new(self.expr(*orelse)),
                },
                _ => self.raw_expr(node),
            },
            "lambda" => Expr::Lambda {
                params: node
                    .child_by_field_name("parameters")
                    .map(|params| self.dedented(params))
                    .unwrap_or_default(),
                body: self.boxed(node, "body"),
            },
            "named_expression" => match node.child_by_field_name("name") {
                Some(name) => Expr::NamedExpr {
                    target: self.text(name).to_owned(),
                    value: self.boxed(node, "value"),
                },
                None => self.raw_expr(node),
            },
            "list" => Expr::List(self.elements(node)),
            "tuple" | "expression_list" => Expr::Tuple(self.elements(node)),
            "pattern_list" | "tuple_pattern" | "list_pattern" => self.target(node),
            "set" => Expr::Set(self.elements(node)),
            "dictionary" => self.dictionary(node),
            "list_splat" | "list_splat_pattern" => match named_children(node).as_slice() {
                [inner] => Expr::Starred(Box::new(self.expr(*inner))),
                _ => self.raw_expr(node),
            },
            "list_comprehension" | "set_comprehension" | "generator_expression"
            | "dictionary_comprehension" => self
                .comprehension(node)
                .unwrap_or_else(|| self.raw_expr(node)),
            "await" => match named_children(node).as_slice() {
                [inner] => Expr::Await(Box::new(self.expr(*inner))),
                _ => self.raw_expr(node),
            },
            _ => self.raw_expr(node),
        }
    }

    fn string(&self, parts: &[Node<'_>]) -> Option<Expr> {
        let mut text = String::new();
        let mut bytes = Vec::new();
        let mut is_bytes = None;
        for part in parts {
            let has_interpolation = named_children(*part)
                .iter()
                .any(|child| child.kind() == "interpolation");
            if has_interpolation {
                return None;
            }
            match decode_string_literal(self.text(*part))? {
                StringLiteral::Str(value) if is_bytes != Some(true) => {
                    is_bytes = Some(false);
                    text.push_str(&value);
                }
                StringLiteral::Bytes(value) if is_bytes != Some(false) => {
                    is_bytes = Some(true);
                    bytes.extend(value);
                }
                _ => return None,
            }
        }
        Some(match is_bytes {
            Some(true) => Expr::Constant(Constant::Bytes(bytes)),
            _ => Expr::Constant(Constant::Str(text)),
        })
    }

    fn slice(&self, node: Node<'_>) -> Expr {
        let mut bounds: [Option<Box<Expr>>; 3] = [None, None, None];
        let mut position = 0_usize;
        for child in children(node) {
            if child.kind() == ":" {
                position += 1;
            } else if child.is_named() {
                if let Some(slot) = bounds.get_mut(position) {
                    *slot = Some(Box::new(self.expr(child)));
                }
            }
        }
        let [lower, upper, step] = bounds;
        Expr::Slice { lower, upper, step }
    }

    fn call(&self, node: Node<'_>) -> Expr {
        let Some(arguments) = node.child_by_field_name("arguments") else {
            return self.raw_expr(node);
        };
        let (args, keywords) = if arguments.kind() == "generator_expression" {
            (vec![self.expr(arguments)], Vec::new())
        } else {
            self.arguments(arguments)
        };
        Expr::Call {
            func: self.boxed(node, "function"),
            args,
            keywords,
        }
    }

    fn arguments(&self, node: Node<'_>) -> (Vec<Expr>, Vec<Keyword>) {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "keyword_argument" => keywords.push(Keyword {
                    arg: child
                        .child_by_field_name("name")
                        .map(|name| self.text(name).to_owned()),
                    value: self.field_expr(child, "value"),
                }),
                "dictionary_splat" => keywords.push(Keyword {
                    arg: None,
                    value: named_children(child)
                        .first()
                        .map_or_else(|| self.raw_expr(child), |inner| self.expr(*inner)),
                }),
                _ => args.push(self.expr(child)),
            }
        }
        (args, keywords)
    }

    fn boolean_operator(&self, node: Node<'_>) -> Expr {
        let op = match node.child_by_field_name("operator").map(|op| op.kind()) {
            Some("and") => BoolOp::And,
            Some("or") => BoolOp::Or,
            _ => return self.raw_expr(node),
        };
        let mut values = match node.child_by_field_name("left").map(|left| self.expr(left)) {
            Some(Expr::BoolOp {
                op: inner,
                values,
            }) if inner == op && node.child_by_field_name("left").is_some_and(|l| l.kind() == "boolean_operator") => values,
            Some(left) => vec![left],
            None => return self.raw_expr(node),
        };
        values.push(self.field_expr(node, "right"));
        Expr::BoolOp { op, values }
    }

    fn comparison(&self, node: Node<'_>) -> Expr {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut pending = String::new();
        for child in children(node) {
            if child.is_named() {
                if !pending.is_empty() {
                    match CmpOp::from_symbol(&pending) {
                        Some(op) => ops.push(op),
                        None => return self.raw_expr(node),
                    }
                    pending.clear();
                }
                operands.push(self.expr(child));
            } else {
                if !pending.is_empty() {
                    pending.push(' ');
                }
                pending.push_str(self.text(child));
            }
        }
        let mut rest = operands.into_iter();
        match rest.next() {
            Some(left) if !ops.is_empty() && ops.len() == rest.len() => Expr::Compare {
                left: Box::new(left),
                ops,
                comparators: rest.collect(),
            },
            _ => self.raw_expr(node),
        }
    }

    fn elements(&self, node: Node<'_>) -> Vec<Expr> {
        named_children(node)
            .into_iter()
            .map(|child| self.expr(child))
            .collect()
    }

    fn dictionary(&self, node: Node<'_>) -> Expr {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "pair" => {
                    keys.push(Some(self.field_expr(child, "key")));
                    values.push(self.field_expr(child, "value"));
                }
                "dictionary_splat" => {
                    keys.push(None);
                    values.push(
                        named_children(child)
                            .first()
                            .map_or_else(|| self.raw_expr(child), |inner| self.expr(*inner)),
                    );
                }
                _ => return self.raw_expr(node),
            }
        }
        Expr::Dict { keys, values }
    }

    fn comprehension(&self, node: Node<'_>) -> Option<Expr> {
        let body = node.child_by_field_name("body")?;
        let mut generators: Vec<Comprehension> = Vec::new();
        for clause in named_children(node) {
            match clause.kind() {
                "for_in_clause" => generators.push(Comprehension {
                    target: self.target(clause.child_by_field_name("left")?),
                    iter: self.field_expr(clause, "right"),
                    ifs: Vec::new(),
                    is_async: starts_with_token(clause, "async"),
                }),
                "if_clause" => {
                    let condition = named_children(clause).first().map(|c| self.expr(*c))?;
                    generators.last_mut()?.ifs.push(condition);
                }
                _ => {}
            }
        }
        if generators.is_empty() {
            return None;
        }

        let expr = match node.kind() {
            "dictionary_comprehension" => Expr::DictComp {
                key: self.boxed(body, "key"),
                value: self.boxed(body, "value"),
                generators,
            },
            "set_comprehension" => Expr::SetComp {
                elt: Box::new(self.expr(body)),
                generators,
            },
            "generator_expression" => Expr::GeneratorExp {
                elt: Box::new(self.expr(body)),
                generators,
            },
            _ => Expr::ListComp {
                elt: Box::new(self.expr(body)),
                generators,
            },
        };
        Some(expr)
    }
}

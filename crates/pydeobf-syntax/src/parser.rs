//! Tree-sitter parsing wrapper for Python source.
//!
//! This module owns the raw Tree-sitter parser and exposes the two entry
//! points the rest of the workspace relies on: [`parse_module`] and
//! [`parse_expression`]. Unlike an editor, a deobfuscator cannot work with a
//! partially broken tree, so any `ERROR` or `MISSING` node rejects the input.

use std::ops::Range;

use crate::ast::{Expr, Module, Stmt};
use crate::error::SyntaxError;
use crate::lower::lower_module;

/// Result of parsing Python source code.
///
/// Contains the concrete syntax tree along with the normalised source it was
/// produced from. Node byte ranges index into [`ParseResult::source`].
#[derive(Debug)]
pub struct ParseResult {
    tree: tree_sitter::Tree,
    source: String,
}

impl ParseResult {
    /// Returns the concrete syntax tree.
    #[must_use]
    pub const fn tree(&self) -> &tree_sitter::Tree {
        &self.tree
    }

    /// Returns the normalised source code that was parsed.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns whether the tree contains any `ERROR` or `MISSING` nodes.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        has_error_nodes(self.tree.root_node())
    }

    /// Collects all syntax errors found in the tree, in source order.
    #[must_use]
    pub fn errors(&self) -> Vec<SyntaxErrorInfo> {
        let mut errors = Vec::new();
        collect_error_nodes(self.tree.root_node(), &self.source, &mut errors);
        errors
    }

    /// Returns the root node of the syntax tree.
    #[must_use]
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Lowers the concrete tree into an owned [`Module`].
    #[must_use]
    pub fn to_module(&self) -> Module {
        lower_module(self.tree.root_node(), &self.source)
    }
}

/// Information about a syntax error found during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxErrorInfo {
    /// Byte range of the error in the source.
    pub byte_range: Range<usize>,
    /// Line number (one-based) where the error starts.
    pub line: u32,
    /// Column number (one-based) where the error starts.
    pub column: u32,
    /// A snippet of the problematic source text.
    pub context: String,
    /// Human-readable description of the error.
    pub message: String,
}

impl SyntaxErrorInfo {
    fn from_node(node: tree_sitter::Node<'_>, source: &str) -> Self {
        let byte_range = node.byte_range();

        let context = source
            .get(byte_range.clone())
            .map(|s| {
                if s.chars().count() > 50 {
                    let truncated: String = s.chars().take(47).collect();
                    format!("{truncated}...")
                } else {
                    s.to_owned()
                }
            })
            .unwrap_or_default();

        let message = if node.is_missing() {
            format!("missing {}", node.kind())
        } else {
            "syntax error".to_owned()
        };

        let (line, column) = point_to_one_based(node.start_position());

        Self {
            byte_range,
            line,
            column,
            context,
            message,
        }
    }

    fn into_error(self) -> SyntaxError {
        let message = if self.context.is_empty() {
            self.message
        } else {
            format!("{} near {:?}", self.message, self.context)
        };
        SyntaxError::invalid_syntax(self.line, self.column, message)
    }
}

/// Tree-sitter parser configured for Python.
pub struct Parser {
    inner: tree_sitter::Parser,
}

impl Parser {
    /// Creates a new Python parser.
    ///
    /// # Errors
    ///
    /// Returns an error if the Tree-sitter parser cannot be initialised
    /// with the Python grammar.
    pub fn new() -> Result<Self, SyntaxError> {
        let mut inner = tree_sitter::Parser::new();
        inner
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| SyntaxError::parser_init(e.to_string()))?;

        Ok(Self { inner })
    }

    /// Parses source code and returns the concrete tree.
    ///
    /// Line endings are normalised to `\n` first, matching how the Python
    /// tokenizer reads source files.
    ///
    /// # Errors
    ///
    /// Returns an error if the parser fails to produce a syntax tree at all.
    /// Syntax errors inside the tree are reported through
    /// [`ParseResult::errors`].
    pub fn parse(&mut self, source: &str) -> Result<ParseResult, SyntaxError> {
        let normalised = source.replace("\r\n", "\n");
        let tree = self
            .inner
            .parse(&normalised, None)
            .ok_or_else(|| SyntaxError::internal_error("parsing failed"))?;

        Ok(ParseResult {
            tree,
            source: normalised,
        })
    }
}

/// Parses Python source into an owned module.
///
/// # Errors
///
/// Returns [`SyntaxError::InvalidSyntax`] for the first syntax error in the
/// source, or an initialisation error if the grammar cannot be loaded.
pub fn parse_module(source: &str) -> Result<Module, SyntaxError> {
    let mut parser = Parser::new()?;
    let result = parser.parse(source)?;
    if let Some(first) = result.errors().into_iter().next() {
        return Err(first.into_error());
    }
    Ok(result.to_module())
}

/// Parses Python source consisting of exactly one expression.
///
/// Surrounding whitespace is ignored, as it is by `eval`.
///
/// # Errors
///
/// Returns [`SyntaxError::NotAnExpression`] when the text parses but is not a
/// single expression statement.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let module = parse_module(source.trim())?;
    let mut body = module.body.into_iter();
    match (body.next(), body.next()) {
        (Some(Stmt::Expr(expr)), None) => Ok(expr),
        (None, _) => Err(SyntaxError::not_an_expression("empty source")),
        (Some(_), None) => Err(SyntaxError::not_an_expression("found a statement")),
        (Some(_), Some(_)) => Err(SyntaxError::not_an_expression(
            "found more than one statement",
        )),
    }
}

/// Converts a Tree-sitter position (0-based) to one-based display coordinates.
fn point_to_one_based(pos: tree_sitter::Point) -> (u32, u32) {
    let line = u32::try_from(pos.row.saturating_add(1)).unwrap_or(u32::MAX);
    let column = u32::try_from(pos.column.saturating_add(1)).unwrap_or(u32::MAX);
    (line, column)
}

fn has_error_nodes(node: tree_sitter::Node<'_>) -> bool {
    if node.is_error() || node.is_missing() {
        return true;
    }
    if !node.has_error() {
        return false;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if has_error_nodes(child) {
            return true;
        }
    }

    false
}

fn collect_error_nodes(
    node: tree_sitter::Node<'_>,
    source: &str,
    errors: &mut Vec<SyntaxErrorInfo>,
) {
    if node.is_error() || node.is_missing() {
        errors.push(SyntaxErrorInfo::from_node(node, source));
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_nodes(child, source, errors);
    }
}

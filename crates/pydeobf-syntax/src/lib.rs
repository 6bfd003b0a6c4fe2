//! Python syntax support for the deobfuscation toolchain.
//!
//! Source text is parsed with Tree-sitter and lowered into an owned AST that
//! mirrors Python's `ast` module. Rewrites operate on that tree through
//! [`Fold`], scanners inspect it through [`Visit`], and [`unparse`] renders
//! the result back to source in the same layout `ast.unparse` produces.
//!
//! Constructs the rewriters never touch (decorated parameters, `match`
//! statements, f-strings and similar) are carried through as raw source text.

pub mod ast;
mod error;
pub mod fold;
mod literal;
mod lower;
mod parser;
mod unparse;
pub mod visit;

pub use error::SyntaxError;
pub use fold::Fold;
pub use literal::{
    StringLiteral, decode_string_literal, parse_float_literal, parse_int_literal, repr_bytes,
    repr_float, repr_str,
};
pub use parser::{ParseResult, Parser, SyntaxErrorInfo, parse_expression, parse_module};
pub use unparse::{unparse, unparse_expr};
pub use visit::Visit;

//! LZMA spam: nested base64 and LZMA blobs around a webhook stealer.
//!
//! The surface program is `exec(compile(lzma.decompress(base64.b64decode(b'..')), ..))`.
//! The blob unpacks to a second program whose first bytes literal is another
//! LZMA stream. That stream holds `___="..";____="..";..;<code>` where the code
//! names four of the variables. The webhook is
//! `b64decode(rot13(a) + b + reversed(c) + d)`.

use std::collections::HashMap;
use std::sync::LazyLock;

use pydeobf_core::indicators::find_webhooks_in_bytes;
use pydeobf_core::{DeobfuscationFailure, Deobfuscator};
use pydeobf_syntax::ast::{Constant, Expr, Stmt};
use pydeobf_syntax::visit::{self, Visit};
use pydeobf_syntax::{StringLiteral, decode_string_literal, parse_module};
use regex::Regex;

use crate::codec;
use crate::pattern::builtin_call;

/// Registered schema name.
pub const NAME: &str = "lzmaspam";

static FIRST_BYTES: LazyLock<Regex> = LazyLock::new(|| compile(r"b'.+?'"));
static LINE_BYTES: LazyLock<Regex> = LazyLock::new(|| compile(r"(b'.+?')\n"));
static VARIABLE: LazyLock<Regex> = LazyLock::new(|| compile(r#"(_{3,})="(.+?)"(?:;|$)"#));
static VARIABLE_NAME: LazyLock<Regex> = LazyLock::new(|| compile(r"_{3,}"));

#[expect(clippy::expect_used, reason = "patterns are compile-time literals")]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("lzmaspam pattern compiles")
}

/// The LZMA spam schema; the output is the recovered webhook, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaSpam;

impl Deobfuscator for LzmaSpam {
    type Output = Option<String>;

    fn scan(&self, source: &str) -> bool {
        parse_module(source).is_ok_and(|module| {
            let mut scanner = LzmaScanner::default();
            visit::walk_module(&mut scanner, &module);
            scanner.base64_import && scanner.lzma_import && scanner.payload
        })
    }

    fn deobfuscate(&self, source: &str) -> Result<Option<String>, DeobfuscationFailure> {
        let blob = bytes_literal(&FIRST_BYTES, source, 0)?;
        let second = codec::utf8(codec::lzma_decompress(&codec::b64decode(&blob)?)?)?;
        tracing::debug!(len = second.len(), "second stage unpacked");
        let packed = bytes_literal(&LINE_BYTES, &second, 1).map_err(|failure| {
            failure.with_diagnostic("second_stage", second.as_str())
        })?;
        let code = codec::utf8(codec::lzma_decompress(&packed)?)?;
        let encoded = assemble_webhook(&code)
            .map_err(|failure| failure.with_diagnostic("third_stage", code.as_str()))?;
        let decoded = codec::b64decode(encoded.as_bytes())?;
        Ok(find_webhooks_in_bytes(&decoded).into_iter().next())
    }

    fn format(&self, output: Option<String>) -> String {
        output.map_or_else(
            || "No webhook found.".to_owned(),
            |webhook| format!("Webhook:\n{webhook}"),
        )
    }
}

/// The bytes literal matched by `pattern` (group `group`) in `text`.
fn bytes_literal(pattern: &Regex, text: &str, group: usize) -> Result<Vec<u8>, DeobfuscationFailure> {
    let literal = pattern
        .captures(text)
        .and_then(|captures| captures.get(group))
        .ok_or_else(|| DeobfuscationFailure::missing_marker("bytes literal not found"))?;
    match decode_string_literal(literal.as_str()) {
        Some(StringLiteral::Bytes(bytes)) => Ok(bytes),
        _ => Err(DeobfuscationFailure::payload("malformed bytes literal")
            .with_diagnostic("literal", literal.as_str())),
    }
}

/// Joins the four webhook pieces named by the final statement.
fn assemble_webhook(code: &str) -> Result<String, DeobfuscationFailure> {
    let (declarations, tail) = code
        .rsplit_once(';')
        .filter(|(_, rest)| !rest.is_empty())
        .ok_or_else(|| DeobfuscationFailure::missing_marker("no statement after the variables"))?;
    let variables: HashMap<&str, &str> = VARIABLE
        .captures_iter(declarations)
        .filter_map(|captures| Some((captures.get(1)?.as_str(), captures.get(2)?.as_str())))
        .collect();
    let pieces = VARIABLE_NAME
        .find_iter(tail)
        .map(|name| variables.get(name.as_str()).copied())
        .collect::<Option<Vec<&str>>>()
        .ok_or_else(|| DeobfuscationFailure::missing_marker("webhook piece is not declared"))?;
    let [a, b, c, d] = pieces.as_slice() else {
        return Err(DeobfuscationFailure::payload(format!(
            "expected four webhook pieces, found {}",
            pieces.len()
        )));
    };
    Ok(format!("{}{b}{}{d}", rot13(a), c.chars().rev().collect::<String>()))
}

fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| {
            let rotated = match c {
                'a'..='m' | 'A'..='M' => u32::from(c) + 13,
                'n'..='z' | 'N'..='Z' => u32::from(c) - 13,
                _ => return c,
            };
            char::from_u32(rotated).unwrap_or(c)
        })
        .collect()
}

#[derive(Default)]
struct LzmaScanner {
    base64_import: bool,
    lzma_import: bool,
    payload: bool,
}

impl Visit for LzmaScanner {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Import(names) => match names.as_slice() {
                [alias] if alias.name == "base64" => self.base64_import = true,
                [alias] if alias.name == "lzma" => self.lzma_import = true,
                _ => {}
            },
            Stmt::Expr(value) => {
                if is_payload_call(value) {
                    self.payload = true;
                }
            }
            _ => visit::walk_stmt(self, stmt),
        }
    }
}

/// `exec(compile(lzma.decompress(base64.b64decode(b'..')), '<string>', 'exec'))`,
/// or the same wrapped in `print`.
fn is_payload_call(expr: &Expr) -> bool {
    let Some(compiled) = builtin_call(expr, "exec").or_else(|| builtin_call(expr, "print")) else {
        return false;
    };
    let Expr::Call { func, args, .. } = compiled else {
        return false;
    };
    let [blob, Expr::Constant(Constant::Str(filename)), Expr::Constant(Constant::Str(mode))] =
        args.as_slice()
    else {
        return false;
    };
    func.as_name() == Some("compile")
        && filename == "<string>"
        && mode == "exec"
        && dotted_call(blob, "lzma", "decompress")
            .and_then(|inner| dotted_call(inner, "base64", "b64decode"))
            .is_some_and(|payload| matches!(payload, Expr::Constant(Constant::Bytes(_))))
}

/// The only argument of `<module>.<function>(..)`.
fn dotted_call<'a>(expr: &'a Expr, module: &str, function: &str) -> Option<&'a Expr> {
    let Expr::Call { func, args, .. } = expr else {
        return None;
    };
    let Expr::Attribute { value, attr } = func.as_ref() else {
        return None;
    };
    match args.as_slice() {
        [arg] if attr == function && value.as_name() == Some(module) => Some(arg),
        _ => None,
    }
}

#[cfg(test)]
mod tests;

//! FCT, the "not pyobfuscate" schema.
//!
//! The visible program defines `_ = lambda __: zlib(b64(__[::-1]))` and runs
//! `exec((_)(b'...'))`. Every round reverses, decodes and inflates the bytes,
//! which yields either another `exec((_)(b'...'))` wrapper or a marshalled
//! code object whose single string constant is the next round's input. The
//! last round's output is the result.

use num_bigint::BigInt;
use pydeobf_core::indicators::find_webhooks_in_bytes;
use pydeobf_core::{DeobfuscationFailure, Deobfuscator, FailureKind};
use pydeobf_syntax::ast::{Constant, Expr, Stmt, UnaryOp};
use pydeobf_syntax::visit::{self, Visit};
use pydeobf_syntax::{parse_module, repr_bytes};

use crate::codec::{self, DecodeError};
use crate::marshal::find_string_payload;
use crate::pattern::{builtin_call, module_call};

/// Registered schema name.
pub const NAME: &str = "fct";

const MAX_ROUNDS: usize = 1000;

/// Prefix of an unmarshalled round that wraps another payload.
const EXEC_WRAPPER: &[u8] = b"exec((_)(b'";
const EXEC_WRAPPER_END: &[u8] = b"'))";

/// The FCT schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fct;

impl Deobfuscator for Fct {
    type Output = Vec<u8>;

    fn scan(&self, source: &str) -> bool {
        parse_module(source).is_ok_and(|module| {
            let mut scanner = FctScanner::default();
            visit::walk_module(&mut scanner, &module);
            scanner.lambda_found && scanner.payload_found
        })
    }

    fn deobfuscate(&self, source: &str) -> Result<Vec<u8>, DeobfuscationFailure> {
        unwind(surface_payload(source)?, MAX_ROUNDS)
    }

    fn format(&self, output: Vec<u8>) -> String {
        for webhook in find_webhooks_in_bytes(&output) {
            tracing::info!(%webhook, "webhook found");
        }
        match String::from_utf8(output) {
            Ok(text) => {
                tracing::info!("output is plain python");
                text
            }
            Err(error) => {
                tracing::info!("output is still marshalled");
                repr_bytes(error.as_bytes())
            }
        }
    }
}

/// The only bytes literal of the visible program.
fn surface_payload(source: &str) -> Result<Vec<u8>, DeobfuscationFailure> {
    tracing::info!("locating the surface payload");
    let module = parse_module(source).map_err(|error| {
        DeobfuscationFailure::from(error).with_diagnostic("surface_code", source)
    })?;
    let mut finder = BytesFinder::default();
    visit::walk_module(&mut finder, &module);
    let mut found = finder.found;
    match found.len() {
        0 => Err(DeobfuscationFailure::missing_marker(
            "no byte string in the surface code",
        )),
        1 => Ok(found.remove(0)),
        _ => Err(
            DeobfuscationFailure::ambiguous("several byte strings in the surface code")
                .with_diagnostic("candidates", found),
        ),
    }
}

fn unwind(surface: Vec<u8>, max_rounds: usize) -> Result<Vec<u8>, DeobfuscationFailure> {
    let mut obfuscated = surface;
    let mut marshalled = Vec::new();
    for round in 0..max_rounds {
        tracing::debug!(round, "unwrapping payload");
        marshalled = open_round(&obfuscated)?;
        if let Some(wrapped) = marshalled.strip_prefix(EXEC_WRAPPER) {
            tracing::debug!("payload is another exec wrapper");
            obfuscated = wrapped
                .trim_ascii_end()
                .strip_suffix(EXEC_WRAPPER_END)
                .ok_or_else(|| {
                    DeobfuscationFailure::payload("exec wrapper is not closed")
                        .with_diagnostic("marshalled_bytes", marshalled.clone())
                })?
                .to_vec();
            continue;
        }
        match find_string_payload(&marshalled) {
            Ok(payload) if !payload.is_empty() => obfuscated = payload,
            Ok(_) => return Ok(marshalled),
            Err(failure) => {
                tracing::debug!(%failure, "no further payload, stopping");
                return Ok(marshalled);
            }
        }
    }
    tracing::warn!(max_rounds, "round limit reached");
    Err(DeobfuscationFailure::new(
        FailureKind::IterationLimitExceeded,
        format!("payload still wrapped after {max_rounds} rounds"),
    )
    .with_diagnostic("marshalled_bytes", marshalled))
}

/// Undoes `zlib.decompress(base64.b64decode(data[::-1]))`, falling back to
/// base32 when the base64 route fails.
fn open_round(obfuscated: &[u8]) -> Result<Vec<u8>, DeobfuscationFailure> {
    let reversed: Vec<u8> = obfuscated.iter().rev().copied().collect();
    let inflate_b64 = |data: &[u8]| codec::zlib_decompress(&codec::b64decode(data)?);
    let inflate_b32 = |data: &[u8]| codec::zlib_decompress(&codec::b32decode(data)?);
    inflate_b64(&reversed)
        .or_else(|error: DecodeError| {
            tracing::warn!(target: "expected", %error, "base64 route failed, trying base32");
            inflate_b32(&reversed)
        })
        .map_err(|error| {
            DeobfuscationFailure::from(error).with_diagnostic("obf_bytes", obfuscated)
        })
}

// ---------------------------------------------------------------------------
// Visitors
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BytesFinder {
    found: Vec<Vec<u8>>,
}

impl Visit for BytesFinder {
    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Constant(Constant::Bytes(bytes)) = expr {
            self.found.push(bytes.clone());
        }
        visit::walk_expr(self, expr);
    }
}

#[derive(Default)]
struct FctScanner {
    lambda_found: bool,
    payload_found: bool,
}

impl Visit for FctScanner {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { targets, value } => {
                if matches!(targets.as_slice(), [Expr::Name(name)] if name == "_")
                    && is_unwrap_lambda(value)
                {
                    self.lambda_found = true;
                }
            }
            Stmt::Expr(value) => {
                let payload = builtin_call(value, "exec").and_then(|inner| builtin_call(inner, "_"));
                if matches!(payload, Some(Expr::Constant(Constant::Bytes(_)))) {
                    self.payload_found = true;
                }
            }
            _ => visit::walk_stmt(self, stmt),
        }
    }
}

/// `lambda __: [__import__('marshal').loads(]zlib(b64(__[::-1]))[)]`.
fn is_unwrap_lambda(expr: &Expr) -> bool {
    let Expr::Lambda { params, body } = expr else {
        return false;
    };
    if params.trim() != "__" {
        return false;
    }
    let inner = match module_call(body, "marshal", "loads") {
        Some([loaded]) => loaded,
        _ => body.as_ref(),
    };
    let Some([encoded]) = module_call(inner, "zlib", "decompress") else {
        return false;
    };
    let Some([reversed]) = module_call(encoded, "base64", "b64decode") else {
        return false;
    };
    is_reversal_of(reversed, "__")
}

/// `<name>[::-1]`.
fn is_reversal_of(expr: &Expr, name: &str) -> bool {
    let Expr::Subscript { value, slice } = expr else {
        return false;
    };
    let Expr::Slice {
        lower: None,
        upper: None,
        step: Some(step),
    } = slice.as_ref()
    else {
        return false;
    };
    value.as_name() == Some(name)
        && matches!(step.as_ref(), Expr::UnaryOp { op: UnaryOp::USub, operand }
            if matches!(operand.as_ref(), Expr::Constant(Constant::Int(one)) if *one == BigInt::from(1)))
}

#[cfg(test)]
mod tests;

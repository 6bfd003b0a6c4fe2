//! BlankOBF v2 (<https://github.com/Blank-c/BlankOBF>).
//!
//! After its imports, a BlankOBF program is a short stack of layers, each of
//! which folds to a single `exec` of the next one once its constants are
//! evaluated:
//!
//! 1. four string assignments concatenated and base64-decoded,
//! 2. a `for` loop that brute-forces a one-byte XOR pad over a zlib stream,
//! 3. an `exec(compile(...))` of plain bytes.
//!
//! The innermost program starts with the obfuscator's banner string.

use std::sync::LazyLock;

use num_bigint::BigInt;
use pydeobf_core::indicators::{find_webhooks, webhook_report};
use pydeobf_core::{DeobfuscationFailure, Deobfuscator, LayerDriver, LayerShape, PyValue};
use pydeobf_syntax::ast::{BinaryOp, CmpOp, Constant, Expr, Module, Stmt};
use pydeobf_syntax::fold::Fold;
use pydeobf_syntax::{parse_module, unparse};
use regex::Regex;

use crate::codec;
use crate::pattern::builtin_call;

mod fold;

use self::fold::ConstantFolder;

/// Registered schema name.
pub const NAME: &str = "blank obf";

const MAX_LAYERS: usize = 30;

const SHAPES: [LayerShape; 3] = [
    LayerShape {
        name: "base64",
        matches: is_base64_layer,
        peel: peel_base64,
    },
    LayerShape {
        name: "xor",
        matches: is_xor_layer,
        peel: peel_xor,
    },
    LayerShape {
        name: "compile",
        matches: is_compile_layer,
        peel: peel_compile,
    },
];

static BANNER: LazyLock<Regex> = LazyLock::new(compile_banner);

#[expect(clippy::expect_used, reason = "the pattern is a compile-time literal")]
fn compile_banner() -> Regex {
    Regex::new(r"(?i)blank\s*obf\s*v\s*2").expect("banner pattern compiles")
}

/// The BlankOBF v2 schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankObf;

impl Deobfuscator for BlankObf {
    type Output = String;

    fn scan(&self, source: &str) -> bool {
        parse_module(source).is_ok_and(|module| {
            let body = strip_leading_imports(&module.body);
            matches!(
                body,
                [
                    Stmt::Assign { .. },
                    Stmt::Assign { .. },
                    Stmt::Assign { .. },
                    Stmt::Assign { .. },
                    Stmt::Expr(_),
                ]
            ) || (body.len() == module.body.len() && has_xor_loop(body))
        })
    }

    fn deobfuscate(&self, source: &str) -> Result<String, DeobfuscationFailure> {
        let module = parse_module(source)?;
        let (imports, body): (Vec<Stmt>, Vec<Stmt>) = module
            .body
            .into_iter()
            .partition(|stmt| matches!(stmt, Stmt::Import(_) | Stmt::ImportFrom { .. }));
        tracing::info!(imports = imports.len(), "removed imports");
        let peeled =
            LayerDriver::new(NAME, &SHAPES, MAX_LAYERS).run(Module::new(body), has_banner)?;
        Ok(unparse(&peeled.module))
    }

    fn format(&self, output: String) -> String {
        let webhooks = find_webhooks(&output);
        if webhooks.is_empty() {
            return output;
        }
        format!("{output}\n\n{}", webhook_report(&webhooks))
    }
}

fn has_banner(tree: &Module, _: &[&'static str]) -> bool {
    matches!(
        tree.body.first(),
        Some(Stmt::Expr(Expr::Constant(Constant::Str(text)))) if BANNER.is_match(text)
    )
}

fn strip_leading_imports(body: &[Stmt]) -> &[Stmt] {
    let imports = body
        .iter()
        .take_while(|stmt| matches!(stmt, Stmt::Import(_) | Stmt::ImportFrom { .. }))
        .count();
    body.get(imports..).unwrap_or_default()
}

fn has_xor_loop(body: &[Stmt]) -> bool {
    let [Stmt::Assign { .. }, Stmt::For { body: loop_body, .. }] = body else {
        return false;
    };
    matches!(
        loop_body.as_slice(),
        [Stmt::If { body: then, .. }] if matches!(then.as_slice(), [Stmt::Expr(_), Stmt::Break])
    )
}

// ---------------------------------------------------------------------------
// Layer shapes
// ---------------------------------------------------------------------------

fn is_base64_layer(tree: &Module) -> bool {
    matches!(
        tree.body.as_slice(),
        [
            Stmt::Assign { .. },
            Stmt::Assign { .. },
            Stmt::Assign { .. },
            Stmt::Assign { .. },
            Stmt::Expr(_),
        ]
    )
}

fn is_xor_layer(tree: &Module) -> bool {
    matches!(tree.body.as_slice(), [Stmt::Assign { .. }, Stmt::For { .. }])
}

fn is_compile_layer(tree: &Module) -> bool {
    matches!(
        tree.body.as_slice(),
        [Stmt::Assign { .. }, Stmt::Assign { .. }, Stmt::Expr(_)]
    )
}

fn folded(tree: &Module) -> Module {
    ConstantFolder::default().fold_module(tree.clone())
}

/// The argument of a module consisting of one `exec(<arg>)` statement.
fn sole_exec_argument(tree: &Module) -> Option<&Expr> {
    match tree.body.as_slice() {
        [Stmt::Expr(call)] => builtin_call(call, "exec"),
        _ => None,
    }
}

fn parse_layer(bytes: Vec<u8>) -> Result<Module, DeobfuscationFailure> {
    let source = codec::utf8(bytes)?;
    parse_module(&source)
        .map_err(|error| DeobfuscationFailure::from(error).with_diagnostic("next_layer", source))
}

fn peel_base64(tree: &Module) -> Result<Option<Module>, DeobfuscationFailure> {
    let flat = folded(tree);
    match sole_exec_argument(&flat) {
        Some(Expr::Constant(Constant::Bytes(payload))) => parse_layer(payload.clone()).map(Some),
        _ => Ok(None),
    }
}

fn peel_compile(tree: &Module) -> Result<Option<Module>, DeobfuscationFailure> {
    let flat = folded(tree);
    let Some(Expr::Call { func, args, .. }) = sole_exec_argument(&flat) else {
        return Ok(None);
    };
    match args.as_slice() {
        [Expr::Constant(Constant::Bytes(payload)), ..] if func.as_name() == Some("compile") => {
            tracing::info!("next layer located");
            parse_layer(payload.clone()).map(Some)
        }
        _ => Ok(None),
    }
}

fn peel_xor(tree: &Module) -> Result<Option<Module>, DeobfuscationFailure> {
    let Some(XorLoop {
        left,
        right,
        payload,
    }) = xor_loop(&folded(tree))
    else {
        return Ok(None);
    };
    let pad = u8::try_from(&(left ^ right)).map_err(|_| {
        DeobfuscationFailure::payload("xor pad does not fit in a byte")
    })?;
    let masked: Vec<u8> = payload.iter().map(|byte| byte ^ pad).collect();
    let inflated = codec::zlib_decompress(&masked).map_err(|error| {
        DeobfuscationFailure::from(error).with_diagnostic("xor_payload", masked.clone())
    })?;
    parse_layer(inflated).map(Some)
}

/// Constants of a folded
/// `for i in ..: if <left> ^ i == <right>: exec(zlib.decompress(bytes(map(.., <payload>)))); break`.
struct XorLoop {
    left: BigInt,
    right: BigInt,
    payload: Vec<u8>,
}

fn xor_loop(tree: &Module) -> Option<XorLoop> {
    let [Stmt::For { body, .. }] = tree.body.as_slice() else {
        return None;
    };
    let [Stmt::If { test, body: then, .. }] = body.as_slice() else {
        return None;
    };
    let [Stmt::Expr(exec), Stmt::Break] = then.as_slice() else {
        return None;
    };
    let Expr::Compare {
        left: probe,
        ops,
        comparators,
    } = test
    else {
        return None;
    };
    let ([CmpOp::Eq], [target]) = (ops.as_slice(), comparators.as_slice()) else {
        return None;
    };
    let Expr::BinOp {
        left,
        op: BinaryOp::BitXor,
        right: counter,
    } = probe.as_ref()
    else {
        return None;
    };
    counter.as_name()?;
    Some(XorLoop {
        left: PyValue::from_expr(left)?.as_int()?,
        right: PyValue::from_expr(target)?.as_int()?,
        payload: mapped_payload(exec)?,
    })
}

/// `<payload>` in `exec(zlib.decompress(bytes(map(<fn>, <payload>))))`.
fn mapped_payload(exec: &Expr) -> Option<Vec<u8>> {
    let Expr::Call { func, args, .. } = builtin_call(exec, "exec")? else {
        return None;
    };
    let is_decompress = matches!(func.as_ref(), Expr::Attribute { value, attr }
        if attr == "decompress" && value.as_name() == Some("zlib"));
    let [packed] = args.as_slice() else {
        return None;
    };
    if !is_decompress {
        return None;
    }
    let mapped = builtin_call(packed, "bytes")?;
    let Expr::Call {
        func: mapper,
        args: map_args,
        ..
    } = mapped
    else {
        return None;
    };
    let [_, payload] = map_args.as_slice() else {
        return None;
    };
    if mapper.as_name() != Some("map") {
        return None;
    }
    match PyValue::from_expr(payload)? {
        PyValue::Bytes(bytes) => Some(bytes),
        PyValue::List(items) => items
            .iter()
            .map(|item| item.as_int().and_then(|n| u8::try_from(&n).ok()))
            .collect(),
        _ => None,
    }
}

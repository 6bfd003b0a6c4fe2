//! Hyperion (<https://github.com/billythegoat356/Hyperion>).
//!
//! The outer layer hides zlib-compressed chunks of the real program in the
//! keyword arguments of heavily indented method calls, sometimes with an
//! extra base64 and zlib "frosting" around each chunk. The second layer opens
//! with a `try` scaffold and then builds its code through `globals()` writes,
//! `getattr` lookups and nested `exec` calls, which the symbolic transformer
//! unwinds.

use pydeobf_core::{
    DeobfuscationFailure, Deobfuscator, LayerDriver, LayerShape, MockCleanup,
    SymbolicTransformer,
};
use pydeobf_syntax::ast::{Constant, Expr, Module, Stmt};
use pydeobf_syntax::fold::{self, Fold};
use pydeobf_syntax::visit::{self, Visit};
use pydeobf_syntax::{parse_module, unparse};

use crate::codec::{self, DecodeError};
use crate::pattern::module_call;

/// Registered schema name.
pub const NAME: &str = "hyperion";

/// Comment Hyperion places at the top of its output.
const BANNER: &str = "# sourcery skip: collection-to-bool, remove-redundant-boolean, remove-redundant-except-handler";

/// Module-level names Hyperion assigns to advertise itself.
const SIGNATURE_NAMES: [&str; 3] = ["__obfuscator__", "__authors__", "__github__"];

const OUTER: &str = "outer";
const SCAFFOLD: &str = "scaffold";
const MAX_LAYERS: usize = 2;

const SHAPES: [LayerShape; 2] = [
    LayerShape {
        name: SCAFFOLD,
        matches: starts_with_try,
        peel: peel_scaffold,
    },
    LayerShape {
        name: OUTER,
        matches: any_tree,
        peel: peel_outer,
    },
];

/// The Hyperion schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hyperion;

impl Deobfuscator for Hyperion {
    type Output = String;

    fn scan(&self, source: &str) -> bool {
        if source.contains(BANNER) {
            return true;
        }
        parse_module(source).is_ok_and(|module| {
            let mut scanner = SignatureScanner::default();
            visit::walk_module(&mut scanner, &module);
            scanner.found
        })
    }

    fn deobfuscate(&self, source: &str) -> Result<String, DeobfuscationFailure> {
        let module = parse_module(source)?;
        let peeled = LayerDriver::new(NAME, &SHAPES, MAX_LAYERS).run(module, is_terminal)?;
        Ok(unparse(&peeled.module))
    }

    fn format(&self, output: String) -> String {
        output
    }
}

fn is_terminal(tree: &Module, trail: &[&'static str]) -> bool {
    match trail.last() {
        Some(&SCAFFOLD) => true,
        Some(&OUTER) if !starts_with_try(tree) => {
            tracing::error!("second layer has no try scaffold, returning it unchanged");
            true
        }
        _ => false,
    }
}

fn starts_with_try(tree: &Module) -> bool {
    matches!(tree.body.first(), Some(Stmt::Try { .. }))
}

const fn any_tree(_: &Module) -> bool {
    true
}

// ---------------------------------------------------------------------------
// Outer layer
// ---------------------------------------------------------------------------

fn peel_outer(tree: &Module) -> Result<Option<Module>, DeobfuscationFailure> {
    tracing::debug!("removing base64 and zlib frosting");
    let mut defrost = Defrost::default();
    let defrosted = defrost.fold_module(tree.clone());
    if let Some(error) = defrost.error {
        return Err(error.into());
    }

    tracing::debug!("collecting first layer bytes");
    let mut collector = ChunkCollector::default();
    visit::walk_module(&mut collector, &defrosted);
    if collector.bytes.is_empty() {
        tracing::error!("first layer bytes not found");
        return Ok(None);
    }
    let inflated = codec::zlib_decompress(&collector.bytes).map_err(|error| {
        DeobfuscationFailure::from(error).with_diagnostic("first_layer_bytes", collector.bytes.clone())
    })?;
    let source = codec::utf8(inflated)?;
    parse_module(&source)
        .map(Some)
        .map_err(|error| DeobfuscationFailure::from(error).with_diagnostic("second_layer", source))
}

/// Payload of `__import__('base64').b64decode(__import__('zlib').decompress(b'..'))`.
fn frosted_payload(expr: &Expr) -> Option<&[u8]> {
    let [inner] = module_call(expr, "base64", "b64decode")? else {
        return None;
    };
    match module_call(inner, "zlib", "decompress")? {
        [Expr::Constant(Constant::Bytes(payload))] => Some(payload),
        _ => None,
    }
}

fn defrost(payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
    codec::b64decode(&codec::zlib_decompress(payload)?)
}

/// Collapses frosted payloads into constants, keeping the first decode error.
#[derive(Default)]
struct Defrost {
    error: Option<DecodeError>,
}

impl Defrost {
    fn collapse(&mut self, payload: &[u8], as_text: bool) -> Option<Expr> {
        let decoded = defrost(payload).and_then(|bytes| {
            if as_text {
                codec::utf8(bytes).map(Expr::str)
            } else {
                Ok(Expr::bytes(bytes))
            }
        });
        match decoded {
            Ok(expr) => Some(expr),
            Err(error) => {
                self.error.get_or_insert(error);
                None
            }
        }
    }
}

impl Fold for Defrost {
    fn fold_expr(&mut self, expr: Expr) -> Expr {
        if let Some(payload) = frosted_payload(&expr) {
            if let Some(collapsed) = self.collapse(payload, false) {
                return collapsed;
            }
            return expr;
        }
        if let Expr::Call { func, args, .. } = &expr
            && args.is_empty()
            && let Expr::Attribute { value, attr } = func.as_ref()
            && attr == "decode"
            && let Some(payload) = frosted_payload(value)
        {
            if let Some(collapsed) = self.collapse(payload, true) {
                return collapsed;
            }
            return expr;
        }
        fold::walk_expr(self, expr)
    }
}

/// Concatenates the bytes passed to `obj.method(k1='..', k2=b'..')` calls.
///
/// Matching calls are not descended into, and neither are other calls, so
/// only outermost calls contribute.
#[derive(Default)]
struct ChunkCollector {
    bytes: Vec<u8>,
}

impl Visit for ChunkCollector {
    fn visit_expr(&mut self, expr: &Expr) {
        let Expr::Call {
            func,
            args,
            keywords,
        } = expr
        else {
            visit::walk_expr(self, expr);
            return;
        };
        if let (Expr::Attribute { .. }, [], [first, second]) =
            (func.as_ref(), args.as_slice(), keywords.as_slice())
            && matches!(first.value, Expr::Constant(Constant::Str(_)))
            && let Expr::Constant(Constant::Bytes(chunk)) = &second.value
        {
            self.bytes.extend_from_slice(chunk);
        }
    }
}

// ---------------------------------------------------------------------------
// Second layer
// ---------------------------------------------------------------------------

fn peel_scaffold(tree: &Module) -> Result<Option<Module>, DeobfuscationFailure> {
    let Some((Stmt::Try { .. }, rest)) = tree.body.split_first() else {
        return Ok(None);
    };
    tracing::debug!("try scaffold found, folding the second layer");
    let mut transformer = SymbolicTransformer::new();
    let folded = transformer.transform(Module::new(rest.to_vec()));
    let (namespace, issues) = transformer.into_parts();
    if !issues.is_empty() {
        tracing::debug!(unresolved = issues.len(), "second layer folded with unresolved nodes");
    }
    Ok(Some(MockCleanup::new(&namespace).clean(folded)))
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SignatureScanner {
    found: bool,
}

impl Visit for SignatureScanner {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let Stmt::Assign { targets, .. } = stmt
            && let [Expr::Name(name)] = targets.as_slice()
            && SIGNATURE_NAMES.contains(&name.as_str())
        {
            self.found = true;
            return;
        }
        visit::walk_stmt(self, stmt);
    }
}

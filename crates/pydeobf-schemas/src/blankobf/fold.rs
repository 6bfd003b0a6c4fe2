//! Plain constant folding for BlankObf layers.
//!
//! Unlike the symbolic transformer this folder works on literal values only:
//! every operand must already be a constant, names are bound by ordinary
//! `name = <constant>` assignments, and the decoding helpers BlankObf calls
//! are evaluated directly.

use std::collections::HashMap;

use num_bigint::BigInt;
use pydeobf_core::PyValue;
use pydeobf_syntax::ast::{Comprehension, Constant, Expr, Stmt};
use pydeobf_syntax::fold::{self, Fold};
use pydeobf_syntax::parse_expression;

use crate::codec::{self, DecodeError};

type Codec = fn(&[u8]) -> Result<Vec<u8>, DecodeError>;

/// `module.function` decoders folded on constant arguments.
const KNOWN_FUNCTIONS: [(&str, &str, Codec); 7] = [
    ("base64", "b64decode", codec::b64decode),
    ("base64", "b32decode", codec::b32decode),
    ("base64", "b16decode", codec::b16decode),
    ("zlib", "decompress", codec::zlib_decompress),
    ("lzma", "decompress", codec::lzma_decompress),
    ("binascii", "unhexlify", codec::unhexlify),
    ("bytes", "fromhex", codec::unhexlify),
];

/// Folds constant subtrees and removes constant name bindings.
#[derive(Debug, Default)]
pub(crate) struct ConstantFolder {
    namespace: HashMap<String, PyValue>,
}

impl Fold for ConstantFolder {
    fn fold_stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        match fold::walk_stmt(self, stmt) {
            Stmt::Assign { targets, value } => {
                if let [Expr::Name(name)] = targets.as_slice()
                    && let Some(constant) = PyValue::from_expr(&value)
                {
                    self.namespace.insert(name.clone(), constant);
                    return Vec::new();
                }
                vec![Stmt::Assign { targets, value }]
            }
            other => vec![other],
        }
    }

    fn fold_expr(&mut self, expr: Expr) -> Expr {
        if let Expr::Name(name) = &expr
            && let Some(value) = self.namespace.get(name)
        {
            return value.to_expr();
        }
        let folded = fold::walk_expr(self, expr);
        self.reduce(&folded).unwrap_or(folded)
    }
}

impl ConstantFolder {
    /// The replacement for a node whose children are already folded.
    fn reduce(&mut self, expr: &Expr) -> Option<Expr> {
        match expr {
            Expr::Call {
                func,
                args,
                keywords,
            } if keywords.is_empty() => self.reduce_call(func, args),
            Expr::Subscript { value, slice } => subscript(value, slice),
            Expr::ListComp { elt, generators } => dotted_quads(elt, generators),
            Expr::BinOp { left, op, right } => {
                let value = literal(left)?.binary(*op, &literal(right)?).ok()?;
                Some(value.to_expr())
            }
            Expr::UnaryOp { op, operand } => Some(literal(operand)?.unary(*op).ok()?.to_expr()),
            _ => None,
        }
    }

    fn reduce_call(&mut self, func: &Expr, args: &[Expr]) -> Option<Expr> {
        match (func, args) {
            (Expr::Name(name), [arg]) if name == "bytes" => match literal(arg)? {
                PyValue::Bytes(bytes) => Some(Expr::bytes(bytes)),
                PyValue::List(items) => {
                    let bytes = items
                        .iter()
                        .map(|item| item.as_int().and_then(|n| u8::try_from(&n).ok()))
                        .collect::<Option<Vec<u8>>>()?;
                    Some(Expr::bytes(bytes))
                }
                _ => None,
            },
            (Expr::Name(name), [arg]) if name == "list" => {
                matches!(literal(arg)?, PyValue::List(_)).then(|| arg.clone())
            }
            (Expr::Name(name), [arg]) if name == "eval" => {
                let source = match literal(arg)? {
                    PyValue::Str(text) => text,
                    PyValue::Bytes(bytes) => String::from_utf8(bytes).ok()?,
                    _ => return None,
                };
                let parsed = parse_expression(&source).ok()?;
                Some(self.fold_expr(parsed))
            }
            (Expr::Name(name), [object, Expr::Constant(Constant::Str(function))])
                if name == "getattr" =>
            {
                let module = imported_module(object)?;
                Some(if module == "builtins" {
                    Expr::name(function.clone())
                } else {
                    Expr::attribute(Expr::name(module), function.clone())
                })
            }
            (Expr::Attribute { value, attr }, _) if attr == "decode" => {
                let Expr::Constant(Constant::Bytes(bytes)) = value.as_ref() else {
                    return None;
                };
                if !args.iter().all(names_utf8) {
                    return None;
                }
                String::from_utf8(bytes.clone()).ok().map(Expr::str)
            }
            (Expr::Attribute { value, attr }, [arg]) => {
                let module = value.as_name()?;
                let (_, _, decode) = KNOWN_FUNCTIONS
                    .iter()
                    .find(|(lib, function, _)| *lib == module && *function == attr.as_str())?;
                let input = match literal(arg)? {
                    PyValue::Bytes(bytes) => bytes,
                    PyValue::Str(text) if text.is_ascii() => text.into_bytes(),
                    _ => return None,
                };
                match decode(&input) {
                    Ok(decoded) => Some(Expr::bytes(decoded)),
                    Err(error) => {
                        tracing::warn!(%module, function = %attr, %error, "constant decode failed");
                        None
                    }
                }
            }
            _ => None,
        }
    }
}

fn literal(expr: &Expr) -> Option<PyValue> {
    PyValue::from_expr(expr)
}

fn names_utf8(arg: &Expr) -> bool {
    matches!(arg, Expr::Constant(Constant::Str(encoding))
        if matches!(encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8"))
}

/// Module named by `__import__('<module>')`.
fn imported_module(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Call { func, args, .. } if func.as_name() == Some("__import__") => match args.as_slice() {
            [Expr::Constant(Constant::Str(module))] => Some(module.as_str()),
            _ => None,
        },
        _ => None,
    }
}

fn subscript(value: &Expr, slice: &Expr) -> Option<Expr> {
    let target = literal(value)?;
    if let Expr::Slice { lower, upper, step } = slice {
        let bound = |part: &Option<Box<Expr>>| -> Option<Option<BigInt>> {
            match part {
                None => Some(None),
                Some(expr) => literal(expr)?.as_int().map(Some),
            }
        };
        let (start, stop, stride) = (bound(lower)?, bound(upper)?, bound(step)?);
        return target
            .slice(start.as_ref(), stop.as_ref(), stride.as_ref())
            .ok()
            .map(|value| value.to_expr());
    }
    target.index(&literal(slice)?).ok().map(|value| value.to_expr())
}

/// `[int(n) for ip in [.. for .. in ['1.2.3.4', ..]] for n in ip.split('.')]`.
fn dotted_quads(elt: &Expr, generators: &[Comprehension]) -> Option<Expr> {
    if !elt.is_call_to("int") {
        return None;
    }
    let [outer, _] = generators else {
        return None;
    };
    let Expr::ListComp {
        generators: inner, ..
    } = &outer.iter
    else {
        return None;
    };
    let [source] = inner.as_slice() else {
        return None;
    };
    let PyValue::List(addresses) = literal(&source.iter)? else {
        return None;
    };
    let mut numbers = Vec::new();
    for address in &addresses {
        for part in address.as_str()?.split('.') {
            numbers.push(Expr::int(part.trim().parse::<BigInt>().ok()?));
        }
    }
    Some(Expr::List(numbers))
}

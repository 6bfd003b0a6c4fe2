//! pyobfuscate (<https://pyobfuscate.com>).
//!
//! Two variants exist and each is recognised by the assignment that carries
//! its payload. The lambda variant binds `pyobfuscate` to a lambda called
//! with a keyword dict `{k: v, 'exec': .., 'eval': bytes.fromhex(..)}`. Its
//! ciphertext is AES-192-CBC keyed with `sha256(k + v)`, and some builds hash
//! `v` without its last character. The dict variant binds `obfuscate` to
//! `{password: blob}` where the blob is base85 text holding a salt and an
//! AES-128-CFB8 ciphertext keyed through PBKDF2.

mod crypto;

use pydeobf_core::indicators::{find_webhooks, webhook_report};
use pydeobf_core::{DeobfuscationFailure, Deobfuscator};
use pydeobf_syntax::ast::{Constant, Expr, Keyword, Module, Stmt};
use pydeobf_syntax::parse_module;
use pydeobf_syntax::visit::{self, Visit};

pub use self::crypto::{CipherError, decrypt_hashed_cbc, decrypt_salted_cfb};
use crate::codec;

/// Registered schema name.
pub const NAME: &str = "pyobfuscate";

const LAMBDA_TARGET: &str = "pyobfuscate";
const DICT_TARGET: &str = "obfuscate";

/// The pyobfuscate schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pyobfuscate;

impl Deobfuscator for Pyobfuscate {
    type Output = String;

    fn scan(&self, source: &str) -> bool {
        parse_module(source).is_ok_and(|module| find_payload(&module).is_some())
    }

    fn deobfuscate(&self, source: &str) -> Result<String, DeobfuscationFailure> {
        let module = parse_module(source)?;
        let payload = find_payload(&module)
            .ok_or_else(|| DeobfuscationFailure::missing_marker("pyobfuscate payload not found"))?;
        match payload {
            Payload::Lambda { key, value, hex } => {
                tracing::info!("payload identified as the lambda variant");
                decrypt_lambda(&key, &value, &hex)
            }
            Payload::Dict { password, blob } => {
                tracing::info!("payload identified as the dict variant");
                decrypt_dict(&password, &blob)
            }
        }
    }

    fn format(&self, output: String) -> String {
        let webhooks = find_webhooks(&output);
        if webhooks.is_empty() {
            output
        } else {
            format!("{output}\n\n{}", webhook_report(&webhooks))
        }
    }
}

/// The encrypted payload of either variant, as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    Lambda {
        key: String,
        value: String,
        hex: String,
    },
    Dict {
        password: String,
        blob: Vec<u8>,
    },
}

fn decrypt_lambda(key: &str, value: &str, hex: &str) -> Result<String, DeobfuscationFailure> {
    let ciphertext = codec::unhexlify(hex.as_bytes())?;
    match decrypt_hashed_cbc(&format!("{key}{value}"), &ciphertext) {
        Ok(text) => Ok(text),
        Err(error) => {
            tracing::info!(%error, "full key failed, retrying with the shortened key");
            let mut shortened = value.chars();
            shortened.next_back();
            decrypt_hashed_cbc(&format!("{key}{}", shortened.as_str()), &ciphertext).map_err(
                |retry| DeobfuscationFailure::from(retry).with_diagnostic("ciphertext", ciphertext),
            )
        }
    }
}

fn decrypt_dict(password: &str, blob: &[u8]) -> Result<String, DeobfuscationFailure> {
    let decoded = codec::b85decode(blob)?;
    let mut inner = password.chars();
    inner.next();
    inner.next_back();
    decrypt_salted_cfb(inner.as_str().as_bytes(), &decoded).map_err(|error| {
        DeobfuscationFailure::from(error).with_diagnostic("blob", decoded.as_slice())
    })
}

/// The last payload assignment in the module.
fn find_payload(module: &Module) -> Option<Payload> {
    let mut finder = PayloadFinder::default();
    visit::walk_module(&mut finder, module);
    finder.payload
}

#[derive(Default)]
struct PayloadFinder {
    payload: Option<Payload>,
}

impl Visit for PayloadFinder {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let Stmt::Assign { targets, value } = stmt
            && let [Expr::Name(target)] = targets.as_slice()
        {
            let found = match target.as_str() {
                LAMBDA_TARGET => lambda_payload(value),
                DICT_TARGET => dict_payload(value),
                _ => None,
            };
            if found.is_some() {
                self.payload = found;
            }
        }
        visit::walk_stmt(self, stmt);
    }
}

/// `(lambda ..: ..)(**{k: v, 'exec': '..', 'eval': bytes.fromhex('..'.replace('\n', ''))})`.
fn lambda_payload(expr: &Expr) -> Option<Payload> {
    let Expr::Call { func, keywords, .. } = expr else {
        return None;
    };
    if !matches!(func.as_ref(), Expr::Lambda { .. }) {
        return None;
    }
    let [Keyword {
        value: Expr::Dict { keys, values },
        ..
    }] = keywords.as_slice()
    else {
        return None;
    };
    let [Some(first_key), Some(exec_key), Some(eval_key)] = keys.as_slice() else {
        return None;
    };
    let [first_value, exec_value, eval_value] = values.as_slice() else {
        return None;
    };
    if str_constant(exec_key) != Some("exec")
        || str_constant(eval_key) != Some("eval")
        || str_constant(exec_value).is_none()
    {
        return None;
    }
    Some(Payload::Lambda {
        key: str_constant(first_key)?.to_owned(),
        value: str_constant(first_value)?.to_owned(),
        hex: fromhex_argument(eval_value)?.replace('\n', ""),
    })
}

/// The text in `bytes.fromhex('<text>'.replace('\n', ''))`.
fn fromhex_argument(expr: &Expr) -> Option<&str> {
    let Expr::Call { func, args, .. } = expr else {
        return None;
    };
    let Expr::Attribute { value, attr } = func.as_ref() else {
        return None;
    };
    if value.as_name() != Some("bytes") || attr != "fromhex" {
        return None;
    }
    let [
        Expr::Call {
            func: replace,
            args: replace_args,
            ..
        },
    ] = args.as_slice()
    else {
        return None;
    };
    let Expr::Attribute {
        value: text,
        attr: method,
    } = replace.as_ref()
    else {
        return None;
    };
    let [from, to] = replace_args.as_slice() else {
        return None;
    };
    if method != "replace" || str_constant(from) != Some("\n") || str_constant(to) != Some("") {
        return None;
    }
    str_constant(text)
}

/// `{password: blob}` with a string password and a str or bytes blob.
fn dict_payload(expr: &Expr) -> Option<Payload> {
    let Expr::Dict { keys, values } = expr else {
        return None;
    };
    let ([Some(password)], [encoded]) = (keys.as_slice(), values.as_slice()) else {
        return None;
    };
    let blob = match encoded {
        Expr::Constant(Constant::Str(text)) => text.as_bytes().to_vec(),
        Expr::Constant(Constant::Bytes(bytes)) => bytes.clone(),
        _ => return None,
    };
    Some(Payload::Dict {
        password: str_constant(password)?.to_owned(),
        blob,
    })
}

fn str_constant(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Constant(Constant::Str(value)) => Some(value),
        _ => None,
    }
}

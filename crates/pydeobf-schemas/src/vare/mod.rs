//! Vare (<https://github.com/saintdaddy/Vare-Obfuscator>), also published as
//! "Vore".
//!
//! Each layer stores a Fernet key in `__mikey__` and a hex-encoded token in
//! `mydata`. The decrypted token goes through a fixed chain of base64,
//! base32, reversal and zlib steps and ends as a marshalled `str` holding the
//! next layer. Layers are peeled while the text still looks like Vare.

mod fernet;

use std::sync::LazyLock;

use pydeobf_core::indicators::find_webhooks;
use pydeobf_core::{DeobfuscationFailure, Deobfuscator, FailureKind};
use pydeobf_syntax::{StringLiteral, decode_string_literal, repr_bytes};
use regex::Regex;

pub use self::fernet::{Fernet, FernetError};
use crate::codec;
use crate::marshal::unmarshal_str;

/// Registered schema name.
pub const NAME: &str = "vare";

const MAX_LAYERS: usize = 100;

static KEY: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"__mikey__\s*=\s*('.+'|".+");mydata"#));
static DATA: LazyLock<Regex> = LazyLock::new(|| compile(r#"mydata\s*=\s*('.+'|".+")"#));
static SIGNATURES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        compile(r"__VareObfuscator__"),
        compile(r"def saint\d+\(\):"),
        compile(r"__mikey__"),
    ]
});

#[expect(clippy::expect_used, reason = "patterns are compile-time literals")]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("vare pattern compiles")
}

/// The Vare schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vare;

impl Deobfuscator for Vare {
    type Output = String;

    fn scan(&self, source: &str) -> bool {
        SIGNATURES.iter().any(|pattern| pattern.is_match(source))
    }

    fn deobfuscate(&self, source: &str) -> Result<String, DeobfuscationFailure> {
        let mut code = source.to_owned();
        for layer in 0..MAX_LAYERS {
            if !self.scan(&code) {
                tracing::info!(layers = layer, "finished peeling");
                return Ok(code);
            }
            tracing::info!(layer, "peeling layer");
            code = peel_layer(&code).map_err(|failure| {
                failure
                    .with_diagnostic("steps", layer.to_string())
                    .with_diagnostic("partial", code.as_str())
            })?;
        }
        if !self.scan(&code) {
            return Ok(code);
        }
        Err(DeobfuscationFailure::new(
            FailureKind::IterationLimitExceeded,
            format!("{NAME} did not finish within {MAX_LAYERS} layers"),
        )
        .with_diagnostic("steps", MAX_LAYERS.to_string())
        .with_diagnostic("partial", code))
    }

    fn format(&self, output: String) -> String {
        let webhooks = find_webhooks(&output).join("\n");
        format!("{output}\n\n{webhooks}")
    }
}

/// Decrypts one layer into the source of the next.
fn peel_layer(code: &str) -> Result<String, DeobfuscationFailure> {
    let key = literal_after(&KEY, code, "__mikey__")?;
    let data = literal_after(&DATA, code, "mydata")?;
    let fernet = Fernet::from_encoded_key(&codec::b64decode(&key)?)?;
    let decrypted = fernet.decrypt(&codec::unhexlify(&data)?)?;
    let marshalled = unscramble(&decrypted)?;
    Ok(unmarshal_str(&marshalled).unwrap_or_else(|| {
        tracing::warn!("layer is not a marshalled str, keeping its bytes");
        repr_bytes(&marshalled)
    }))
}

/// `zlib(b32(b64(reversed(b64(b64(b32(b64(data))))))))`.
fn unscramble(decrypted: &[u8]) -> Result<Vec<u8>, codec::DecodeError> {
    let inner = codec::b64decode(&codec::b64decode(&codec::b32decode(&codec::b64decode(
        decrypted,
    )?)?)?)?;
    let reversed: Vec<u8> = inner.into_iter().rev().collect();
    codec::zlib_decompress(&codec::b32decode(&codec::b64decode(&reversed)?)?)
}

/// Contents of the string literal captured by `pattern`.
fn literal_after(pattern: &Regex, code: &str, marker: &str) -> Result<Vec<u8>, DeobfuscationFailure> {
    let literal = pattern
        .captures(code)
        .and_then(|captures| captures.get(1))
        .ok_or_else(|| DeobfuscationFailure::missing_marker(format!("{marker} not found")))?;
    match decode_string_literal(literal.as_str()) {
        Some(StringLiteral::Str(text)) => Ok(text.into_bytes()),
        Some(StringLiteral::Bytes(bytes)) => Ok(bytes),
        None => Err(DeobfuscationFailure::payload(format!("{marker} is not a string literal"))
            .with_diagnostic("literal", literal.as_str())),
    }
}

#[cfg(test)]
mod tests;

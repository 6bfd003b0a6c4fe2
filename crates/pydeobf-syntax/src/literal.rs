//! Decoding and rendering of Python literals.
//!
//! Decoding follows the Python lexer: string prefixes, quote styles, escape
//! sequences and integer radixes. Rendering follows `repr()`, which is what
//! `ast.unparse` emits for constants, so unparsed output reads the way a
//! Python user expects.

use num_bigint::BigInt;
use num_traits::Num;

/// A decoded string or bytes literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringLiteral {
    /// A text literal.
    Str(String),
    /// A bytes literal.
    Bytes(Vec<u8>),
}

/// Decodes one Python string or bytes literal, prefix and quotes included.
///
/// Returns `None` for f-strings and template strings, for malformed input,
/// and for escapes that have no Rust `char` equivalent (lone surrogates,
/// named `\N{...}` escapes).
#[must_use]
pub fn decode_string_literal(text: &str) -> Option<StringLiteral> {
    let quote_at = text.find(['\'', '"'])?;
    let (written_prefix, quoted) = text.split_at(quote_at);
    let prefix = written_prefix.to_ascii_lowercase();
    if prefix.chars().any(|c| !matches!(c, 'r' | 'b' | 'u')) {
        return None;
    }
    let raw = prefix.contains('r');
    let is_bytes = prefix.contains('b');

    let body = strip_quotes(quoted)?;
    if is_bytes {
        decode_bytes_body(body, raw).map(StringLiteral::Bytes)
    } else {
        decode_str_body(body, raw).map(StringLiteral::Str)
    }
}

fn strip_quotes(quoted: &str) -> Option<&str> {
    for delimiter in ["'''", "\"\"\"", "'", "\""] {
        if quoted.len() >= delimiter.len() * 2 && quoted.starts_with(delimiter) {
            return quoted
                .strip_prefix(delimiter)
                .and_then(|rest| rest.strip_suffix(delimiter));
        }
    }
    None
}

fn decode_str_body(body: &str, raw: bool) -> Option<String> {
    if raw {
        return Some(body.to_owned());
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escape) = chars.next() else {
            out.push('\\');
            break;
        };
        match escape {
            '\n' => {}
            'u' => out.push(read_hex_char(&mut chars, 4)?),
            'U' => out.push(read_hex_char(&mut chars, 8)?),
            'x' => out.push(read_hex_char(&mut chars, 2)?),
            'N' => return None,
            '0'..='7' => {
                let value = read_octal(escape, &mut chars);
                out.push(char::from_u32(value)?);
            }
            other => match simple_escape(other) {
                Some(byte) => out.push(char::from(byte)),
                None => {
                    out.push('\\');
                    out.push(other);
                }
            },
        }
    }
    Some(out)
}

fn decode_bytes_body(body: &str, raw: bool) -> Option<Vec<u8>> {
    if !body.is_ascii() {
        return None;
    }
    if raw {
        return Some(body.as_bytes().to_vec());
    }
    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(u8::try_from(c).ok()?);
            continue;
        }
        let Some(escape) = chars.next() else {
            out.push(b'\\');
            break;
        };
        match escape {
            '\n' => {}
            'x' => {
                let value = read_hex_char(&mut chars, 2)?;
                out.push(u8::try_from(u32::from(value)).ok()?);
            }
            '0'..='7' => {
                let value = read_octal(escape, &mut chars);
                out.push(u8::try_from(value & 0xff).ok()?);
            }
            other => match simple_escape(other) {
                Some(byte) => out.push(byte),
                None => {
                    out.push(b'\\');
                    out.push(u8::try_from(other).ok()?);
                }
            },
        }
    }
    Some(out)
}

const fn simple_escape(c: char) -> Option<u8> {
    let byte = match c {
        '\\' => b'\\',
        '\'' => b'\'',
        '"' => b'"',
        'a' => 0x07,
        'b' => 0x08,
        'f' => 0x0c,
        'n' => b'\n',
        'r' => b'\r',
        't' => b'\t',
        'v' => 0x0b,
        _ => return None,
    };
    Some(byte)
}

fn read_hex_char(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, len: usize) -> Option<char> {
    let mut value = 0_u32;
    for _ in 0..len {
        let digit = chars.next()?.to_digit(16)?;
        value = value.checked_mul(16)?.checked_add(digit)?;
    }
    char::from_u32(value)
}

fn read_octal(first: char, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u32 {
    let mut value = first.to_digit(8).unwrap_or(0);
    for _ in 0..2 {
        match chars.peek().and_then(|c| c.to_digit(8)) {
            Some(digit) => {
                value = value * 8 + digit;
                chars.next();
            }
            None => break,
        }
    }
    value
}

/// Parses a Python integer literal (`0x`, `0o`, `0b`, underscores).
///
/// Imaginary and Python 2 long suffixes are rejected.
#[must_use]
pub fn parse_int_literal(text: &str) -> Option<BigInt> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        if lower.len() > 1 && lower.starts_with('0') && lower.chars().any(|c| c != '0') {
            return None;
        }
        (lower.as_str(), 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    BigInt::from_str_radix(digits, radix).ok()
}

/// Parses a Python float literal (`1.`, `.5`, `1e-3`, underscores).
#[must_use]
pub fn parse_float_literal(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if cleaned.ends_with(['j', 'J']) {
        return None;
    }
    cleaned.parse().ok()
}

/// Renders a string the way Python's `repr()` does.
#[must_use]
pub fn repr_str(value: &str) -> String {
    let quote = pick_quote(value.contains('\''), value.contains('"'));
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if !is_printable(c) => {
                let code = u32::from(c);
                let escaped = if code < 0x100 {
                    format!("\\x{code:02x}")
                } else if code < 0x1_0000 {
                    format!("\\u{code:04x}")
                } else {
                    format!("\\U{code:08x}")
                };
                out.push_str(&escaped);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Renders bytes the way Python's `repr()` does.
#[must_use]
pub fn repr_bytes(value: &[u8]) -> String {
    let quote = pick_quote(value.contains(&b'\''), value.contains(&b'"'));
    let mut out = String::with_capacity(value.len() + 3);
    out.push('b');
    out.push(quote);
    for &byte in value {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if char::from(b) == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(char::from(byte)),
            _ => {
                out.push_str(&format!("\\x{byte:02x}"));
            }
        }
    }
    out.push(quote);
    out
}

const fn pick_quote(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double { '"' } else { '\'' }
}

fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !(c.is_control()
        || c.is_whitespace()
        || matches!(
            c,
            '\u{ad}'
                | '\u{200b}'..='\u{200f}'
                | '\u{2060}'..='\u{2064}'
                | '\u{feff}'
                | '\u{e000}'..='\u{f8ff}'
                | '\u{f0000}'..='\u{10ffff}'
        ))
}

/// Renders a float the way Python's `repr()` does (`1e+16`, `0.0001`, `1.0`).
#[must_use]
pub fn repr_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value.is_sign_negative() { "-inf" } else { "inf" }.to_owned();
    }

    // `{:e}` yields the shortest round-tripping digits, e.g. `-1.5e16`.
    let scientific = format!("{value:e}");
    let (mantissa, exponent_text) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent_text.parse().unwrap_or(0);
    let (sign, magnitude) = mantissa
        .strip_prefix('-')
        .map_or(("", mantissa), |rest| ("-", rest));
    let digits: String = magnitude.chars().filter(char::is_ascii_digit).collect();

    if (-4..16).contains(&exponent) {
        format!("{sign}{}", fixed_notation(&digits, exponent))
    } else {
        let (head, tail) = digits.split_at(1.min(digits.len()));
        let fraction = if tail.is_empty() {
            String::new()
        } else {
            format!(".{tail}")
        };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        format!("{sign}{head}{fraction}e{exp_sign}{:02}", exponent.unsigned_abs())
    }
}

fn fixed_notation(digits: &str, exponent: i32) -> String {
    if exponent < 0 {
        let zeros = "0".repeat(usize::try_from(-exponent - 1).unwrap_or(0));
        return format!("0.{zeros}{digits}");
    }
    let int_len = usize::try_from(exponent).unwrap_or(0) + 1;
    if digits.len() <= int_len {
        let padding = "0".repeat(int_len - digits.len());
        format!("{digits}{padding}.0")
    } else {
        let (int_part, frac_part) = digits.split_at(int_len);
        format!("{int_part}.{frac_part}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("'abc'", StringLiteral::Str("abc".into()))]
    #[case("\"a'b\"", StringLiteral::Str("a'b".into()))]
    #[case("'''multi\nline'''", StringLiteral::Str("multi\nline".into()))]
    #[case(r"'\x41\101é\n'", StringLiteral::Str("AAé\n".into()))]
    #[case(r"r'\d+'", StringLiteral::Str(r"\d+".into()))]
    #[case(r"'\q'", StringLiteral::Str(r"\q".into()))]
    #[case(r"b'\x00\xff'", StringLiteral::Bytes(vec![0, 0xff]))]
    #[case(r"Rb'\x00'", StringLiteral::Bytes(br"\x00".to_vec()))]
    #[case(r"b'\u1234'", StringLiteral::Bytes(br"\u1234".to_vec()))]
    #[case("u'x'", StringLiteral::Str("x".into()))]
    fn decodes_literals(#[case] text: &str, #[case] expected: StringLiteral) {
        assert_eq!(decode_string_literal(text), Some(expected));
    }

    #[rstest]
    #[case("f'{x}'")]
    #[case(r"'\N{BULLET}'")]
    #[case(r"'\ud800'")]
    #[case("b'é'")]
    fn refuses_undecodable_literals(#[case] text: &str) {
        assert_eq!(decode_string_literal(text), None);
    }

    #[rstest]
    #[case("42", 42)]
    #[case("0x_ff", 255)]
    #[case("0o17", 15)]
    #[case("0B101", 5)]
    #[case("1_000", 1000)]
    #[case("0", 0)]
    fn parses_integers(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(parse_int_literal(text), Some(BigInt::from(expected)));
    }

    #[rstest]
    #[case("10j")]
    #[case("017")]
    #[case("0x")]
    fn rejects_non_integers(#[case] text: &str) {
        assert_eq!(parse_int_literal(text), None);
    }

    #[rstest]
    #[case("abc", "'abc'")]
    #[case("it's", "\"it's\"")]
    #[case("'\"", r#"'\'"'"#)]
    #[case("a\\b\n", r"'a\\b\n'")]
    #[case("\u{1}\u{7f}é", r"'\x01\x7fé'")]
    #[case("\u{2028}\u{e000}", r"'\u2028\ue000'")]
    #[case("\u{f0000}", r"'\U000f0000'")]
    fn repr_str_matches_python(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(repr_str(value), expected);
    }

    #[rstest]
    #[case(b"abc".as_slice(), "b'abc'")]
    #[case(b"\x00\xff'".as_slice(), r#"b"\x00\xff'""#)]
    #[case(b"\t\\".as_slice(), r"b'\t\\'")]
    fn repr_bytes_matches_python(#[case] value: &[u8], #[case] expected: &str) {
        assert_eq!(repr_bytes(value), expected);
    }

    #[rstest]
    #[case(1.0, "1.0")]
    #[case(0.5, "0.5")]
    #[case(123.25, "123.25")]
    #[case(1e16, "1e+16")]
    #[case(1.5e16, "1.5e+16")]
    #[case(0.0001, "0.0001")]
    #[case(0.00001, "1e-05")]
    #[case(-2.5, "-2.5")]
    #[case(1e100, "1e+100")]
    fn repr_float_matches_python(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(repr_float(value), expected);
    }
}

//! Unit tests for the FCT schema.

use std::io::Write;

use data_encoding::BASE64;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use rstest::rstest;

use super::*;

const LAMBDA: &str =
    "_ = lambda __: __import__('zlib').decompress(__import__('base64').b64decode(__[::-1]))";

/// `reverse(b64encode(zlib(data)))`, the inverse of one round.
fn wrap(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write");
    let packed = encoder.finish().expect("finish");
    BASE64.encode(&packed).into_bytes().into_iter().rev().collect()
}

fn exec_wrapper(payload: &[u8]) -> Vec<u8> {
    [EXEC_WRAPPER, payload, EXEC_WRAPPER_END].concat()
}

/// A marshalled code object whose only string constant is `payload`.
fn marshalled(payload: &[u8]) -> Vec<u8> {
    let len = u32::try_from(payload.len()).expect("short payload");
    let mut out = b"\xe3\x00\x00\x00\x00".to_vec();
    out.extend_from_slice(b"\x02s");
    out.extend((0..4).map(|shift| u8::try_from((len >> (shift * 8)) & 0xff).expect("byte")));
    out.extend_from_slice(payload);
    out.extend_from_slice(b"N)");
    out
}

fn surface(payload: &[u8]) -> String {
    format!(
        "{LAMBDA}\nexec((_)(b'{}'))\n",
        String::from_utf8(payload.to_vec()).expect("base64 text")
    )
}

/// Surface code -> exec wrapper -> marshalled wrapper -> `program`.
fn sample(program: &[u8]) -> String {
    let inner = marshalled(&wrap(program));
    surface(&wrap(&exec_wrapper(&wrap(&inner))))
}

#[test]
fn rounds_are_unwound_to_the_program() {
    let output = Fct.deobfuscate(&sample(b"print('hello')")).expect("deobfuscates");
    assert_eq!(Fct.format(output), "print('hello')");
}

#[test]
fn marshalled_output_is_rendered_as_bytes() {
    let output = Fct
        .deobfuscate(&sample(b"\xe3\x00N"))
        .expect("deobfuscates");
    assert_eq!(Fct.format(output), r"b'\xe3\x00N'");
}

#[test]
fn empty_payload_ends_the_rounds() {
    let wrapper = marshalled(b"");
    let output = Fct.deobfuscate(&surface(&wrap(&wrapper))).expect("deobfuscates");
    assert_eq!(output, wrapper);
}

#[test]
fn round_cap_keeps_the_last_bytes() {
    let source = sample(b"print(1)");
    let failure = unwind(surface_payload(&source).expect("payload"), 1).expect_err("capped");
    assert_eq!(failure.kind(), FailureKind::IterationLimitExceeded);
    assert!(failure.diagnostic("marshalled_bytes").is_some());
}

#[rstest]
#[case::none("print(1)\n", FailureKind::MissingMarker, None)]
#[case::two("a = b'x'\nb = b'y'\n", FailureKind::Ambiguous, Some("candidates"))]
#[case::not_python("exec((_)(b'abc'\n", FailureKind::Syntax, Some("surface_code"))]
#[case::corrupt("x = b'!!!!'\n", FailureKind::Payload, Some("obf_bytes"))]
fn failures_carry_their_evidence(
    #[case] source: &str,
    #[case] kind: FailureKind,
    #[case] diagnostic: Option<&str>,
) {
    let failure = Fct.deobfuscate(source).expect_err("fails");
    assert_eq!(failure.kind(), kind);
    if let Some(name) = diagnostic {
        assert!(failure.diagnostic(name).is_some(), "{name} missing");
    }
}

#[test]
fn base32_route_is_tried_after_base64() {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"print(32)").expect("write");
    let packed = encoder.finish().expect("finish");
    let reversed: Vec<u8> = data_encoding::BASE32
        .encode(&packed)
        .into_bytes()
        .into_iter()
        .rev()
        .collect();
    assert_eq!(open_round(&reversed).expect("base32 round"), b"print(32)");
}

#[rstest]
#[case::sample(sample(b"print(1)"), true)]
#[case::marshal_loads(
    "_ = lambda __: __import__('marshal').loads(__import__('zlib').decompress(\
     __import__('base64').b64decode(__[::-1])))\nexec((_)(b'abc'))\n".to_owned(),
    true
)]
#[case::lambda_only(format!("{LAMBDA}\n"), false)]
#[case::wrong_slice(
    "_ = lambda __: __import__('zlib').decompress(__import__('base64').b64decode(__[::2]))\n\
     exec((_)(b'abc'))\n".to_owned(),
    false
)]
#[case::plain("print(1)\n".to_owned(), false)]
fn scanner_needs_lambda_and_payload(#[case] source: String, #[case] expected: bool) {
    assert_eq!(Fct.scan(&source), expected);
}

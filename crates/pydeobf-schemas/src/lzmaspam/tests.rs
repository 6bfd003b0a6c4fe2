//! Unit tests for the LZMA spam schema.

use data_encoding::BASE64;
use pydeobf_core::FailureKind;
use rstest::rstest;

use super::*;

const HOOK: &str = "https://discord.com/api/webhooks/123456/secret-token";

fn xz(data: &[u8]) -> Vec<u8> {
    let mut packed = Vec::new();
    lzma_rs::xz_compress(&mut &data[..], &mut packed).expect("compress");
    packed
}

/// A single-quoted bytes literal with every byte escaped.
fn escaped_literal(data: &[u8]) -> String {
    let body: String = data.iter().map(|byte| format!("\\x{byte:02x}")).collect();
    format!("b'{body}'")
}

/// The innermost program hiding `secret` in four pieces.
fn third_stage(secret: &str) -> String {
    let encoded = BASE64.encode(secret.as_bytes());
    let quarter = encoded.len().div_ceil(4);
    let chunks: Vec<String> = encoded
        .as_bytes()
        .chunks(quarter)
        .map(|chunk| String::from_utf8(chunk.to_vec()).expect("ascii"))
        .collect();
    let [a, b, c, d] = chunks.as_slice() else {
        panic!("expected four chunks");
    };
    format!(
        "___=\"{}\";____=\"{b}\";_____=\"{}\";______=\"{d}\";send(___+____+_____+______)",
        rot13(a),
        c.chars().rev().collect::<String>()
    )
}

fn sample_with(third: &str, call: &str) -> String {
    let second = format!(
        "import lzma\n_x = {}\nexec(lzma.decompress(_x))\n",
        escaped_literal(&xz(third.as_bytes()))
    );
    let blob = BASE64.encode(&xz(second.as_bytes()));
    format!(
        "import base64\nimport lzma\n{call}(compile(lzma.decompress(base64.b64decode(b'{blob}')), \
         '<string>', 'exec'))\n"
    )
}

fn sample(secret: &str) -> String {
    sample_with(&third_stage(secret), "exec")
}

#[test]
fn webhook_is_reassembled() {
    let output = LzmaSpam.deobfuscate(&sample(HOOK)).expect("deobfuscates");
    assert_eq!(output.as_deref(), Some(HOOK));
    assert_eq!(LzmaSpam.format(output), format!("Webhook:\n{HOOK}"));
}

#[test]
fn other_secrets_report_no_webhook() {
    let output = LzmaSpam
        .deobfuscate(&sample("https://example.com/not-a-hook"))
        .expect("deobfuscates");
    assert_eq!(output, None);
    assert_eq!(LzmaSpam.format(output), "No webhook found.");
}

#[rstest]
#[case::no_literal("print(1)\n", FailureKind::MissingMarker)]
#[case::not_base64("x = b'%%%'\n", FailureKind::Payload)]
fn surface_failures(#[case] source: &str, #[case] kind: FailureKind) {
    let failure = LzmaSpam.deobfuscate(source).expect_err("fails");
    assert_eq!(failure.kind(), kind);
}

#[test]
fn wrong_piece_count_keeps_the_third_stage() {
    let third = "___=\"a\";____=\"b\";send(___+____)";
    let failure = LzmaSpam
        .deobfuscate(&sample_with(third, "exec"))
        .expect_err("two pieces");
    assert_eq!(failure.kind(), FailureKind::Payload);
    assert_eq!(
        failure.diagnostic("third_stage").map(ToString::to_string).as_deref(),
        Some(third)
    );
}

#[rstest]
#[case::undeclared("___=\"a\";send(___+____+_____+______)")]
#[case::no_tail("___=\"a\"")]
fn incomplete_declarations_are_missing_markers(#[case] code: &str) {
    let failure = assemble_webhook(code).expect_err("incomplete");
    assert_eq!(failure.kind(), FailureKind::MissingMarker);
}

#[test]
fn pieces_are_joined_in_usage_order() {
    let code = "___=\"nop\";____=\"d\";_____=\"fe\";______=\"g\";x(____+___+_____+______)";
    assert_eq!(assemble_webhook(code).expect("assembles"), "qnopefg");
}

#[rstest]
#[case("abc", "nop")]
#[case("NOP-xyz", "ABC-klm")]
fn rot13_rotates_ascii_letters_only(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(rot13(input), expected);
}

#[rstest]
#[case::exec(sample(HOOK), true)]
#[case::print(sample_with("x", "print"), true)]
#[case::no_imports(
    "exec(compile(lzma.decompress(base64.b64decode(b'QQ==')), '<string>', 'exec'))\n".to_owned(),
    false
)]
#[case::text_payload(
    "import base64\nimport lzma\n\
     exec(compile(lzma.decompress(base64.b64decode('QQ==')), '<string>', 'exec'))\n"
        .to_owned(),
    false
)]
fn scanner_needs_imports_and_payload(#[case] source: String, #[case] expected: bool) {
    assert_eq!(LzmaSpam.scan(&source), expected);
}

//! Unit tests for the Vare schema.

use std::io::Write;

use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use data_encoding::{BASE32, BASE64, BASE64URL, HEXLOWER};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use hmac::{Hmac, Mac};
use rstest::{fixture, rstest};
use sha2::Sha256;

use super::*;

const RAW_KEY: [u8; 32] = *b"0123456789abcdefFEDCBA9876543210";
const IV: [u8; 16] = *b"vare-test-iv-16b";
const HOOK: &str = "https://discord.com/api/webhooks/987/vare_hook";

/// Builds a Fernet token for `plaintext`.
fn encrypt(plaintext: &[u8]) -> Vec<u8> {
    let (signing_key, encryption_key) = RAW_KEY.split_at(16);
    let mut buf = plaintext.to_vec();
    buf.resize(plaintext.len().div_ceil(16).max(1) * 16 + 16, 0);
    let ciphertext = cbc::Encryptor::<Aes128>::new_from_slices(encryption_key, &IV)
        .expect("key and iv lengths")
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .expect("buffer has room for padding")
        .to_vec();
    let mut token = vec![0x80];
    token.extend_from_slice(&[0, 0, 0, 0, 0x65, 0x00, 0x00, 0x00]);
    token.extend_from_slice(&IV);
    token.extend_from_slice(&ciphertext);
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_key).expect("any key length");
    mac.update(&token);
    token.extend_from_slice(&mac.finalize().into_bytes());
    BASE64URL.encode(&token).into_bytes()
}

/// Inverse of the unscrambling chain.
fn scramble(marshalled: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(marshalled).expect("write");
    let packed = encoder.finish().expect("finish");
    let reversed = BASE64.encode(BASE32.encode(&packed).as_bytes());
    let inner: Vec<u8> = reversed.into_bytes().into_iter().rev().collect();
    let wrapped = BASE32.encode(BASE64.encode(BASE64.encode(&inner).as_bytes()).as_bytes());
    BASE64.encode(wrapped.as_bytes()).into_bytes()
}

fn marshal_str(text: &str) -> Vec<u8> {
    let len = u32::try_from(text.len()).expect("short text");
    let mut out = b"s".to_vec();
    out.extend((0..4).map(|shift| u8::try_from((len >> (shift * 8)) & 0xff).expect("byte")));
    out.extend_from_slice(text.as_bytes());
    out
}

/// One Vare layer wrapping `inner`.
fn layer_bytes(marshalled: &[u8]) -> String {
    let key = BASE64.encode(BASE64URL.encode(&RAW_KEY).as_bytes());
    let data = HEXLOWER.encode(&encrypt(&scramble(marshalled)));
    format!(
        "__VareObfuscator__ = ''\n\ndef saint1():\n    pass\n\n__mikey__ = '{key}';mydata = \"{data}\"\n"
    )
}

fn layer(inner: &str) -> String {
    layer_bytes(&marshal_str(inner))
}

#[fixture]
fn fernet() -> Fernet {
    Fernet::from_encoded_key(BASE64URL.encode(&RAW_KEY).as_bytes()).expect("valid key")
}

// ---------------------------------------------------------------------------
// Fernet
// ---------------------------------------------------------------------------

#[rstest]
fn fernet_tokens_decrypt(fernet: Fernet) {
    assert_eq!(fernet.decrypt(&encrypt(b"hello")).expect("decrypts"), b"hello");
}

#[rstest]
fn tampered_tokens_fail_the_signature(fernet: Fernet) {
    let mut raw = BASE64URL.decode(&encrypt(b"hello")).expect("token");
    if let Some(byte) = raw.get_mut(30) {
        *byte ^= 1;
    }
    let token = BASE64URL.encode(&raw).into_bytes();
    assert!(matches!(fernet.decrypt(&token), Err(FernetError::Signature)));
}

#[rstest]
#[case::short(BASE64URL.encode(b"short").into_bytes())]
#[case::not_base64(b"***".to_vec())]
fn malformed_tokens_are_rejected(fernet: Fernet, #[case] token: Vec<u8>) {
    assert!(fernet.decrypt(&token).is_err());
}

#[test]
fn keys_must_be_32_bytes() {
    let error = Fernet::from_encoded_key(BASE64URL.encode(b"too short").as_bytes())
        .expect_err("short key");
    assert!(matches!(error, FernetError::KeyLength { len: 9 }));
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

#[test]
fn single_layer_is_peeled() {
    let output = Vare.deobfuscate(&layer("print('vare')")).expect("deobfuscates");
    assert_eq!(output, "print('vare')");
}

#[test]
fn nested_layers_are_peeled_until_no_signature_remains() {
    let program = format!("send('{HOOK}')");
    let source = layer(&layer(&layer(&program)));
    let output = Vare.deobfuscate(&source).expect("deobfuscates");
    assert_eq!(output, program);
    assert_eq!(Vare.format(output), format!("{program}\n\n{HOOK}"));
}

#[test]
fn unmarshallable_layers_are_kept_as_bytes() {
    let output = Vare.deobfuscate(&layer_bytes(b"\x01\x02")).expect("deobfuscates");
    assert_eq!(output, r"b'\x01\x02'");
}

#[test]
fn missing_data_is_a_missing_marker() {
    let failure = Vare
        .deobfuscate("__mikey__ = 'abc'\n")
        .expect_err("no key assignment");
    assert_eq!(failure.kind(), FailureKind::MissingMarker);
    assert_eq!(
        failure.diagnostic("partial").map(ToString::to_string).as_deref(),
        Some("__mikey__ = 'abc'\n")
    );
}

#[test]
fn wrong_key_fails_the_signature() {
    let other_key = BASE64.encode(BASE64URL.encode(&[7_u8; 32]).as_bytes());
    let source = layer("print(1)").replacen(
        &BASE64.encode(BASE64URL.encode(&RAW_KEY).as_bytes()),
        &other_key,
        1,
    );
    let failure = Vare.deobfuscate(&source).expect_err("wrong key");
    assert_eq!(failure.kind(), FailureKind::Payload);
    assert!(failure.message().contains("signature"), "{}", failure.message());
}

#[rstest]
#[case::name("__VareObfuscator__ = ''", true)]
#[case::saint("def saint42():\n    pass", true)]
#[case::mikey("__mikey__ = 'x'", true)]
#[case::plain("print('hello')", false)]
#[case::saint_without_digits("def saint():\n    pass", false)]
fn scanner_looks_for_signatures(#[case] source: &str, #[case] expected: bool) {
    assert_eq!(Vare.scan(source), expected);
}

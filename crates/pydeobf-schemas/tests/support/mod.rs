//! Builders for obfuscated samples of every built-in schema.

use std::io::Write;

use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use data_encoding::{BASE32, BASE64, BASE64URL, HEXLOWER};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use hmac::{Hmac, Mac};
use pydeobf_syntax::repr_bytes;
use sha2::Sha256;

/// The second Hyperion layer: a `try` scaffold, then an `exec` built through
/// `globals()` and `getattr`.
pub const HYPERION_SECOND_LAYER: &str = r"try:
    if 365101 > 7435378:
        pass
except Exception:
    pass
globals()['_run'] = getattr(__import__('builtins'), 'exec')
_run(compile('import numpy as np\nnp.zeros(10**14)\nprint(x)', '<string>', 'exec'))
";

const HYPERION_BANNER: &str = "# sourcery skip: collection-to-bool, remove-redundant-boolean, \
                               remove-redundant-except-handler";

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write");
    encoder.finish().expect("finish")
}

fn xz(data: &[u8]) -> Vec<u8> {
    let mut packed = Vec::new();
    lzma_rs::xz_compress(&mut &data[..], &mut packed).expect("compress");
    packed
}

fn le32(len: usize) -> impl Iterator<Item = u8> {
    let word = u32::try_from(len).expect("short payload");
    (0..4).map(move |shift| u8::try_from((word >> (shift * 8)) & 0xff).expect("byte"))
}

/// A Hyperion outer layer carrying `second_layer` in two chunks.
pub fn hyperion(second_layer: &str) -> String {
    let packed = zlib(second_layer.as_bytes());
    let (head, tail) = packed.split_at(packed.len().div_ceil(2));
    format!(
        "{HYPERION_BANNER}\nfrom math import prod as Hypothesis\n\nclass _theory:\n    pass\n\n\
         _theory(_modulo=-56047 * -45510).Calculate(CallFunction='a', Walk={})\n\
         _theory(_modulo=1).Execute(code='b', data={})\n",
        repr_bytes(head),
        repr_bytes(tail)
    )
}

/// The outermost BlankOBF layer: four base64 parts joined and executed.
pub fn blankobf(program: &str) -> String {
    let inner = format!(
        "':: You managed to break through BlankOBF v2; Give yourself a pat on your back! ::'\n\
         {program}"
    );
    let encoded = BASE64.encode(inner.as_bytes());
    let (head, tail) = encoded.split_at(encoded.len().div_ceil(2));
    let (first, second) = head.split_at(head.len().div_ceil(2));
    let (third, fourth) = tail.split_at(tail.len().div_ceil(2));
    format!(
        "import base64\nimport zlib\n_1 = '{first}'\n_2 = '{second}'\n_3 = '{third}'\n\
         _4 = '{fourth}'\nexec(base64.b64decode(_1 + _2 + _3 + _4))\n"
    )
}

fn fct_round(data: &[u8]) -> Vec<u8> {
    BASE64.encode(&zlib(data)).into_bytes().into_iter().rev().collect()
}

/// An FCT surface program whose single round yields a marshalled `program`.
pub fn fct(program: &str) -> String {
    let payload = fct_round(program.as_bytes());
    let mut code_object = b"\xe3\x00\x00\x00\x00\x02s".to_vec();
    code_object.extend(le32(payload.len()));
    code_object.extend_from_slice(&payload);
    code_object.extend_from_slice(b"N)");
    format!(
        "_ = lambda __: __import__('zlib').decompress(__import__('base64').b64decode(__[::-1]))\n\
         exec((_)(b'{}'))\n",
        String::from_utf8(fct_round(&code_object)).expect("base64 text")
    )
}

/// An LZMA spam program hiding `secret` in its innermost stage.
pub fn lzmaspam(secret: &str) -> String {
    let encoded = BASE64.encode(secret.as_bytes());
    let quarter = encoded.len().div_ceil(4);
    let pieces: Vec<&str> = (0..4)
        .map(|at| encoded.get(at * quarter..((at + 1) * quarter).min(encoded.len())).unwrap_or(""))
        .collect();
    let [first, second, third, fourth] = pieces.as_slice() else {
        panic!("expected four pieces");
    };
    let rot13: String = first
        .chars()
        .map(|c| match c {
            'a'..='m' | 'A'..='M' => char::from_u32(u32::from(c) + 13).expect("letter"),
            'n'..='z' | 'N'..='Z' => char::from_u32(u32::from(c) - 13).expect("letter"),
            _ => c,
        })
        .collect();
    let reversed: String = third.chars().rev().collect();
    let stage = format!(
        "___=\"{rot13}\";____=\"{second}\";_____=\"{reversed}\";______=\"{fourth}\";\
         send(___+____+_____+______)"
    );
    let escaped: String = xz(stage.as_bytes())
        .iter()
        .map(|byte| format!("\\x{byte:02x}"))
        .collect();
    let unpacker = format!("import lzma\n_x = b'{escaped}'\nexec(lzma.decompress(_x))\n");
    format!(
        "import base64\nimport lzma\nexec(compile(lzma.decompress(base64.b64decode(b'{}')), \
         '<string>', 'exec'))\n",
        BASE64.encode(&xz(unpacker.as_bytes()))
    )
}

const VARE_KEY: [u8; 32] = *b"0123456789abcdefFEDCBA9876543210";

fn fernet_token(plaintext: &[u8]) -> Vec<u8> {
    let (signing_key, encryption_key) = VARE_KEY.split_at(16);
    let iv = [9_u8; 16];
    let mut buf = plaintext.to_vec();
    buf.resize(plaintext.len().div_ceil(16) * 16 + 16, 0);
    let ciphertext = cbc::Encryptor::<Aes128>::new_from_slices(encryption_key, &iv)
        .expect("key and iv lengths")
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .expect("room for padding")
        .to_vec();
    let mut token = vec![0x80, 0, 0, 0, 0, 0x65, 0, 0, 0];
    token.extend_from_slice(&iv);
    token.extend_from_slice(&ciphertext);
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_key).expect("any key length");
    mac.update(&token);
    token.extend_from_slice(&mac.finalize().into_bytes());
    BASE64URL.encode(&token).into_bytes()
}

/// A single Vare layer around `program`.
pub fn vare(program: &str) -> String {
    let mut marshalled = b"s".to_vec();
    marshalled.extend(le32(program.len()));
    marshalled.extend_from_slice(program.as_bytes());
    let reversed: Vec<u8> = BASE64
        .encode(BASE32.encode(&zlib(&marshalled)).as_bytes())
        .into_bytes()
        .into_iter()
        .rev()
        .collect();
    let scrambled = BASE64.encode(
        BASE32
            .encode(BASE64.encode(BASE64.encode(&reversed).as_bytes()).as_bytes())
            .as_bytes(),
    );
    let key = BASE64.encode(BASE64URL.encode(&VARE_KEY).as_bytes());
    let data = HEXLOWER.encode(&fernet_token(scrambled.as_bytes()));
    format!("__VareObfuscator__ = ''\n__mikey__ = '{key}';mydata = \"{data}\"\n")
}

/// A pyobfuscate lambda-variant program decrypting to `print('lambda')`.
///
/// The ciphertext is fixed: AES-192-CBC under `sha256('IIlIlIIl' + 'lIllIlIIlI')`.
pub fn pyobfuscate_lambda() -> String {
    const HEX_HEAD: &str = "000102030405060708090a0b0c0d0e0fde7e39c8b9c2bbf140f31c43b4ed8241\
                            db940ff6c295f3599e3a3d70bbd214e8";
    const HEX_TAIL: &str = "81c9d2d5527555e8e0277b0551f109c64ef7756c09f00a39b008a48dee68d624\
                            2cbf5215c4bf0e961194a09815c80d34";
    format!(
        "pyobfuscate = (lambda **kw: kw['exec'])(**{{'IIlIlIIl': 'lIllIlIIlI', 'exec': 'run', \
         'eval': bytes.fromhex('''{HEX_HEAD}\n{HEX_TAIL}'''.replace('\\n', ''))}})\n"
    )
}

/// A pyobfuscate dict-variant program decrypting to `print('dict')` under
/// the password `pyobf-pass`.
pub fn pyobfuscate_dict() -> String {
    const BLOB: &str = "b75?Bb75?BKm$Ej5Ggk9`JogKod";
    format!("obfuscate = {{'[pyobf-pass]': '{BLOB}'}}\n")
}

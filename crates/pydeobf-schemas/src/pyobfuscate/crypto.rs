//! Ciphers behind the two pyobfuscate variants.

use aes::{Aes128, Aes192};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use cfb8::cipher::AsyncStreamCipher;
use pbkdf2::pbkdf2_hmac;
use pydeobf_core::DeobfuscationFailure;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::codec::{self, DecodeError};

type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes128Cfb8Dec = cfb8::Decryptor<Aes128>;

const BLOCK_LEN: usize = 16;
const CBC_KEY_LEN: usize = 24;
const SALT_LEN: usize = 8;
const PBKDF2_ROUNDS: u32 = 100_000;
/// AES-128 key followed by the CFB IV.
const DERIVED_LEN: usize = 32;
const CFB_KEY_LEN: usize = 16;

/// Errors raised while decrypting a payload.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CipherError {
    /// The ciphertext cannot hold an IV and whole blocks.
    #[error("ciphertext of {len} bytes is not an IV followed by whole blocks")]
    BlockLength {
        /// Length of the ciphertext, IV included.
        len: usize,
    },

    /// The salted blob is shorter than its salt.
    #[error("blob of {len} bytes is shorter than its {SALT_LEN}-byte salt")]
    MissingSalt {
        /// Length of the decoded blob.
        len: usize,
    },

    /// The key or IV has the wrong length for the cipher.
    #[error("cipher rejected the key or IV length")]
    KeyLength,

    /// The CBC plaintext padding is invalid, usually because of a wrong key.
    #[error("plaintext padding is invalid")]
    Padding,

    /// The plaintext is not UTF-8 text.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl From<CipherError> for DeobfuscationFailure {
    fn from(error: CipherError) -> Self {
        Self::payload(error.to_string())
    }
}

/// AES-192-CBC under the first 24 bytes of `sha256(seed)`; the first block
/// of `data` is the IV.
///
/// # Errors
///
/// Returns a [`CipherError`] when the layout, padding or text is invalid.
pub fn decrypt_hashed_cbc(seed: &str, data: &[u8]) -> Result<String, CipherError> {
    let digest = Sha256::digest(seed.as_bytes());
    let key = digest.get(..CBC_KEY_LEN).ok_or(CipherError::KeyLength)?;
    let block_error = || CipherError::BlockLength { len: data.len() };
    let (iv, ciphertext) = data.split_at_checked(BLOCK_LEN).ok_or_else(block_error)?;
    if !ciphertext.len().is_multiple_of(BLOCK_LEN) {
        return Err(block_error());
    }
    let cipher = Aes192CbcDec::new_from_slices(key, iv).map_err(|_| CipherError::KeyLength)?;
    let mut buf = ciphertext.to_vec();
    let plaintext = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| CipherError::Padding)?;
    Ok(codec::utf8(plaintext.to_vec())?)
}

/// AES-128-CFB8 keyed by PBKDF2-HMAC-SHA256 over `password`; `blob` is the
/// 8-byte salt followed by the ciphertext.
///
/// # Errors
///
/// Returns a [`CipherError`] when the blob is truncated or the plaintext is
/// not text.
pub fn decrypt_salted_cfb(password: &[u8], blob: &[u8]) -> Result<String, CipherError> {
    let (salt, ciphertext) = blob
        .split_at_checked(SALT_LEN)
        .ok_or(CipherError::MissingSalt { len: blob.len() })?;
    let mut derived = [0_u8; DERIVED_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ROUNDS, &mut derived);
    let (key, iv) = derived.split_at(CFB_KEY_LEN);
    let mut buf = ciphertext.to_vec();
    Aes128Cfb8Dec::new_from_slices(key, iv)
        .map_err(|_| CipherError::KeyLength)?
        .decrypt(&mut buf);
    Ok(codec::utf8(buf)?)
}

//! Fernet token decryption.
//!
//! A token is `0x80 | timestamp (8) | iv (16) | ciphertext | tag (32)`,
//! URL-safe base64 encoded. The tag is HMAC-SHA256 over everything before it
//! keyed with the first half of the key; the ciphertext is AES-128-CBC with
//! PKCS#7 padding under the second half. Timestamps are not checked.

use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use pydeobf_core::DeobfuscationFailure;
use sha2::Sha256;
use thiserror::Error;

use crate::codec::{self, DecodeError};

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 0x80;
const KEY_LEN: usize = 32;
const SIGNING_KEY_LEN: usize = 16;
/// Version byte, timestamp and IV.
const HEADER_LEN: usize = 25;
const IV_AT: usize = 9;
const TAG_LEN: usize = 32;
const BLOCK_LEN: usize = 16;

/// Errors raised while opening a Fernet token.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FernetError {
    /// The decoded key is not 32 bytes long.
    #[error("fernet key must be {KEY_LEN} bytes, got {len}")]
    KeyLength {
        /// Length of the decoded key.
        len: usize,
    },

    /// The token is too short or has the wrong version byte.
    #[error("fernet token is malformed")]
    Malformed,

    /// The HMAC tag does not match.
    #[error("fernet signature does not match")]
    Signature,

    /// The plaintext padding is invalid.
    #[error("fernet plaintext padding is invalid")]
    Padding,

    /// The key or token is not valid base64.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl From<FernetError> for DeobfuscationFailure {
    fn from(error: FernetError) -> Self {
        Self::payload(error.to_string())
    }
}

/// A Fernet key split into its signing and encryption halves.
#[derive(Clone)]
pub struct Fernet {
    key: [u8; KEY_LEN],
}

impl Fernet {
    /// Builds a key from its URL-safe base64 text, as `Fernet(key)` takes it.
    ///
    /// # Errors
    ///
    /// Returns [`FernetError::Decode`] for bad base64 and
    /// [`FernetError::KeyLength`] when the key is not 32 bytes.
    pub fn from_encoded_key(encoded: &[u8]) -> Result<Self, FernetError> {
        let raw = codec::urlsafe_b64decode(encoded)?;
        let key = <[u8; KEY_LEN]>::try_from(raw.as_slice())
            .map_err(|_| FernetError::KeyLength { len: raw.len() })?;
        Ok(Self { key })
    }

    /// Verifies and decrypts a token.
    ///
    /// # Errors
    ///
    /// Returns a [`FernetError`] describing the first check that failed.
    pub fn decrypt(&self, token: &[u8]) -> Result<Vec<u8>, FernetError> {
        let raw = codec::urlsafe_b64decode(token)?;
        let signed_len = raw.len().checked_sub(TAG_LEN).ok_or(FernetError::Malformed)?;
        let (signed, tag) = raw.split_at(signed_len);
        let (header, ciphertext) = signed
            .split_at_checked(HEADER_LEN)
            .ok_or(FernetError::Malformed)?;
        if header.first() != Some(&VERSION)
            || ciphertext.is_empty()
            || !ciphertext.len().is_multiple_of(BLOCK_LEN)
        {
            return Err(FernetError::Malformed);
        }
        let (signing_key, encryption_key) = self.key.split_at(SIGNING_KEY_LEN);

        let mut mac =
            HmacSha256::new_from_slice(signing_key).map_err(|_| FernetError::Malformed)?;
        mac.update(signed);
        mac.verify_slice(tag).map_err(|_| FernetError::Signature)?;

        let iv = header.get(IV_AT..).ok_or(FernetError::Malformed)?;
        let cipher = Aes128CbcDec::new_from_slices(encryption_key, iv)
            .map_err(|_| FernetError::Malformed)?;
        let mut buf = ciphertext.to_vec();
        let plaintext = cipher
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| FernetError::Padding)?;
        Ok(plaintext.to_vec())
    }
}

impl std::fmt::Debug for Fernet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fernet").finish_non_exhaustive()
    }
}

//! Byte codecs used by obfuscated payloads.
//!
//! Each helper mirrors the Python function the obfuscators call, including
//! its leniency: `b64decode` discards characters outside the alphabet and
//! `bytes.fromhex` skips whitespace.

use std::io::{self, Read};

use data_encoding::{BASE32, BASE64, BASE64URL, HEXLOWER_PERMISSIVE, HEXUPPER};
use flate2::read::ZlibDecoder;
use pydeobf_core::DeobfuscationFailure;
use thiserror::Error;

/// Leading bytes of an `.xz` container.
const XZ_MAGIC: &[u8] = b"\xfd7zXZ\x00";

/// Digits of `base64.b85encode`, in value order.
const BASE85_ALPHABET: &[u8; 85] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";
const BASE85_GROUP: usize = 5;
/// Value of `~`, the digit short groups are padded with.
const BASE85_PAD_DIGIT: u32 = 84;

/// Errors raised while decoding a payload.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The input is not valid base64.
    #[error("invalid base64 payload: {source}")]
    Base64 {
        /// Underlying decoder error.
        source: data_encoding::DecodeError,
    },

    /// The input is not valid base32.
    #[error("invalid base32 payload: {source}")]
    Base32 {
        /// Underlying decoder error.
        source: data_encoding::DecodeError,
    },

    /// A character outside the base85 alphabet.
    #[error("bad base85 character at position {position}")]
    Base85Character {
        /// Offset of the character in the input.
        position: usize,
    },

    /// A base85 group decodes to more than 32 bits.
    #[error("base85 overflow in hunk starting at byte {position}")]
    Base85Overflow {
        /// Offset of the group in the input.
        position: usize,
    },

    /// The input is not valid hexadecimal.
    #[error("invalid hex payload: {source}")]
    Hex {
        /// Underlying decoder error.
        source: data_encoding::DecodeError,
    },

    /// The zlib stream is corrupt or truncated.
    #[error("zlib inflate failed: {source}")]
    Zlib {
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The LZMA stream is corrupt or truncated.
    #[error("lzma decompression failed: {message}")]
    Lzma {
        /// Decoder message.
        message: String,
    },

    /// Decoded text is not UTF-8.
    #[error("payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl From<DecodeError> for DeobfuscationFailure {
    fn from(error: DecodeError) -> Self {
        Self::payload(error.to_string())
    }
}

/// `base64.b64decode`: characters outside the alphabet are discarded.
///
/// # Errors
///
/// Returns [`DecodeError::Base64`] for bad padding or length.
pub fn b64decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let filtered: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        .collect();
    BASE64
        .decode(&filtered)
        .map_err(|source| DecodeError::Base64 { source })
}

/// `base64.urlsafe_b64decode`, as used for Fernet keys and tokens.
///
/// # Errors
///
/// Returns [`DecodeError::Base64`] for malformed input.
pub fn urlsafe_b64decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let trimmed = data.trim_ascii();
    BASE64URL
        .decode(trimmed)
        .map_err(|source| DecodeError::Base64 { source })
}

/// `base64.b32decode`.
///
/// # Errors
///
/// Returns [`DecodeError::Base32`] for malformed input.
pub fn b32decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    BASE32
        .decode(data)
        .map_err(|source| DecodeError::Base32 { source })
}

/// `base64.b16decode` (upper-case digits only).
///
/// # Errors
///
/// Returns [`DecodeError::Hex`] for malformed input.
pub fn b16decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    HEXUPPER
        .decode(data)
        .map_err(|source| DecodeError::Hex { source })
}

/// `base64.b85decode`.
///
/// A short final group is padded with `~` and the padding is cut from the
/// output again.
///
/// # Errors
///
/// Returns [`DecodeError::Base85Character`] for characters outside the
/// alphabet and [`DecodeError::Base85Overflow`] for groups above `u32::MAX`.
pub fn b85decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(data.len());
    for (group, chunk) in data.chunks(BASE85_GROUP).enumerate() {
        let start = group * BASE85_GROUP;
        let padding = BASE85_GROUP - chunk.len();
        let digits = chunk
            .iter()
            .enumerate()
            .map(|(offset, &byte)| {
                base85_digit(byte).ok_or(DecodeError::Base85Character {
                    position: start + offset,
                })
            })
            .chain(std::iter::repeat_n(BASE85_PAD_DIGIT, padding).map(Ok));
        let mut word: u32 = 0;
        for digit in digits {
            let value = digit?;
            word = word
                .checked_mul(85)
                .and_then(|scaled| scaled.checked_add(value))
                .ok_or(DecodeError::Base85Overflow { position: start })?;
        }
        out.extend(word_bytes(word).into_iter().take(4 - padding));
    }
    Ok(out)
}

fn base85_digit(byte: u8) -> Option<u32> {
    (0_u32..)
        .zip(BASE85_ALPHABET)
        .find_map(|(value, &digit)| (digit == byte).then_some(value))
}

#[expect(clippy::big_endian_bytes, reason = "base85 groups are big-endian words")]
const fn word_bytes(word: u32) -> [u8; 4] {
    word.to_be_bytes()
}

/// `bytes.fromhex` and `binascii.unhexlify`: either case, whitespace ignored.
///
/// # Errors
///
/// Returns [`DecodeError::Hex`] for malformed input.
pub fn unhexlify(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let digits: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    HEXLOWER_PERMISSIVE
        .decode(&digits)
        .map_err(|source| DecodeError::Hex { source })
}

/// `zlib.decompress`.
///
/// # Errors
///
/// Returns [`DecodeError::Zlib`] for a corrupt stream.
pub fn zlib_decompress(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Zlib {
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "incomplete or truncated stream"),
        });
    }
    let mut decoder = ZlibDecoder::new(data);
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(|source| DecodeError::Zlib { source })?;
    Ok(inflated)
}

/// `lzma.decompress`: `.xz` containers and legacy `.lzma` streams.
///
/// # Errors
///
/// Returns [`DecodeError::Lzma`] for a corrupt stream.
pub fn lzma_decompress(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut input = data;
    let mut output = Vec::new();
    let outcome = if data.starts_with(XZ_MAGIC) {
        lzma_rs::xz_decompress(&mut input, &mut output)
    } else {
        lzma_rs::lzma_decompress(&mut input, &mut output)
    };
    outcome.map_err(|err| DecodeError::Lzma {
        message: err.to_string(),
    })?;
    Ok(output)
}

/// Decodes UTF-8 text.
///
/// # Errors
///
/// Returns [`DecodeError::Utf8`] for invalid sequences.
pub fn utf8(data: Vec<u8>) -> Result<String, DecodeError> {
    Ok(String::from_utf8(data)?)
}

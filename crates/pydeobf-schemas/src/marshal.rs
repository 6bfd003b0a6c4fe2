//! Minimal readers for marshalled Python strings.
//!
//! Obfuscators that ship a marshalled code object keep the real payload in
//! one string constant. It is found either at the offset a stock compiler
//! places it or by scanning for string headers followed by the `N)` trailer.

use std::sync::LazyLock;

use pydeobf_core::DeobfuscationFailure;
use regex::bytes::Regex;

/// Offset of the payload header in a freshly compiled wrapper.
const PAYLOAD_HEADER_AT: usize = 73;
/// Marker opening a string constant.
const HEADER: &[u8] = b"\x02s";
/// Bytes following the payload constant.
const TRAILER: &[u8] = b"N)";

static HEADER_SEARCH: LazyLock<Regex> = LazyLock::new(compile_header_search);

#[expect(clippy::expect_used, reason = "the pattern is a compile-time literal")]
fn compile_header_search() -> Regex {
    Regex::new(r"(?s-u)\x02s(.{4})").expect("header pattern compiles")
}

/// Reads a four-byte little-endian length.
fn read_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rev()
        .fold(0, |acc, byte| (acc << 8) | usize::from(*byte))
}

/// Payload bytes at `start` when they are followed by the trailer.
fn payload_at(data: &[u8], start: usize, len: usize) -> Option<&[u8]> {
    let end = start.checked_add(len)?;
    let payload = data.get(start..end)?;
    let trailer = data.get(end..end.checked_add(TRAILER.len())?)?;
    (trailer == TRAILER).then_some(payload)
}

/// Extracts the single string payload of a marshalled wrapper.
///
/// # Errors
///
/// Returns a failure carrying the marshalled bytes when no payload is found,
/// when a header's length disagrees with its trailer, or when several
/// payloads are present.
pub fn find_string_payload(data: &[u8]) -> Result<Vec<u8>, DeobfuscationFailure> {
    if let Some(payload) = payload_at_fixed_offset(data) {
        return Ok(payload.to_vec());
    }
    tracing::warn!(target: "expected", "payload not at the fixed offset, searching headers");
    search_payloads(data)
}

fn payload_at_fixed_offset(data: &[u8]) -> Option<&[u8]> {
    let header_end = PAYLOAD_HEADER_AT.checked_add(HEADER.len() + 4)?;
    let header = data.get(PAYLOAD_HEADER_AT..header_end)?;
    let (marker, len) = header.split_at(HEADER.len());
    if marker != HEADER {
        return None;
    }
    payload_at(data, header_end, read_len(len))
}

fn search_payloads(data: &[u8]) -> Result<Vec<u8>, DeobfuscationFailure> {
    let mut resume_at = 0;
    let mut found: Vec<Vec<u8>> = Vec::new();
    for header in HEADER_SEARCH.captures_iter(data) {
        let (Some(whole), Some(len_field)) = (header.get(0), header.get(1)) else {
            continue;
        };
        if whole.end() < resume_at {
            continue;
        }
        let start = whole.end();
        let len = read_len(len_field.as_bytes());
        let Some(payload) = payload_at(data, start, len) else {
            return Err(
                DeobfuscationFailure::payload("marshal length does not match its trailer")
                    .with_diagnostic("marshalled_bytes", data),
            );
        };
        found.push(payload.to_vec());
        resume_at = start + len + TRAILER.len();
    }
    match found.len() {
        0 => Err(DeobfuscationFailure::missing_marker("no marshalled string payload found")
            .with_diagnostic("marshalled_bytes", data)),
        1 => Ok(found.remove(0)),
        _ => Err(DeobfuscationFailure::ambiguous("several marshalled payloads found")
            .with_diagnostic("marshalled_bytes", data)
            .with_diagnostic("payloads", found)),
    }
}

/// Decodes a top-level marshalled `str` (`s`, length, UTF-8 bytes).
#[must_use]
pub fn unmarshal_str(data: &[u8]) -> Option<String> {
    let rest = data.strip_prefix(b"s")?;
    let (len, payload) = rest.split_at_checked(4)?;
    if read_len(len) != payload.len() {
        tracing::error!("marshalled string length does not match its header");
        return None;
    }
    String::from_utf8(payload.to_vec()).ok()
}

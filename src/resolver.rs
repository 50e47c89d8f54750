//! Aggregator-wrapped URL decoding.
//!
//! Google News links articles through opaque `/articles/<token>` URLs where
//! the token is a URL-safe base64 blob embedding the real publisher URL in a
//! protobuf-style record. The wrapper format is undocumented and shifts, so
//! this is a defensive binary scan, not a schema-aware decoder: walk the
//! varint-framed fields, look inside every length-delimited blob (recursing
//! into nested records), and take the first UTF-8 string that starts with
//! `http://` or `https://`.
//!
//! Anything that fails (bad base64, truncated varints, no embedded URL)
//! falls back to returning the input unchanged. `resolve` never errors.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static WRAPPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://news\.google\.com/(?:rss/)?articles/([A-Za-z0-9_-]+)")
        .expect("wrapped-url pattern")
});

/// Nested blobs shrink strictly, but adversarial tokens could still nest
/// deeply; stop descending past this.
const MAX_SCAN_DEPTH: usize = 8;

/// True when the URL matches the known aggregator-wrapper shape.
pub fn is_wrapped(url: &str) -> bool {
    WRAPPED.is_match(url)
}

/// Decode a wrapped aggregator URL into the publisher URL it embeds.
///
/// Identity fallback on anything that is not a wrapped URL or that fails to
/// decode; never panics on arbitrary token bytes.
pub fn resolve(url: &str) -> String {
    let Some(caps) = WRAPPED.captures(url) else {
        return url.to_string();
    };
    let mut token = caps[1].to_string();
    while token.len() % 4 != 0 {
        token.push('=');
    }
    let Ok(bytes) = URL_SAFE.decode(token.as_bytes()) else {
        debug!(%url, "Wrapped token is not valid base64");
        return url.to_string();
    };
    match scan_for_url(&bytes, 0) {
        Some(resolved) => {
            debug!(%url, %resolved, "Unwrapped aggregator URL");
            resolved
        }
        None => url.to_string(),
    }
}

/// Walk a varint-framed record: tag = field_number << 3 | wire_type.
/// Wire types: 0 varint, 1 fixed64, 2 length-delimited, 5 fixed32.
/// Unknown wire types terminate the scan.
fn scan_for_url(bytes: &[u8], depth: usize) -> Option<String> {
    if depth > MAX_SCAN_DEPTH {
        return None;
    }
    let mut pos = 0usize;
    while pos < bytes.len() {
        let tag = read_varint(bytes, &mut pos)?;
        match tag & 0x07 {
            0 => {
                read_varint(bytes, &mut pos)?;
            }
            1 => {
                pos = pos.checked_add(8)?;
                if pos > bytes.len() {
                    return None;
                }
            }
            2 => {
                let len = read_varint(bytes, &mut pos)? as usize;
                let end = pos.checked_add(len)?;
                if end > bytes.len() {
                    return None;
                }
                let blob = &bytes[pos..end];
                if let Ok(s) = std::str::from_utf8(blob) {
                    if s.starts_with("http://") || s.starts_with("https://") {
                        return Some(s.to_string());
                    }
                }
                if let Some(found) = scan_for_url(blob, depth + 1) {
                    return Some(found);
                }
                pos = end;
            }
            5 => {
                pos = pos.checked_add(4)?;
                if pos > bytes.len() {
                    return None;
                }
            }
            _ => return None,
        }
    }
    None
}

fn read_varint(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
        shift += 7;
        if shift > 63 {
            // longer than any valid varint
            return None;
        }
    }
}

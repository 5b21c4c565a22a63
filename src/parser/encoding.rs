//! Best-effort byte-to-text decoding.
//!
//! Two entry points:
//! - [`decode`] for free text (bodies, headers): charset sniffing, then an
//!   ordered list of strict candidates, then statistical detection.
//! - [`decode_legacy_string`] for fixed-format property values, which are
//!   NUL-terminated strings without embedded charset hints.
//!
//! Neither ever fails.

use std::sync::LazyLock;

use encoding_rs::{Encoding, EUC_KR, UTF_16LE, UTF_8, WINDOWS_1252};
use regex::Regex;
use tracing::{debug, trace};

use crate::model::property::ValueType;

/// How many leading bytes are searched for a `charset=` declaration.
const SNIFF_WINDOW: usize = 2048;

/// Strict candidates tried in order by [`decode`].
///
/// `EUC_KR` is the WHATWG "euc-kr" decoder, a superset covering code page 949.
/// `WINDOWS_1252` maps every byte, so with this list the statistical step is
/// only reached by callers passing their own candidates.
pub const DEFAULT_CANDIDATES: &[&Encoding] = &[UTF_8, EUC_KR, WINDOWS_1252];

static CHARSET_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*['"]?\s*([-A-Za-z0-9_]+)"#).expect("valid charset regex")
});

/// Decode free text with the default candidate list.
pub fn decode(bytes: &[u8]) -> String {
    decode_with(bytes, DEFAULT_CANDIDATES)
}

/// Decode free text, trying `candidates` in order after charset sniffing.
pub fn decode_with(bytes: &[u8], candidates: &[&'static Encoding]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    if let Some(encoding) = sniff_charset(bytes) {
        trace!(charset = encoding.name(), "Decoding with declared charset");
        let (text, _) = encoding.decode_without_bom_handling(bytes);
        return text.into_owned();
    }

    for encoding in candidates {
        if let Some(text) = decode_strict(encoding, bytes) {
            return text;
        }
    }

    detect_and_decode(bytes)
}

/// Find a `charset=` declaration in the first [`SNIFF_WINDOW`] bytes.
///
/// Non-ASCII bytes are ignored so the search works on any body. Unknown
/// labels are treated as absent.
fn sniff_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    let head: String = window
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();

    let label = CHARSET_DECL.captures(&head)?.get(1)?.as_str();
    let encoding = Encoding::for_label(label.as_bytes());
    if encoding.is_none() {
        debug!(charset = label, "Ignoring unknown declared charset");
    }
    encoding
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    if encoding == UTF_8 {
        return std::str::from_utf8(bytes).ok().map(str::to_string);
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// Statistical fallback. The detector always produces a guess; if that
/// guess still cannot decode cleanly, its replacement-mode output is used.
fn detect_and_decode(bytes: &[u8]) -> String {
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, true);
    debug!(guess = guess.name(), "Falling back to detected charset");

    let (text, _, had_errors) = guess.decode(bytes);
    if had_errors && guess == UTF_8 {
        return latin1(bytes);
    }
    text.into_owned()
}

/// Decode a fixed-format property string of unknown type.
///
/// Tries UTF-16LE, then UTF-8, then forces Latin-1. Trailing NUL terminators
/// are removed in every case.
pub fn decode_legacy_string(bytes: &[u8]) -> String {
    let text = decode_strict(UTF_16LE, bytes)
        .or_else(|| std::str::from_utf8(bytes).ok().map(str::to_string))
        .unwrap_or_else(|| latin1(bytes));
    strip_nul(text)
}

/// Decode a property value according to its declared value type.
///
/// `PT_UNICODE` is read as UTF-16LE and `PT_STRING8` as Windows-1252, both
/// substituting undecodable units. Other types go through
/// [`decode_legacy_string`].
pub fn decode_property_value(bytes: &[u8], value_type: ValueType) -> String {
    match value_type {
        ValueType::Unicode => {
            let (text, _) = UTF_16LE.decode_without_bom_handling(bytes);
            strip_nul(text.into_owned())
        }
        ValueType::String8 => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            strip_nul(text.into_owned())
        }
        _ => decode_legacy_string(bytes),
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn strip_nul(mut text: String) -> String {
    let keep = text.trim_end_matches('\0').len();
    text.truncate(keep);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode("héllo wörld".as_bytes()), "héllo wörld");
    }

    #[test]
    fn test_decode_korean_code_page() {
        let (bytes, _, _) = EUC_KR.encode("안녕하세요");
        assert_eq!(decode(&bytes), "안녕하세요");
    }

    #[test]
    fn test_decode_windows_1252_after_korean_fails() {
        // 0xE9 followed by ASCII is invalid in both UTF-8 and EUC-KR.
        assert_eq!(decode(b"caf\xe9 ok"), "café ok");
    }

    #[test]
    fn test_declared_charset_wins() {
        let mut html = b"<meta charset=\"iso-8859-1\"><p>".to_vec();
        html.extend_from_slice(b"Gr\xfc\xdfe</p>");
        assert_eq!(decode(&html), "<meta charset=\"iso-8859-1\"><p>Grüße</p>");
    }

    #[test]
    fn test_unknown_declared_charset_is_ignored() {
        let body = b"Content-Type: text/plain; charset=x-made-up\n\nplain";
        assert!(decode(body).ends_with("plain"));
    }

    #[test]
    fn test_statistical_fallback_never_fails() {
        let garbage = [0xFF, 0xFE, 0x80, 0x81, 0xC0, 0x00, 0xF5];
        let text = decode_with(&garbage, &[UTF_8]);
        assert!(!text.is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode(b""), "");
        assert_eq!(decode_legacy_string(b""), "");
    }

    #[test]
    fn test_legacy_string_utf16() {
        let bytes = [b'I', 0, b'P', 0, b'M', 0, 0, 0];
        assert_eq!(decode_legacy_string(&bytes), "IPM");
    }

    #[test]
    fn test_legacy_string_odd_length_falls_to_utf8() {
        assert_eq!(decode_legacy_string(b"abcd\0"), "abcd");
    }

    #[test]
    fn test_legacy_string_forces_latin1() {
        assert_eq!(decode_legacy_string(b"\xe9t\xe9"), "été");
    }

    #[test]
    fn test_property_value_by_type() {
        let unicode = [b'o', 0, b'k', 0, 0, 0];
        assert_eq!(decode_property_value(&unicode, ValueType::Unicode), "ok");
        assert_eq!(decode_property_value(b"na\xefve\0", ValueType::String8), "naïve");
    }
}

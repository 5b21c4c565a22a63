//! Transport-header parsing: folding, encoded-words (RFC 2047), recipient
//! lists and date parsing.

use std::collections::BTreeSet;

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::model::address::Recipient;
use crate::parser::encoding;

/// Unfolded transport headers as `(lowercase_name, raw_value)` pairs.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    fields: Vec<(String, String)>,
}

impl HeaderMap {
    /// Decode and unfold raw header bytes.
    pub fn parse(raw: &[u8]) -> Self {
        Self::parse_text(&encoding::decode(raw))
    }

    /// Unfold header text: continuation lines (leading space or tab) are
    /// joined to the previous field. Lines without a colon are skipped.
    pub fn parse_text(text: &str) -> Self {
        let mut fields: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(last) = fields.last_mut() {
                    last.1.push(' ');
                    last.1.push_str(line.trim());
                }
            } else if let Some(colon_pos) = line.find(':') {
                let name = line[..colon_pos].trim().to_lowercase();
                let value = line[colon_pos + 1..].trim().to_string();
                fields.push((name, value));
            }
        }

        Self { fields }
    }

    /// First value for a header name (case-insensitive).
    pub fn first(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for a header name, in order of appearance.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Extract the To and Cc recipient lists from raw transport headers.
///
/// Each list is formatted as `"Name <addr>"` entries, deduplicated, sorted
/// and joined with `"; "`. Bcc is never read. Malformed input yields empty
/// lists rather than an error.
pub fn parse_recipients(raw_headers: &[u8]) -> (String, String) {
    let headers = HeaderMap::parse(raw_headers);
    if headers.is_empty() {
        debug!("No parseable transport headers");
    }
    (
        format_recipients(&headers, "to"),
        format_recipients(&headers, "cc"),
    )
}

fn format_recipients(headers: &HeaderMap, name: &str) -> String {
    let formatted: BTreeSet<String> = headers
        .all(name)
        .flat_map(Recipient::parse_list)
        .map(|mut recipient| {
            recipient.name = decode_encoded_words(&recipient.name).trim().to_string();
            recipient.formatted()
        })
        .collect();

    formatted.into_iter().collect::<Vec<_>>().join("; ")
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Tokens that fail to decode are kept verbatim.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two adjacent encoded-words is dropped (RFC 2047 §6.2).
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];
        match decode_one_word(after_start) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &after_start[consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=`, returning the text and the number of
/// bytes consumed after the leading `=?`.
fn decode_one_word(s: &str) -> Option<(String, usize)> {
    let (charset, rest) = s.split_once('?')?;
    let (mode, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let payload = &rest[..end];
    let consumed = charset.len() + 1 + mode.len() + 1 + end + 2;

    // RFC 2231 language suffix: "utf-8*en"
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match mode {
        "B" | "b" => base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?,
        "Q" | "q" => decode_q_encoding(payload),
        _ => return None,
    };

    Some((decode_charset(charset, &bytes), consumed))
}

/// Q-encoding (RFC 2047): `_` is a space, `=XX` a hex byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        out.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

/// Decode bytes using a named charset, falling back to the normalizer.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => {
            warn!(charset = charset, "Unknown encoded-word charset");
            encoding::decode(bytes)
        }
    }
}

/// Parse the `Date:` header of raw transport headers, if any.
pub fn header_date(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers.first("date").and_then(parse_date)
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601 and common broken variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);
    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%z",
    ];
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(no_dow, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(no_dow, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Last resort: `mail-parser`'s lenient date parser.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn strip_day_of_week(s: &str) -> &str {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim_start_matches(',').trim_start();
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipients_dedup_sorted_no_bcc() {
        let raw = b"To: Bob <bob@x.com>\r\nCc: Carol <carol@x.com>, Bob <bob@x.com>\r\nBcc: eve@x.com\r\n";
        let (to, cc) = parse_recipients(raw);
        assert_eq!(to, "Bob <bob@x.com>");
        assert_eq!(cc, "Bob <bob@x.com>; Carol <carol@x.com>");
        assert!(!cc.contains("eve"));
    }

    #[test]
    fn test_recipients_duplicate_collapsed() {
        let raw = b"Cc: Carol <carol@x.com>, Carol <carol@x.com>\r\n";
        let (to, cc) = parse_recipients(raw);
        assert_eq!(to, "");
        assert_eq!(cc, "Carol <carol@x.com>");
    }

    #[test]
    fn test_recipients_encoded_name_and_folding() {
        let raw = b"To: =?UTF-8?B?6rmA7LKg7IiY?= <kim@x.kr>,\r\n\tplain@x.kr\r\n";
        let (to, _) = parse_recipients(raw);
        assert_eq!(to, "plain@x.kr; 김철수 <kim@x.kr>");
    }

    #[test]
    fn test_recipients_korean_legacy_charset() {
        // "홍길동" in ks_c_5601-1987, base64
        let raw = b"To: =?ks_c_5601-1987?B?yKux5rW/?= <hong@x.kr>\r\n";
        let (to, _) = parse_recipients(raw);
        assert_eq!(to, "홍길동 <hong@x.kr>");
    }

    #[test]
    fn test_recipients_garbage_is_empty() {
        let (to, cc) = parse_recipients(b"\xff\xfe not a header at all");
        assert_eq!(to, "");
        assert_eq!(cc, "");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
        assert_eq!(
            decode_encoded_words("=?ISO-8859-1?Q?R=E9sum=E9_du_projet?="),
            "Résumé du projet"
        );
    }

    #[test]
    fn test_decode_adjacent_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
        assert_eq!(decode_encoded_words("Re: =?UTF-8?B?SG9sYQ==?= there"), "Re: Hola there");
    }

    #[test]
    fn test_broken_word_kept() {
        assert_eq!(decode_encoded_words("=?broken"), "=?broken");
    }

    #[test]
    fn test_header_map_unfolds() {
        let headers = HeaderMap::parse_text("Subject: a long\n\tline\nFrom: x@y.com\n");
        assert_eq!(headers.first("subject"), Some("a long line"));
        assert_eq!(headers.first("FROM"), Some("x@y.com"));
    }

    #[test]
    fn test_parse_dates() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
        assert!(parse_date("04 Jan 2024 10:00:00").is_some());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_header_date() {
        let headers = HeaderMap::parse(b"Date: Mon, 01 Jul 2024 09:30:00 +0900\r\n");
        let dt = header_date(&headers).unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "00:30");
    }
}

//! Plain-text extraction from RTF message bodies.
//!
//! Only what message bodies need: groups, ignorable destinations, `\uN`
//! escapes with their fallback characters, `\'hh` bytes in the document's
//! ANSI code page, and Outlook's `\htmlrtf` suppression blocks.

use encoding_rs::{Encoding, WINDOWS_1252};

/// Destinations whose content is never body text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "footer",
    "themedata",
    "datastore",
    "xmlnstbl",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
];

#[derive(Clone, Copy)]
struct GroupState {
    skip: bool,
    uc: usize,
}

struct Extractor<'a> {
    input: &'a [u8],
    pos: usize,
    out: String,
    pending: Vec<u8>,
    codepage: &'static Encoding,
    stack: Vec<GroupState>,
    state: GroupState,
    html_suppressed: bool,
    skip_fallback: usize,
    high_surrogate: Option<u32>,
}

/// Convert an RTF document into plain text.
///
/// Input that does not start with `{\rtf` is returned unchanged.
pub fn rtf_to_text(rtf: &str) -> String {
    let trimmed = rtf.trim_start();
    if !trimmed.starts_with("{\\rtf") {
        return rtf.to_string();
    }

    let mut extractor = Extractor {
        input: trimmed.as_bytes(),
        pos: 0,
        out: String::with_capacity(trimmed.len() / 2),
        pending: Vec::new(),
        codepage: WINDOWS_1252,
        stack: Vec::new(),
        state: GroupState { skip: false, uc: 1 },
        html_suppressed: false,
        skip_fallback: 0,
        high_surrogate: None,
    };
    extractor.run();
    extractor.flush_bytes();
    extractor.out.trim().to_string()
}

impl Extractor<'_> {
    fn run(&mut self) {
        while let Some(&byte) = self.input.get(self.pos) {
            self.pos += 1;
            match byte {
                b'{' => {
                    self.stack.push(self.state);
                    if self.peek_is(b"\\*") {
                        self.state.skip = true;
                    }
                }
                b'}' => {
                    if let Some(previous) = self.stack.pop() {
                        self.state = previous;
                    }
                }
                b'\\' => self.control(),
                b'\r' | b'\n' => {}
                _ => {
                    if self.skip_fallback > 0 {
                        self.skip_fallback -= 1;
                    } else {
                        self.emit_byte(byte);
                    }
                }
            }
        }
    }

    fn peek_is(&self, prefix: &[u8]) -> bool {
        self.input[self.pos..].starts_with(prefix)
    }

    fn control(&mut self) {
        let Some(&next) = self.input.get(self.pos) else {
            return;
        };

        if !next.is_ascii_alphabetic() {
            self.pos += 1;
            match next {
                b'\'' => {
                    let hex = self.input.get(self.pos..self.pos + 2).unwrap_or_default();
                    self.pos += hex.len();
                    if self.skip_fallback > 0 {
                        self.skip_fallback -= 1;
                    } else if let Some(byte) = std::str::from_utf8(hex)
                        .ok()
                        .and_then(|h| u8::from_str_radix(h, 16).ok())
                    {
                        self.emit_byte(byte);
                    }
                }
                b'~' => self.emit_char('\u{00A0}'),
                b'_' => self.emit_char('-'),
                b'\\' | b'{' | b'}' => self.emit_byte(next),
                b'\r' | b'\n' => self.emit_char('\n'),
                _ => {}
            }
            return;
        }

        let start = self.pos;
        while self.input.get(self.pos).is_some_and(u8::is_ascii_alphabetic) {
            self.pos += 1;
        }
        let word = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();

        let num_start = self.pos;
        if self.input.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while self.input.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        let param = std::str::from_utf8(&self.input[num_start..self.pos])
            .ok()
            .and_then(|n| n.parse::<i32>().ok());
        if self.input.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }

        self.apply(&word, param);
    }

    fn apply(&mut self, word: &str, param: Option<i32>) {
        match word {
            "ansicpg" => {
                if let Some(cp) = param {
                    let label = format!("windows-{cp}");
                    let encoding = Encoding::for_label(label.as_bytes())
                        .or_else(|| Encoding::for_label(format!("cp{cp}").as_bytes()));
                    if let Some(encoding) = encoding {
                        self.codepage = encoding;
                    }
                }
            }
            "uc" => self.state.uc = param.unwrap_or(1).max(0) as usize,
            "u" => {
                if let Some(code) = param {
                    let unit = (if code < 0 { code + 65536 } else { code }) as u32;
                    match (self.high_surrogate.take(), unit) {
                        (None, 0xD800..=0xDBFF) => self.high_surrogate = Some(unit),
                        (Some(high), 0xDC00..=0xDFFF) => {
                            let combined = 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                            if let Some(ch) = char::from_u32(combined) {
                                self.emit_char(ch);
                            }
                        }
                        (_, unit) => {
                            if let Some(ch) = char::from_u32(unit) {
                                self.emit_char(ch);
                            }
                        }
                    }
                    self.skip_fallback = self.state.uc;
                }
            }
            "htmlrtf" => self.html_suppressed = param != Some(0),
            "par" | "line" | "sect" | "row" => self.emit_char('\n'),
            "tab" | "cell" => self.emit_char('\t'),
            "emdash" => self.emit_char('\u{2014}'),
            "endash" => self.emit_char('\u{2013}'),
            "bullet" => self.emit_char('\u{2022}'),
            "lquote" => self.emit_char('\u{2018}'),
            "rquote" => self.emit_char('\u{2019}'),
            "ldblquote" => self.emit_char('\u{201C}'),
            "rdblquote" => self.emit_char('\u{201D}'),
            _ if SKIPPED_DESTINATIONS.contains(&word) => self.state.skip = true,
            _ => {}
        }
    }

    fn suppressed(&self) -> bool {
        self.state.skip || self.html_suppressed
    }

    fn emit_byte(&mut self, byte: u8) {
        if !self.suppressed() {
            self.pending.push(byte);
        }
    }

    fn emit_char(&mut self, ch: char) {
        if self.suppressed() {
            return;
        }
        self.flush_bytes();
        self.out.push(ch);
    }

    fn flush_bytes(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let (text, _) = self.codepage.decode_without_bom_handling(&self.pending);
        self.out.push_str(&text);
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paragraphs() {
        let rtf = r"{\rtf1\ansi{\fonttbl{\f0 Arial;}}\f0 Hello\par World}";
        assert_eq!(rtf_to_text(rtf), "Hello\nWorld");
    }

    #[test]
    fn test_unicode_escape_skips_fallback() {
        let rtf = r"{\rtf1\ansi\uc1 caf\u233?\par}";
        assert_eq!(rtf_to_text(rtf), "café");
    }

    #[test]
    fn test_surrogate_pair() {
        let rtf = r"{\rtf1\uc1 \u-10179?\u-8704?}";
        assert_eq!(rtf_to_text(rtf), "\u{1F600}");
    }

    #[test]
    fn test_hex_bytes_in_korean_code_page() {
        // "한" in code page 949
        let rtf = r"{\rtf1\ansi\ansicpg949 \'c7\'d1}";
        assert_eq!(rtf_to_text(rtf), "한");
    }

    #[test]
    fn test_ignorable_destination_and_htmlrtf() {
        let rtf = r"{\rtf1{\*\htmltag64 <p>}\htmlrtf junk\htmlrtf0 Body text}";
        assert_eq!(rtf_to_text(rtf), "Body text");
    }

    #[test]
    fn test_not_rtf_passthrough() {
        assert_eq!(rtf_to_text("just text"), "just text");
    }
}

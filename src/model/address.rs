//! Recipient address parsing (RFC 5322 §3.4) and formatting.

/// A parsed mailbox: optional display name plus address.
///
/// # Examples
/// - `"Bob <bob@x.com>"` → `name = "Bob"`, `address = "bob@x.com"`
/// - `"bob@x.com"` → `name = ""`, `address = "bob@x.com"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Hash)]
pub struct Recipient {
    /// Display name, already decoded from encoded-word form. May be empty.
    pub name: String,
    /// The bare address.
    pub address: String,
}

impl Recipient {
    /// Parse a single mailbox.
    ///
    /// Accepts `addr`, `<addr>`, `Name <addr>` and `"Quoted, Name" <addr>`.
    /// Anything else is kept verbatim as the address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    name: unquote(&trimmed[..open]),
                    address: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }

        Self {
            name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Split a header value into mailboxes.
    ///
    /// Commas and semicolons separate entries unless they appear inside a
    /// quoted name or angle brackets. Group syntax (`team: a@x, b@x;`) is
    /// flattened. Entries without an address are dropped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        let mut flush = |segment: &mut String| {
            let recipient = Self::parse(strip_group_label(segment));
            if !recipient.address.is_empty() {
                results.push(recipient);
            }
            segment.clear();
        };

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' | ';' if !in_quotes && !in_angle => flush(&mut current),
                _ => current.push(ch),
            }
        }
        flush(&mut current);

        results
    }

    /// `"Name <address>"`, or the bare address when there is no name.
    pub fn formatted(&self) -> String {
        if self.name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.name, self.address)
        }
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.formatted())
    }
}

/// Drop a leading `group-name:` label, unless the colon is inside brackets.
fn strip_group_label(segment: &str) -> &str {
    match (segment.find(':'), segment.find('<')) {
        (Some(colon), Some(angle)) if colon < angle => &segment[colon + 1..],
        (Some(colon), None) if !segment[..colon].contains('@') => &segment[colon + 1..],
        _ => segment,
    }
}

fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\\\"", "\"").trim().to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_address() {
        let r = Recipient::parse("Bob <bob@x.com>");
        assert_eq!(r.name, "Bob");
        assert_eq!(r.address, "bob@x.com");
    }

    #[test]
    fn test_parse_bare_and_bracketed() {
        assert_eq!(Recipient::parse("bob@x.com").address, "bob@x.com");
        let r = Recipient::parse("<bob@x.com>");
        assert_eq!(r.name, "");
        assert_eq!(r.address, "bob@x.com");
    }

    #[test]
    fn test_parse_list_with_quoted_separators() {
        let list = Recipient::parse_list("\"Doe, Jane; PM\" <jane@x.com>, carol@x.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Doe, Jane; PM");
        assert_eq!(list[1].address, "carol@x.com");
    }

    #[test]
    fn test_parse_list_semicolons() {
        let list = Recipient::parse_list("a@x.com; b@x.com;");
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_parse_list_group_syntax() {
        let list = Recipient::parse_list("team: Ann <ann@x.com>, bob@x.com;");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].formatted(), "Ann <ann@x.com>");
        assert_eq!(list[1].address, "bob@x.com");
    }

    #[test]
    fn test_formatted() {
        let r = Recipient {
            name: String::new(),
            address: "a@x.com".into(),
        };
        assert_eq!(r.formatted(), "a@x.com");
        assert_eq!(Recipient::parse("A <a@x.com>").to_string(), "A <a@x.com>");
    }
}

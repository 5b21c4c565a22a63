//! Sender and from address resolution.
//!
//! Exchange stores internal senders as directory names such as
//! `/O=CORP/OU=EXCHANGE ADMINISTRATIVE GROUP/CN=RECIPIENTS/CN=jdoe` instead
//! of SMTP addresses. When the primary address property lacks an `@`, the
//! recovery chain in [`RECOVERY_CHAIN`] is tried in order.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::archive::PropertySource;
use crate::model::property::{
    PropertyTag, PR_EMAIL_ADDRESS, PR_ORIGINAL_SENDER_EMAIL_ADDRESS, PR_SENDER_EMAIL_ADDRESS,
    PR_SENDER_NAME, PR_SENDER_SMTP_ADDRESS, PR_SENT_REPRESENTING_EMAIL_ADDRESS,
    PR_SENT_REPRESENTING_NAME, PR_SENT_REPRESENTING_SMTP_ADDRESS, PR_SMTP_ADDRESS,
};
use crate::parser::header::HeaderMap;
use crate::resolve::property::{first_success, get_string};

const SENDER_ALTERNATES: &[PropertyTag] = &[
    PR_SENDER_SMTP_ADDRESS,
    PR_SMTP_ADDRESS,
    PR_EMAIL_ADDRESS,
    PR_SENT_REPRESENTING_SMTP_ADDRESS,
];

const FROM_ALTERNATES: &[PropertyTag] = &[
    PR_SENT_REPRESENTING_SMTP_ADDRESS,
    PR_SENDER_SMTP_ADDRESS,
    PR_SMTP_ADDRESS,
    PR_EMAIL_ADDRESS,
];

/// Properties that sometimes embed an address in free text.
const MISC_ADDRESS_PROPERTIES: &[PropertyTag] = &[
    PR_SENDER_NAME,
    PR_SENT_REPRESENTING_NAME,
    PR_ORIGINAL_SENDER_EMAIL_ADDRESS,
];

/// Transport headers searched for an address, in order.
const ADDRESS_HEADERS: &[&str] = &["from", "reply-to"];

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}")
        .expect("valid email regex")
});

static CN_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|/)cn=([^/]+)").expect("valid cn regex"));

static ORG_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|/)o(?:u)?=([^/]+)").expect("valid org regex"));

/// Exchange prefixes some common names with a 32-digit hex GUID and a dash.
static GUID_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{32}-").expect("valid guid regex"));

/// Steps tried, in order, when the primary address is not an SMTP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStep {
    /// Other address-bearing properties; first value with an `@` wins.
    AlternateProperties,
    /// `From:` then `Reply-To:` in the transport headers.
    TransportHeaders,
    /// Common name from the directory identifier plus a guessed domain.
    DirectoryName,
    /// Address pattern embedded in name-like properties.
    EmbeddedAddress,
}

pub const RECOVERY_CHAIN: [RecoveryStep; 4] = [
    RecoveryStep::AlternateProperties,
    RecoveryStep::TransportHeaders,
    RecoveryStep::DirectoryName,
    RecoveryStep::EmbeddedAddress,
];

/// Context shared by both resolutions of one message.
#[derive(Debug, Clone, Copy)]
pub struct AddressHints<'a> {
    pub headers: &'a HeaderMap,
    /// Domain used for directory names that carry no recognizable one.
    pub fallback_domain: Option<&'a str>,
}

/// Resolve `(sender_address, from_address)` for a message.
///
/// Never fails. `from_address` equals `sender_address` when the message has
/// no from-address property of its own. A directory identifier that cannot
/// be turned into an SMTP address is returned in readable form.
pub fn resolve_sender<S: PropertySource + ?Sized>(
    message: &S,
    hints: AddressHints<'_>,
) -> (String, String) {
    let sender_raw = get_string(message, &[PR_SENDER_EMAIL_ADDRESS], |_| true);
    let sender = resolve_address(message, sender_raw.as_deref(), SENDER_ALTERNATES, hints);

    let from = match get_string(message, &[PR_SENT_REPRESENTING_EMAIL_ADDRESS], |_| true) {
        Some(raw) => resolve_address(message, Some(&raw), FROM_ALTERNATES, hints),
        None => sender.clone(),
    };

    (sender, from)
}

fn resolve_address<S: PropertySource + ?Sized>(
    message: &S,
    raw: Option<&str>,
    alternates: &[PropertyTag],
    hints: AddressHints<'_>,
) -> String {
    if let Some(value) = raw {
        if value.contains('@') {
            return value.to_string();
        }
    }

    let recovered = first_success(RECOVERY_CHAIN, |step| {
        let found = match step {
            RecoveryStep::AlternateProperties => {
                get_string(message, alternates, |v| v.contains('@'))
            }
            RecoveryStep::TransportHeaders => address_from_headers(hints.headers),
            RecoveryStep::DirectoryName => {
                raw.and_then(|id| address_from_directory_name(id, hints.fallback_domain))
            }
            RecoveryStep::EmbeddedAddress => first_success(MISC_ADDRESS_PROPERTIES, |&tag| {
                get_string(message, &[tag], |_| true)
                    .and_then(|text| find_address(&text).map(str::to_string))
            }),
        };
        if let Some(address) = &found {
            debug!(?step, address = %address, "Recovered address");
        }
        found
    });

    recovered
        .or_else(|| raw.map(readable_identifier))
        .unwrap_or_default()
}

fn address_from_headers(headers: &HeaderMap) -> Option<String> {
    first_success(ADDRESS_HEADERS, |name| {
        headers
            .all(name)
            .find_map(find_address)
            .map(str::to_string)
    })
}

/// Build `cn@domain` from a directory identifier.
///
/// The domain comes from the first `O=`/`OU=` token that looks like one
/// (contains a dot), else from `fallback_domain`.
fn address_from_directory_name(identifier: &str, fallback_domain: Option<&str>) -> Option<String> {
    let cn = common_name(identifier)?;
    let domain = ORG_TOKEN
        .captures_iter(identifier)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|org| org.contains('.') && !org.contains(' '))
        .or(fallback_domain.map(str::trim))
        .filter(|domain| !domain.is_empty())?;
    Some(format!("{}@{}", cn.to_lowercase(), domain.to_lowercase()))
}

/// The last `CN=` token, without any GUID prefix.
fn common_name(identifier: &str) -> Option<String> {
    let last = CN_TOKEN
        .captures_iter(identifier)
        .filter_map(|caps| caps.get(1))
        .last()?
        .as_str()
        .trim();
    let cn = GUID_PREFIX.replace(last, "");
    let cn = cn.trim();
    (!cn.is_empty()).then(|| cn.to_string())
}

fn find_address(text: &str) -> Option<&str> {
    EMAIL_PATTERN.find(text).map(|m| m.as_str())
}

/// Last-resort rendering of an unresolvable identifier.
fn readable_identifier(identifier: &str) -> String {
    common_name(identifier).unwrap_or_else(|| {
        let cleaned = identifier.trim().trim_matches('/').trim();
        if cleaned.is_empty() {
            identifier.trim().to_string()
        } else {
            cleaned.to_string()
        }
    })
}

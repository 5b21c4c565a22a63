//! Property identifiers and the logical-property lookup table.
//!
//! Archive producers disagree on which identifier carries a given field, so
//! every [`LogicalProperty`] maps to an ordered list of candidate tags. The
//! first tag that yields a non-empty value wins.

/// Numeric property identifier (the upper 16 bits of a MAPI property tag).
pub type PropertyTag = u16;

pub const PR_MESSAGE_CLASS: PropertyTag = 0x001A;
pub const PR_SUBJECT: PropertyTag = 0x0037;
pub const PR_SENT_REPRESENTING_NAME: PropertyTag = 0x0042;
pub const PR_SENT_REPRESENTING_EMAIL_ADDRESS: PropertyTag = 0x0065;
pub const PR_ORIGINAL_SENDER_EMAIL_ADDRESS: PropertyTag = 0x0067;
pub const PR_SENDER_NAME: PropertyTag = 0x0C1A;
pub const PR_SENDER_EMAIL_ADDRESS: PropertyTag = 0x0C1F;
pub const PR_DISPLAY_CC: PropertyTag = 0x0E03;
pub const PR_DISPLAY_TO: PropertyTag = 0x0E04;
pub const PR_MESSAGE_FLAGS: PropertyTag = 0x0E07;
pub const PR_DISPLAY_NAME: PropertyTag = 0x3001;
pub const PR_EMAIL_ADDRESS: PropertyTag = 0x3003;
pub const PR_ATTACH_EXTENSION: PropertyTag = 0x3703;
pub const PR_ATTACH_FILENAME: PropertyTag = 0x3704;
pub const PR_ATTACH_LONG_FILENAME: PropertyTag = 0x3707;
pub const PR_SMTP_ADDRESS: PropertyTag = 0x39FE;
pub const PR_SENDER_SMTP_ADDRESS: PropertyTag = 0x5D01;
pub const PR_SENT_REPRESENTING_SMTP_ADDRESS: PropertyTag = 0x5D02;

/// `PR_MESSAGE_FLAGS` bit set on items authored by the mailbox owner
/// (`mfFromMe`). Not to be confused with `0x10` (has attachments) or `0x40`
/// (associated, i.e. hidden folder-associated items).
pub const MSGFLAG_FROMME: u32 = 0x0000_0020;

/// Declared value type of a property entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum ValueType {
    /// `PT_LONG`: 32-bit little-endian integer.
    Integer32,
    /// `PT_STRING8`: single-byte string in the archive's code page.
    String8,
    /// `PT_UNICODE`: UTF-16LE string.
    Unicode,
    /// `PT_BINARY`: opaque bytes.
    Binary,
    /// Any other type code.
    Other(u16),
}

impl From<u16> for ValueType {
    fn from(code: u16) -> Self {
        match code {
            0x0003 => Self::Integer32,
            0x001E => Self::String8,
            0x001F => Self::Unicode,
            0x0102 => Self::Binary,
            other => Self::Other(other),
        }
    }
}

impl From<ValueType> for u16 {
    fn from(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Integer32 => 0x0003,
            ValueType::String8 => 0x001E,
            ValueType::Unicode => 0x001F,
            ValueType::Binary => 0x0102,
            ValueType::Other(code) => code,
        }
    }
}

/// One raw property entry as enumerated by the archive reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEntry {
    pub tag: PropertyTag,
    pub value_type: ValueType,
    pub data: Vec<u8>,
}

impl PropertyEntry {
    pub fn new(tag: PropertyTag, value_type: ValueType, data: Vec<u8>) -> Self {
        Self {
            tag,
            value_type,
            data,
        }
    }

    /// Build a `PT_UNICODE` entry from text (NUL-terminated, as archives store it).
    pub fn unicode(tag: PropertyTag, text: &str) -> Self {
        let mut data: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        data.extend_from_slice(&[0, 0]);
        Self::new(tag, ValueType::Unicode, data)
    }

    /// Build a `PT_LONG` entry.
    pub fn integer(tag: PropertyTag, value: u32) -> Self {
        Self::new(tag, ValueType::Integer32, value.to_le_bytes().to_vec())
    }
}

/// A named semantic field, independent of its storage identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalProperty {
    MessageClass,
    Subject,
    SenderName,
    SenderEmail,
    FromName,
    FromEmail,
    DisplayTo,
    DisplayCc,
    MessageFlags,
    AttachmentFilename,
}

impl LogicalProperty {
    /// Candidate identifiers, in priority order.
    pub fn tags(self) -> &'static [PropertyTag] {
        match self {
            Self::MessageClass => &[PR_MESSAGE_CLASS],
            Self::Subject => &[PR_SUBJECT],
            Self::SenderName => &[PR_SENDER_NAME],
            Self::SenderEmail => &[PR_SENDER_EMAIL_ADDRESS],
            Self::FromName => &[PR_SENT_REPRESENTING_NAME],
            Self::FromEmail => &[PR_SENT_REPRESENTING_EMAIL_ADDRESS],
            Self::DisplayTo => &[PR_DISPLAY_TO],
            Self::DisplayCc => &[PR_DISPLAY_CC],
            Self::MessageFlags => &[PR_MESSAGE_FLAGS],
            Self::AttachmentFilename => &[
                PR_ATTACH_LONG_FILENAME,
                PR_ATTACH_FILENAME,
                PR_DISPLAY_NAME,
                PR_ATTACH_EXTENSION,
            ],
        }
    }
}

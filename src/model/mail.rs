//! Normalized email and attachment records, ready for persistence.

use std::fmt;

/// Direction of a message relative to the mailbox owner.
///
/// Always one of exactly two values; a recorded message is never unclassified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Sent,
    Receive,
}

impl MessageKind {
    /// The value stored in the `msg_kind` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Receive => "receive",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized mail item.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmailRecord {
    /// Archive-local identifier rendered as text (unique within one run only).
    pub email_id: String,

    pub subject: String,

    pub sender_name: String,

    /// Resolved sender address. Falls back to a readable directory name when
    /// no SMTP address can be recovered.
    pub sender_address: String,

    pub from_name: String,

    pub from_address: String,

    /// `"Name <addr>; ..."`, deduplicated and sorted.
    pub to_recipients: String,

    pub cc_recipients: String,

    /// Delivery time in UTC (`%Y-%m-%d %H:%M:%S`), empty when unknown.
    pub email_time: String,

    /// Delivery time at the configured UTC offset, empty when unknown.
    pub local_time: String,

    /// Best-effort body text.
    pub content: String,

    pub kind: MessageKind,

    /// Slash-joined folder names from the archive root (root name omitted).
    pub folder_path: String,

    pub attachments: Vec<AttachmentRecord>,

    /// Diagnostic set when extraction only partially succeeded.
    pub note: Option<String>,
}

impl EmailRecord {
    /// First `max_chars` characters of the subject, for log lines.
    pub fn subject_prefix(&self, max_chars: usize) -> String {
        self.subject.chars().take(max_chars).collect()
    }
}

/// One attachment written to disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttachmentRecord {
    pub email_id: String,

    /// Sanitized original filename. Metadata only; never used on disk.
    pub original_filename: String,

    /// Generated, collision-free filename actually written.
    pub physical_filename: String,

    /// Directory holding the file, relative to the attachment base directory.
    pub save_folder: String,

    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(MessageKind::Sent.as_str(), "sent");
        assert_eq!(MessageKind::Receive.to_string(), "receive");
    }

    #[test]
    fn test_subject_prefix_respects_char_boundaries() {
        let record = EmailRecord {
            email_id: "1".into(),
            subject: "회의 안건 공유드립니다".into(),
            sender_name: String::new(),
            sender_address: String::new(),
            from_name: String::new(),
            from_address: String::new(),
            to_recipients: String::new(),
            cc_recipients: String::new(),
            email_time: String::new(),
            local_time: String::new(),
            content: String::new(),
            kind: MessageKind::Receive,
            folder_path: String::new(),
            attachments: Vec::new(),
            note: None,
        };
        assert_eq!(record.subject_prefix(2), "회의");
    }
}

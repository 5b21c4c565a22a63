//! Sent-versus-received classification and the mail-item filter.

use crate::archive::PropertySource;
use crate::model::mail::MessageKind;
use crate::model::property::{LogicalProperty, MSGFLAG_FROMME};
use crate::resolve::property::get_integer;

/// Folder names that hold the owner's outgoing mail, compared case-insensitively.
pub const SENT_FOLDER_NAMES: &[&str] = &["sent items", "sent", "보낸 편지함", "outbox"];

/// Message classes starting with this prefix (case-insensitive) are mail items.
pub const MAIL_CLASS_PREFIX: &str = "IPM.Note";

/// Case-insensitive set of sent-folder names.
#[derive(Debug, Clone)]
pub struct SentFolders {
    names: Vec<String>,
}

impl Default for SentFolders {
    fn default() -> Self {
        Self::with_extra(std::iter::empty::<&str>())
    }
}

impl SentFolders {
    /// The well-known names plus `extra`.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = SENT_FOLDER_NAMES.iter().map(|n| n.to_string()).collect();
        names.extend(
            extra
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty()),
        );
        Self { names }
    }

    /// True when the whole path, or its last segment, is a sent-folder name.
    ///
    /// The leaf match also catches sent folders nested below a store root or
    /// an archive folder (`Top of Personal Folders/Sent Items`,
    /// `Archive/Sent Items`). Folders nested below a sent folder do not match.
    pub fn matches(&self, folder_path: &str) -> bool {
        let path = folder_path.trim().to_lowercase();
        let leaf = path.rsplit('/').next().unwrap_or(&path).trim();
        self.names.iter().any(|name| *name == path || name == leaf)
    }
}

/// Decide whether a message was sent by the mailbox owner.
///
/// A sent-folder match short-circuits; otherwise the from-me bit of the
/// message flags decides; otherwise the message is received.
pub fn classify<S: PropertySource + ?Sized>(
    message: &S,
    folder_path: &str,
    sent_folders: &SentFolders,
) -> MessageKind {
    if sent_folders.matches(folder_path) {
        return MessageKind::Sent;
    }
    match get_integer(message, LogicalProperty::MessageFlags) {
        Some(flags) if flags & MSGFLAG_FROMME != 0 => MessageKind::Sent,
        _ => MessageKind::Receive,
    }
}

/// Whether a message class denotes a mail item (as opposed to calendar
/// entries, contacts, tasks and the like).
pub fn is_mail_class(class: &str) -> bool {
    let class = class.trim();
    class
        .get(..MAIL_CLASS_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(MAIL_CLASS_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveResult;
    use crate::model::property::{PropertyEntry, PR_MESSAGE_FLAGS};

    struct Flags(Option<u32>);

    impl PropertySource for Flags {
        fn property_entries(&self) -> ArchiveResult<Vec<PropertyEntry>> {
            Ok(self
                .0
                .map(|f| vec![PropertyEntry::integer(PR_MESSAGE_FLAGS, f)])
                .unwrap_or_default())
        }
    }

    #[test]
    fn test_sent_folder_ignores_flags() {
        let sent = SentFolders::default();
        assert_eq!(classify(&Flags(Some(0)), "Sent Items", &sent), MessageKind::Sent);
        assert_eq!(classify(&Flags(None), "SENT", &sent), MessageKind::Sent);
        assert_eq!(classify(&Flags(None), "보낸 편지함", &sent), MessageKind::Sent);
    }

    #[test]
    fn test_nested_sent_folder_matches_leaf() {
        let sent = SentFolders::default();
        assert!(sent.matches("Archive/2023/Sent Items"));
        assert!(!sent.matches("Sent Items/Old"));
    }

    #[test]
    fn test_from_me_flag_in_inbox() {
        let sent = SentFolders::default();
        assert_eq!(classify(&Flags(Some(0x21)), "Inbox", &sent), MessageKind::Sent);
        assert_eq!(classify(&Flags(Some(0x01)), "Inbox", &sent), MessageKind::Receive);
        assert_eq!(classify(&Flags(None), "Inbox", &sent), MessageKind::Receive);
    }

    #[test]
    fn test_only_from_me_bit_marks_sent() {
        let sent = SentFolders::default();
        assert_eq!(MSGFLAG_FROMME, 0x20);
        assert_eq!(classify(&Flags(Some(0x20)), "Inbox", &sent), MessageKind::Sent);
        assert_eq!(classify(&Flags(Some(0x10)), "Inbox", &sent), MessageKind::Receive);
        assert_eq!(classify(&Flags(Some(0x40)), "Inbox", &sent), MessageKind::Receive);
    }

    #[test]
    fn test_archived_sent_folder_is_sent() {
        let sent = SentFolders::default();
        assert_eq!(
            classify(&Flags(None), "Archive/Sent Items", &sent),
            MessageKind::Sent
        );
        assert_eq!(
            classify(&Flags(None), "Top of Personal Folders/보낸 편지함", &sent),
            MessageKind::Sent
        );
        assert_eq!(
            classify(&Flags(None), "Archive/Sent Items/2023", &sent),
            MessageKind::Receive
        );
    }

    #[test]
    fn test_extra_sent_folders() {
        let sent = SentFolders::with_extra(["Gesendete Elemente"]);
        assert!(sent.matches("gesendete elemente"));
        assert!(sent.matches("Sent"));
    }

    #[test]
    fn test_mail_class_prefix() {
        assert!(is_mail_class("IPM.Note"));
        assert!(is_mail_class("ipm.note.SMIME"));
        assert!(!is_mail_class("IPM.Appointment"));
        assert!(!is_mail_class("IPM"));
        assert!(!is_mail_class(""));
    }
}

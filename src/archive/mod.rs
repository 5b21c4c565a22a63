//! Interface to the mailbox archive reader.
//!
//! The extraction pipeline only talks to these traits. A reader hands out
//! folder, message and attachment handles; each handle exposes a generic
//! property-entry enumeration plus a few convenience accessors.
//!
//! Two implementations ship with the crate:
//! - [`memory`]: an in-memory tree, also used by the tests
//! - [`json`]: loads a JSON dump of an archive into the in-memory tree

pub mod json;
pub mod memory;

use chrono::{DateTime, Utc};

use crate::error::ArchiveError;
use crate::model::property::{PropertyEntry, PropertyTag};

/// Result type for archive reader calls.
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Raw property access shared by messages and attachments.
pub trait PropertySource {
    /// All property entries of this item, across its record sets.
    fn property_entries(&self) -> ArchiveResult<Vec<PropertyEntry>>;

    /// A natively typed string value, for readers that decode some
    /// properties themselves. `Ok(None)` means "not offered".
    fn native_string(&self, _tag: PropertyTag) -> ArchiveResult<Option<String>> {
        Ok(None)
    }

    /// A natively typed integer value. `Ok(None)` means "not offered".
    fn native_integer(&self, _tag: PropertyTag) -> ArchiveResult<Option<i64>> {
        Ok(None)
    }
}

/// An opened archive. Owns the folder tree for the duration of a run.
pub trait MailboxArchive {
    type Folder: ArchiveFolder;

    /// The root folder. Failure here is fatal for the run.
    fn root_folder(&self) -> ArchiveResult<Self::Folder>;

    /// Release the archive. Must be safe to call more than once.
    fn close(&mut self) -> ArchiveResult<()>;
}

pub trait ArchiveFolder: Sized {
    type Message: ArchiveMessage;

    /// Archive-local identifier, unique within the archive.
    fn identifier(&self) -> u64;

    fn name(&self) -> String;

    /// Child folders in declared order.
    fn sub_folders(&self) -> ArchiveResult<Vec<Self>>;

    /// Contained messages in declared order.
    fn messages(&self) -> ArchiveResult<Vec<Self::Message>>;
}

pub trait ArchiveMessage: PropertySource {
    type Attachment: ArchiveAttachment;

    /// Archive-local identifier, unique within the archive.
    fn identifier(&self) -> u64;

    fn subject(&self) -> ArchiveResult<Option<String>>;

    fn sender_name(&self) -> ArchiveResult<Option<String>>;

    /// Message-class text (`IPM.Note`, `IPM.Appointment`, ...), when the
    /// reader exposes it directly.
    fn message_class(&self) -> ArchiveResult<Option<String>> {
        Ok(None)
    }

    fn plain_text_body(&self) -> ArchiveResult<Option<Vec<u8>>>;

    fn html_body(&self) -> ArchiveResult<Option<Vec<u8>>>;

    fn rtf_body(&self) -> ArchiveResult<Option<Vec<u8>>>;

    /// Raw RFC 822 transport headers, if the message went through SMTP.
    fn transport_headers(&self) -> ArchiveResult<Option<Vec<u8>>>;

    fn delivery_time(&self) -> ArchiveResult<Option<DateTime<Utc>>>;

    /// Number of attachments. An error here signals a damaged message.
    fn attachment_count(&self) -> ArchiveResult<usize>;

    fn attachment(&self, index: usize) -> ArchiveResult<Self::Attachment>;
}

pub trait ArchiveAttachment: PropertySource {
    /// Declared payload size in bytes. Failing to read it makes the
    /// attachment unreadable.
    fn size(&self) -> ArchiveResult<u64>;

    /// Read the full payload.
    fn read_payload(&self) -> ArchiveResult<Vec<u8>>;

    /// Name reported by the reader's own accessor, probed only when no
    /// filename property resolves.
    fn alternate_name(&self) -> ArchiveResult<Option<String>> {
        Ok(None)
    }
}

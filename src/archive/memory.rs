//! In-memory archive tree.
//!
//! Handles are reference-counted, so handing out sub-folders or messages is
//! cheap and never copies payloads. Builders allow injecting a reader fault
//! into any message accessor and into attachment reads.

use std::rc::Rc;

use chrono::{DateTime, Utc};

use super::{
    ArchiveAttachment, ArchiveFolder, ArchiveMessage, ArchiveResult, MailboxArchive,
    PropertySource,
};
use crate::error::ArchiveError;
use crate::model::property::{PropertyEntry, PR_ATTACH_LONG_FILENAME};

/// An opened in-memory archive.
#[derive(Debug)]
pub struct MemoryArchive {
    root: Rc<MemoryFolder>,
    closed: bool,
}

impl MemoryArchive {
    pub fn new(root: MemoryFolder) -> Self {
        Self {
            root: Rc::new(root),
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl MailboxArchive for MemoryArchive {
    type Folder = Rc<MemoryFolder>;

    fn root_folder(&self) -> ArchiveResult<Self::Folder> {
        if self.closed {
            return Err(ArchiveError::Closed);
        }
        Ok(Rc::clone(&self.root))
    }

    fn close(&mut self) -> ArchiveResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFolder {
    pub id: u64,
    pub name: String,
    pub folders: Vec<Rc<MemoryFolder>>,
    pub messages: Vec<Rc<MemoryMessage>>,
}

impl MemoryFolder {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_folder(mut self, folder: MemoryFolder) -> Self {
        self.folders.push(Rc::new(folder));
        self
    }

    pub fn with_message(mut self, message: MemoryMessage) -> Self {
        self.messages.push(Rc::new(message));
        self
    }
}

impl ArchiveFolder for Rc<MemoryFolder> {
    type Message = Rc<MemoryMessage>;

    fn identifier(&self) -> u64 {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn sub_folders(&self) -> ArchiveResult<Vec<Self>> {
        Ok(self.folders.clone())
    }

    fn messages(&self) -> ArchiveResult<Vec<Self::Message>> {
        Ok(self.messages.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMessage {
    pub id: u64,
    pub subject: Option<String>,
    pub sender_name: Option<String>,
    pub message_class: Option<String>,
    pub properties: Vec<PropertyEntry>,
    pub plain_body: Option<Vec<u8>>,
    pub html_body: Option<Vec<u8>>,
    pub rtf_body: Option<Vec<u8>>,
    pub transport_headers: Option<Vec<u8>>,
    pub delivery_time: Option<DateTime<Utc>>,
    pub attachments: Vec<Rc<MemoryAttachment>>,
    /// When set, `attachment_count` fails with this reason.
    pub attachment_count_error: Option<String>,
    /// When set, every body accessor fails with this reason.
    pub body_error: Option<String>,
    pub subject_error: Option<String>,
    pub sender_name_error: Option<String>,
    pub delivery_time_error: Option<String>,
    pub headers_error: Option<String>,
}

impl MemoryMessage {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn message_class(mut self, class: impl Into<String>) -> Self {
        self.message_class = Some(class.into());
        self
    }

    pub fn property(mut self, entry: PropertyEntry) -> Self {
        self.properties.push(entry);
        self
    }

    pub fn plain_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.plain_body = Some(body.into());
        self
    }

    pub fn html_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    pub fn rtf_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.rtf_body = Some(body.into());
        self
    }

    pub fn transport_headers(mut self, headers: impl Into<Vec<u8>>) -> Self {
        self.transport_headers = Some(headers.into());
        self
    }

    pub fn delivered(mut self, at: DateTime<Utc>) -> Self {
        self.delivery_time = Some(at);
        self
    }

    pub fn attachment(mut self, attachment: MemoryAttachment) -> Self {
        self.attachments.push(Rc::new(attachment));
        self
    }

    pub fn fail_attachment_count(mut self, reason: impl Into<String>) -> Self {
        self.attachment_count_error = Some(reason.into());
        self
    }

    pub fn fail_body(mut self, reason: impl Into<String>) -> Self {
        self.body_error = Some(reason.into());
        self
    }

    pub fn fail_subject(mut self, reason: impl Into<String>) -> Self {
        self.subject_error = Some(reason.into());
        self
    }

    pub fn fail_sender_name(mut self, reason: impl Into<String>) -> Self {
        self.sender_name_error = Some(reason.into());
        self
    }

    pub fn fail_delivery_time(mut self, reason: impl Into<String>) -> Self {
        self.delivery_time_error = Some(reason.into());
        self
    }

    pub fn fail_headers(mut self, reason: impl Into<String>) -> Self {
        self.headers_error = Some(reason.into());
        self
    }

    fn body(&self, body: &Option<Vec<u8>>) -> ArchiveResult<Option<Vec<u8>>> {
        faulty(&self.body_error, || body.clone())
    }
}

/// `Err(Corrupt)` when a fault is injected, else the stored value.
fn faulty<T>(fault: &Option<String>, value: impl FnOnce() -> T) -> ArchiveResult<T> {
    match fault {
        Some(reason) => Err(ArchiveError::Corrupt(reason.clone())),
        None => Ok(value()),
    }
}

impl PropertySource for Rc<MemoryMessage> {
    fn property_entries(&self) -> ArchiveResult<Vec<PropertyEntry>> {
        Ok(self.properties.clone())
    }
}

impl ArchiveMessage for Rc<MemoryMessage> {
    type Attachment = Rc<MemoryAttachment>;

    fn identifier(&self) -> u64 {
        self.id
    }

    fn subject(&self) -> ArchiveResult<Option<String>> {
        faulty(&self.subject_error, || self.subject.clone())
    }

    fn sender_name(&self) -> ArchiveResult<Option<String>> {
        faulty(&self.sender_name_error, || self.sender_name.clone())
    }

    fn message_class(&self) -> ArchiveResult<Option<String>> {
        Ok(self.message_class.clone())
    }

    fn plain_text_body(&self) -> ArchiveResult<Option<Vec<u8>>> {
        self.body(&self.plain_body)
    }

    fn html_body(&self) -> ArchiveResult<Option<Vec<u8>>> {
        self.body(&self.html_body)
    }

    fn rtf_body(&self) -> ArchiveResult<Option<Vec<u8>>> {
        self.body(&self.rtf_body)
    }

    fn transport_headers(&self) -> ArchiveResult<Option<Vec<u8>>> {
        faulty(&self.headers_error, || self.transport_headers.clone())
    }

    fn delivery_time(&self) -> ArchiveResult<Option<DateTime<Utc>>> {
        faulty(&self.delivery_time_error, || self.delivery_time)
    }

    fn attachment_count(&self) -> ArchiveResult<usize> {
        faulty(&self.attachment_count_error, || self.attachments.len())
    }

    fn attachment(&self, index: usize) -> ArchiveResult<Self::Attachment> {
        self.attachments
            .get(index)
            .cloned()
            .ok_or(ArchiveError::NoSuchAttachment(index))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAttachment {
    pub properties: Vec<PropertyEntry>,
    pub data: Vec<u8>,
    pub alternate_name: Option<String>,
    /// Size reported by `size`; the payload length when unset.
    pub declared_size: Option<u64>,
    /// When set, `read_payload` fails with this reason.
    pub read_error: Option<String>,
    /// When set, `size` fails with this reason.
    pub size_error: Option<String>,
}

impl MemoryAttachment {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Convenience: a `PR_ATTACH_LONG_FILENAME` attachment.
    pub fn named(name: &str, data: impl Into<Vec<u8>>) -> Self {
        Self::new(data).property(PropertyEntry::unicode(PR_ATTACH_LONG_FILENAME, name))
    }

    pub fn property(mut self, entry: PropertyEntry) -> Self {
        self.properties.push(entry);
        self
    }

    pub fn alternate_name(mut self, name: impl Into<String>) -> Self {
        self.alternate_name = Some(name.into());
        self
    }

    pub fn declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn fail_read(mut self, reason: impl Into<String>) -> Self {
        self.read_error = Some(reason.into());
        self
    }

    pub fn fail_size(mut self, reason: impl Into<String>) -> Self {
        self.size_error = Some(reason.into());
        self
    }
}

impl PropertySource for Rc<MemoryAttachment> {
    fn property_entries(&self) -> ArchiveResult<Vec<PropertyEntry>> {
        Ok(self.properties.clone())
    }
}

impl ArchiveAttachment for Rc<MemoryAttachment> {
    fn size(&self) -> ArchiveResult<u64> {
        faulty(&self.size_error, || {
            self.declared_size.unwrap_or(self.data.len() as u64)
        })
    }

    fn read_payload(&self) -> ArchiveResult<Vec<u8>> {
        faulty(&self.read_error, || self.data.clone())
    }

    fn alternate_name(&self) -> ArchiveResult<Option<String>> {
        Ok(self.alternate_name.clone())
    }
}

//! JSON archive dumps.
//!
//! A dump is a single JSON document describing the folder tree:
//!
//! ```json
//! {
//!   "root": {
//!     "id": 1, "name": "Top of Personal Folders",
//!     "folders": [{
//!       "id": 2, "name": "Inbox",
//!       "messages": [{
//!         "id": 2097252,
//!         "subject": "Quarterly report",
//!         "message_class": "IPM.Note",
//!         "delivery_time": "2024-03-01T09:30:00Z",
//!         "plain_body": "See attached.",
//!         "transport_headers": "To: Bob <bob@example.com>\r\n",
//!         "properties": [{ "tag": 3103, "type": 31, "text": "jdoe@example.com" }],
//!         "attachments": [{
//!           "properties": [{ "tag": 14087, "type": 31, "text": "report.pdf" }],
//!           "data": { "base64": "JVBERi0xLjQ=" }
//!         }]
//!       }]
//!     }]
//!   }
//! }
//! ```
//!
//! Payloads (bodies, headers, attachment data) are either plain strings or
//! `{ "base64": "..." }` objects for raw bytes. Property entries carry
//! either `data` (base64 raw bytes), `text` (encoded per the value type) or
//! `integer`.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use encoding_rs::WINDOWS_1252;
use serde::Deserialize;

use super::memory::{MemoryArchive, MemoryAttachment, MemoryFolder, MemoryMessage};
use super::ArchiveResult;
use crate::error::ArchiveError;
use crate::model::property::{PropertyEntry, PropertyTag, ValueType};

#[derive(Debug, Deserialize)]
struct ArchiveDump {
    root: FolderDump,
}

#[derive(Debug, Deserialize)]
struct FolderDump {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    folders: Vec<FolderDump>,
    #[serde(default)]
    messages: Vec<MessageDump>,
}

#[derive(Debug, Deserialize)]
struct MessageDump {
    id: u64,
    subject: Option<String>,
    sender_name: Option<String>,
    message_class: Option<String>,
    delivery_time: Option<DateTime<Utc>>,
    plain_body: Option<Payload>,
    html_body: Option<Payload>,
    rtf_body: Option<Payload>,
    transport_headers: Option<Payload>,
    #[serde(default)]
    properties: Vec<PropertyDump>,
    #[serde(default)]
    attachments: Vec<AttachmentDump>,
}

#[derive(Debug, Deserialize)]
struct AttachmentDump {
    #[serde(default)]
    properties: Vec<PropertyDump>,
    data: Option<Payload>,
    alternate_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PropertyDump {
    tag: PropertyTag,
    #[serde(rename = "type", default = "default_value_type")]
    value_type: ValueType,
    data: Option<String>,
    text: Option<String>,
    integer: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Text(String),
    Encoded { base64: String },
}

fn default_value_type() -> ValueType {
    ValueType::Unicode
}

/// Open a JSON dump from disk.
pub fn open(path: &Path) -> ArchiveResult<MemoryArchive> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ArchiveError::Open(format!("{}: {e}", path.display())))?;
    parse(&contents)
}

/// Parse a JSON dump held in memory.
pub fn parse(contents: &str) -> ArchiveResult<MemoryArchive> {
    let dump: ArchiveDump =
        serde_json::from_str(contents).map_err(|e| ArchiveError::Open(e.to_string()))?;
    Ok(MemoryArchive::new(dump.root.into_folder()?))
}

impl FolderDump {
    fn into_folder(self) -> ArchiveResult<MemoryFolder> {
        let mut folder = MemoryFolder::new(self.id, self.name);
        for message in self.messages {
            folder = folder.with_message(message.into_message()?);
        }
        for child in self.folders {
            folder = folder.with_folder(child.into_folder()?);
        }
        Ok(folder)
    }
}

impl MessageDump {
    fn into_message(self) -> ArchiveResult<MemoryMessage> {
        let mut message = MemoryMessage {
            id: self.id,
            subject: self.subject,
            sender_name: self.sender_name,
            message_class: self.message_class,
            delivery_time: self.delivery_time,
            plain_body: self.plain_body.map(Payload::into_bytes).transpose()?,
            html_body: self.html_body.map(Payload::into_bytes).transpose()?,
            rtf_body: self.rtf_body.map(Payload::into_bytes).transpose()?,
            transport_headers: self.transport_headers.map(Payload::into_bytes).transpose()?,
            ..MemoryMessage::default()
        };
        for property in self.properties {
            message = message.property(property.into_entry()?);
        }
        for attachment in self.attachments {
            message = message.attachment(attachment.into_attachment()?);
        }
        Ok(message)
    }
}

impl AttachmentDump {
    fn into_attachment(self) -> ArchiveResult<MemoryAttachment> {
        let data = self
            .data
            .map(Payload::into_bytes)
            .transpose()?
            .unwrap_or_default();
        let mut attachment = MemoryAttachment::new(data);
        attachment.alternate_name = self.alternate_name;
        for property in self.properties {
            attachment = attachment.property(property.into_entry()?);
        }
        Ok(attachment)
    }
}

impl PropertyDump {
    fn into_entry(self) -> ArchiveResult<PropertyEntry> {
        let data = match (self.data, self.text, self.integer) {
            (Some(encoded), _, _) => decode_base64(&encoded)?,
            (None, Some(text), _) => encode_text(&text, self.value_type),
            (None, None, Some(value)) => value.to_le_bytes().to_vec(),
            (None, None, None) => Vec::new(),
        };
        Ok(PropertyEntry::new(self.tag, self.value_type, data))
    }
}

impl Payload {
    fn into_bytes(self) -> ArchiveResult<Vec<u8>> {
        match self {
            Self::Text(text) => Ok(text.into_bytes()),
            Self::Encoded { base64 } => decode_base64(&base64),
        }
    }
}

fn decode_base64(encoded: &str) -> ArchiveResult<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| ArchiveError::Corrupt(format!("invalid base64 payload: {e}")))
}

/// Encode text the way an archive stores a value of the given type.
fn encode_text(text: &str, value_type: ValueType) -> Vec<u8> {
    match value_type {
        ValueType::Unicode => {
            let mut data: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
            data.extend_from_slice(&[0, 0]);
            data
        }
        ValueType::String8 => {
            let (bytes, _, _) = WINDOWS_1252.encode(text);
            let mut data = bytes.into_owned();
            data.push(0);
            data
        }
        _ => text.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveAttachment, ArchiveFolder, ArchiveMessage, MailboxArchive};
    use crate::model::property::PR_SENDER_EMAIL_ADDRESS;

    const DUMP: &str = r#"{
      "root": {
        "id": 1,
        "name": "Root",
        "folders": [{
          "id": 2,
          "name": "Inbox",
          "messages": [{
            "id": 100,
            "subject": "Hello",
            "message_class": "IPM.Note",
            "delivery_time": "2024-03-01T09:30:00Z",
            "plain_body": { "base64": "aGk=" },
            "properties": [
              { "tag": 3103, "type": 31, "text": "a@b.com" },
              { "tag": 3591, "type": 3, "integer": 32 }
            ],
            "attachments": [{ "data": "payload", "alternate_name": "x.txt" }]
          }]
        }]
      }
    }"#;

    #[test]
    fn test_parse_dump() {
        let archive = parse(DUMP).unwrap();
        let root = archive.root_folder().unwrap();
        let folders = root.sub_folders().unwrap();
        let messages = folders[0].messages().unwrap();
        let message = &messages[0];

        assert_eq!(message.identifier(), 100);
        assert_eq!(message.plain_text_body().unwrap().unwrap(), b"hi");
        assert_eq!(message.properties[0].tag, PR_SENDER_EMAIL_ADDRESS);
        assert_eq!(message.properties[0].value_type, ValueType::Unicode);
        assert_eq!(message.properties[1].data, vec![32, 0, 0, 0]);

        let attachment = message.attachment(0).unwrap();
        assert_eq!(attachment.read_payload().unwrap(), b"payload");
        assert_eq!(attachment.alternate_name().unwrap().as_deref(), Some("x.txt"));
    }

    #[test]
    fn test_string8_text_is_windows_1252() {
        assert_eq!(encode_text("café", ValueType::String8), b"caf\xe9\0");
    }

    #[test]
    fn test_invalid_json_is_open_error() {
        assert!(matches!(parse("{ not json"), Err(ArchiveError::Open(_))));
    }

    #[test]
    fn test_invalid_base64_is_corrupt() {
        let dump = r#"{"root":{"id":1,"messages":[{"id":2,"plain_body":{"base64":"!!"}}]}}"#;
        assert!(matches!(parse(dump), Err(ArchiveError::Corrupt(_))));
    }
}

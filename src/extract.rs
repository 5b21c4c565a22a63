//! Build the normalized record for one message.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, warn};

use crate::archive::{ArchiveMessage, ArchiveResult};
use crate::context::ExtractContext;
use crate::error::{ArchiveError, HarvestError, Result};
use crate::model::mail::EmailRecord;
use crate::model::property::LogicalProperty;
use crate::parser::header::{self, HeaderMap};
use crate::parser::{encoding, rtf};
use crate::resolve::address::{resolve_sender, AddressHints};
use crate::resolve::classify::classify;
use crate::resolve::property::get_property;

/// Rendering of `email_time` and `local_time`.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Attachment folder for messages without any delivery time.
pub const UNDATED_FOLDER: &str = "undated";

/// Build the record for a mail item found under `folder_path`.
///
/// Attachments are written to disk as a side effect. Only an unreadable body
/// fails the record. Other accessor failures fall back to property entries
/// or empty values, and a failing attachment count yields no attachments
/// and a note.
pub fn build_record<M: ArchiveMessage + ?Sized>(
    message: &M,
    folder_path: &str,
    ctx: &ExtractContext,
) -> Result<EmailRecord> {
    let email_id = message.identifier().to_string();
    let processing_error = |e: ArchiveError| HarvestError::MessageProcessing {
        email_id: email_id.clone(),
        reason: e.to_string(),
    };

    let raw_headers = degrade(message.transport_headers(), &email_id, "transport headers");
    let headers = raw_headers
        .as_deref()
        .map(HeaderMap::parse)
        .unwrap_or_default();

    let subject = degrade(message.subject(), &email_id, "subject")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| get_property(message, LogicalProperty::Subject))
        .unwrap_or_default();

    let sender_name = degrade(message.sender_name(), &email_id, "sender name")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| get_property(message, LogicalProperty::SenderName))
        .unwrap_or_default();
    let from_name =
        get_property(message, LogicalProperty::FromName).unwrap_or_else(|| sender_name.clone());

    let (sender_address, from_address) = resolve_sender(
        message,
        AddressHints {
            headers: &headers,
            fallback_domain: ctx.fallback_domain.as_deref(),
        },
    );

    let (to_recipients, cc_recipients) = recipients(message, raw_headers.as_deref());

    let delivered = degrade(message.delivery_time(), &email_id, "delivery time")
        .or_else(|| header::header_date(&headers));
    let (email_time, local_time) = render_times(delivered, ctx.utc_offset);

    let content = resolve_body(message).map_err(processing_error)?;
    let kind = classify(message, folder_path, &ctx.sent_folders);

    let save_folder = attachment_folder(delivered, ctx.utc_offset);
    let (attachments, note) = match message.attachment_count() {
        Ok(count) => (
            ctx.materializer
                .extract(message, &save_folder, &email_id, count),
            None,
        ),
        Err(e) => {
            let error = HarvestError::AttachmentCount {
                email_id: email_id.clone(),
                reason: e.to_string(),
            };
            warn!(email_id = %email_id, error = %error, "Recording message without attachments");
            (Vec::new(), Some(error.to_string()))
        }
    };

    Ok(EmailRecord {
        email_id,
        subject,
        sender_name,
        sender_address,
        from_name,
        from_address,
        to_recipients,
        cc_recipients,
        email_time,
        local_time,
        content,
        kind,
        folder_path: folder_path.to_string(),
        attachments,
        note,
    })
}

/// An accessor failure is treated as an absent value.
fn degrade<T>(value: ArchiveResult<Option<T>>, email_id: &str, field: &str) -> Option<T> {
    value.unwrap_or_else(|e| {
        debug!(email_id, field, error = %e, "Accessor failed, using fallback");
        None
    })
}

/// To/Cc from the transport headers, else from the display properties.
fn recipients<M: ArchiveMessage + ?Sized>(message: &M, raw_headers: Option<&[u8]>) -> (String, String) {
    let (to, cc) = raw_headers
        .map(header::parse_recipients)
        .unwrap_or_default();
    let to = if to.is_empty() {
        get_property(message, LogicalProperty::DisplayTo).unwrap_or_default()
    } else {
        to
    };
    let cc = if cc.is_empty() {
        get_property(message, LogicalProperty::DisplayCc).unwrap_or_default()
    } else {
        cc
    };
    (to, cc)
}

/// Body text: plain, else HTML, else RTF converted to text. Blank variants
/// fall through to the next one.
fn resolve_body<M: ArchiveMessage + ?Sized>(message: &M) -> ArchiveResult<String> {
    if let Some(text) = message.plain_text_body()?.map(|b| decode_body(&b)) {
        if !text.trim().is_empty() {
            return Ok(text);
        }
    }
    if let Some(text) = message.html_body()?.map(|b| decode_body(&b)) {
        if !text.trim().is_empty() {
            return Ok(text);
        }
    }
    if let Some(text) = message.rtf_body()?.map(|b| rtf::rtf_to_text(&decode_body(&b))) {
        if !text.trim().is_empty() {
            return Ok(text);
        }
    }
    Ok(String::new())
}

fn decode_body(bytes: &[u8]) -> String {
    let text = encoding::decode(bytes);
    text.trim_end_matches('\0').to_string()
}

/// `(email_time, local_time)`: UTC and the configured offset, or empty.
pub fn render_times(delivered: Option<DateTime<Utc>>, offset: FixedOffset) -> (String, String) {
    match delivered {
        Some(at) => (
            at.format(TIME_FORMAT).to_string(),
            at.with_timezone(&offset).format(TIME_FORMAT).to_string(),
        ),
        None => (String::new(), String::new()),
    }
}

/// Attachment folder relative to the attachment base: the local delivery
/// date, or [`UNDATED_FOLDER`].
pub fn attachment_folder(delivered: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    delivered
        .map(|at| at.with_timezone(&offset).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNDATED_FOLDER.to_string())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use chrono::TimeZone;

    use super::*;
    use crate::archive::memory::{MemoryAttachment, MemoryMessage};
    use crate::model::mail::MessageKind;
    use crate::model::property::{
        PropertyEntry, PR_DISPLAY_CC, PR_DISPLAY_TO, PR_SENDER_EMAIL_ADDRESS,
        PR_SENT_REPRESENTING_NAME, PR_SUBJECT,
    };

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn context(dir: &std::path::Path) -> ExtractContext {
        ExtractContext::new(dir.join("mail.db"), dir.join("attachments"))
    }

    #[test]
    fn test_render_times_crosses_midnight() {
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 20, 15, 0).unwrap();
        assert_eq!(
            render_times(Some(at), kst()),
            (
                "2024-02-29 20:15:00".to_string(),
                "2024-03-01 05:15:00".to_string()
            )
        );
        assert_eq!(attachment_folder(Some(at), kst()), "2024-03-01");
        assert_eq!(attachment_folder(None, kst()), "undated");
    }

    #[test]
    fn test_build_record_fields() {
        let dir = tempfile::tempdir().unwrap();
        let message = Rc::new(
            MemoryMessage::new(42)
                .subject("Budget")
                .sender_name("Alice")
                .message_class("IPM.Note")
                .property(PropertyEntry::unicode(PR_SENDER_EMAIL_ADDRESS, "alice@example.com"))
                .property(PropertyEntry::unicode(PR_SENT_REPRESENTING_NAME, "Alice Manager"))
                .transport_headers(&b"To: Bob <bob@example.com>\r\nCc: Carol <carol@example.com>\r\n"[..])
                .plain_body(&b"   "[..])
                .html_body(&b"<p>numbers</p>"[..])
                .delivered(Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap())
                .attachment(MemoryAttachment::named("q1.xlsx", b"xl".to_vec())),
        );

        let record = build_record(&message, "Inbox", &context(dir.path())).unwrap();
        assert_eq!(record.email_id, "42");
        assert_eq!(record.subject, "Budget");
        assert_eq!(record.sender_name, "Alice");
        assert_eq!(record.from_name, "Alice Manager");
        assert_eq!(record.from_address, "alice@example.com");
        assert_eq!(record.to_recipients, "Bob <bob@example.com>");
        assert_eq!(record.cc_recipients, "Carol <carol@example.com>");
        assert_eq!(record.email_time, "2024-03-01 00:30:00");
        assert_eq!(record.local_time, "2024-03-01 09:30:00");
        assert_eq!(record.content, "<p>numbers</p>");
        assert_eq!(record.kind, MessageKind::Receive);
        assert_eq!(record.attachments.len(), 1);
        assert_eq!(record.attachments[0].save_folder, "2024-03-01");
        assert!(record.note.is_none());
    }

    #[test]
    fn test_display_properties_and_header_date_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let message = Rc::new(
            MemoryMessage::new(7)
                .property(PropertyEntry::unicode(PR_DISPLAY_TO, "Bob Smith"))
                .property(PropertyEntry::unicode(PR_DISPLAY_CC, "Carol"))
                .transport_headers(&b"Subject: hi\r\nDate: Fri, 01 Mar 2024 10:00:00 +0000\r\n"[..])
                .rtf_body(&br"{\rtf1\ansi Hello\par there}"[..]),
        );

        let record = build_record(&message, "", &context(dir.path())).unwrap();
        assert_eq!(record.to_recipients, "Bob Smith");
        assert_eq!(record.cc_recipients, "Carol");
        assert_eq!(record.email_time, "2024-03-01 10:00:00");
        assert_eq!(record.local_time, "2024-03-01 19:00:00");
        assert_eq!(record.content, "Hello\nthere");
        assert_eq!(record.sender_address, "");
    }

    #[test]
    fn test_attachment_count_failure_sets_note() {
        let dir = tempfile::tempdir().unwrap();
        let message = Rc::new(
            MemoryMessage::new(9)
                .plain_body(&b"still here"[..])
                .attachment(MemoryAttachment::named("lost.doc", b"x".to_vec()))
                .fail_attachment_count("attachment table damaged"),
        );

        let record = build_record(&message, "Inbox", &context(dir.path())).unwrap();
        assert!(record.attachments.is_empty());
        let note = record.note.unwrap();
        assert!(note.contains("attachment table damaged"));
        assert_eq!(record.content, "still here");
    }

    #[test]
    fn test_accessor_failures_keep_record() {
        let dir = tempfile::tempdir().unwrap();
        let message = Rc::new(
            MemoryMessage::new(7)
                .subject("lost")
                .sender_name("Kim")
                .plain_body(&b"hi"[..])
                .delivered(Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap())
                .attachment(MemoryAttachment::named("a.txt", b"a".to_vec()))
                .fail_subject("subject block")
                .fail_sender_name("name block")
                .fail_delivery_time("time block")
                .fail_headers("header block"),
        );

        let record = build_record(&message, "Inbox", &context(dir.path())).unwrap();
        assert_eq!(record.subject, "");
        assert_eq!(record.sender_name, "");
        assert_eq!(record.email_time, "");
        assert_eq!(record.local_time, "");
        assert_eq!(record.content, "hi");
        assert_eq!(record.attachments[0].save_folder, "undated");
        assert!(record.note.is_none());
    }

    #[test]
    fn test_failed_accessor_falls_back_to_properties() {
        let dir = tempfile::tempdir().unwrap();
        let message = Rc::new(
            MemoryMessage::new(8)
                .property(PropertyEntry::unicode(PR_SUBJECT, "From entries"))
                .transport_headers(&b"Date: Fri, 01 Mar 2024 10:00:00 +0000\r\n"[..])
                .fail_subject("subject block")
                .fail_delivery_time("time block"),
        );

        let record = build_record(&message, "Inbox", &context(dir.path())).unwrap();
        assert_eq!(record.subject, "From entries");
        assert_eq!(record.email_time, "2024-03-01 10:00:00");
    }

    #[test]
    fn test_body_failure_is_processing_error() {
        let dir = tempfile::tempdir().unwrap();
        let message = Rc::new(MemoryMessage::new(3).fail_body("bad block"));
        let err = build_record(&message, "Inbox", &context(dir.path())).unwrap_err();
        assert!(matches!(err, HarvestError::MessageProcessing { ref email_id, .. } if email_id == "3"));
    }
}

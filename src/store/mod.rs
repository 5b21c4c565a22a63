//! SQLite persistence of normalized records.
//!
//! Every batch opens its own connection and runs inside one transaction:
//! either all emails and attachments of the batch are committed or none.

pub mod schema;

use std::path::Path;

use rusqlite::{params, Connection, Transaction};
use tracing::debug;

use crate::error::{HarvestError, Result};
use crate::model::mail::EmailRecord;

/// Open a connection with foreign keys enforced, creating the parent
/// directory if needed.
pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
    }

    let conn = Connection::open(path)
        .map_err(|e| HarvestError::persistence(format!("open {}", path.display()), e))?;
    conn.execute("PRAGMA foreign_keys = ON", [])
        .map_err(|e| HarvestError::persistence("enable foreign keys", e))?;
    Ok(conn)
}

/// Create the tables if missing. Refuses a database written by a newer
/// layout.
pub fn ensure_schema(path: &Path) -> Result<()> {
    let conn = open(path)?;
    schema::create_schema(&conn)
}

/// Persist a batch atomically and return the number of emails committed.
///
/// On any storage error the transaction is rolled back and the error is
/// returned; no row of the batch is left behind.
pub fn save_batch(path: &Path, records: &[EmailRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut conn = open(path)?;
    let tx = conn
        .transaction()
        .map_err(|e| HarvestError::persistence("begin transaction", e))?;

    for record in records {
        insert_record(&tx, record).map_err(|e| {
            HarvestError::persistence(format!("insert email {}", record.email_id), e)
        })?;
    }

    tx.commit()
        .map_err(|e| HarvestError::persistence("commit batch", e))?;
    debug!(count = records.len(), "Committed batch");
    Ok(records.len())
}

fn insert_record(tx: &Transaction<'_>, record: &EmailRecord) -> rusqlite::Result<()> {
    tx.execute(
        r#"
        INSERT INTO emails (
            email_id, subject, sender_address, sender_name, from_address, from_name,
            to_recipients, cc_recipients, email_time, local_time, content,
            msg_kind, folder_path, note
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
        params![
            record.email_id,
            record.subject,
            record.sender_address,
            record.sender_name,
            record.from_address,
            record.from_name,
            record.to_recipients,
            record.cc_recipients,
            record.email_time,
            record.local_time,
            record.content,
            record.kind.as_str(),
            record.folder_path,
            record.note,
        ],
    )?;
    let parent_id = tx.last_insert_rowid();

    let mut stmt = tx.prepare_cached(
        r#"
        INSERT INTO email_attachments (
            parent_id, email_id, save_folder, org_file_name, phy_file_name, file_size
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )?;
    for attachment in &record.attachments {
        stmt.execute(params![
            parent_id,
            attachment.email_id,
            attachment.save_folder,
            attachment.original_filename,
            attachment.physical_filename,
            attachment.size as i64,
        ])?;
    }

    Ok(())
}

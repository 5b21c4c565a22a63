//! Table layout of the harvest database.
//!
//! The layout is created idempotently. Its version is stamped into `meta`
//! so that a database written by a newer layout is refused instead of
//! being appended to.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{HarvestError, Result};

/// Version stamped into `meta.schema_version`.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_KEY: &str = "schema_version";

const TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );

    CREATE TABLE IF NOT EXISTS emails (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email_id TEXT NOT NULL,
        subject TEXT,
        sender_address TEXT,
        sender_name TEXT,
        from_address TEXT,
        from_name TEXT,
        to_recipients TEXT,
        cc_recipients TEXT,
        email_time TEXT,
        local_time TEXT,
        content TEXT,
        msg_kind TEXT NOT NULL CHECK(msg_kind IN ('sent', 'receive')),
        folder_path TEXT,
        note TEXT
    );

    CREATE TABLE IF NOT EXISTS email_attachments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parent_id INTEGER NOT NULL REFERENCES emails(id) ON DELETE CASCADE,
        email_id TEXT NOT NULL,
        save_folder TEXT,
        org_file_name TEXT,
        phy_file_name TEXT,
        file_size INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_emails_email_id ON emails(email_id);
    CREATE INDEX IF NOT EXISTS idx_emails_local_time ON emails(local_time);
    CREATE INDEX IF NOT EXISTS idx_email_attachments_parent ON email_attachments(parent_id);
"#;

/// Create the tables if missing and stamp the version on a fresh database.
///
/// Fails with [`HarvestError::Config`] when the database carries a version
/// this build does not know.
pub fn create_schema(conn: &Connection) -> Result<()> {
    let stored = stored_version(conn)?;
    if let Some(version) = stored.filter(|v| *v > SCHEMA_VERSION) {
        return Err(HarvestError::Config(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    conn.execute_batch(TABLES)
        .map_err(|e| HarvestError::persistence("create tables", e))?;
    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES (?1, ?2)",
        params![SCHEMA_VERSION_KEY, SCHEMA_VERSION.to_string()],
    )
    .map_err(|e| HarvestError::persistence("stamp schema version", e))?;
    Ok(())
}

/// Version recorded in `meta`, or `None` for a database without one.
pub fn stored_version(conn: &Connection) -> Result<Option<u32>> {
    let has_meta: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'meta')",
            [],
            |row| row.get(0),
        )
        .map_err(|e| HarvestError::persistence("inspect database", e))?;
    if !has_meta {
        return Ok(None);
    }

    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![SCHEMA_VERSION_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| HarvestError::persistence("read schema version", e))?;

    raw.map(|v| {
        v.parse::<u32>()
            .map_err(|_| HarvestError::Config(format!("invalid schema version in database: {v}")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_is_stamped() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(stored_version(&conn).unwrap(), None);

        create_schema(&conn).unwrap();
        assert_eq!(stored_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("harvest.db")).unwrap();

        create_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO emails (email_id, msg_kind) VALUES ('1', 'sent')",
            [],
        )
        .unwrap();
        create_schema(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM emails", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(stored_version(&conn).unwrap(), Some(1));
    }

    #[test]
    fn test_newer_database_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute("UPDATE meta SET value = '99' WHERE key = 'schema_version'", [])
            .unwrap();

        assert!(matches!(create_schema(&conn), Err(HarvestError::Config(_))));
    }
}

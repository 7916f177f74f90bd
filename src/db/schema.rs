//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Conversation threads, one active per sender at a time
        CREATE TABLE IF NOT EXISTS threads (
            id TEXT PRIMARY KEY,
            sender_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_threads_sender ON threads(sender_id);
        CREATE INDEX IF NOT EXISTS idx_threads_updated ON threads(updated_at);

        -- Stored attachments
        CREATE TABLE IF NOT EXISTS media (
            id TEXT PRIMARY KEY,
            location TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('image', 'pdf', 'document')),
            summary TEXT,
            sender_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_media_sender ON media(sender_id);

        -- Conversation turns; content and media_id are never both absent
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            thread_id TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK(role IN ('user', 'bot', 'system')),
            content TEXT,
            media_id TEXT REFERENCES media(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK(content IS NOT NULL OR media_id IS NOT NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::debug!("applied schema migration v1");
    Ok(())
}

//! Thread repository for conversation lifecycle operations

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// One ongoing dialogue for a sender
#[derive(Debug, Clone)]
pub struct Thread {
    pub id: String,
    pub sender_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Thread repository
#[derive(Clone)]
pub struct ThreadRepo {
    pool: DbPool,
}

impl ThreadRepo {
    /// Create a new thread repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find the sender's active thread (most recently updated), if any
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_active(&self, sender_id: &str) -> Result<Option<Thread>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        // `.optional()` keeps "no thread" distinct from a failing
        // database, which must surface as an error, not a miss
        let thread = conn
            .query_row(
                "SELECT id, sender_id, created_at, updated_at
                 FROM threads WHERE sender_id = ?1
                 ORDER BY updated_at DESC, rowid DESC LIMIT 1",
                [sender_id],
                row_to_thread,
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(thread)
    }

    /// Create a new thread for a sender
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(&self, sender_id: &str) -> Result<Thread> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO threads (id, sender_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            [&id, sender_id, &now_str],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(sender = sender_id, thread = %id, "created thread");

        Ok(Thread {
            id,
            sender_id: sender_id.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Delete all threads owned by a sender, cascading to their
    /// messages. Returns the number of threads deleted.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete_for_sender(&self, sender_id: &str) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let deleted = conn
            .execute("DELETE FROM threads WHERE sender_id = ?1", [sender_id])
            .map_err(|e| Error::Database(e.to_string()))?;

        tracing::info!(sender = sender_id, deleted, "deleted sender threads");
        Ok(deleted)
    }

    /// Delete threads whose last activity is older than `cutoff`,
    /// cascading to their messages. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let deleted = conn
            .execute(
                "DELETE FROM threads WHERE updated_at < ?1",
                [cutoff.to_rfc3339()],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(deleted)
    }

    /// Count threads owned by a sender
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_for_sender(&self, sender_id: &str) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM threads WHERE sender_id = ?1",
                [sender_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn row_to_thread(row: &rusqlite::Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        created_at: super::message::parse_datetime(&row.get::<_, String>(2)?),
        updated_at: super::message::parse_datetime(&row.get::<_, String>(3)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> ThreadRepo {
        ThreadRepo::new(init_memory().unwrap())
    }

    #[test]
    fn find_active_on_fresh_sender_is_none() {
        let repo = setup();
        assert!(repo.find_active("628123").unwrap().is_none());
    }

    #[test]
    fn find_active_surfaces_database_errors() {
        let pool = init_memory().unwrap();
        let repo = ThreadRepo::new(pool.clone());

        pool.get()
            .unwrap()
            .execute_batch("DROP TABLE messages; DROP TABLE threads;")
            .unwrap();

        let err = repo.find_active("628123").unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[test]
    fn create_then_find_active() {
        let repo = setup();
        let created = repo.create("628123").unwrap();

        let found = repo.find_active("628123").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.sender_id, "628123");
    }

    #[test]
    fn newest_thread_is_active() {
        let repo = setup();
        let _older = repo.create("628123").unwrap();
        let newer = repo.create("628123").unwrap();

        // Same-second timestamps fall back to insertion order
        let active = repo.find_active("628123").unwrap().unwrap();
        assert_eq!(active.id, newer.id);
    }

    #[test]
    fn delete_for_sender_removes_all() {
        let repo = setup();
        repo.create("628123").unwrap();
        repo.create("628123").unwrap();
        repo.create("628999").unwrap();

        let deleted = repo.delete_for_sender("628123").unwrap();
        assert_eq!(deleted, 2);
        assert!(repo.find_active("628123").unwrap().is_none());
        assert!(repo.find_active("628999").unwrap().is_some());
    }

    #[test]
    fn new_thread_after_delete_has_distinct_id() {
        let repo = setup();
        let first = repo.create("628123").unwrap();
        repo.delete_for_sender("628123").unwrap();
        let second = repo.create("628123").unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn delete_older_than_respects_cutoff() {
        let repo = setup();
        repo.create("628123").unwrap();

        // Cutoff in the past deletes nothing
        let past = Utc::now() - chrono::Duration::days(1);
        assert_eq!(repo.delete_older_than(past).unwrap(), 0);

        // Cutoff in the future deletes the fresh thread
        let future = Utc::now() + chrono::Duration::days(1);
        assert_eq!(repo.delete_older_than(future).unwrap(), 1);
    }
}

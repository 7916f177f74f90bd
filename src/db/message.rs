//! Message repository for conversation turns
//!
//! Turns are appended in user/bot pairs inside a single transaction so
//! a persistence failure can never leave half an exchange behind.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// One turn in a thread. Content and media reference are never both
/// absent (enforced by a schema CHECK as well).
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub role: MessageRole,
    pub content: Option<String>,
    pub media_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Bot,
    System,
}

impl MessageRole {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
            Self::System => "system",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "bot" => Some(Self::Bot),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// The user half of an exchange about to be recorded
#[derive(Debug, Clone, Default)]
pub struct UserTurn {
    /// Text the sender wrote (caption or question)
    pub content: Option<String>,

    /// Stored media record referenced by this turn
    pub media_id: Option<String>,
}

impl UserTurn {
    /// A text-only user turn
    #[must_use]
    pub fn text(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            media_id: None,
        }
    }

    /// A user turn carrying a media reference and optional caption
    #[must_use]
    pub fn with_media(content: Option<&str>, media_id: &str) -> Self {
        Self {
            content: content.map(ToString::to_string),
            media_id: Some(media_id.to_string()),
        }
    }
}

/// Message repository
#[derive(Clone)]
pub struct MessageRepo {
    pool: DbPool,
}

impl MessageRepo {
    /// Create a new message repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a user turn and the generated bot turn as one atomic
    /// write, touching the thread's last-activity timestamp in the
    /// same transaction. User turn is inserted first.
    ///
    /// # Errors
    ///
    /// Returns error if the turn pair cannot be written; on error
    /// neither turn is persisted
    pub fn append_exchange(
        &self,
        thread_id: &str,
        user_turn: &UserTurn,
        bot_text: &str,
    ) -> Result<(Message, Message)> {
        if user_turn.content.is_none() && user_turn.media_id.is_none() {
            return Err(Error::Validation(
                "user turn needs text or a media reference".to_string(),
            ));
        }

        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let user_id = Uuid::new_v4().to_string();
        let bot_id = Uuid::new_v4().to_string();

        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO messages (id, thread_id, role, content, media_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                &user_id,
                thread_id,
                MessageRole::User.as_str(),
                user_turn.content.as_deref(),
                user_turn.media_id.as_deref(),
                &now_str,
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO messages (id, thread_id, role, content, media_id, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            rusqlite::params![
                &bot_id,
                thread_id,
                MessageRole::Bot.as_str(),
                bot_text,
                &now_str,
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tx.execute(
            "UPDATE threads SET updated_at = ?1 WHERE id = ?2",
            [&now_str, thread_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;

        let user_msg = Message {
            id: user_id,
            thread_id: thread_id.to_string(),
            role: MessageRole::User,
            content: user_turn.content.clone(),
            media_id: user_turn.media_id.clone(),
            created_at: now,
        };
        let bot_msg = Message {
            id: bot_id,
            thread_id: thread_id.to_string(),
            role: MessageRole::Bot,
            content: Some(bot_text.to_string()),
            media_id: None,
            created_at: now,
        };

        Ok((user_msg, bot_msg))
    }

    /// Get the most recent messages of a thread, oldest-to-newest
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_recent(&self, thread_id: &str, limit: usize) -> Result<Vec<Message>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, thread_id, role, content, media_id, created_at
                 FROM messages WHERE thread_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        #[allow(clippy::cast_possible_wrap)]
        let messages: Vec<Message> = stmt
            .query_map(rusqlite::params![thread_id, limit as i64], row_to_message)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        // Reverse to chronological order
        Ok(messages.into_iter().rev().collect())
    }

    /// Count messages in a thread
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_for_thread(&self, thread_id: &str) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM messages WHERE thread_id = ?1",
                [thread_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Count messages across all threads owned by a sender
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
                "SELECT COUNT(*) FROM messages m
                 JOIN threads t ON t.id = m.thread_id
                 WHERE t.sender_id = ?1",
                [sender_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        role: MessageRole::from_str(&row.get::<_, String>(2)?).unwrap_or(MessageRole::User),
        content: row.get(3)?,
        media_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

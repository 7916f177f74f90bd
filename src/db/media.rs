//! Media repository for stored attachments

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// Kind of a stored attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
    Document,
}

impl MediaKind {
    /// Determine media kind from MIME type
    #[must_use]
    pub fn from_mime(mime_type: &str) -> Self {
        let lower = mime_type.to_lowercase();
        if lower.starts_with("image/") {
            Self::Image
        } else if lower == "application/pdf" {
            Self::Pdf
        } else {
            Self::Document
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Document => "document",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "pdf" => Some(Self::Pdf),
            "document" => Some(Self::Document),
            _ => None,
        }
    }
}

/// A stored attachment
#[derive(Debug, Clone)]
pub struct MediaRecord {
    pub id: String,
    /// Filesystem location of the stored payload
    pub location: String,
    pub kind: MediaKind,
    /// AI-generated summary, if one was produced
    pub summary: Option<String>,
    pub sender_id: String,
    pub created_at: DateTime<Utc>,
}

/// Media repository
#[derive(Clone)]
pub struct MediaRepo {
    pool: DbPool,
}

impl MediaRepo {
    /// Create a new media repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a durably stored attachment
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert(
        &self,
        location: &str,
        kind: MediaKind,
        summary: Option<&str>,
        sender_id: &str,
    ) -> Result<MediaRecord> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO media (id, location, kind, summary, sender_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                &id,
                location,
                kind.as_str(),
                summary,
                sender_id,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(MediaRecord {
            id,
            location: location.to_string(),
            kind,
            summary: summary.map(ToString::to_string),
            sender_id: sender_id.to_string(),
            created_at: now,
        })
    }

    /// Look up a stored attachment by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, id: &str) -> Result<Option<MediaRecord>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let record = conn
            .query_row(
                "SELECT id, location, kind, summary, sender_id, created_at
                 FROM media WHERE id = ?1",
                [id],
                |row| {
                    Ok(MediaRecord {
                        id: row.get(0)?,
                        location: row.get(1)?,
                        kind: MediaKind::from_str(&row.get::<_, String>(2)?)
                            .unwrap_or(MediaKind::Document),
                        summary: row.get(3)?,
                        sender_id: row.get(4)?,
                        created_at: super::message::parse_datetime(&row.get::<_, String>(5)?),
                    })
                },
            )
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(record)
    }

    /// List stored payload locations, used by maintenance to detect
    /// orphaned files
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_locations(&self) -> Result<Vec<String>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare("SELECT location FROM media")
            .map_err(|e| Error::Database(e.to_string()))?;

        let locations = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[test]
    fn kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/jpeg"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("IMAGE/PNG"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("application/pdf"), MediaKind::Pdf);
        assert_eq!(
            MediaKind::from_mime("application/vnd.ms-excel"),
            MediaKind::Document
        );
    }

    #[test]
    fn insert_and_find() {
        let repo = MediaRepo::new(init_memory().unwrap());

        let record = repo
            .insert("/data/media/abc.jpg", MediaKind::Image, None, "628123")
            .unwrap();

        let found = repo.find(&record.id).unwrap().unwrap();
        assert_eq!(found.location, "/data/media/abc.jpg");
        assert_eq!(found.kind, MediaKind::Image);
        assert!(found.summary.is_none());
        assert_eq!(found.sender_id, "628123");
    }

    #[test]
    fn summary_round_trips() {
        let repo = MediaRepo::new(init_memory().unwrap());

        let record = repo
            .insert(
                "/data/media/doc.pdf",
                MediaKind::Pdf,
                Some("A chemistry worksheet"),
                "628123",
            )
            .unwrap();

        let found = repo.find(&record.id).unwrap().unwrap();
        assert_eq!(found.summary.as_deref(), Some("A chemistry worksheet"));
    }

    #[test]
    fn list_locations_returns_all() {
        let repo = MediaRepo::new(init_memory().unwrap());
        repo.insert("/m/a", MediaKind::Image, None, "s1").unwrap();
        repo.insert("/m/b", MediaKind::Document, None, "s2").unwrap();

        let mut locations = repo.list_locations().unwrap();
        locations.sort();
        assert_eq!(locations, vec!["/m/a", "/m/b"]);
    }
}

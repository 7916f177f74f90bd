//! Media ingestion
//!
//! The orchestrator hands raw attachment bytes to the [`MediaIngest`]
//! collaborator, which stores them durably and records a
//! [`MediaRecord`]. Content extraction beyond an optional summary
//! snippet is out of scope here.

use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::{MediaKind, MediaRecord, MediaRepo};
use crate::{Error, Result};

/// Raw attachment bytes with their declared content type
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl MediaPayload {
    /// Create a payload
    #[must_use]
    pub fn new(data: Vec<u8>, mime_type: &str) -> Self {
        Self {
            data,
            mime_type: mime_type.to_string(),
        }
    }
}

/// Stores attachment payloads and records them
#[async_trait]
pub trait MediaIngest: Send + Sync {
    /// Durably store a payload and return its record
    ///
    /// # Errors
    ///
    /// Returns error if storage or recording fails
    async fn ingest(
        &self,
        payload: &MediaPayload,
        filename: Option<&str>,
        sender_id: &str,
        summary: Option<&str>,
    ) -> Result<MediaRecord>;
}

/// Ingestor writing payloads under the gateway data directory
pub struct FileMediaIngestor {
    media_dir: PathBuf,
    repo: MediaRepo,
}

impl FileMediaIngestor {
    /// Create an ingestor storing files in `media_dir`
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(media_dir: PathBuf, repo: MediaRepo) -> Self {
        Self { media_dir, repo }
    }

    fn extension(filename: Option<&str>, mime_type: &str) -> &'static str {
        if let Some(ext) = filename.and_then(|f| f.rsplit_once('.').map(|(_, e)| e)) {
            match ext.to_lowercase().as_str() {
                "jpg" | "jpeg" => return "jpg",
                "png" => return "png",
                "webp" => return "webp",
                "pdf" => return "pdf",
                _ => {}
            }
        }
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "application/pdf" => "pdf",
            _ => "bin",
        }
    }
}

#[async_trait]
impl MediaIngest for FileMediaIngestor {
    async fn ingest(
        &self,
        payload: &MediaPayload,
        filename: Option<&str>,
        sender_id: &str,
        summary: Option<&str>,
    ) -> Result<MediaRecord> {
        if payload.data.is_empty() {
            return Err(Error::Media("empty attachment payload".to_string()));
        }

        tokio::fs::create_dir_all(&self.media_dir).await?;

        let ext = Self::extension(filename, &payload.mime_type);
        let path = self.media_dir.join(format!("{}.{ext}", Uuid::new_v4()));
        tokio::fs::write(&path, &payload.data).await?;

        let kind = MediaKind::from_mime(&payload.mime_type);
        let record = self
            .repo
            .insert(&path.to_string_lossy(), kind, summary, sender_id)?;

        tracing::debug!(
            media = %record.id,
            path = %path.display(),
            ?kind,
            "ingested attachment"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn ingestor(dir: &std::path::Path) -> FileMediaIngestor {
        FileMediaIngestor::new(dir.to_path_buf(), MediaRepo::new(init_memory().unwrap()))
    }

    #[tokio::test]
    async fn ingest_stores_file_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(dir.path());

        let payload = MediaPayload::new(vec![1, 2, 3], "image/jpeg");
        let record = ingestor
            .ingest(&payload, Some("photo.jpg"), "628123", None)
            .await
            .unwrap();

        assert_eq!(record.kind, MediaKind::Image);
        assert!(record.location.ends_with(".jpg"));
        let stored = std::fs::read(&record.location).unwrap();
        assert_eq!(stored, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn ingest_rejects_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(dir.path());

        let payload = MediaPayload::new(Vec::new(), "image/png");
        let err = ingestor.ingest(&payload, None, "628123", None).await.unwrap_err();
        assert!(matches!(err, Error::Media(_)));
    }

    #[tokio::test]
    async fn ingest_persists_summary() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(dir.path());

        let payload = MediaPayload::new(b"%PDF-1.4".to_vec(), "application/pdf");
        let record = ingestor
            .ingest(&payload, Some("sheet.pdf"), "628123", Some("a worksheet"))
            .await
            .unwrap();

        assert_eq!(record.kind, MediaKind::Pdf);
        assert_eq!(record.summary.as_deref(), Some("a worksheet"));
    }

    #[test]
    fn extension_prefers_filename() {
        assert_eq!(
            FileMediaIngestor::extension(Some("x.PNG"), "application/octet-stream"),
            "png"
        );
        assert_eq!(FileMediaIngestor::extension(None, "image/webp"), "webp");
        assert_eq!(FileMediaIngestor::extension(Some("notes.txt"), "text/plain"), "bin");
    }
}

//! Scheduled maintenance
//!
//! Periodically purges stale conversation threads, sweeps expired
//! staged attachments, and removes stored media files no record points
//! at. A failed run is logged and retried on the next tick; it never
//! takes the gateway down.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use crate::config::BotConfig;
use crate::db::{MediaRepo, ThreadRepo};
use crate::pending::PendingMediaStore;
use crate::Result;

/// Outcome of one maintenance pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Threads purged for inactivity (messages cascade with them)
    pub threads_purged: usize,

    /// Expired staged attachments swept
    pub pending_swept: usize,

    /// Orphaned media files removed from disk
    pub orphans_removed: usize,
}

/// Runs retention and cleanup passes
pub struct Maintenance {
    threads: ThreadRepo,
    media: MediaRepo,
    pending: Arc<PendingMediaStore>,
    media_dir: PathBuf,
    retention_days: i64,
    pending_ttl: std::time::Duration,
}

impl Maintenance {
    /// Create a maintenance runner
    #[must_use]
    pub fn new(
        threads: ThreadRepo,
        media: MediaRepo,
        pending: Arc<PendingMediaStore>,
        media_dir: PathBuf,
        bot: &BotConfig,
    ) -> Self {
        Self {
            threads,
            media,
            pending,
            media_dir,
            retention_days: bot.retention_days,
            pending_ttl: bot.pending_media_ttl,
        }
    }

    /// Run one full maintenance pass
    ///
    /// # Errors
    ///
    /// Returns error if thread purging or the media record listing
    /// fails; individual file removals are logged and skipped instead
    pub async fn run(&self) -> Result<MaintenanceReport> {
        let cutoff = Utc::now() - ChronoDuration::days(self.retention_days);
        let threads_purged = self.threads.delete_older_than(cutoff)?;

        let pending_swept = self.pending.sweep_expired(self.pending_ttl);

        let orphans_removed = self.remove_orphaned_files().await?;

        let report = MaintenanceReport {
            threads_purged,
            pending_swept,
            orphans_removed,
        };
        tracing::info!(
            threads = report.threads_purged,
            pending = report.pending_swept,
            orphans = report.orphans_removed,
            "maintenance pass completed"
        );
        Ok(report)
    }

    /// Delete files in the media directory that no media record
    /// references
    async fn remove_orphaned_files(&self) -> Result<usize> {
        if !self.media_dir.is_dir() {
            return Ok(0);
        }

        let referenced: HashSet<PathBuf> = self
            .media
            .list_locations()?
            .into_iter()
            .map(PathBuf::from)
            .collect();

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.media_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() || referenced.contains(&path) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed orphaned media file");
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove orphan");
                }
            }
        }

        Ok(removed)
    }
}

/// Run maintenance on a fixed interval until the task is aborted.
/// The first pass runs one full interval after startup.
pub async fn run_scheduled(maintenance: Maintenance, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = maintenance.run().await {
            tracing::error!(error = %e, "maintenance pass failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::db::{init_memory, MediaKind, MessageRepo, UserTurn};

    async fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    fn runner(
        pool: crate::db::DbPool,
        media_dir: &Path,
        pending: Arc<PendingMediaStore>,
    ) -> Maintenance {
        Maintenance::new(
            ThreadRepo::new(pool.clone()),
            MediaRepo::new(pool),
            pending,
            media_dir.to_path_buf(),
            &BotConfig::default(),
        )
    }

    #[tokio::test]
    async fn purges_only_stale_threads() {
        let pool = init_memory().unwrap();
        let threads = ThreadRepo::new(pool.clone());
        let messages = MessageRepo::new(pool.clone());

        let stale = threads.create("628123").unwrap();
        messages
            .append_exchange(&stale.id, &UserTurn::text("old"), "reply")
            .unwrap();
        // Backdate past the retention horizon
        pool.get()
            .unwrap()
            .execute(
                "UPDATE threads SET updated_at = ?1 WHERE id = ?2",
                [
                    &(Utc::now() - ChronoDuration::days(120)).to_rfc3339(),
                    &stale.id,
                ],
            )
            .unwrap();

        let fresh = threads.create("628999").unwrap();
        messages
            .append_exchange(&fresh.id, &UserTurn::text("new"), "reply")
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let report = runner(pool, dir.path(), Arc::new(PendingMediaStore::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(report.threads_purged, 1);
        assert!(threads.find_active("628123").unwrap().is_none());
        assert!(threads.find_active("628999").unwrap().is_some());
        // Cascade removed the stale thread's messages too
        assert_eq!(messages.count_for_sender("628123").unwrap(), 0);
        assert_eq!(messages.count_for_sender("628999").unwrap(), 2);
    }

    #[tokio::test]
    async fn sweeps_expired_pending_entries() {
        let pool = init_memory().unwrap();
        let pending = Arc::new(PendingMediaStore::new());

        let mut stale = crate::pending::PendingMedia::new(
            b"old".to_vec(),
            "image/jpeg".to_string(),
            None,
        );
        stale.staged_at = std::time::Instant::now() - std::time::Duration::from_secs(3600);
        pending.stage("stale", stale);
        pending.stage(
            "fresh",
            crate::pending::PendingMedia::new(b"new".to_vec(), "image/jpeg".to_string(), None),
        );

        let dir = tempfile::tempdir().unwrap();
        let report = runner(pool, dir.path(), Arc::clone(&pending)).run().await.unwrap();

        assert_eq!(report.pending_swept, 1);
        assert!(!pending.has("stale"));
        assert!(pending.has("fresh"));
    }

    #[tokio::test]
    async fn removes_only_orphaned_media_files() {
        let pool = init_memory().unwrap();
        let media = MediaRepo::new(pool.clone());
        let dir = tempfile::tempdir().unwrap();

        let kept = write_file(dir.path(), "kept.jpg", b"jpeg").await;
        let orphan = write_file(dir.path(), "orphan.jpg", b"jpeg").await;
        media
            .insert(&kept.to_string_lossy(), MediaKind::Image, None, "628123")
            .unwrap();

        let report = runner(pool, dir.path(), Arc::new(PendingMediaStore::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(report.orphans_removed, 1);
        assert!(kept.is_file());
        assert!(!orphan.exists());
    }

    #[tokio::test]
    async fn missing_media_dir_is_fine() {
        let pool = init_memory().unwrap();
        let report = runner(
            pool,
            Path::new("/nonexistent/wulang-media"),
            Arc::new(PendingMediaStore::new()),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(report, MaintenanceReport::default());
    }
}

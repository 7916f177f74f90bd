//! Pending-media staging store
//!
//! Holds at most one uploaded-but-unlabeled attachment per sender,
//! awaiting the follow-up caption. Entries are transient and never
//! persisted. Staging overwrites any previous entry (single slot,
//! last-write-wins); consuming is idempotent.
//!
//! The store is shared between the orchestrator and the maintenance
//! sweep, which run on a preemptive runtime, so state lives behind an
//! interior mutex keyed by sender.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A staged attachment awaiting its caption
#[derive(Debug, Clone)]
pub struct PendingMedia {
    /// Raw attachment bytes
    pub data: Vec<u8>,

    /// Original filename, if the transport supplied one
    pub filename: Option<String>,

    /// Declared content type
    pub mime_type: String,

    /// When the entry was staged
    pub staged_at: Instant,
}

impl PendingMedia {
    /// Create an entry staged now
    #[must_use]
    pub fn new(data: Vec<u8>, mime_type: String, filename: Option<String>) -> Self {
        Self {
            data,
            filename,
            mime_type,
            staged_at: Instant::now(),
        }
    }
}

/// Per-sender single-slot staging store
#[derive(Debug, Default)]
pub struct PendingMediaStore {
    entries: Mutex<HashMap<String, PendingMedia>>,
}

impl PendingMediaStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an attachment for a sender, replacing any existing entry
    pub fn stage(&self, sender_id: &str, entry: PendingMedia) {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if entries.insert(sender_id.to_string(), entry).is_some() {
            tracing::debug!(sender = sender_id, "replaced staged attachment");
        }
    }

    /// Whether a sender has a staged attachment
    #[must_use]
    pub fn has(&self, sender_id: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(sender_id)
    }

    /// Non-destructive read of a sender's staged attachment
    #[must_use]
    pub fn peek(&self, sender_id: &str) -> Option<PendingMedia> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(sender_id)
            .cloned()
    }

    /// Remove and return a sender's staged attachment.
    ///
    /// Idempotent: returns `None` when nothing is staged.
    #[must_use]
    pub fn consume(&self, sender_id: &str) -> Option<PendingMedia> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(sender_id)
    }

    /// Remove entries staged longer ago than `max_age`.
    ///
    /// Returns the number of entries removed. Called by maintenance,
    /// not by the per-message path.
    pub fn sweep_expired(&self, max_age: Duration) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.staged_at.elapsed() < max_age);
        before - entries.len()
    }

    /// Number of staged entries across all senders
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether no attachments are staged
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: &str) -> PendingMedia {
        PendingMedia::new(tag.as_bytes().to_vec(), "image/jpeg".to_string(), None)
    }

    #[test]
    fn stage_and_peek() {
        let store = PendingMediaStore::new();
        store.stage("628123", entry("photo"));

        assert!(store.has("628123"));
        let peeked = store.peek("628123").unwrap();
        assert_eq!(peeked.data, b"photo");
        // Peek is non-destructive
        assert!(store.has("628123"));
    }

    #[test]
    fn stage_overwrites_previous_entry() {
        let store = PendingMediaStore::new();
        store.stage("628123", entry("first"));
        store.stage("628123", entry("second"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.peek("628123").unwrap().data, b"second");
    }

    #[test]
    fn consume_removes_entry() {
        let store = PendingMediaStore::new();
        store.stage("628123", entry("photo"));

        let consumed = store.consume("628123").unwrap();
        assert_eq!(consumed.data, b"photo");
        assert!(!store.has("628123"));
    }

    #[test]
    fn consume_is_idempotent() {
        let store = PendingMediaStore::new();
        store.stage("628123", entry("photo"));

        assert!(store.consume("628123").is_some());
        assert!(store.consume("628123").is_none());
        assert!(store.consume("never-staged").is_none());
    }

    #[test]
    fn senders_have_independent_slots() {
        let store = PendingMediaStore::new();
        store.stage("sender-a", entry("a"));
        store.stage("sender-b", entry("b"));

        assert_eq!(store.len(), 2);
        assert!(store.consume("sender-a").is_some());
        assert!(store.has("sender-b"));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let store = PendingMediaStore::new();
        let mut old = entry("old");
        old.staged_at = Instant::now() - Duration::from_secs(3600);
        store.stage("stale", old);
        store.stage("fresh", entry("new"));

        let removed = store.sweep_expired(Duration::from_secs(1800));
        assert_eq!(removed, 1);
        assert!(!store.has("stale"));
        assert!(store.has("fresh"));
    }
}

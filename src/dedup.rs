//! Inbound message deduplication
//!
//! Gates every inbound event before any other processing: messages
//! from the bot's own account, group chats, and already-seen message
//! ids are dropped. The id cache is bounded FIFO — when it grows past
//! `MAX_ENTRIES` only the most recent `KEEP_ENTRIES` are retained. An
//! id evicted here and redelivered later will be reprocessed; that is
//! the accepted tradeoff of a bounded cache.

use std::collections::{HashSet, VecDeque};

/// Cache size that triggers a trim
const MAX_ENTRIES: usize = 1000;

/// Entries retained after a trim (most recent)
const KEEP_ENTRIES: usize = 500;

/// Deduplication filter for inbound messages
#[derive(Debug, Default)]
pub struct DedupFilter {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl DedupFilter {
    /// Create an empty filter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a message should be processed.
    ///
    /// Returns `false` for self-sent messages, group contexts, and
    /// duplicate ids. On acceptance the id is recorded in the cache.
    pub fn accept(&mut self, message_id: &str, is_from_self: bool, is_group: bool) -> bool {
        if is_from_self {
            tracing::trace!(message_id, "rejected: own message");
            return false;
        }
        if is_group {
            tracing::trace!(message_id, "rejected: group context");
            return false;
        }
        if self.seen.contains(message_id) {
            tracing::debug!(message_id, "rejected: duplicate");
            return false;
        }

        self.seen.insert(message_id.to_string());
        self.order.push_back(message_id.to_string());

        if self.order.len() > MAX_ENTRIES {
            self.trim();
        }

        true
    }

    /// Drop the oldest entries, keeping the most recent `KEEP_ENTRIES`
    fn trim(&mut self) {
        while self.order.len() > KEEP_ENTRIES {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        tracing::debug!(retained = self.order.len(), "trimmed dedup cache");
    }

    /// Number of ids currently tracked
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

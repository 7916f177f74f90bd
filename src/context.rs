//! Conversation context assembly
//!
//! Resolves the active thread for a sender and builds the bounded
//! history window handed to the AI responder. Older messages beyond
//! the window stay in storage for audit and maintenance but are never
//! sent to the responder.

use crate::db::{Message, MessageRepo, Thread, ThreadRepo, UserTurn};
use crate::Result;

/// Assembles per-sender conversation context
#[derive(Clone)]
pub struct ContextAssembler {
    threads: ThreadRepo,
    messages: MessageRepo,
    window_size: usize,
}

impl ContextAssembler {
    /// Create a new assembler with the given sliding-window size
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(threads: ThreadRepo, messages: MessageRepo, window_size: usize) -> Self {
        Self {
            threads,
            messages,
            window_size,
        }
    }

    /// Return the sender's active thread, creating one if none exists.
    /// Thread creation is the only path that establishes a new
    /// conversation id for a sender without one.
    ///
    /// # Errors
    ///
    /// Returns error if persistence is unavailable
    pub fn resolve_thread(&self, sender_id: &str) -> Result<Thread> {
        if let Some(thread) = self.threads.find_active(sender_id)? {
            return Ok(thread);
        }
        self.threads.create(sender_id)
    }

    /// Whether the sender already has any thread
    ///
    /// # Errors
    ///
    /// Returns error if persistence is unavailable
    pub fn has_thread(&self, sender_id: &str) -> Result<bool> {
        Ok(self.threads.find_active(sender_id)?.is_some())
    }

    /// Build the history window for a thread: the last `window_size`
    /// messages, oldest-to-newest
    ///
    /// # Errors
    ///
    /// Returns error if persistence is unavailable
    pub fn build_context(&self, thread_id: &str) -> Result<Vec<Message>> {
        self.messages.list_recent(thread_id, self.window_size)
    }

    /// Record a completed exchange: the inbound user turn and the
    /// generated bot turn, appended atomically in that order
    ///
    /// # Errors
    ///
    /// Returns error if the pair cannot be written; nothing is
    /// persisted on failure
    pub fn record_exchange(
        &self,
        thread_id: &str,
        user_turn: &UserTurn,
        bot_text: &str,
    ) -> Result<()> {
        self.messages.append_exchange(thread_id, user_turn, bot_text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup(window: usize) -> ContextAssembler {
        let pool = init_memory().unwrap();
        ContextAssembler::new(
            ThreadRepo::new(pool.clone()),
            MessageRepo::new(pool),
            window,
        )
    }

    #[test]
    fn resolve_creates_thread_for_new_sender() {
        let assembler = setup(10);
        assert!(!assembler.has_thread("628123").unwrap());

        let thread = assembler.resolve_thread("628123").unwrap();
        assert_eq!(thread.sender_id, "628123");
        assert!(assembler.has_thread("628123").unwrap());
    }

    #[test]
    fn resolve_reuses_active_thread() {
        let assembler = setup(10);
        let first = assembler.resolve_thread("628123").unwrap();
        let second = assembler.resolve_thread("628123").unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn context_is_empty_for_fresh_thread() {
        let assembler = setup(10);
        let thread = assembler.resolve_thread("628123").unwrap();
        assert!(assembler.build_context(&thread.id).unwrap().is_empty());
    }

    #[test]
    fn context_is_bounded_by_window() {
        let assembler = setup(4);
        let thread = assembler.resolve_thread("628123").unwrap();

        for i in 0..6 {
            assembler
                .record_exchange(&thread.id, &UserTurn::text(&format!("q{i}")), &format!("a{i}"))
                .unwrap();
        }

        let window = assembler.build_context(&thread.id).unwrap();
        assert_eq!(window.len(), 4);
        // Oldest-to-newest within the window
        assert_eq!(window[0].content.as_deref(), Some("q4"));
        assert_eq!(window[3].content.as_deref(), Some("a5"));
    }
}

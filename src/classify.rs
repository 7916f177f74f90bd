//! Command classification for inbound text
//!
//! Decides whether a message is a reset command, contains the
//! activation trigger, or is plain text. Pure functions, no side
//! effects.

/// Classification of an inbound text message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reset command: wipe the sender's conversation history
    Reset,
    /// Contains the activation trigger substring
    Trigger,
    /// Anything else
    Plain,
}

/// Classifies inbound text against the configured keywords
#[derive(Debug, Clone)]
pub struct Classifier {
    reset_keyword: String,
    trigger_keyword: String,
}

impl Classifier {
    /// Create a classifier. Keywords are matched case-insensitively;
    /// they are stored lower-cased.
    #[must_use]
    pub fn new(reset_keyword: &str, trigger_keyword: &str) -> Self {
        Self {
            reset_keyword: reset_keyword.to_lowercase(),
            trigger_keyword: trigger_keyword.to_lowercase(),
        }
    }

    /// Classify a message text.
    ///
    /// Reset matches when the trimmed, lower-cased text is exactly the
    /// reset keyword or the keyword followed by whitespace — a bare
    /// prefix like `"!resetme"` does not match. Trigger is a plain
    /// substring check anywhere in the text; matching inside longer
    /// words (e.g. `"wulanguage"`) is intentional.
    #[must_use]
    pub fn classify(&self, text: &str) -> Command {
        let normalized = text.trim().to_lowercase();

        if self.is_reset(&normalized) {
            return Command::Reset;
        }
        if normalized.contains(&self.trigger_keyword) {
            return Command::Trigger;
        }
        Command::Plain
    }

    fn is_reset(&self, normalized: &str) -> bool {
        if normalized == self.reset_keyword {
            return true;
        }
        normalized
            .strip_prefix(&self.reset_keyword)
            .is_some_and(|rest| rest.starts_with(char::is_whitespace))
    }
}

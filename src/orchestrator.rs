//! Conversation orchestration
//!
//! The top-level state machine processing one inbound message at a
//! time. Branches, in evaluation order: rejected (dedup), reset,
//! no-trigger plain, pending-media continuation, new bare attachment,
//! normal processing. Every error inside a branch is caught at this
//! boundary and converted to a fixed apology — the orchestrator never
//! returns an error to its caller.

use std::sync::Arc;

use crate::classify::{Classifier, Command};
use crate::context::ContextAssembler;
use crate::db::{ThreadRepo, UserTurn};
use crate::dedup::DedupFilter;
use crate::media::{MediaIngest, MediaPayload};
use crate::pending::{PendingMedia, PendingMediaStore};
use crate::responder::{ChatTurn, Responder};
use crate::transport::{InboundMessage, MediaFetcher};
use crate::Result;

/// Fixed user-facing apology for any failed turn
pub const APOLOGY: &str =
    "Maaf, lagi ada gangguan di sistem. Coba kirim pesanmu lagi sebentar lagi ya.";

/// Fixed instruction shown to first-time senders without the trigger
pub const TRIGGER_HINT: &str = "Halo! Aku Wulang, asisten belajarmu. \
     Sebut \"wulang\" di pesanmu untuk mulai bertanya, contohnya: \
     \"wulang, apa itu fotosintesis?\"";

/// Prompt asking for a caption after a bare attachment
pub const MEDIA_PROMPT: &str =
    "File kamu sudah kuterima. Mau ditanyakan apa tentang file ini?";

/// Maximum length of the reply snippet stored as a media summary
const SUMMARY_LEN: usize = 200;

/// Outcome of processing one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyDecision {
    /// Send this text back to the sender
    Reply(String),
    /// Stay silent
    Silent,
}

/// Per-message conversation orchestrator
pub struct Orchestrator {
    classifier: Classifier,
    dedup: DedupFilter,
    pending: Arc<PendingMediaStore>,
    assembler: ContextAssembler,
    threads: ThreadRepo,
    responder: Arc<dyn Responder>,
    ingestor: Arc<dyn MediaIngest>,
    fetcher: Arc<dyn MediaFetcher>,
}

impl Orchestrator {
    /// Wire an orchestrator from its collaborators
    #[must_use]
    pub fn new(
        classifier: Classifier,
        pending: Arc<PendingMediaStore>,
        assembler: ContextAssembler,
        threads: ThreadRepo,
        responder: Arc<dyn Responder>,
        ingestor: Arc<dyn MediaIngest>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Self {
        Self {
            classifier,
            dedup: DedupFilter::new(),
            pending,
            assembler,
            threads,
            responder,
            ingestor,
            fetcher,
        }
    }

    /// Process one inbound message to a respond-or-silent decision.
    /// Never fails: collaborator errors become the fixed apology.
    pub async fn handle(&mut self, msg: &InboundMessage) -> ReplyDecision {
        if msg.sender_id.is_empty() {
            tracing::warn!(message_id = %msg.id, "dropping message with empty sender id");
            return ReplyDecision::Silent;
        }

        // Branch 1: rejected
        if !self.dedup.accept(&msg.id, msg.is_from_self, msg.is_group) {
            return ReplyDecision::Silent;
        }

        match self.process(msg).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(
                    sender = %msg.sender_id,
                    message_id = %msg.id,
                    error = %e,
                    "turn failed"
                );
                ReplyDecision::Reply(APOLOGY.to_string())
            }
        }
    }

    async fn process(&self, msg: &InboundMessage) -> Result<ReplyDecision> {
        let sender = msg.sender_id.as_str();
        let text = msg.text.trim();

        let command = self.classifier.classify(text);

        // Branch 2: reset
        if command == Command::Reset {
            return self.handle_reset(sender);
        }

        let has_pending = self.pending.has(sender);

        // Branch 3: plain text from a sender with no history and no
        // staged media — point them at the trigger, write nothing
        if command == Command::Plain
            && msg.attachment.is_none()
            && !has_pending
            && !self.assembler.has_thread(sender)?
        {
            if text.is_empty() {
                // Contentless event; the transport usually drops these
                return Ok(ReplyDecision::Silent);
            }
            tracing::debug!(sender, "no trigger, no thread: sending hint");
            return Ok(ReplyDecision::Reply(TRIGGER_HINT.to_string()));
        }

        // Branch 4: staged attachment + follow-up text. The entry is
        // consumed up front so it is gone regardless of outcome.
        if has_pending && msg.attachment.is_none() && !text.is_empty() {
            if let Some(entry) = self.pending.consume(sender) {
                tracing::debug!(sender, "consuming staged attachment");
                return self.handle_continuation(sender, entry, text).await;
            }
        }

        // Branch 5: bare attachment — stage it and ask for a caption
        if let Some(attachment) = &msg.attachment {
            if text.is_empty() {
                let payload = self.fetcher.fetch(&attachment.media_id).await?;
                self.pending.stage(
                    sender,
                    PendingMedia::new(
                        payload.data,
                        payload.mime_type,
                        attachment.filename.clone(),
                    ),
                );
                tracing::debug!(sender, media = %attachment.media_id, "staged bare attachment");
                return Ok(ReplyDecision::Reply(MEDIA_PROMPT.to_string()));
            }
        }

        if text.is_empty() && msg.attachment.is_none() {
            return Ok(ReplyDecision::Silent);
        }

        // Branch 6: normal processing
        self.handle_normal(msg, text).await
    }

    /// Branch 2: delete every thread the sender owns (messages
    /// cascade) and confirm. Staged media is deliberately untouched.
    fn handle_reset(&self, sender: &str) -> Result<ReplyDecision> {
        let deleted = self.threads.delete_for_sender(sender)?;
        tracing::info!(sender, deleted, "conversation reset");
        Ok(ReplyDecision::Reply(self.responder.reset_confirmation()))
    }

    /// Branch 4: combine the staged payload with the follow-up text
    /// as one enriched turn
    async fn handle_continuation(
        &self,
        sender: &str,
        entry: PendingMedia,
        caption: &str,
    ) -> Result<ReplyDecision> {
        let thread = self.assembler.resolve_thread(sender)?;
        let history = ChatTurn::from_history(&self.assembler.build_context(&thread.id)?);

        let payload = MediaPayload::new(entry.data, &entry.mime_type);
        let reply = self
            .responder
            .generate_with_media(&history, caption, &payload)
            .await?;

        let record = self
            .ingestor
            .ingest(
                &payload,
                entry.filename.as_deref(),
                sender,
                Some(&summary_snippet(&reply)),
            )
            .await?;

        self.assembler.record_exchange(
            &thread.id,
            &UserTurn::with_media(Some(caption), &record.id),
            &reply,
        )?;

        Ok(ReplyDecision::Reply(reply))
    }

    /// Branch 6: forward the turn (with resolved media, if any) to
    /// the responder and append the exchange
    async fn handle_normal(&self, msg: &InboundMessage, text: &str) -> Result<ReplyDecision> {
        let sender = msg.sender_id.as_str();
        let thread = self.assembler.resolve_thread(sender)?;
        let history = ChatTurn::from_history(&self.assembler.build_context(&thread.id)?);

        let (reply, user_turn) = if let Some(attachment) = &msg.attachment {
            let payload = self.fetcher.fetch(&attachment.media_id).await?;
            let reply = self
                .responder
                .generate_with_media(&history, text, &payload)
                .await?;
            let record = self
                .ingestor
                .ingest(
                    &payload,
                    attachment.filename.as_deref(),
                    sender,
                    Some(&summary_snippet(&reply)),
                )
                .await?;
            (reply, UserTurn::with_media(Some(text), &record.id))
        } else {
            let reply = self.responder.generate(&history, text).await?;
            (reply, UserTurn::text(text))
        };

        self.assembler
            .record_exchange(&thread.id, &user_turn, &reply)?;

        tracing::debug!(sender, thread = %thread.id, "turn completed");
        Ok(ReplyDecision::Reply(reply))
    }
}

fn summary_snippet(reply: &str) -> String {
    reply.chars().take(SUMMARY_LEN).collect()
}

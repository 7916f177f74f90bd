//! Daemon - the main gateway service
//!
//! Wires persistence, the WhatsApp transport, the AI responder, and
//! the orchestrator together, then drives the intake loop. Messages
//! are processed one at a time in webhook delivery order; replies go
//! back out through the transport.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::ApiServer;
use crate::classify::Classifier;
use crate::context::ContextAssembler;
use crate::db::{self, DbPool, MediaRepo, MessageRepo, ThreadRepo};
use crate::maintenance::{self, Maintenance};
use crate::media::FileMediaIngestor;
use crate::orchestrator::{Orchestrator, ReplyDecision};
use crate::pending::PendingMediaStore;
use crate::responder::OpenAiResponder;
use crate::transport::{InboundMessage, ReplySink, WhatsAppClient};
use crate::{Config, Result};

/// Intake channel depth; webhook handlers block (briefly) when full
const INTAKE_BUFFER: usize = 64;

/// The Wulang daemon - runs intake, orchestration, and maintenance
pub struct Daemon {
    config: Config,
    db: DbPool,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the data directory or database cannot be
    /// initialized
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let db_path = config.db_path();
        let db = db::init(&db_path)?;
        tracing::info!(path = %db_path.display(), "database initialized");

        Ok(Self { config, db })
    }

    /// Run the daemon until shutdown
    ///
    /// # Errors
    ///
    /// Returns error if a component fails to start
    pub async fn run(self) -> Result<()> {
        let threads = ThreadRepo::new(self.db.clone());
        let messages = MessageRepo::new(self.db.clone());
        let media = MediaRepo::new(self.db.clone());
        let pending = Arc::new(PendingMediaStore::new());

        let whatsapp = Arc::new(WhatsAppClient::new(&self.config.whatsapp)?);
        let responder = Arc::new(OpenAiResponder::new(&self.config.llm)?);
        let ingestor = Arc::new(FileMediaIngestor::new(
            self.config.media_dir(),
            media.clone(),
        ));

        let mut orchestrator = Orchestrator::new(
            Classifier::new(
                &self.config.bot.reset_keyword,
                &self.config.bot.trigger_keyword,
            ),
            Arc::clone(&pending),
            ContextAssembler::new(
                threads.clone(),
                messages.clone(),
                self.config.bot.context_window,
            ),
            threads.clone(),
            responder,
            ingestor,
            Arc::clone(&whatsapp) as Arc<dyn crate::transport::MediaFetcher>,
        );

        let (intake_tx, mut intake_rx) = mpsc::channel::<InboundMessage>(INTAKE_BUFFER);
        let server = ApiServer::new(
            intake_tx,
            self.config.whatsapp.verify_token.clone(),
            self.config.server.port,
        );
        let server_handle = server.spawn();

        let maintenance_handle = tokio::spawn(maintenance::run_scheduled(
            Maintenance::new(
                threads,
                media,
                Arc::clone(&pending),
                self.config.media_dir(),
                &self.config.bot,
            ),
            self.config.bot.maintenance_interval,
        ));

        tracing::info!(
            trigger = %self.config.bot.trigger_keyword,
            port = self.config.server.port,
            "gateway running"
        );

        // Single-consumer intake loop: one message at a time keeps
        // per-sender ordering without any further coordination
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "shutdown signal error");
                    }
                    tracing::info!("shutdown requested");
                    break;
                }
                message = intake_rx.recv() => {
                    let Some(message) = message else {
                        tracing::warn!("intake channel closed");
                        break;
                    };

                    let sender_id = message.sender_id.clone();
                    match orchestrator.handle(&message).await {
                        ReplyDecision::Reply(text) => {
                            if let Err(e) = whatsapp.send_reply(&sender_id, &text).await {
                                tracing::error!(sender = %sender_id, error = %e, "reply send failed");
                            }
                        }
                        ReplyDecision::Silent => {}
                    }
                }
            }
        }

        maintenance_handle.abort();
        server_handle.abort();
        Ok(())
    }

    /// Run a single maintenance pass and exit (for the `maintain`
    /// subcommand)
    ///
    /// # Errors
    ///
    /// Returns error if the pass fails
    pub async fn run_maintenance_once(self) -> Result<()> {
        let report = Maintenance::new(
            ThreadRepo::new(self.db.clone()),
            MediaRepo::new(self.db),
            Arc::new(PendingMediaStore::new()),
            self.config.media_dir(),
            &self.config.bot,
        )
        .run()
        .await?;

        tracing::info!(
            threads = report.threads_purged,
            orphans = report.orphans_removed,
            "maintenance finished"
        );
        Ok(())
    }
}

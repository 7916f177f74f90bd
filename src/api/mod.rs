//! HTTP intake server
//!
//! Serves the WhatsApp Cloud API webhook (GET verification handshake
//! and POST deliveries) plus a health endpoint. Deliveries are parsed,
//! normalized, and forwarded over a channel to the single intake loop;
//! the handler acknowledges immediately so the platform does not
//! redeliver while a turn is being processed.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::transport::{InboundMessage, WhatsAppWebhook};
use crate::Result;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Channel into the intake loop
    pub intake: mpsc::Sender<InboundMessage>,

    /// Token the platform must echo during webhook verification
    pub verify_token: String,
}

/// HTTP intake server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a server forwarding inbound messages to `intake`
    #[must_use]
    pub fn new(intake: mpsc::Sender<InboundMessage>, verify_token: String, port: u16) -> Self {
        Self {
            state: Arc::new(ApiState {
                intake,
                verify_token,
            }),
            port,
        }
    }

    /// Build the router with all routes
    fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(health))
            .route(
                "/webhooks/whatsapp",
                get(verify_webhook).post(receive_webhook),
            )
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the intake server
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind intake server: {e}")))?;

        tracing::info!(port = self.port, "intake server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("intake server error: {e}")))?;

        Ok(())
    }

    /// Run the intake server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

#[allow(clippy::unused_async)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Webhook verification handshake: echo `hub.challenge` back when the
/// mode is `subscribe` and the verify token matches
#[allow(clippy::unused_async)]
async fn verify_webhook(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HashMap<String, String>>,
) -> std::result::Result<String, StatusCode> {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge");

    if mode == Some("subscribe") && token == Some(state.verify_token.as_str()) {
        if let Some(challenge) = challenge {
            tracing::info!("webhook verification succeeded");
            return Ok(challenge.clone());
        }
    }

    tracing::warn!(?mode, "webhook verification rejected");
    Err(StatusCode::FORBIDDEN)
}

/// Webhook delivery: normalize and forward each message, then ack.
/// Always returns 200 — a non-2xx would make the platform redeliver
/// a payload we already failed to handle.
async fn receive_webhook(
    State(state): State<Arc<ApiState>>,
    Json(webhook): Json<WhatsAppWebhook>,
) -> StatusCode {
    for message in webhook.into_inbound() {
        if let Err(e) = state.intake.send(message).await {
            tracing::error!(error = %e, "intake channel closed, dropping message");
        }
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(verify_token: &str) -> (Arc<ApiState>, mpsc::Receiver<InboundMessage>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Arc::new(ApiState {
                intake: tx,
                verify_token: verify_token.to_string(),
            }),
            rx,
        )
    }

    fn query(pairs: &[(&str, &str)]) -> Query<HashMap<String, String>> {
        Query(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn verification_echoes_challenge() {
        let (state, _rx) = state("secret");
        let result = verify_webhook(
            State(state),
            query(&[
                ("hub.mode", "subscribe"),
                ("hub.verify_token", "secret"),
                ("hub.challenge", "12345"),
            ]),
        )
        .await;
        assert_eq!(result.unwrap(), "12345");
    }

    #[tokio::test]
    async fn verification_rejects_bad_token() {
        let (state, _rx) = state("secret");
        let result = verify_webhook(
            State(state),
            query(&[
                ("hub.mode", "subscribe"),
                ("hub.verify_token", "wrong"),
                ("hub.challenge", "12345"),
            ]),
        )
        .await;
        assert_eq!(result.unwrap_err(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn delivery_forwards_messages_and_acks() {
        let (state, mut rx) = state("secret");
        let webhook: WhatsAppWebhook = serde_json::from_str(
            r#"{
                "entry": [{"changes": [{"value": {
                    "messages": [{
                        "from": "628123456789",
                        "id": "wamid.1",
                        "text": {"body": "wulang hi"}
                    }]
                }}]}]
            }"#,
        )
        .unwrap();

        let status = receive_webhook(State(state), Json(webhook)).await;
        assert_eq!(status, StatusCode::OK);

        let forwarded = rx.recv().await.unwrap();
        assert_eq!(forwarded.sender_id, "628123456789");
        assert_eq!(forwarded.text, "wulang hi");
    }

    #[tokio::test]
    async fn empty_delivery_still_acks() {
        let (state, mut rx) = state("secret");
        let webhook: WhatsAppWebhook = serde_json::from_str(r#"{"entry": []}"#).unwrap();

        let status = receive_webhook(State(state), Json(webhook)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }
}

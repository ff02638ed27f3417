//! The `/ws` funnel: one websocket per connected identity, carrying
//! keep-alive/stats requests in and push notifications out. Implements
//! [`relay_push::LocalSink`] over an axum websocket split sink, matching the
//! single-writer-per-funnel requirement the `Hub` relies on.

use crate::state::AppState;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use relay_core::types::PushMessage;
use relay_core::{identity, transfer};
use relay_crypto::validate;
use relay_push::error::{PushError, Result as PushResult};
use relay_push::LocalSink;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::{digest_identity, digest_identity_key};

#[derive(Deserialize)]
pub struct WsParams {
    pub identity: String,
    pub identity_key: String,
    pub version: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum InboundMessage {
    KeepAlive { content: String },
    Stats { content: String },
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(version) = &params.version {
        if validate::validate_version(version).is_err() {
            return (StatusCode::BAD_REQUEST, "bad version").into_response();
        }
    }

    let identity = match digest_identity(&params.identity) {
        Ok(identity) => identity,
        Err(_) => return (StatusCode::BAD_REQUEST, "bad creds").into_response(),
    };
    let identity_key = digest_identity_key(&params.identity_key);

    match identity::validate(&*state.users, &identity, &identity_key).await {
        Ok(true) => {}
        Ok(false) => return (StatusCode::BAD_REQUEST, "bad creds").into_response(),
        Err(err) => {
            tracing::error!(error = %err, "validate failed during ws handshake");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: relay_crypto::HashedId) {
    let (sink, mut stream) = socket.split();
    let sink: Arc<dyn LocalSink> = Arc::new(WsSink {
        inner: Mutex::new(sink),
    });

    if let Err(err) = state.hub.connect(&identity, sink.clone()).await {
        tracing::warn!(error = %err, identity = %identity.log_prefix(), "failed to connect funnel");
        return;
    }
    if let Err(err) = state.users.set_connected(&identity, true).await {
        tracing::warn!(error = %err, "failed to mark user connected");
    }

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };

        match serde_json::from_str::<InboundMessage>(&text) {
            Ok(InboundMessage::KeepAlive { content }) => {
                if let Err(err) = transfer::keep_alive(&*state.transfers, &identity, &content).await {
                    tracing::debug!(error = %err, "keep-alive rejected");
                }
            }
            Ok(InboundMessage::Stats { .. }) => {
                match identity::recompute_stats(&*state.users, &*state.credits, &*state.transfers, &identity).await {
                    Ok(stats) => {
                        let _ = sink.send(&PushMessage::UserStatsUpdate { stats }).await;
                    }
                    Err(err) => tracing::debug!(error = %err, "stats recompute failed"),
                }
            }
            Err(err) => tracing::debug!(error = %err, "unparsable websocket frame"),
        }
    }

    state.hub.disconnect(&identity).await;
    if let Err(err) = state.users.set_connected(&identity, false).await {
        tracing::warn!(error = %err, "failed to mark user disconnected");
    }
}

struct WsSink {
    inner: Mutex<futures::stream::SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl LocalSink for WsSink {
    async fn send(&self, message: &PushMessage) -> PushResult<()> {
        let payload = serde_json::to_string(message)?;
        self.inner
            .lock()
            .await
            .send(Message::Text(payload))
            .await
            .map_err(|_| PushError::SinkClosed)
    }
}

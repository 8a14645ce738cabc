// HTTP and websocket request handlers
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::StreamExt;
use seed_node_shared::types::{FilterConfig, ResponsePayload};
use tracing::{debug, info, warn};

use crate::server::state::AppState;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Seed node is running")
}

/// Upgrades to a websocket that streams payloads for one filter.
pub async fn stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Reads the filter from the first text frame.
pub(crate) fn parse_filter(text: &str) -> Result<FilterConfig, serde_json::Error> {
    serde_json::from_str(text)
}

async fn read_filter(socket: &mut WebSocket) -> Option<FilterConfig> {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => match parse_filter(&text) {
                Ok(filter) => return Some(filter),
                Err(e) => {
                    warn!(error = %e, "Rejected subscription filter");
                    let payload = ResponsePayload::error(0, format!("invalid filter: {e}"));
                    send_payload(socket, &payload).await;
                    return None;
                }
            },
            Message::Close(_) => return None,
            _ => {}
        }
    }
    None
}

async fn send_payload(socket: &mut WebSocket, payload: &ResponsePayload) -> bool {
    let text = match serde_json::to_string(payload) {
        Ok(text) => text,
        Err(e) => {
            warn!(block = payload.block_number, error = %e, "Failed to encode payload");
            return true;
        }
    };
    socket.send(Message::Text(text)).await.is_ok()
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let Some(filter) = read_filter(&mut socket).await else {
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    let mut subscription = match state.api.stream(filter) {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "Failed to open subscription");
            let payload = ResponsePayload::error(0, format!("subscription failed: {e}"));
            send_payload(&mut socket, &payload).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    info!(subscription = %subscription.id(), "Client subscribed");

    loop {
        tokio::select! {
            next = subscription.next() => match next {
                Some(payload) => {
                    if !send_payload(&mut socket, &payload).await {
                        debug!(subscription = %subscription.id(), "Client send failed");
                        break;
                    }
                }
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    info!(subscription = %subscription.id(), "Client unsubscribed");
}

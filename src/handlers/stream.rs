//! Live event stream over WebSocket
//!
//! `GET /ws?channels=new_alert,network_traffic_update` subscribes to the
//! listed channels; no parameter means all of them.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use serde::Deserialize;

use crate::logic::events::{Channel, Subscription};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    channels: Option<String>,
}

pub fn parse_channels(raw: Option<&str>) -> AppResult<Vec<Channel>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Channel>().map_err(|e| AppError::ValidationError(e.to_string())))
        .collect()
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<StreamParams>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let channels = parse_channels(params.channels.as_deref())?;
    let subscription = state.bus.subscribe(&channels);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, subscription)))
}

async fn handle_socket(mut socket: WebSocket, mut subscription: Subscription) {
    tracing::debug!("Stream client connected");

    loop {
        tokio::select! {
            // Forward bus messages to the client
            event = subscription.recv() => {
                match event {
                    Some(msg) => {
                        let json = match serde_json::to_string(&msg) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::warn!("Failed to encode {} message: {}", msg.event, e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            // Client messages are ignored; a close or error ends the stream
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("Stream client disconnected");
}

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use tracing::{debug, info, warn};

use super::AppState;
use crate::relay::{self, ClientEvent, EventSink, ServerEvent, SinkError};

/// WebSocket upgrade for the streaming conversational path. All pushes for a
/// session go through the sink created here, so they can only reach the
/// connection that sent the request.
pub async fn websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("websocket connected");
    let (sender, mut receiver) = socket.split();
    let mut sink = WsSink { sender };

    while let Some(message) = receiver.next().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "websocket receive error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let outcome = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(ClientEvent::StreamRequest(request)) => {
                        relay::stream_answer(&state.search, &state.chat, &mut sink, request).await
                    }
                    Err(e) => {
                        warn!(error = %e, "invalid client event");
                        sink.emit(ServerEvent::StreamError {
                            error: format!("invalid request: {e}"),
                        })
                        .await
                    }
                };
                if outcome.is_err() {
                    debug!("client went away mid-stream");
                    break;
                }
            }
            Message::Ping(data) => {
                if sink.sender.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => {
                debug!("websocket closed by client");
                break;
            }
            Message::Binary(_) | Message::Pong(_) => {}
        }
    }

    info!("websocket disconnected");
}

/// Outbound half of one connection; serializes each event as a JSON text frame.
struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

impl EventSink for WsSink {
    async fn emit(&mut self, event: ServerEvent) -> Result<(), SinkError> {
        let json = serde_json::to_string(&event).map_err(|e| SinkError(e.to_string()))?;
        self.sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| SinkError(e.to_string()))
    }
}

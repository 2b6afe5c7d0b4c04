//! Conversational streaming relay: turns one (query, history) request into a
//! sequence of token events pushed to the requesting connection, terminated by
//! exactly one end or error event.
//!
//! The relay is stateless per invocation and addresses pushes only through the
//! sink it is handed, so concurrent sessions on different connections need no
//! coordination and cannot leak fragments into each other.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::{ChatMessage, ChatProvider};
use crate::prompt;
use crate::search::SearchProvider;

/// One past exchange, oldest first in the request's history list. Malformed
/// entries are rejected at deserialization rather than patched up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub query: String,
    pub response: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub history: Vec<Turn>,
}

/// Events the client sends over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    StreamRequest(StreamRequest),
}

/// Events pushed back to the client. A session ends with exactly one
/// `StreamEnd` or one `StreamError`, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Token { data: String },
    StreamEnd,
    StreamError { error: String },
}

/// The connection to the client went away; nothing further can be delivered.
#[derive(Debug, thiserror::Error)]
#[error("connection closed: {0}")]
pub struct SinkError(pub String);

/// Outbound half of one client connection. Handing the sink in per invocation
/// pins every push to the connection that made the request.
pub trait EventSink {
    async fn emit(&mut self, event: ServerEvent) -> Result<(), SinkError>;
}

/// Runs one stream session: search for context, assemble the grounding
/// prompt, open the model stream, and relay each non-empty fragment as its own
/// event in arrival order.
///
/// Provider failures terminate the session with a single `StreamError` event;
/// already-delivered tokens stand. A `SinkError` means the client is gone and
/// the session is abandoned.
pub async fn stream_answer<S, C, K>(
    search: &S,
    chat: &C,
    sink: &mut K,
    request: StreamRequest,
) -> Result<(), SinkError>
where
    S: SearchProvider,
    C: ChatProvider,
    K: EventSink,
{
    if request.query.trim().is_empty() {
        warn!("stream request with empty query");
        return sink
            .emit(ServerEvent::StreamError {
                error: "query must not be empty".to_string(),
            })
            .await;
    }

    info!(query = %request.query, turns = request.history.len(), "stream session start");

    let results = match search.search(&request.query).await {
        Ok(results) => results,
        Err(e) => {
            warn!(error = %e, "search failed, ending stream");
            return sink
                .emit(ServerEvent::StreamError {
                    error: e.to_string(),
                })
                .await;
        }
    };

    let context = prompt::render_context(&results.organic_results);
    let history = prompt::render_history(&request.history);
    let grounding_prompt = prompt::build_prompt(&context, &history, &request.query);

    let mut fragments = match chat.stream(vec![ChatMessage::user(grounding_prompt)]).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "model stream failed to open");
            return sink
                .emit(ServerEvent::StreamError {
                    error: e.to_string(),
                })
                .await;
        }
    };

    let mut tokens = 0usize;
    while let Some(fragment) = fragments.next().await {
        match fragment {
            Ok(text) if text.is_empty() => {}
            Ok(text) => {
                sink.emit(ServerEvent::Token { data: text }).await?;
                tokens += 1;
            }
            Err(e) => {
                warn!(error = %e, tokens, "model stream failed mid-session");
                return sink
                    .emit(ServerEvent::StreamError {
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }

    info!(tokens, "stream session complete");
    sink.emit(ServerEvent::StreamEnd).await
}

//! HTTP and WebSocket surface: the synchronous query endpoints and the
//! streaming socket channel, sharing one pair of provider clients.

mod routes;
mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::llm::{ChatClient, ChatError};
use crate::search::{SearchClient, SearchError};

/// Provider handles constructed once at startup and shared read-only by every
/// request handler.
#[derive(Clone)]
pub struct AppState {
    pub search: SearchClient,
    pub chat: ChatClient,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(routes::search))
        .route("/api/answer", post(routes::answer))
        .route("/ws", get(ws::websocket))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error reply for the synchronous endpoints: 400 for client input errors,
/// 500 carrying the provider's message for upstream failures.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            axum::Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

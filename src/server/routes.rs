use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{ApiError, AppState};
use crate::llm::{ChatMessage, ChatProvider};
use crate::prompt;
use crate::search::{OrganicResult, SearchProvider};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    // Defaulted so a missing field reports the same 400 as an empty one.
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub search_results: Vec<OrganicResult>,
    pub video_results: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub ai_response: String,
    pub search_results: Vec<OrganicResult>,
}

/// Raw search results plus inline videos, passed through unmodified.
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<SearchResults>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    info!(query = %request.query, "api:search");
    let response = state.search.search(&request.query).await?;

    Ok(Json(SearchResults {
        search_results: response.organic_results,
        video_results: response.inline_videos,
    }))
}

/// Search results plus a single non-streamed synthesized answer grounded in
/// the top snippets.
pub async fn answer(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Answer>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    info!(query = %request.query, "api:answer");
    let response = state.search.search(&request.query).await?;

    let context = prompt::render_context(&response.organic_results);
    let answer_prompt = prompt::build_answer_prompt(&context, &request.query);
    let ai_response = state
        .chat
        .complete(vec![ChatMessage::user(answer_prompt)])
        .await?;

    info!(chars = ai_response.len(), "answer complete");
    Ok(Json(Answer {
        ai_response,
        search_results: response.organic_results,
    }))
}

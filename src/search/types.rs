use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level response from the search provider. Only the fields this backend
/// reads are modeled; everything else inside each result is carried opaquely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub organic_results: Vec<OrganicResult>,
    #[serde(default)]
    pub inline_videos: Vec<Value>,
}

/// One organic search result. The snippet feeds the grounding context; all
/// other provider fields pass through to the client unmodified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganicResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl OrganicResult {
    #[cfg(test)]
    pub(crate) fn with_snippet(snippet: &str) -> Self {
        Self {
            snippet: Some(snippet.to_string()),
            rest: serde_json::Map::new(),
        }
    }
}

/// Error body the provider returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct SearchErrorBody {
    pub error: Option<String>,
}

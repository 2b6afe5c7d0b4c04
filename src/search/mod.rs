//! Client for the external web-search provider (SerpAPI-style API).

mod client;
mod types;

pub use client::{SearchClient, SearchError, SearchProvider};
pub use types::{OrganicResult, SearchResponse};

//! Client for the external language-model provider (OpenAI-compatible chat
//! completions, streamed and non-streamed).

mod client;
mod sse;
mod types;

pub use client::{ChatClient, ChatError, ChatProvider, TokenStream};
pub use types::ChatMessage;

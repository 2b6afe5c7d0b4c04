//! Grounding-prompt assembly: numbered snippet context, serialized
//! conversation history, and the instruction text tying them together.
//!
//! Everything here is a pure function over the current request; prompts are
//! rebuilt from scratch every time and never cached.

use crate::relay::Turn;
use crate::search::OrganicResult;

/// Only the top results ground the answer; the rest are display-only.
pub const MAX_CONTEXT_RESULTS: usize = 5;

const INSTRUCTIONS: &str = "You are a helpful assistant that answers questions using web search results.\n\
Answer the user's new question, building on the conversation so far when it is relevant.\n\
Use only the numbered context entries below and cite the ones you rely on with their [number] markers.\n\
Cite only numbers from the context below, not from earlier answers.\n\
If the context does not contain the answer, say so instead of guessing.";

const ANSWER_INSTRUCTIONS: &str = "You are a helpful assistant that answers questions using web search results.\n\
Use only the numbered context entries below and cite the ones you rely on with their [number] markers.\n\
If the context does not contain the answer, say so instead of guessing.";

/// Renders up to the first five results as `"[i] <snippet>\n"`, numbered from
/// 1 in provider order. These indices are the citation anchors the model is
/// told to emit.
pub fn render_context(results: &[OrganicResult]) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().take(MAX_CONTEXT_RESULTS).enumerate() {
        out.push_str(&format!(
            "[{}] {}\n",
            i + 1,
            result.snippet.as_deref().unwrap_or_default()
        ));
    }
    out
}

/// Renders each prior turn as `"User: <query>\nAI: <response>\n\n"` in the
/// order supplied by the caller. Empty history renders as an empty string.
pub fn render_history(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push_str(&format!("User: {}\nAI: {}\n\n", turn.query, turn.response));
    }
    out
}

/// Full prompt for the streaming conversational path.
pub fn build_prompt(context: &str, history: &str, query: &str) -> String {
    format!(
        "{INSTRUCTIONS}\n\nContext:\n{context}\nConversation so far:\n{history}\nUser: {query}\nAI:"
    )
}

/// History-free prompt for the synchronous answer path.
pub fn build_answer_prompt(context: &str, query: &str) -> String {
    format!("{ANSWER_INSTRUCTIONS}\n\nContext:\n{context}\nUser: {query}\nAI:")
}

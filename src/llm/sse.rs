use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tracing::warn;

use super::client::ChatError;
use super::types::ChatCompletionChunk;

/// SSE terminator the provider sends after the last data event.
const DONE_MARKER: &str = "[DONE]";

/// Adapts a raw HTTP byte stream of `text/event-stream` chunks into a stream
/// of content fragments. Events may be split across HTTP chunks, so complete
/// lines are carved out of a buffer; every parsed event is queued so none is
/// lost when one chunk carries several.
pub struct SseTokenStream<S> {
    inner: S,
    buffer: String,
    pending: VecDeque<Result<String, ChatError>>,
    done: bool,
}

impl<S> SseTokenStream<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: String::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn drain_complete_lines(&mut self) {
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            let line = line.trim();

            // Blank lines separate events; lines starting with ':' are comments.
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };

            if data == DONE_MARKER {
                self.done = true;
                return;
            }

            match serde_json::from_str::<ChatCompletionChunk>(data) {
                Ok(chunk) => {
                    let content = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content);
                    if let Some(text) = content {
                        self.pending.push_back(Ok(text));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "malformed SSE chunk");
                    self.pending.push_back(Err(ChatError::InvalidResponse(format!(
                        "malformed stream chunk: {e}"
                    ))));
                }
            }
        }
    }
}

impl<S> Stream for SseTokenStream<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<String, ChatError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Poll::Ready(Some(item));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    self.drain_complete_lines();
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(ChatError::Stream(e.to_string()))));
                }
                Poll::Ready(None) => {
                    if !self.buffer.trim().is_empty() {
                        warn!("incomplete SSE data in buffer at stream end");
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;

    fn byte_stream(
        chunks: Vec<&str>,
    ) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Unpin {
        stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect_fragments(chunks: Vec<&str>) -> Vec<Result<String, ChatError>> {
        SseTokenStream::new(byte_stream(chunks)).collect().await
    }

    fn data_line(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{content}\"}}}}]}}\n\n"
        )
    }

    #[tokio::test]
    async fn fragments_arrive_in_order() {
        let body = format!("{}{}data: [DONE]\n\n", data_line("Hel"), data_line("lo"));
        let fragments = collect_fragments(vec![&body]).await;

        let texts: Vec<_> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn event_split_across_http_chunks_is_reassembled() {
        let line = data_line("Hello");
        let (first, second) = line.split_at(20);
        let fragments = collect_fragments(vec![first, second, "data: [DONE]\n\n"]).await;

        let texts: Vec<_> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["Hello"]);
    }

    #[tokio::test]
    async fn multiple_events_in_one_chunk_are_all_delivered() {
        let body = format!(
            "{}{}{}data: [DONE]\n\n",
            data_line("a"),
            data_line("b"),
            data_line("c")
        );
        let fragments = collect_fragments(vec![&body]).await;

        let texts: Vec<_> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn comments_and_blank_lines_are_ignored() {
        let body = format!(": keep-alive\n\n{}data: [DONE]\n\n", data_line("hi"));
        let fragments = collect_fragments(vec![&body]).await;

        let texts: Vec<_> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["hi"]);
    }

    #[tokio::test]
    async fn chunk_without_delta_content_produces_no_fragment() {
        let body = format!(
            "{}data: {{\"choices\":[{{\"index\":0,\"delta\":{{}},\"finish_reason\":\"stop\"}}]}}\n\ndata: [DONE]\n\n",
            data_line("end")
        );
        let fragments = collect_fragments(vec![&body]).await;

        let texts: Vec<_> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["end"]);
    }

    #[tokio::test]
    async fn events_after_done_are_ignored() {
        let body = format!("{}data: [DONE]\n\n{}", data_line("first"), data_line("late"));
        let fragments = collect_fragments(vec![&body]).await;

        let texts: Vec<_> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["first"]);
    }

    #[tokio::test]
    async fn malformed_event_yields_error_item() {
        let body = "data: {not json}\n\ndata: [DONE]\n\n";
        let fragments = collect_fragments(vec![body]).await;

        assert_eq!(fragments.len(), 1);
        assert!(matches!(
            fragments[0],
            Err(ChatError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn stream_without_done_still_terminates() {
        let body = data_line("only");
        let fragments = collect_fragments(vec![&body]).await;

        let texts: Vec<_> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["only"]);
    }
}

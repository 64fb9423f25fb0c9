//! Turning a streamed response body into completion text fragments.

use async_stream::try_stream;
use futures_util::stream::{Stream, StreamExt};
use pipeline::LlmError;

use crate::sse::{SseDecoder, SseEvent};
use crate::wire::ChatChunk;

/// Decodes an SSE chat-completion body into non-empty text fragments.
///
/// Chunks without content are skipped. A body error or an undecodable event
/// is yielded as the final `Err` item. `[DONE]` or the end of the body ends
/// the sequence.
pub(crate) fn text_fragments<S, B>(body: S) -> impl Stream<Item = Result<String, LlmError>> + Send
where
    S: Stream<Item = Result<B, LlmError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    try_stream! {
        let mut body = Box::pin(body);
        let mut decoder = SseDecoder::default();
        let mut fragments = 0usize;
        let mut done = false;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for event in decoder.push(chunk.as_ref()) {
                match event {
                    SseEvent::Done => {
                        done = true;
                        break;
                    }
                    SseEvent::Data(payload) => {
                        if let Some(text) = fragment(&payload)? {
                            fragments += 1;
                            yield text;
                        }
                    }
                }
            }
            if done {
                break;
            }
        }

        if !done {
            if let Some(SseEvent::Data(payload)) = decoder.finish() {
                if let Some(text) = fragment(&payload)? {
                    fragments += 1;
                    yield text;
                }
            }
        }
        tracing::debug!(fragments, completed = done, "completion stream closed");
    }
}

fn fragment(payload: &str) -> Result<Option<String>, LlmError> {
    let chunk: ChatChunk = serde_json::from_str(payload).map_err(|err| {
        LlmError::malformed(
            format!("undecodable stream event: {payload}"),
            Some(Box::new(err)),
        )
    })?;
    Ok(chunk.into_content())
}

//! Newline-delimited JSON framing for token generation.
//!
//! Every streamed element is one compact JSON object followed by `\n`:
//!
//! ```text
//! {"done":false,"tokens":"He"}
//! {"done":false,"tokens":"llo"}
//! {"done":true,"session_id":7,"input_length":3,"context_length":10}
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};
use futures::{Stream, StreamExt};
use futures::stream::FusedStream;
use serde::Serialize;
use crate::bridge::{AbortHandle, BridgeStream, StreamEvent};
use crate::error::{KilnError, Result};
use crate::generation::SessionId;

/// What a finished generation reports in its terminal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSummary {
    pub session_id: SessionId,
    pub input_length: u32,
    pub context_length: u32,
}

/// Single-shot generation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResponse {
    pub session_id: SessionId,
    pub input_length: u32,
    pub result: String,
    pub context_length: u32,
}

#[derive(Serialize)]
struct PartialRecord<'a> {
    done: bool,
    tokens: &'a str,
}

#[derive(Serialize)]
struct DoneRecord {
    done: bool,
    session_id: SessionId,
    input_length: u32,
    context_length: u32,
}

#[derive(Serialize)]
struct ErrorRecord<'a> {
    error: &'a str,
}

fn line<T: Serialize>(record: &T) -> Result<String> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

pub fn partial_line(tokens: &str) -> Result<String> {
    line(&PartialRecord { done: false, tokens })
}

pub fn done_line(summary: &GenerationSummary) -> Result<String> {
    line(&DoneRecord {
        done: true,
        session_id: summary.session_id,
        input_length: summary.input_length,
        context_length: summary.context_length,
    })
}

/// Terminal `{"error": ...}` line for clients that read a failure in place of
/// the done record.
pub fn error_line(err: &KilnError) -> String {
    let message = err.client_message();
    line(&ErrorRecord { error: &message }).unwrap_or_else(|_| "{\"error\":\"unserializable error\"}\n".to_string())
}

/// A generation stream rendered as NDJSON lines.
///
/// Yields one `Ok(line)` per token batch and one for the done record. If the
/// inference fails the last item is `Err` instead of the done record.
pub struct GenerationFrames {
    inner: BridgeStream<String, GenerationSummary>,
}

impl GenerationFrames {
    pub(crate) fn new(inner: BridgeStream<String, GenerationSummary>) -> Self {
        Self { inner }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.inner.abort_handle()
    }

    /// Renders failures as a final [`error_line`] so every item is a line.
    pub fn with_error_lines(self) -> impl Stream<Item = String> + Send + Unpin {
        self.map(|item| item.unwrap_or_else(|err| error_line(&err)))
    }
}

impl Stream for GenerationFrames {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let next = match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(next) => next,
            Poll::Pending => return Poll::Pending,
        };
        Poll::Ready(next.map(|event| match event {
            StreamEvent::Partial(tokens) => partial_line(&tokens),
            StreamEvent::End(termination) => termination.into_result().and_then(|summary| done_line(&summary)),
        }))
    }
}

impl FusedStream for GenerationFrames {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

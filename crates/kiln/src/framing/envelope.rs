//! Audio envelope framing for speech synthesis.
//!
//! A streamed synthesis is a sequence of [`AudioFrame`]s:
//!
//! 1. `{"inference_id": ...}` prologue, envelope mode only
//! 2. the WAV header, once, right before the first audio chunk, when requested
//! 3. one frame per audio chunk
//! 4. `{"usage": {"execution_time": ...}}` epilogue, envelope mode only
//!
//! Chunks and the header are raw binary frames, or `{"wav_base_64": ...}`
//! records when base64 encoding is on. Envelope records are JSON, so envelope
//! mode requires base64.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use futures::{Stream, StreamExt};
use futures::stream::FusedStream;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use crate::bridge::{AbortHandle, BridgeStream, StreamEvent, Termination};
use crate::error::{KilnError, Result};
use crate::gate::InferenceId;
use super::wav::base64_encode;

/// Framing switches of a streaming synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvelopeOptions {
    pub add_wav_header: bool,
    pub encode_base64: bool,
    pub envelope: bool,
}

impl Default for EnvelopeOptions {
    fn default() -> Self {
        Self {
            add_wav_header: true,
            encode_base64: false,
            envelope: false,
        }
    }
}

impl EnvelopeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.envelope && !self.encode_base64 {
            return Err(KilnError::EnvelopeWithoutBase64);
        }
        Ok(())
    }
}

/// One element of a streamed synthesis.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioFrame {
    Binary(Vec<u8>),
    Record(Value),
}

impl AudioFrame {
    /// Bytes to put on the wire: binary frames as-is, records as compact JSON.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            AudioFrame::Binary(bytes) => bytes,
            AudioFrame::Record(record) => record.to_string().into_bytes(),
        }
    }
}

/// What a finished synthesis reports in its epilogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechSummary {
    pub execution_time_ms: u64,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub execution_time: u64,
}

/// Synthesized audio in a single-shot response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WavPayload {
    Base64(String),
    Raw(Vec<u8>),
}

/// Single-shot synthesis response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechResponse {
    pub inference_id: String,
    pub wav: WavPayload,
    pub wav_duration_ms: u64,
    pub usage: Usage,
}

pub fn prologue_record(inference_id: &InferenceId) -> AudioFrame {
    AudioFrame::Record(json!({ "inference_id": inference_id.to_string() }))
}

pub fn epilogue_record(summary: &SpeechSummary) -> AudioFrame {
    AudioFrame::Record(json!({ "usage": { "execution_time": summary.execution_time_ms } }))
}

pub fn error_record(err: &KilnError) -> AudioFrame {
    AudioFrame::Record(json!({ "error": err.client_message() }))
}

/// A synthesis stream rendered as audio frames.
///
/// A failed synthesis ends with an `Err` item and no epilogue.
pub struct SpeechFrames {
    inner: BridgeStream<Vec<u8>, SpeechSummary>,
    options: EnvelopeOptions,
    header: Option<Vec<u8>>,
    pending: VecDeque<Result<AudioFrame>>,
    done: bool,
}

impl SpeechFrames {
    /// # Parameters
    ///
    /// * `inner` - Bridged PCM chunks.
    /// * `options` - Already validated framing switches.
    /// * `inference_id` - Reported in the prologue.
    /// * `header` - Sent before the first chunk when `options.add_wav_header` is set.
    pub(crate) fn new(
        inner: BridgeStream<Vec<u8>, SpeechSummary>,
        options: EnvelopeOptions,
        inference_id: &InferenceId,
        header: Option<Vec<u8>>,
    ) -> Self {
        let mut pending = VecDeque::new();
        if options.envelope {
            pending.push_back(Ok(prologue_record(inference_id)));
        }
        Self {
            inner,
            options,
            header: header.filter(|_| options.add_wav_header),
            pending,
            done: false,
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.inner.abort_handle()
    }

    /// Renders failures as a final [`error_record`].
    pub fn with_error_records(self) -> impl Stream<Item = AudioFrame> + Send + Unpin {
        self.map(|item| item.unwrap_or_else(|err| error_record(&err)))
    }

    fn audio(&self, bytes: Vec<u8>) -> AudioFrame {
        if self.options.encode_base64 {
            AudioFrame::Record(json!({ "wav_base_64": base64_encode(&bytes) }))
        } else {
            AudioFrame::Binary(bytes)
        }
    }
}

impl Stream for SpeechFrames {
    type Item = Result<AudioFrame>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(frame) = this.pending.pop_front() {
                return Poll::Ready(Some(frame));
            }
            if this.done {
                return Poll::Ready(None);
            }

            let event = match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(event) => event,
                Poll::Pending => return Poll::Pending,
            };
            match event {
                Some(StreamEvent::Partial(pcm)) => {
                    if let Some(header) = this.header.take() {
                        let frame = this.audio(header);
                        this.pending.push_back(Ok(frame));
                    }
                    let frame = this.audio(pcm);
                    this.pending.push_back(Ok(frame));
                }
                Some(StreamEvent::End(Termination::Completed(summary))) => {
                    this.done = true;
                    if this.options.envelope {
                        this.pending.push_back(Ok(epilogue_record(&summary)));
                    }
                }
                Some(StreamEvent::End(Termination::Failed(err))) => {
                    this.done = true;
                    this.pending.push_back(Err(err));
                }
                None => this.done = true,
            }
        }
    }
}

impl FusedStream for SpeechFrames {
    fn is_terminated(&self) -> bool {
        self.done && self.pending.is_empty()
    }
}

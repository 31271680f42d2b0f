use async_trait::async_trait;
use crate::error::{EngineError, Result};
use crate::framing::envelope::{SpeechFrames, SpeechResponse};
use crate::framing::wav::DEFAULT_SAMPLE_RATE;
use super::options::{SpeechRequest, StreamingSpeechRequest, SynthesisOptions, VoiceConditioning};

/// Per-segment callback for chunked synthesis. Returns whether to continue.
pub type WaveformCallback<'a> = &'a mut dyn FnMut(Vec<f32>) -> bool;

/// # SpeechEngine
///
/// The synthesis capability of a loaded text-to-speech model.
///
/// Waveforms are mono `f32` samples nominally in `[-1, 1]` at
/// [`sample_rate`](Self::sample_rate). Quantization and containers are
/// handled by kiln. All methods block.
pub trait SpeechEngine: Send + Sync + 'static {
    fn sample_rate(&self) -> u32 {
        DEFAULT_SAMPLE_RATE
    }

    /// Synthesizes `text` in one call.
    fn synthesize(
        &self,
        voice: &VoiceConditioning,
        text: &str,
        language: &str,
        options: &SynthesisOptions,
    ) -> std::result::Result<Vec<f32>, EngineError>;

    /// Synthesizes `text`, handing each waveform segment to `on_chunk` as soon
    /// as it is decoded.
    ///
    /// # Parameters
    ///
    /// * `stream_chunk_size` - Decoding steps per segment.
    /// * `on_chunk` - Returns `false` to ask for an early stop. Engines may
    ///   ignore the request.
    fn synthesize_chunked(
        &self,
        voice: &VoiceConditioning,
        text: &str,
        language: &str,
        options: &SynthesisOptions,
        stream_chunk_size: u32,
        on_chunk: WaveformCallback<'_>,
    ) -> std::result::Result<(), EngineError>;

    /// Computes speaker conditioning from a reference recording.
    fn compute_conditioning(&self, reference_wav: &[u8]) -> std::result::Result<VoiceConditioning, EngineError>;

    fn languages(&self) -> Vec<String>;
}

/// # SpeechService
///
/// The call shapes a request layer uses for speech synthesis.
#[async_trait]
pub trait SpeechService {
    /// Synthesizes a complete WAV file, base64-encoded or raw.
    async fn synthesize(&self, request: SpeechRequest, encode_base64: bool) -> Result<SpeechResponse>;

    /// Streams synthesized audio as frames.
    ///
    /// Framing errors (envelope without base64) and invalid requests are
    /// returned here, before the gate is taken.
    async fn synthesize_stream(&self, request: StreamingSpeechRequest) -> Result<SpeechFrames>;

    async fn create_speaker(&self, reference_wav: Vec<u8>) -> Result<VoiceConditioning>;

    fn languages(&self) -> Vec<String>;
}

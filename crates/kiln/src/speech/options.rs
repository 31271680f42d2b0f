use serde::{Deserialize, Serialize};
use crate::error::{KilnError, Result};
use crate::framing::envelope::EnvelopeOptions;

/// Speaker conditioning computed from reference audio.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VoiceConditioning {
    pub speaker_embedding: Vec<f32>,
    pub gpt_cond_latent: Vec<Vec<f32>>,
}

/// Decoding parameters passed through to the synthesis engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SynthesisOptions {
    pub overlap_wav_len: u32,
    pub temperature: f32,
    pub length_penalty: f32,
    pub repetition_penalty: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub do_sample: bool,
    pub speed: f32,
    pub enable_text_splitting: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            overlap_wav_len: 1024,
            temperature: 0.75,
            length_penalty: 1.0,
            repetition_penalty: 5.0,
            top_k: 50,
            top_p: 0.85,
            do_sample: true,
            speed: 1.0,
            enable_text_splitting: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SpeechRequest {
    #[serde(flatten)]
    pub voice: VoiceConditioning,
    pub text: String,
    pub language: String,
    #[serde(flatten)]
    pub options: SynthesisOptions,
}

impl SpeechRequest {
    pub fn new(voice: VoiceConditioning, text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            voice,
            text: text.into(),
            language: language.into(),
            options: SynthesisOptions::default(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(KilnError::InvalidRequest("text must not be empty".to_string()));
        }
        if self.language.trim().is_empty() {
            return Err(KilnError::InvalidRequest("language must be set".to_string()));
        }
        Ok(())
    }
}

fn default_stream_chunk_size() -> u32 {
    100
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StreamingSpeechRequest {
    #[serde(flatten)]
    pub request: SpeechRequest,
    /// Engine-side decoding steps per emitted chunk.
    #[serde(default = "default_stream_chunk_size")]
    pub stream_chunk_size: u32,
    #[serde(flatten)]
    pub framing: EnvelopeOptions,
}

impl StreamingSpeechRequest {
    pub fn new(request: SpeechRequest) -> Self {
        Self {
            request,
            stream_chunk_size: default_stream_chunk_size(),
            framing: EnvelopeOptions::default(),
        }
    }

    pub fn with_framing(mut self, framing: EnvelopeOptions) -> Self {
        self.framing = framing;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.framing.validate()?;
        self.request.validate()?;
        if self.stream_chunk_size == 0 {
            return Err(KilnError::InvalidRequest("stream_chunk_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

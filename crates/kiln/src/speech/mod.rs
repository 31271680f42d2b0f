//! # Speech Synthesis
//!
//! Gated text-to-speech on top of a blocking [`SpeechEngine`], with
//! single-shot WAV responses and framed audio streams.

mod core_trait;
mod options;
mod service;

pub use core_trait::*;
pub use options::{SpeechRequest, StreamingSpeechRequest, SynthesisOptions, VoiceConditioning};
pub use service::SpeechInference;
pub use crate::framing::envelope::{AudioFrame, EnvelopeOptions, SpeechFrames, SpeechResponse, WavPayload};

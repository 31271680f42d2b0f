use std::sync::Arc;
use std::time::Instant;
use async_trait::async_trait;
use tracing::{info, warn};
use crate::bridge::{BridgeOptions, run_blocking, start_stream};
use crate::config::ServeConfig;
use crate::error::Result;
use crate::framing::envelope::{SpeechFrames, SpeechResponse, SpeechSummary, Usage, WavPayload};
use crate::framing::wav::{base64_encode, duration_ms, encode_wav, pcm16_from_waveform, quantize, wav_header};
use crate::gate::{GateWait, InferenceGate};
use super::core_trait::{SpeechEngine, SpeechService, WaveformCallback};
use super::options::{SpeechRequest, StreamingSpeechRequest, VoiceConditioning};

/// Speech synthesis against one loaded model instance.
pub struct SpeechInference<E> {
    engine: Arc<E>,
    gate: Arc<InferenceGate>,
    bridge: BridgeOptions,
    wait: GateWait,
}

impl<E> SpeechInference<E>
where
    E: SpeechEngine,
{
    pub fn new(engine: E, gate: Arc<InferenceGate>) -> Self {
        Self {
            engine: Arc::new(engine),
            gate,
            bridge: BridgeOptions::default(),
            wait: GateWait::Queue,
        }
    }

    pub fn from_config(engine: E, config: &ServeConfig) -> Self {
        Self::new(engine, Arc::new(config.gate()))
            .with_bridge_options(config.bridge_options())
            .with_gate_wait(config.gate_wait())
    }

    pub fn with_bridge_options(mut self, options: BridgeOptions) -> Self {
        self.bridge = options;
        self
    }

    pub fn with_gate_wait(mut self, wait: GateWait) -> Self {
        self.wait = wait;
        self
    }

    pub fn gate(&self) -> &Arc<InferenceGate> {
        &self.gate
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

#[async_trait]
impl<E> SpeechService for SpeechInference<E>
where
    E: SpeechEngine,
{
    async fn synthesize(&self, request: SpeechRequest, encode_base64: bool) -> Result<SpeechResponse> {
        request.validate()?;
        let guard = self.gate.acquire_with(self.wait).await;
        let engine = self.engine.clone();

        run_blocking(move || {
            let inference_id = guard.inference_id().clone();
            let sample_rate = engine.sample_rate();

            let started = Instant::now();
            let waveform = engine
                .synthesize(&request.voice, &request.text, &request.language, &request.options)
                .inspect_err(|e| warn!(%inference_id, error = %e, "synthesis failed"))?;
            let execution_time = started.elapsed().as_millis() as u64;
            info!(
                %inference_id,
                tti_ms = execution_time,
                held_ms = guard.held_for().as_millis() as u64,
                "synthesis complete"
            );
            drop(guard);

            let samples = quantize(&waveform);
            let wav = encode_wav(&samples, sample_rate)?;
            let wav = if encode_base64 {
                WavPayload::Base64(base64_encode(&wav))
            } else {
                WavPayload::Raw(wav)
            };

            Ok(SpeechResponse {
                inference_id: inference_id.to_string(),
                wav,
                wav_duration_ms: duration_ms(samples.len(), sample_rate),
                usage: Usage { execution_time },
            })
        })
        .await
    }

    async fn synthesize_stream(&self, request: StreamingSpeechRequest) -> Result<SpeechFrames> {
        request.validate()?;
        let header = if request.framing.add_wav_header {
            Some(wav_header(self.engine.sample_rate())?)
        } else {
            None
        };

        let guard = self.gate.acquire_with(self.wait).await;
        let inference_id = guard.inference_id().clone();
        let engine = self.engine.clone();
        let StreamingSpeechRequest { request, stream_chunk_size, framing } = request;

        let stream = start_stream(&self.bridge, move |mut sender| {
            let inference_id = guard.inference_id().clone();
            let started = Instant::now();
            let mut first_chunk = true;

            let on_chunk: WaveformCallback<'_> = &mut |waveform: Vec<f32>| {
                if first_chunk {
                    first_chunk = false;
                    info!(%inference_id, l1c_ms = started.elapsed().as_millis() as u64, "first chunk");
                }
                sender.send(pcm16_from_waveform(&waveform))
            };
            engine
                .synthesize_chunked(
                    &request.voice,
                    &request.text,
                    &request.language,
                    &request.options,
                    stream_chunk_size,
                    on_chunk,
                )
                .inspect_err(|e| warn!(%inference_id, error = %e, "synthesis failed"))?;

            let execution_time_ms = started.elapsed().as_millis() as u64;
            info!(
                %inference_id,
                chunks = sender.sent(),
                tti_ms = execution_time_ms,
                held_ms = guard.held_for().as_millis() as u64,
                "synthesis complete"
            );
            drop(guard);

            Ok(SpeechSummary {
                execution_time_ms,
                chunks: sender.sent(),
            })
        });

        Ok(SpeechFrames::new(stream, framing, &inference_id, header))
    }

    async fn create_speaker(&self, reference_wav: Vec<u8>) -> Result<VoiceConditioning> {
        let engine = self.engine.clone();
        run_blocking(move || Ok(engine.compute_conditioning(&reference_wav)?)).await
    }

    fn languages(&self) -> Vec<String> {
        self.engine.languages()
    }
}

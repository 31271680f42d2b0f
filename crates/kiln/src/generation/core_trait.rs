use async_trait::async_trait;
use crate::error::{EngineError, Result};
use crate::framing::ndjson::{GenerationFrames, GenerationResponse};
use super::options::{GenerationRequest, InferenceOptions};
use super::session::SessionId;

/// What a finished `run_inference` call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceOutput {
    pub result: String,
    pub context_length: u32,
}

/// Per-chunk callback handed to the engine.
///
/// Receives each decoded text fragment and returns whether generation should
/// continue. `false` is a request the engine may ignore.
pub type ChunkCallback<'a> = &'a mut dyn FnMut(&str) -> bool;

/// # GenerationEngine
///
/// The token-generation capability of a loaded model, as provided by the
/// native engine. Sessions, sampling and the model itself live behind it.
///
/// ```rust
/// use kiln::error::EngineError;
/// use kiln::generation::{ChunkCallback, GenerationEngine, InferenceOptions, InferenceOutput, SessionId};
///
/// pub struct Echo;
///
/// impl GenerationEngine for Echo {
///     fn touch(&self, _session: SessionId) -> bool {
///         true
///     }
///
///     fn create_session(
///         &self,
///         _model_id: &str,
///         _context_size: Option<u32>,
///         _initial_prompt: Option<&str>,
///         _state_file_path: Option<&str>,
///     ) -> Result<SessionId, EngineError> {
///         Ok(SessionId(1))
///     }
///
///     fn token_length(&self, _model_id: &str, text: &str) -> Result<u32, EngineError> {
///         Ok(text.split_whitespace().count() as u32)
///     }
///
///     fn run_inference(
///         &self,
///         _session: SessionId,
///         _max_tokens: u32,
///         prompt: &str,
///         _options: Option<&InferenceOptions>,
///         mut on_chunk: Option<ChunkCallback<'_>>,
///     ) -> Result<InferenceOutput, EngineError> {
///         for word in prompt.split_inclusive(' ') {
///             if let Some(callback) = on_chunk.as_mut() {
///                 if !callback(word) {
///                     break;
///                 }
///             }
///         }
///         Ok(InferenceOutput { result: prompt.to_string(), context_length: 0 })
///     }
/// }
/// ```
///
/// ## Implementation Notes
///
/// - Every method is blocking. kiln only calls them from the blocking pool,
///   and never two inferences at once for the same gate.
/// - `touch` doubles as liveness probe and expiry refresh.
/// - Errors are reported to clients with the engine's message.
pub trait GenerationEngine: Send + Sync + 'static {
    /// Refreshes a session's expiry. Returns `false` if it is not live.
    fn touch(&self, session: SessionId) -> bool;

    fn create_session(
        &self,
        model_id: &str,
        context_size: Option<u32>,
        initial_prompt: Option<&str>,
        state_file_path: Option<&str>,
    ) -> std::result::Result<SessionId, EngineError>;

    /// Number of tokens `text` encodes to.
    fn token_length(&self, model_id: &str, text: &str) -> std::result::Result<u32, EngineError>;

    /// Decodes up to `max_tokens` tokens after `prompt` in `session`.
    ///
    /// # Parameters
    ///
    /// * `on_chunk` - When present, invoked with each text fragment as it is
    ///   decoded, before this call returns.
    fn run_inference(
        &self,
        session: SessionId,
        max_tokens: u32,
        prompt: &str,
        options: Option<&InferenceOptions>,
        on_chunk: Option<ChunkCallback<'_>>,
    ) -> std::result::Result<InferenceOutput, EngineError>;
}

/// # GenerationService
///
/// The two call shapes a request layer uses for token generation.
#[async_trait]
pub trait GenerationService {
    /// Runs a request to completion and returns the whole result.
    async fn infer(&self, request: GenerationRequest) -> Result<GenerationResponse>;

    /// Starts a request and returns its output as NDJSON lines.
    ///
    /// Errors returned here happened before any token was produced: an
    /// invalid request, or a failure creating the session or measuring the
    /// prompt. Failures during inference arrive as the stream's last item.
    async fn infer_stream(&self, request: GenerationRequest) -> Result<GenerationFrames>;
}

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;
use kiln::error::EngineError;
use kiln::generation::{ChunkCallback, GenerationEngine, InferenceOptions, InferenceOutput, SessionId};

/// Echoes the prompt back one word at a time, pretending each word takes a
/// while to decode.
pub struct EchoEngine {
    sessions: Mutex<HashSet<SessionId>>,
    next_id: AtomicU32,
}

impl EchoEngine {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashSet::new()),
            next_id: AtomicU32::new(1),
        }
    }
}

impl GenerationEngine for EchoEngine {
    fn touch(&self, session: SessionId) -> bool {
        self.sessions
            .lock()
            .map(|sessions| sessions.contains(&session))
            .unwrap_or(false)
    }

    fn create_session(
        &self,
        _model_id: &str,
        _context_size: Option<u32>,
        _initial_prompt: Option<&str>,
        _state_file_path: Option<&str>,
    ) -> Result<SessionId, EngineError> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sessions
            .lock()
            .map_err(|_| EngineError::new("session table poisoned"))?
            .insert(id);
        Ok(id)
    }

    fn token_length(&self, _model_id: &str, text: &str) -> Result<u32, EngineError> {
        Ok(text.split_whitespace().count() as u32)
    }

    fn run_inference(
        &self,
        _session: SessionId,
        max_tokens: u32,
        prompt: &str,
        _options: Option<&InferenceOptions>,
        mut on_chunk: Option<ChunkCallback<'_>>,
    ) -> Result<InferenceOutput, EngineError> {
        let mut result = String::new();
        for word in prompt.split_inclusive(' ').take(max_tokens as usize) {
            thread::sleep(Duration::from_millis(50));
            result.push_str(word);
            if let Some(callback) = on_chunk.as_mut() {
                if !callback(word) {
                    break;
                }
            }
        }
        Ok(InferenceOutput {
            context_length: result.split_whitespace().count() as u32,
            result,
        })
    }
}

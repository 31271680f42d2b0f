use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use crate::error::EngineError;

// Tracks how many engine calls run at the same time.
#[derive(Default)]
pub struct ConcurrencyProbe {
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ConcurrencyProbe {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn max(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[cfg(feature = "generation")]
pub use generation::MockGenerationEngine;

#[cfg(feature = "speech")]
pub use speech::MockSpeechEngine;

#[cfg(feature = "generation")]
mod generation {
    use super::*;
    use crate::generation::{ChunkCallback, GenerationEngine, InferenceOptions, InferenceOutput, SessionId};

    type CreateArgs = (String, Option<u32>, Option<String>, Option<String>);

    pub struct MockGenerationEngine {
        live: Mutex<HashSet<SessionId>>,
        next_session: AtomicU32,
        chunks: Vec<String>,
        context_length: u32,
        fail_create: Option<String>,
        fail_inference: Option<String>,
        honour_stop: bool,
        chunk_delay: Duration,
        last_create: Mutex<Option<CreateArgs>>,
        probe: ConcurrencyProbe,
        pub creates: AtomicUsize,
        pub touches: AtomicUsize,
        pub completed: AtomicUsize,
    }

    impl MockGenerationEngine {
        pub fn new() -> Self {
            Self {
                live: Mutex::new(HashSet::new()),
                next_session: AtomicU32::new(1),
                chunks: vec![],
                context_length: 0,
                fail_create: None,
                fail_inference: None,
                honour_stop: true,
                chunk_delay: Duration::ZERO,
                last_create: Mutex::new(None),
                probe: ConcurrencyProbe::default(),
                creates: AtomicUsize::new(0),
                touches: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
            }
        }

        pub fn with_next_session(self, id: u32) -> Self {
            self.next_session.store(id, Ordering::SeqCst);
            self
        }

        pub fn with_live_session(self, id: u32) -> Self {
            self.live.lock().unwrap().insert(SessionId(id));
            self
        }

        pub fn with_chunks(mut self, chunks: &[&str]) -> Self {
            self.chunks = chunks.iter().map(|c| c.to_string()).collect();
            self
        }

        pub fn with_context_length(mut self, context_length: u32) -> Self {
            self.context_length = context_length;
            self
        }

        pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
            self.chunk_delay = delay;
            self
        }

        pub fn failing_create(mut self, message: &str) -> Self {
            self.fail_create = Some(message.to_string());
            self
        }

        pub fn failing_inference(mut self, message: &str) -> Self {
            self.fail_inference = Some(message.to_string());
            self
        }

        pub fn ignoring_stop(mut self) -> Self {
            self.honour_stop = false;
            self
        }

        pub fn expire(&self, id: SessionId) {
            self.live.lock().unwrap().remove(&id);
        }

        pub fn live_sessions(&self) -> usize {
            self.live.lock().unwrap().len()
        }

        pub fn last_create(&self) -> Option<CreateArgs> {
            self.last_create.lock().unwrap().clone()
        }

        pub fn max_active(&self) -> usize {
            self.probe.max()
        }
    }

    impl GenerationEngine for MockGenerationEngine {
        fn touch(&self, session: SessionId) -> bool {
            self.touches.fetch_add(1, Ordering::SeqCst);
            self.live.lock().unwrap().contains(&session)
        }

        fn create_session(
            &self,
            model_id: &str,
            context_size: Option<u32>,
            initial_prompt: Option<&str>,
            state_file_path: Option<&str>,
        ) -> Result<SessionId, EngineError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            *self.last_create.lock().unwrap() = Some((
                model_id.to_string(),
                context_size,
                initial_prompt.map(str::to_string),
                state_file_path.map(str::to_string),
            ));
            if let Some(message) = &self.fail_create {
                return Err(EngineError::new(message.clone()));
            }
            let id = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
            self.live.lock().unwrap().insert(id);
            Ok(id)
        }

        fn token_length(&self, _model_id: &str, text: &str) -> Result<u32, EngineError> {
            Ok(text.chars().count() as u32)
        }

        fn run_inference(
            &self,
            _session: SessionId,
            _max_tokens: u32,
            _prompt: &str,
            _options: Option<&InferenceOptions>,
            mut on_chunk: Option<ChunkCallback<'_>>,
        ) -> Result<InferenceOutput, EngineError> {
            self.probe.enter();
            let mut result = String::new();
            for chunk in &self.chunks {
                if !self.chunk_delay.is_zero() {
                    std::thread::sleep(self.chunk_delay);
                }
                result.push_str(chunk);
                let keep_going = match on_chunk.as_mut() {
                    Some(callback) => callback(chunk.as_str()),
                    None => true,
                };
                if !keep_going && self.honour_stop {
                    break;
                }
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            self.probe.exit();

            if let Some(message) = &self.fail_inference {
                return Err(EngineError::new(message.clone()));
            }
            Ok(InferenceOutput {
                result,
                context_length: self.context_length,
            })
        }
    }
}

#[cfg(feature = "speech")]
mod speech {
    use super::*;
    use crate::speech::{SpeechEngine, SynthesisOptions, VoiceConditioning, WaveformCallback};

    pub struct MockSpeechEngine {
        chunks: Vec<Vec<f32>>,
        failure: Option<String>,
        chunk_delay: Duration,
        probe: ConcurrencyProbe,
        pub calls: AtomicUsize,
        pub last_chunk_size: AtomicU32,
    }

    impl MockSpeechEngine {
        pub fn new() -> Self {
            Self {
                chunks: vec![],
                failure: None,
                chunk_delay: Duration::ZERO,
                probe: ConcurrencyProbe::default(),
                calls: AtomicUsize::new(0),
                last_chunk_size: AtomicU32::new(0),
            }
        }

        pub fn with_chunks(mut self, chunks: Vec<Vec<f32>>) -> Self {
            self.chunks = chunks;
            self
        }

        pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
            self.chunk_delay = delay;
            self
        }

        pub fn failing(mut self, message: &str) -> Self {
            self.failure = Some(message.to_string());
            self
        }

        pub fn max_active(&self) -> usize {
            self.probe.max()
        }

        fn outcome(&self) -> Result<(), EngineError> {
            match &self.failure {
                Some(message) => Err(EngineError::new(message.clone())),
                None => Ok(()),
            }
        }
    }

    impl SpeechEngine for MockSpeechEngine {
        fn synthesize(
            &self,
            _voice: &VoiceConditioning,
            _text: &str,
            _language: &str,
            _options: &SynthesisOptions,
        ) -> Result<Vec<f32>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome()?;
            Ok(self.chunks.concat())
        }

        fn synthesize_chunked(
            &self,
            _voice: &VoiceConditioning,
            _text: &str,
            _language: &str,
            _options: &SynthesisOptions,
            stream_chunk_size: u32,
            on_chunk: WaveformCallback<'_>,
        ) -> Result<(), EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_chunk_size.store(stream_chunk_size, Ordering::SeqCst);
            self.probe.enter();
            for chunk in &self.chunks {
                if !self.chunk_delay.is_zero() {
                    std::thread::sleep(self.chunk_delay);
                }
                if !on_chunk(chunk.clone()) {
                    break;
                }
            }
            self.probe.exit();
            self.outcome()
        }

        fn compute_conditioning(&self, _reference_wav: &[u8]) -> Result<VoiceConditioning, EngineError> {
            Ok(VoiceConditioning {
                speaker_embedding: vec![0.0; 4],
                gpt_cond_latent: vec![vec![0.0; 4]; 2],
            })
        }

        fn languages(&self) -> Vec<String> {
            vec!["en".to_string(), "es".to_string()]
        }
    }
}

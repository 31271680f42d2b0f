use std::sync::Arc;
use std::time::Instant;
use async_trait::async_trait;
use tracing::{info, warn};
use crate::bridge::{BridgeOptions, run_blocking, start_stream};
use crate::config::ServeConfig;
use crate::error::Result;
use crate::framing::ndjson::{GenerationFrames, GenerationResponse, GenerationSummary};
use crate::gate::{GateWait, InferenceGate};
use super::core_trait::{ChunkCallback, GenerationEngine, GenerationService};
use super::options::GenerationRequest;
use super::session::{SessionRegistry, SessionSpec};

/// Token generation against one loaded model instance.
///
/// Every request is validated, then waits for the instance's gate, then
/// resolves its session and runs on the blocking pool. The gate is held
/// until the engine returns, including after a streaming client went away.
pub struct GenerationInference<E> {
    registry: SessionRegistry<E>,
    gate: Arc<InferenceGate>,
    spec: SessionSpec,
    bridge: BridgeOptions,
    wait: GateWait,
}

impl<E> GenerationInference<E>
where
    E: GenerationEngine,
{
    pub fn new(engine: E, spec: SessionSpec, gate: Arc<InferenceGate>) -> Self {
        Self {
            registry: SessionRegistry::new(Arc::new(engine)),
            gate,
            spec,
            bridge: BridgeOptions::default(),
            wait: GateWait::Queue,
        }
    }

    /// Builds the service from process configuration with a gate of its own.
    pub fn from_config(engine: E, config: &ServeConfig) -> Result<Self> {
        let spec = SessionSpec::from_config(config)?;
        Ok(Self::new(engine, spec, Arc::new(config.gate()))
            .with_bridge_options(config.bridge_options())
            .with_gate_wait(config.gate_wait()))
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

    pub fn registry(&self) -> &SessionRegistry<E> {
        &self.registry
    }
}

#[async_trait]
impl<E> GenerationService for GenerationInference<E>
where
    E: GenerationEngine,
{
    async fn infer(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        request.validate()?;
        let guard = self.gate.acquire_with(self.wait).await;
        let registry = self.registry.clone();
        let spec = self.spec.clone();

        run_blocking(move || {
            let inference_id = guard.inference_id().clone();
            let session_id = registry.resolve_or_create(request.session_id, &spec)?;
            let input_length = registry.engine().token_length(&spec.model_id, &request.prompt)?;

            let started = Instant::now();
            let output = registry
                .engine()
                .run_inference(session_id, request.n_eval, &request.prompt, request.options.as_ref(), None)
                .inspect_err(|e| warn!(%inference_id, error = %e, "inference failed"))?;
            info!(
                %inference_id,
                %session_id,
                tti_ms = started.elapsed().as_millis() as u64,
                held_ms = guard.held_for().as_millis() as u64,
                "inference complete"
            );
            drop(guard);

            Ok(GenerationResponse {
                session_id,
                input_length,
                result: output.result,
                context_length: output.context_length,
            })
        })
        .await
    }

    async fn infer_stream(&self, request: GenerationRequest) -> Result<GenerationFrames> {
        request.validate()?;
        let guard = self.gate.acquire_with(self.wait).await;

        let registry = self.registry.clone();
        let spec = self.spec.clone();
        let (guard, request, session_id, input_length) = run_blocking(move || {
            let session_id = registry.resolve_or_create(request.session_id, &spec)?;
            let input_length = registry.engine().token_length(&spec.model_id, &request.prompt)?;
            Ok((guard, request, session_id, input_length))
        })
        .await?;

        let registry = self.registry.clone();
        let stream = start_stream(&self.bridge, move |mut sender| {
            let inference_id = guard.inference_id().clone();
            let started = Instant::now();
            let mut first_chunk = true;

            let on_chunk: ChunkCallback<'_> = &mut |tokens: &str| {
                if first_chunk {
                    first_chunk = false;
                    info!(%inference_id, l1c_ms = started.elapsed().as_millis() as u64, "first chunk");
                }
                sender.send(tokens.to_string())
            };
            let output = registry
                .engine()
                .run_inference(
                    session_id,
                    request.n_eval,
                    &request.prompt,
                    request.options.as_ref(),
                    Some(on_chunk),
                )
                .inspect_err(|e| warn!(%inference_id, error = %e, "inference failed"))?;

            info!(
                %inference_id,
                %session_id,
                chunks = sender.sent(),
                tti_ms = started.elapsed().as_millis() as u64,
                held_ms = guard.held_for().as_millis() as u64,
                "inference complete"
            );
            drop(guard);

            Ok(GenerationSummary {
                session_id,
                input_length,
                context_length: output.context_length,
            })
        });

        Ok(GenerationFrames::new(stream))
    }
}

//! # Token Generation
//!
//! Gated, session-aware token generation on top of a blocking
//! [`GenerationEngine`].
//!
//! ## Key Components
//!
//! * [`GenerationEngine`] - The native engine's capability: sessions, token
//!   counting and callback-driven inference
//! * [`SessionRegistry`] - Stateless resolve-or-create over engine sessions
//! * [`GenerationService`] - Single-shot and NDJSON-streaming call shapes
//! * [`GenerationInference`] - The service for one model instance
//!
//! ## Request flow
//!
//! A request is validated, waits for the instance's [`InferenceGate`], has
//! its session resolved (reusing a live `session_id`, creating a session
//! otherwise), and runs on the blocking pool. Streaming requests forward each
//! decoded fragment through the bridge and finish with a done record
//! carrying the session id, prompt length and context length.
//!
//! [`InferenceGate`]: crate::gate::InferenceGate

mod core_trait;
mod options;
mod service;
mod session;

pub use core_trait::*;
pub use options::{Dynatemp, GenerationRequest, InferenceOptions, Mirostat, MirostatVersion, Penalty};
pub use service::GenerationInference;
pub use session::{SessionId, SessionRegistry, SessionSpec};
pub use crate::framing::ndjson::{GenerationFrames, GenerationResponse, GenerationSummary};

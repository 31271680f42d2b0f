//! # Kiln
//!
//! Gated, streaming access to stateful, blocking inference engines.
//!
//! ## Overview
//!
//! Native inference engines run one blocking call per inference and report
//! partial output through a callback. Services built on them need to let
//! many asynchronous clients share one loaded model, stream output as it is
//! produced, and keep generation sessions alive across requests. Kiln is the
//! layer in between.
//!
//! Key components include:
//!
//! - An inference gate that serializes work on each model instance and
//!   issues ordered inference ids
//! - A streaming bridge that runs a blocking producer on its own thread and
//!   exposes its chunks as a `futures::Stream`
//! - A session registry that reuses live token-generation sessions and
//!   creates new ones on a miss
//! - Wire framing: NDJSON for token generation, a prologue/chunks/epilogue
//!   envelope for synthesized audio
//!
//! ## Architecture
//!
//! A request flows through the components in a fixed order:
//!
//! ```text
//! request -> gate (acquire) -> session registry -> engine
//!                                                    |
//!                    client <- framing <- bridge <---+
//! ```
//!
//! Single-shot requests skip the bridge and run the engine call on the
//! blocking pool directly.
//!
//! ### Engines
//!
//! [`generation::GenerationEngine`] and [`speech::SpeechEngine`] describe
//! what kiln needs from a native engine. Implementations are blocking and
//! are only ever called from tokio's blocking pool.
//!
//! ### Services
//!
//! [`generation::GenerationService`] and [`speech::SpeechService`] are what a
//! request layer (HTTP server, serverless handler) calls. Each offers a
//! single-shot and a streaming shape.
//!
//! ## Features
//!
//! - **generation** - Token generation, session registry and NDJSON framing
//! - **speech** - Speech synthesis, WAV helpers and the audio envelope
//!
//! Both are enabled by default.
//!
//! ## Guarantees
//!
//! - At most one inference runs per gate at any time. Distinct gates are
//!   fully independent.
//! - Within a stream, chunks arrive in production order and are followed by
//!   exactly one termination, whether the engine succeeded, failed or
//!   panicked.
//! - Early stop is advisory. A client that disconnects sets a flag the
//!   engine sees through its callback; the engine is never interrupted, and
//!   the gate stays held until it returns.
//! - Requests with invalid framing are rejected before the gate is taken.

pub mod bridge;
pub mod config;
pub mod error;
pub mod framing;
pub mod gate;
pub mod logging;

#[cfg(feature = "generation")]
pub mod generation;

#[cfg(feature = "speech")]
pub mod speech;

#[cfg(test)]
mod mock_engine;

pub use config::ServeConfig;
pub use error::{ErrorCategory, KilnError, Result};
pub use gate::{GateGuard, GateWait, InferenceGate, InferenceId};

//! Error types shared by every layer of the crate.
//!
//! Errors fall into four broad categories, reported by [`KilnError::category`]:
//!
//! - **Engine** errors are raised by the opaque model engine while creating a
//!   session or running inference. They are carried verbatim to the caller or,
//!   for streams, into the stream's failure termination.
//! - **Configuration** errors are detected synchronously, before the gate is
//!   taken and before any engine call is made.
//! - **Stream** errors describe the bridge itself: an idle consumer read that
//!   timed out, or a producer that died without returning.
//! - **Encoding** errors come from serializing wire records or audio containers.
//!
//! Invalid session ids are not errors; they fall back to session creation.
//! The inference gate never fails, so there is no concurrency category.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a model engine implementation.
///
/// Engines are opaque capabilities, so their failures are carried as the
/// message the engine produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for EngineError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for EngineError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum KilnError {
    /// The engine failed while creating a session, measuring a prompt, or running inference.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// The request is structurally unusable, e.g. asks for zero tokens.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Envelope records are JSON, so raw binary frames cannot be mixed in.
    #[error("envelope mode requires encode_base64 to be enabled")]
    EnvelopeWithoutBase64,

    /// A configuration value could not be parsed.
    #[error("invalid configuration for {key}: {message}")]
    Config { key: String, message: String },

    /// The consumer waited longer than the configured idle timeout for the next item.
    #[error("no stream item received within {0:?}")]
    StreamIdle(Duration),

    /// The producer task ended without returning, usually because it panicked.
    #[error("producer failed: {0}")]
    ProducerFailed(String),

    #[error("json encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "speech")]
    #[error("wav encoding error: {0}")]
    Wav(#[from] hound::Error),
}

/// Coarse classification of a [`KilnError`], used for logging and by request
/// layers that map errors to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Engine,
    Configuration,
    Stream,
    Encoding,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Engine => write!(f, "engine"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Stream => write!(f, "stream"),
            ErrorCategory::Encoding => write!(f, "encoding"),
        }
    }
}

impl KilnError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            KilnError::Engine(_) => ErrorCategory::Engine,
            KilnError::InvalidRequest(_)
            | KilnError::EnvelopeWithoutBase64
            | KilnError::Config { .. } => ErrorCategory::Configuration,
            KilnError::StreamIdle(_) | KilnError::ProducerFailed(_) => ErrorCategory::Stream,
            KilnError::Json(_) => ErrorCategory::Encoding,
            #[cfg(feature = "speech")]
            KilnError::Wav(_) => ErrorCategory::Encoding,
        }
    }

    /// Whether the error was raised before any engine work was attempted.
    pub fn is_rejected_up_front(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    /// Message suitable for a client-facing error record.
    ///
    /// Engine failures are reported with the engine's own message, unprefixed.
    pub fn client_message(&self) -> String {
        match self {
            KilnError::Engine(inner) => inner.0.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KilnError>;

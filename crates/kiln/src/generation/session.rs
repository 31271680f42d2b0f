use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::config::ServeConfig;
use crate::error::Result;
use super::core_trait::GenerationEngine;

/// Engine-issued identifier of a generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SessionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Parameters for sessions created on a cache miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpec {
    pub model_id: String,
    pub context_size: Option<u32>,
    pub initial_prompt: Option<String>,
    pub state_file_path: Option<String>,
}

impl SessionSpec {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            context_size: None,
            initial_prompt: None,
            state_file_path: None,
        }
    }

    pub fn from_config(config: &ServeConfig) -> Result<Self> {
        Ok(Self {
            model_id: config.require_model_id()?,
            context_size: config.context_size,
            initial_prompt: config.initial_prompt.clone(),
            state_file_path: config.state_file_path.clone(),
        })
    }
}

/// # SessionRegistry
///
/// Resolves the session a generation request runs in.
///
/// The registry keeps no state of its own. Liveness is always asked of the
/// engine, which owns session storage and eviction, so the two can never
/// disagree.
pub struct SessionRegistry<E> {
    engine: Arc<E>,
}

impl<E> Clone for SessionRegistry<E> {
    fn clone(&self) -> Self {
        Self { engine: self.engine.clone() }
    }
}

impl<E> SessionRegistry<E>
where
    E: GenerationEngine,
{
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns `provided` if the engine still considers it live, otherwise
    /// creates a new session from `spec`.
    ///
    /// An unknown or expired id is not an error: it is treated exactly like a
    /// missing one.
    ///
    /// # Returns
    ///
    /// The session to run in, or the engine's error if creation failed.
    ///
    /// # Blocking
    ///
    /// Calls into the engine; run it off the async executor.
    pub fn resolve_or_create(&self, provided: Option<SessionId>, spec: &SessionSpec) -> Result<SessionId> {
        if let Some(id) = provided {
            if self.engine.touch(id) {
                debug!(session_id = %id, "reusing session");
                return Ok(id);
            }
            debug!(session_id = %id, "session not live, creating a new one");
        }

        let id = self.engine.create_session(
            &spec.model_id,
            spec.context_size,
            spec.initial_prompt.as_deref(),
            spec.state_file_path.as_deref(),
        )?;
        info!(session_id = %id, model_id = %spec.model_id, "created session");
        Ok(id)
    }
}

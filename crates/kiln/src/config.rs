//! Process-start configuration.
//!
//! Values are read once from the environment (or deserialized from a file by
//! the embedding service) and then handed to the gate, the bridge, and the
//! session registry. Empty environment variables count as unset.

use std::time::Duration;
use serde::Deserialize;
use crate::bridge::BridgeOptions;
use crate::error::{KilnError, Result};
use crate::gate::{GateWait, InferenceGate};

pub const MODEL_ID_ENV: &str = "MODEL_ID";
pub const MODEL_PATH_ENV: &str = "MODEL_PATH";
pub const CONTEXT_SIZE_ENV: &str = "CONTEXT_SIZE";
pub const INITIAL_PROMPT_ENV: &str = "INITIAL_PROMPT";
pub const STATE_FILE_PATH_ENV: &str = "STATE_FILE_PATH";
pub const INSTANCE_ID_ENV: &str = "KILN_INSTANCE_ID";
pub const STREAM_IDLE_TIMEOUT_ENV: &str = "KILN_STREAM_IDLE_TIMEOUT_MS";
pub const STREAM_QUEUE_CAPACITY_ENV: &str = "KILN_STREAM_QUEUE_CAPACITY";
pub const GATE_POLL_INTERVAL_ENV: &str = "KILN_GATE_POLL_INTERVAL_MS";

/// Configuration for one served model instance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Identifier the engine loaded the model under.
    pub model_id: Option<String>,
    /// Weights location. Only informational here; loading belongs to the engine host.
    pub model_path: Option<String>,
    pub context_size: Option<u32>,
    pub initial_prompt: Option<String>,
    pub state_file_path: Option<String>,
    /// Prefix of every inference id issued by this instance's gate.
    pub instance_id: String,
    /// Maximum time a stream consumer waits for the next item. Unset means forever.
    pub stream_idle_timeout_ms: Option<u64>,
    /// Bound on queued chunks per stream. Unset means unbounded.
    pub stream_queue_capacity: Option<usize>,
    /// When set, callers observe the gate at this interval before acquiring it.
    pub gate_poll_interval_ms: Option<u64>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            model_id: None,
            model_path: None,
            context_size: None,
            initial_prompt: None,
            state_file_path: None,
            instance_id: "1".to_string(),
            stream_idle_timeout_ms: None,
            stream_queue_capacity: None,
            gate_poll_interval_ms: None,
        }
    }
}

impl ServeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    ///
    /// # Parameters
    ///
    /// * `lookup` - Returns the raw value for an environment key, if any.
    ///
    /// # Returns
    ///
    /// The parsed configuration, or [`KilnError::Config`] naming the first
    /// numeric key that failed to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            model_id: get(MODEL_ID_ENV),
            model_path: get(MODEL_PATH_ENV),
            context_size: parse_opt(CONTEXT_SIZE_ENV, get(CONTEXT_SIZE_ENV))?,
            initial_prompt: get(INITIAL_PROMPT_ENV),
            state_file_path: get(STATE_FILE_PATH_ENV),
            instance_id: get(INSTANCE_ID_ENV).unwrap_or(defaults.instance_id),
            stream_idle_timeout_ms: parse_opt(STREAM_IDLE_TIMEOUT_ENV, get(STREAM_IDLE_TIMEOUT_ENV))?,
            stream_queue_capacity: parse_opt(STREAM_QUEUE_CAPACITY_ENV, get(STREAM_QUEUE_CAPACITY_ENV))?,
            gate_poll_interval_ms: parse_opt(GATE_POLL_INTERVAL_ENV, get(GATE_POLL_INTERVAL_ENV))?,
        })
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            idle_timeout: self.stream_idle_timeout_ms.map(Duration::from_millis),
            // a zero-capacity tokio channel is not constructible
            queue_capacity: self.stream_queue_capacity.filter(|capacity| *capacity > 0),
        }
    }

    pub fn gate_wait(&self) -> GateWait {
        match self.gate_poll_interval_ms {
            Some(ms) => GateWait::Poll(Duration::from_millis(ms)),
            None => GateWait::Queue,
        }
    }

    pub fn gate(&self) -> InferenceGate {
        InferenceGate::new(self.instance_id.clone())
    }

    pub(crate) fn require_model_id(&self) -> Result<String> {
        self.model_id.clone().ok_or_else(|| KilnError::Config {
            key: MODEL_ID_ENV.to_string(),
            message: "must be set".to_string(),
        })
    }
}

fn parse_opt<T>(key: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value.trim().parse::<T>().map_err(|e| KilnError::Config {
            key: key.to_string(),
            message: format!("{value:?}: {e}"),
        })
    })
    .transpose()
}

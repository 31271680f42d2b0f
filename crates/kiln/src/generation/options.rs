use serde::{Deserialize, Serialize};
use crate::error::{KilnError, Result};
use super::session::SessionId;

/// Sampling and decoding parameters forwarded to the engine untouched.
///
/// Every field is optional; an absent field means "engine default".
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceOptions {
    pub n_prev: Option<u32>,
    pub n_probs: Option<u32>,
    pub min_keep: Option<u32>,
    pub top_k: Option<i32>,
    pub top_p: Option<f32>,
    pub min_p: Option<f32>,
    pub tfs_z: Option<f32>,
    pub typical_p: Option<f32>,
    pub temp: Option<f32>,
    pub dynatemp: Option<Dynatemp>,
    pub penalty: Option<Penalty>,
    pub mirostat: Option<Mirostat>,
    pub seed: Option<u32>,
    pub grammar: Option<String>,
    pub stop_sequences: Option<Vec<String>>,
    pub lua_grammar: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Dynatemp {
    pub range: Option<f32>,
    pub exponent: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Penalty {
    pub last_n: Option<i32>,
    pub repeat: Option<f32>,
    pub freq: Option<f32>,
    pub present: Option<f32>,
    pub penalize_nl: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MirostatVersion {
    V1,
    V2,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Mirostat {
    pub version: MirostatVersion,
    #[serde(default)]
    pub tau: Option<f32>,
    #[serde(default)]
    pub eta: Option<f32>,
}

/// One token-generation request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerationRequest {
    /// Session to continue. Unknown or expired ids silently start a new session.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    pub prompt: String,
    /// Maximum number of tokens to generate.
    pub n_eval: u32,
    #[serde(default)]
    pub options: Option<InferenceOptions>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, n_eval: u32) -> Self {
        Self {
            session_id: None,
            prompt: prompt.into(),
            n_eval,
            options: None,
        }
    }

    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_options(mut self, options: InferenceOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.n_eval == 0 {
            return Err(KilnError::InvalidRequest("n_eval must be at least 1".to_string()));
        }
        Ok(())
    }
}

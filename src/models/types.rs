use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Generation parameters forwarded to the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl GenerationConfig {
    /// True when no parameter is set and the provider defaults apply
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none() && self.top_p.is_none()
    }
}

/// Response from a model
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// The full reply text (also the concatenation of streamed deltas)
    pub content: String,
    /// Usage statistics if available
    pub usage: Option<TokenUsage>,
    /// Model that generated the response
    pub model_name: String,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Stream callback type for real-time response streaming
pub type StreamCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Failure of a call to the external model service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("could not reach the model service: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("model service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("invalid response from model service: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Classify a non-success HTTP status and its error message
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth(message),
            429 => Self::Quota(message),
            400 if message.contains("API key") => Self::Auth(message),
            _ => Self::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

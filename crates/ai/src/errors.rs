//! Error types for AI provider calls.

use thiserror::Error;

/// Errors returned by AI providers and response parsing.
#[derive(Error, Debug, Clone)]
pub enum AiError {
    #[error("AI provider '{provider}' is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },

    /// Transport failure or a response body that is not the API's JSON.
    #[error("AI request failed: {reason}")]
    Request { reason: String },

    #[error("AI API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("AI response blocked by provider policy: {reason}")]
    Blocked { reason: String },

    #[error("AI response for model '{model}' contained no text")]
    EmptyResponse { model: String },

    #[error("Failed to parse AI response: {reason}")]
    ResponseParse { reason: String },

    #[error("No model configured for generation")]
    NoModels,
}

impl AiError {
    /// Whether trying a different model may succeed.
    ///
    /// Policy blocks and unparseable content are properties of the prompt,
    /// not of the model endpoint.
    pub fn is_model_failure(&self) -> bool {
        matches!(
            self,
            Self::Request { .. } | Self::Api { .. } | Self::EmptyResponse { .. }
        )
    }
}

/// Result alias for AI operations.
pub type AiResult<T> = Result<T, AiError>;

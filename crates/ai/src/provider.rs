//! AI Provider trait and common types.
//!
//! Defines the interface that all AI providers must implement.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{AiError, AiResult};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIRole {
    /// System message (sets context/behavior)
    System,
    /// User message (input)
    User,
    /// Assistant message (AI response)
    Assistant,
}

/// A message in a conversation with an AI model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIMessage {
    /// Role of the message sender
    pub role: AIRole,
    /// Content of the message
    pub content: String,
}

impl AIMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token usage information from an AI response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Response from an AI model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIResponse {
    /// Generated text content
    pub text: String,
    /// Token usage information
    pub usage: TokenUsage,
    /// Model that generated the response
    pub model: String,
    /// Provider that generated the response
    pub provider: String,
    /// Provider-reported reason generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Options for text generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Whether to request JSON output
    pub json_mode: bool,
}

impl GenerateOptions {
    /// Options requesting a JSON object response.
    pub fn json() -> Self {
        Self {
            json_mode: true,
            ..Default::default()
        }
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the output token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Trait for AI providers.
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Get the provider name (e.g., "gemini").
    fn name(&self) -> &'static str;

    /// Check if the provider is configured (has API key).
    fn is_configured(&self) -> bool;

    /// Generate text from messages.
    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> AiResult<AIResponse>;
}

/// Try each model in order until one produces a response.
///
/// Only endpoint failures (transport, HTTP status, empty output) move on to
/// the next model. The last error is returned when every model fails.
pub async fn generate_with_fallback(
    provider: &dyn AIProvider,
    models: &[String],
    messages: &[AIMessage],
    options: &GenerateOptions,
) -> AiResult<AIResponse> {
    let mut last_error = AiError::NoModels;

    for (attempt, model) in models.iter().enumerate() {
        match provider.generate_text(model, messages, options).await {
            Ok(response) => {
                if attempt > 0 {
                    tracing::info!(model = %model, attempt, "Fallback model succeeded");
                }
                return Ok(response);
            }
            Err(e) if e.is_model_failure() => {
                tracing::warn!(
                    provider = provider.name(),
                    model = %model,
                    error = %e,
                    "Model request failed"
                );
                last_error = e;
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error)
}

static FENCE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(?:json|JSON)?\s*").expect("valid fence regex"));
static FENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```$").expect("valid fence regex"));

/// Deserialize a structured object from an AI response.
///
/// Accepts a bare JSON object, one wrapped in a markdown code fence, or one
/// embedded in surrounding prose (first `{` through last `}`).
pub fn parse_ai_response<T: for<'de> Deserialize<'de>>(response: &AIResponse) -> AiResult<T> {
    let text = response.text.trim();
    let unfenced = FENCE_START.replace(text, "");
    let unfenced = FENCE_END.replace(&unfenced, "");
    let cleaned = unfenced.trim();

    let json_text = if cleaned.starts_with('{') && cleaned.ends_with('}') {
        cleaned
    } else {
        match (cleaned.find('{'), cleaned.rfind('}')) {
            (Some(start), Some(end)) if start < end => &cleaned[start..=end],
            _ => {
                return Err(AiError::ResponseParse {
                    reason: format!("response did not contain a JSON object. Response: {text}"),
                })
            }
        }
    };

    serde_json::from_str(json_text).map_err(|e| AiError::ResponseParse {
        reason: format!("Failed to parse AI response as JSON: {e}. Response: {text}"),
    })
}

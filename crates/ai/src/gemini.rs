//! Google Gemini provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{AiError, AiResult};

use super::provider::{AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions, TokenUsage};

/// Gemini REST API base
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default fallback model
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.5-flash-lite";

const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 16_384;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Finish reasons that mean the provider refused to complete the output.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

/// Google Gemini provider.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider with an API key.
    pub fn new(api_key: impl Into<String>) -> AiResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AiError::Request {
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    /// Set a custom base URL (proxies, tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Split messages into Gemini `contents` and a system instruction.
    fn convert_messages(messages: &[AIMessage]) -> (Vec<Content>, Option<Content>) {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for msg in messages {
            let part = Part {
                text: Some(msg.content.clone()),
            };
            match msg.role {
                AIRole::System => system_parts.push(part),
                AIRole::User => contents.push(Content {
                    role: Some("user"),
                    parts: vec![part],
                }),
                AIRole::Assistant => contents.push(Content {
                    role: Some("model"),
                    parts: vec![part],
                }),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: system_parts,
            })
        };

        (contents, system)
    }

    fn build_request(messages: &[AIMessage], options: &GenerateOptions) -> GenerateContentRequest {
        let (contents, system_instruction) = Self::convert_messages(messages);
        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                max_output_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
                response_mime_type: options.json_mode.then_some("application/json"),
            },
        }
    }
}

#[async_trait]
impl AIProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> AiResult<AIResponse> {
        if !self.is_configured() {
            return Err(AiError::NotConfigured {
                provider: "gemini".to_string(),
                reason: "API key is empty".to_string(),
            });
        }

        let request = Self::build_request(messages, options);
        let url = format!("{}/models/{model}:generateContent", self.base_url);

        tracing::debug!(model, messages = messages.len(), "Sending Gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Request {
                reason: format!("Gemini API request failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AiError::Request {
            reason: format!("Failed to read Gemini response: {e}"),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<GoogleErrorResponse>(&body) {
                Ok(error_response) => match error_response.error.status {
                    Some(code) => format!("{code}: {}", error_response.error.message),
                    None => error_response.error.message,
                },
                Err(_) => body,
            };
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| AiError::Request {
                reason: format!("Failed to decode Gemini response body: {e}"),
            })?;

        if let Some(reason) = api_response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Err(AiError::Blocked { reason });
        }

        let candidate = api_response
            .candidates
            .first()
            .ok_or_else(|| AiError::EmptyResponse {
                model: model.to_string(),
            })?;

        if let Some(reason) = candidate
            .finish_reason
            .as_deref()
            .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
        {
            return Err(AiError::Blocked {
                reason: reason.to_string(),
            });
        }

        let text: String = candidate
            .content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();
        let text = text.trim().to_string();

        if text.is_empty() {
            return Err(AiError::EmptyResponse {
                model: model.to_string(),
            });
        }

        let usage = api_response.usage_metadata.unwrap_or_default();

        tracing::debug!(
            model,
            input_tokens = usage.prompt_token_count,
            output_tokens = usage.candidates_token_count,
            finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown"),
            "Gemini response received"
        );

        Ok(AIResponse {
            text,
            usage: TokenUsage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            },
            model: api_response
                .model_version
                .unwrap_or_else(|| model.to_string()),
            provider: "gemini".to_string(),
            finish_reason: candidate.finish_reason.clone(),
        })
    }
}

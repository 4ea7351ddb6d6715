//! Error types for the digest pipeline.

use thiserror::Error;

/// Errors that abort a digest run.
///
/// None of these are recovered locally: any of them means no email is sent.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Missing or invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Network, HTTP or payload failure while fetching preprints
    #[error("Preprint fetch failed: {0}")]
    Fetch(String),

    /// AI provider call failed
    #[error("AI request failed: {0}")]
    Ai(#[from] ai::AiError),

    /// Model selection was malformed or incomplete
    #[error("Invalid paper selection: {0}")]
    Selection(String),

    /// Generated digest content was malformed or incomplete
    #[error("Invalid generated content: {0}")]
    Content(String),

    /// Prompt template failed to render
    #[error("Template error: {0}")]
    Template(String),

    /// Message construction or SMTP delivery failed
    #[error("Email delivery failed: {0}")]
    Mail(String),
}

impl From<handlebars::RenderError> for DigestError {
    fn from(e: handlebars::RenderError) -> Self {
        Self::Template(e.to_string())
    }
}

impl From<handlebars::TemplateError> for DigestError {
    fn from(e: handlebars::TemplateError) -> Self {
        Self::Template(e.to_string())
    }
}

/// Result alias for digest operations.
pub type DigestResult<T> = Result<T, DigestError>;

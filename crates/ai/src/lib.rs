#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

//! # AI
//!
//! Thin provider layer for hosted generative-AI models.
//!
//! This crate provides:
//! - The [`AIProvider`] trait and the message/option/response types shared by
//!   every provider
//! - A Google Gemini `generateContent` client
//! - Ordered model fallback ([`generate_with_fallback`])
//! - Extraction of JSON objects from model output ([`parse_ai_response`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use ai::{parse_ai_response, AIMessage, AIProvider, GeminiProvider, GenerateOptions};
//!
//! let provider = GeminiProvider::new(api_key)?;
//! let messages = vec![AIMessage::user("Reply with {\"ok\": true}")];
//! let response = provider
//!     .generate_text("gemini-2.5-flash", &messages, &GenerateOptions::json())
//!     .await?;
//! let value: serde_json::Value = parse_ai_response(&response)?;
//! ```

pub mod errors;
pub mod gemini;
pub mod provider;

pub use errors::{AiError, AiResult};
pub use gemini::GeminiProvider;
pub use provider::{
    generate_with_fallback, parse_ai_response, AIMessage, AIProvider, AIResponse, AIRole,
    GenerateOptions, TokenUsage,
};

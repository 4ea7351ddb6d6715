//! Daily bioRxiv digest.
//!
//! This crate provides:
//! - Paginated fetching of bioRxiv/medRxiv preprints for a lookback window
//! - Interest-based paper selection with Gemini
//! - AI summaries, a cross-paper synthesis and two concept explainers
//! - HTML and plain-text rendering of the digest email
//! - SMTP delivery with To/CC/BCC recipients

pub mod biorxiv;
pub mod config;
pub mod error;
pub mod generator;
pub mod mailer;
pub mod pipeline;
pub mod prompts;
pub mod ranker;
pub mod render;
pub mod topics;
pub mod types;

// Re-export main types
pub use biorxiv::{BiorxivClient, PaperSource};
pub use config::DigestConfig;
pub use error::{DigestError, DigestResult};
pub use generator::{AiContentGenerator, ContentGenerator};
pub use mailer::{Mailer, SmtpMailer};
pub use pipeline::{ComposeOutcome, ComposedDigest, DigestPipeline, PipelineSettings};
pub use ranker::{AiRanker, PaperRanker, SelectionPolicy};
pub use render::{DigestRenderer, RenderMeta};
pub use topics::TopicCatalogue;
pub use types::{
    Concept, DigestContent, EmailMessage, InterestProfile, LookbackWindow, Paper,
    PreprintServer, SelectionResult,
};

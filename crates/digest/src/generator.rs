//! Digest content generation: paper summaries, synthesis and concept blocks.

use std::sync::{Arc, LazyLock};

use ai::{generate_with_fallback, parse_ai_response, AIMessage, AIProvider, GenerateOptions};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::error::{DigestError, DigestResult};
use crate::prompts::{PromptManager, PromptPaper, GENERATE_TEMPLATE_NAME};
use crate::types::{Concept, DigestContent, InterestProfile, PaperSummary, SelectionResult};

/// Writes the text of a digest for a selection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produce summaries for every selected paper plus the three
    /// explanatory blocks; `topic` names the general concept.
    async fn generate(
        &self,
        selection: &SelectionResult,
        interests: &InterestProfile,
        topic: &str,
    ) -> DigestResult<DigestContent>;
}

#[derive(Debug, Default, Deserialize)]
struct RawContent {
    #[serde(default)]
    summaries: Vec<RawSummary>,
    #[serde(default)]
    idea: Vec<String>,
    #[serde(default)]
    general_concept: Vec<String>,
    #[serde(default)]
    specific_concept: RawConcept,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    id: String,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawConcept {
    #[serde(default)]
    name: String,
    #[serde(default)]
    points: Vec<String>,
}

/// Generates digest content with a single JSON-mode model call.
pub struct AiContentGenerator {
    provider: Arc<dyn AIProvider>,
    models: Vec<String>,
    prompts: PromptManager,
}

impl AiContentGenerator {
    pub fn new(provider: Arc<dyn AIProvider>, models: Vec<String>) -> DigestResult<Self> {
        Ok(Self {
            provider,
            models,
            prompts: PromptManager::new()?,
        })
    }
}

#[async_trait]
impl ContentGenerator for AiContentGenerator {
    async fn generate(
        &self,
        selection: &SelectionResult,
        interests: &InterestProfile,
        topic: &str,
    ) -> DigestResult<DigestContent> {
        let Some(first) = selection.papers().next() else {
            return Err(DigestError::Content(
                "cannot generate a digest for an empty selection".to_string(),
            ));
        };

        let papers: Vec<PromptPaper> = selection.papers().map(PromptPaper::from).collect();
        let data = serde_json::json!({
            "server": first.server.display_name(),
            "interests": interests.as_str(),
            "papers": papers,
            "general_topic": topic,
        });
        let prompt = self.prompts.render(GENERATE_TEMPLATE_NAME, &data)?;

        let messages = vec![AIMessage::system(SYSTEM_PROMPT), AIMessage::user(prompt)];
        let options = GenerateOptions::json()
            .with_temperature(0.2)
            .with_max_tokens(16384);

        let response =
            generate_with_fallback(self.provider.as_ref(), &self.models, &messages, &options)
                .await?;

        tracing::debug!(
            model = %response.model,
            output_tokens = response.usage.output_tokens,
            "Content response received"
        );

        let raw: RawContent = parse_ai_response(&response)
            .map_err(|e| DigestError::Content(format!("unusable content response: {e}")))?;

        let content = into_content(raw, topic);
        ensure_complete(&content, selection)?;
        Ok(content)
    }
}

static BULLET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("valid bullet regex"));

/// Trim a point and strip any list marker the model added.
fn clean_point(point: &str) -> String {
    BULLET_PREFIX.replace(point.trim(), "").trim().to_string()
}

fn clean_points(points: Vec<String>) -> Vec<String> {
    points
        .iter()
        .map(|p| clean_point(p))
        .filter(|p| !p.is_empty())
        .collect()
}

fn into_content(raw: RawContent, topic: &str) -> DigestContent {
    DigestContent {
        summaries: raw
            .summaries
            .into_iter()
            .map(|s| PaperSummary {
                paper_id: s.id.trim().to_uppercase(),
                summary: s.summary.trim().to_string(),
            })
            .collect(),
        idea: clean_points(raw.idea),
        general_concept: Concept::new(topic, clean_points(raw.general_concept)),
        interest_concept: Concept::new(
            raw.specific_concept.name.trim(),
            clean_points(raw.specific_concept.points),
        ),
    }
}

/// Check that every selected paper has a summary and no block is empty.
pub fn ensure_complete(content: &DigestContent, selection: &SelectionResult) -> DigestResult<()> {
    for paper in selection.papers() {
        match content.summary_for(&paper.id) {
            Some(summary) if !summary.trim().is_empty() => {}
            _ => {
                return Err(DigestError::Content(format!(
                    "missing summary for paper {}",
                    paper.id
                )))
            }
        }
    }

    let extra = content
        .summaries
        .iter()
        .filter(|s| !selection.papers().any(|p| p.id == s.paper_id))
        .count();
    if extra > 0 {
        tracing::warn!(extra, "Ignoring summaries for papers that were not selected");
    }

    if content.idea.is_empty() {
        return Err(DigestError::Content("idea block is empty".to_string()));
    }
    if content.general_concept.points.is_empty() {
        return Err(DigestError::Content(
            "general concept block is empty".to_string(),
        ));
    }
    if content.interest_concept.title.is_empty() || content.interest_concept.points.is_empty() {
        return Err(DigestError::Content(
            "interest concept block is empty".to_string(),
        ));
    }

    Ok(())
}

const SYSTEM_PROMPT: &str = "You write concise, accurate scientific digests. Summaries must \
stay faithful to the abstracts you are given and never invent results. Always respond with \
valid JSON containing plain text strings.";

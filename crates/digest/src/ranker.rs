//! Interest-based paper selection using an AI provider.

use std::collections::HashSet;
use std::sync::Arc;

use ai::{generate_with_fallback, parse_ai_response, AIMessage, AIProvider, GenerateOptions};
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{DigestError, DigestResult};
use crate::prompts::{PromptManager, PromptPaper, RANK_TEMPLATE_NAME};
use crate::types::{InterestProfile, Paper, SelectedPaper, SelectionResult};

/// Number of papers a digest features.
pub const SELECTION_SIZE: usize = 5;

/// How strictly a short selection is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Accept between one and five papers.
    #[default]
    Lenient,
    /// Require five papers, or every candidate when there are fewer.
    Strict,
}

impl SelectionPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// Chooses the papers a digest features.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaperRanker: Send + Sync {
    /// Pick up to [`SELECTION_SIZE`] papers from `candidates`.
    async fn rank(
        &self,
        candidates: &[Paper],
        interests: &InterestProfile,
    ) -> DigestResult<SelectionResult>;
}

/// Raw response from AI for parsing.
#[derive(Debug, Deserialize)]
struct RawSelection {
    selected: Vec<RawPick>,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct RawPick {
    id: String,
    #[serde(default)]
    reason: String,
}

/// Ranks papers by asking the model to choose.
pub struct AiRanker {
    provider: Arc<dyn AIProvider>,
    models: Vec<String>,
    prompts: PromptManager,
    policy: SelectionPolicy,
}

impl AiRanker {
    /// Create a new ranker trying `models` in order.
    pub fn new(
        provider: Arc<dyn AIProvider>,
        models: Vec<String>,
        policy: SelectionPolicy,
    ) -> DigestResult<Self> {
        Ok(Self {
            provider,
            models,
            prompts: PromptManager::new()?,
            policy,
        })
    }

    fn build_prompt(
        &self,
        candidates: &[Paper],
        interests: &InterestProfile,
    ) -> DigestResult<String> {
        let papers: Vec<PromptPaper> = candidates.iter().map(PromptPaper::from).collect();
        let data = serde_json::json!({
            "server": candidates[0].server.display_name(),
            "interests": interests.as_str(),
            "selection_size": SELECTION_SIZE.min(candidates.len()),
            "papers": papers,
        });
        self.prompts.render(RANK_TEMPLATE_NAME, &data)
    }
}

#[async_trait]
impl PaperRanker for AiRanker {
    async fn rank(
        &self,
        candidates: &[Paper],
        interests: &InterestProfile,
    ) -> DigestResult<SelectionResult> {
        if candidates.is_empty() {
            return Err(DigestError::Selection(
                "no candidate papers to rank".to_string(),
            ));
        }

        let prompt = self.build_prompt(candidates, interests)?;
        let messages = vec![AIMessage::system(SYSTEM_PROMPT), AIMessage::user(prompt)];
        let options = GenerateOptions::json()
            .with_temperature(0.2)
            .with_max_tokens(8192);

        let response =
            generate_with_fallback(self.provider.as_ref(), &self.models, &messages, &options)
                .await?;

        tracing::debug!(
            model = %response.model,
            output_tokens = response.usage.output_tokens,
            "Ranking response received"
        );

        let raw: RawSelection = parse_ai_response(&response)
            .map_err(|e| DigestError::Selection(format!("unusable ranking response: {e}")))?;

        build_selection(raw, candidates, self.policy)
    }
}

/// Resolve model picks against the candidates, rejecting anything malformed.
fn build_selection(
    raw: RawSelection,
    candidates: &[Paper],
    policy: SelectionPolicy,
) -> DigestResult<SelectionResult> {
    let mut selected = Vec::with_capacity(raw.selected.len());

    for pick in raw.selected {
        let id = pick.id.trim();
        let paper = candidates
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| {
                DigestError::Selection(format!("model selected unknown paper id '{id}'"))
            })?;
        selected.push(SelectedPaper {
            paper: paper.clone(),
            reason: pick.reason.trim().to_string(),
        });
    }

    let selection = SelectionResult {
        selected,
        rationale: raw.rationale.trim().to_string(),
    };
    validate_selection(&selection, candidates, policy)?;
    Ok(selection)
}

/// Check that a selection is non-empty, at most [`SELECTION_SIZE`] long,
/// free of duplicates, and drawn entirely from `candidates`.
pub fn validate_selection(
    selection: &SelectionResult,
    candidates: &[Paper],
    policy: SelectionPolicy,
) -> DigestResult<()> {
    if selection.is_empty() {
        return Err(DigestError::Selection("model selected no papers".to_string()));
    }
    if selection.len() > SELECTION_SIZE {
        return Err(DigestError::Selection(format!(
            "model selected {} papers, at most {SELECTION_SIZE} allowed",
            selection.len()
        )));
    }

    let mut seen = HashSet::new();
    for paper in selection.papers() {
        if !candidates.contains(paper) {
            return Err(DigestError::Selection(format!(
                "selected paper '{}' is not among the candidates",
                paper.id
            )));
        }
        if !seen.insert(paper.id.as_str()) {
            return Err(DigestError::Selection(format!(
                "paper '{}' selected more than once",
                paper.id
            )));
        }
    }

    let expected = SELECTION_SIZE.min(candidates.len());
    if selection.len() < expected {
        match policy {
            SelectionPolicy::Strict => {
                return Err(DigestError::Selection(format!(
                    "model selected {} papers, expected {expected}",
                    selection.len()
                )));
            }
            SelectionPolicy::Lenient => {
                tracing::warn!(
                    selected = selection.len(),
                    expected,
                    "Model returned a short selection"
                );
            }
        }
    }

    Ok(())
}

const SYSTEM_PROMPT: &str = "You are a careful scientific editor selecting preprints for a \
reader with specific research interests. You judge relevance, scientific impact and \
methodological robustness. Always respond with valid JSON and only reference paper ids \
that appear in the provided list.";

#[cfg(test)]
mod tests {
    use super::*;
    use ai::{AIResponse, AiResult, TokenUsage};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    use crate::types::PreprintServer;

    pub(crate) fn papers(n: usize) -> Vec<Paper> {
        (1..=n)
            .map(|i| Paper {
                id: format!("P{i:02}"),
                doi: format!("10.1101/2024.05.0{i}"),
                version: Some(1),
                title: format!("Paper {i}"),
                authors: vec!["Smith, J.".to_string()],
                date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
                category: "immunology".to_string(),
                abstract_text: format!("Abstract {i}"),
                server: PreprintServer::Biorxiv,
            })
            .collect()
    }

    fn interests() -> InterestProfile {
        InterestProfile::new("immunology").unwrap()
    }

    /// Provider returning one canned text and capturing prompts.
    struct CannedProvider {
        text: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedProvider {
        fn new(text: &str) -> Arc<Self> {
            Arc::new(Self {
                text: text.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AIProvider for CannedProvider {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn generate_text(
            &self,
            model: &str,
            messages: &[AIMessage],
            _options: &GenerateOptions,
        ) -> AiResult<AIResponse> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.extend(messages.iter().map(|m| m.content.clone()));
            Ok(AIResponse {
                text: self.text.clone(),
                usage: TokenUsage::default(),
                model: model.to_string(),
                provider: "canned".to_string(),
                finish_reason: None,
            })
        }
    }

    fn ranker(provider: Arc<CannedProvider>, policy: SelectionPolicy) -> AiRanker {
        AiRanker::new(provider, vec!["test-model".to_string()], policy).unwrap()
    }

    #[tokio::test]
    async fn test_rank_resolves_ids_in_model_order() {
        let provider = CannedProvider::new(
            r#"```json
{"selected": [{"id": "P03", "reason": "Most relevant"}, {"id": "p01", "reason": "Rigorous"}],
 "rationale": "Both address T cell biology."}
```"#,
        );
        let candidates = papers(3);

        let selection = ranker(provider.clone(), SelectionPolicy::Lenient)
            .rank(&candidates, &interests())
            .await
            .unwrap();

        let ids: Vec<_> = selection.papers().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["P03", "P01"]);
        assert_eq!(selection.selected[0].reason, "Most relevant");
        assert_eq!(selection.rationale, "Both address T cell biology.");

        let prompts = provider.prompts.lock().unwrap();
        let user_prompt = &prompts[1];
        assert!(user_prompt.contains("USER_INTERESTS:\nimmunology"));
        assert!(user_prompt.contains("[P02] Title: Paper 2"));
        assert!(user_prompt.contains("Select the 3 papers"));
    }

    #[tokio::test]
    async fn test_rank_rejects_fabricated_paper() {
        let provider = CannedProvider::new(r#"{"selected": [{"id": "P09", "reason": "x"}]}"#);

        let err = ranker(provider, SelectionPolicy::Lenient)
            .rank(&papers(3), &interests())
            .await
            .unwrap_err();

        assert!(matches!(err, DigestError::Selection(msg) if msg.contains("P09")));
    }

    #[tokio::test]
    async fn test_rank_rejects_malformed_output() {
        let provider = CannedProvider::new("Here are my favourite papers: P01, P02.");

        let err = ranker(provider, SelectionPolicy::Lenient)
            .rank(&papers(3), &interests())
            .await
            .unwrap_err();

        assert!(matches!(err, DigestError::Selection(_)));
    }

    #[tokio::test]
    async fn test_rank_rejects_empty_candidates() {
        let provider = CannedProvider::new("{}");
        let err = ranker(provider.clone(), SelectionPolicy::Lenient)
            .rank(&[], &interests())
            .await
            .unwrap_err();

        assert!(matches!(err, DigestError::Selection(_)));
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    fn selection_of(candidates: &[Paper], ids: &[&str]) -> SelectionResult {
        SelectionResult {
            selected: ids
                .iter()
                .map(|id| SelectedPaper {
                    paper: candidates.iter().find(|p| p.id == *id).unwrap().clone(),
                    reason: String::new(),
                })
                .collect(),
            rationale: String::new(),
        }
    }

    #[test]
    fn test_validate_rejects_more_than_five() {
        let candidates = papers(8);
        let selection = selection_of(&candidates, &["P01", "P02", "P03", "P04", "P05", "P06"]);
        assert!(validate_selection(&selection, &candidates, SelectionPolicy::Lenient).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let candidates = papers(8);
        let selection = selection_of(&candidates, &["P01", "P02", "P01"]);
        assert!(validate_selection(&selection, &candidates, SelectionPolicy::Lenient).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_selection() {
        let candidates = papers(3);
        let selection = SelectionResult::default();
        assert!(validate_selection(&selection, &candidates, SelectionPolicy::Lenient).is_err());
    }

    #[test]
    fn test_validate_rejects_papers_outside_candidates() {
        let candidates = papers(3);
        let mut outsider = papers(4).pop().unwrap();
        outsider.title = "Not offered".to_string();
        let selection = SelectionResult {
            selected: vec![SelectedPaper {
                paper: outsider,
                reason: String::new(),
            }],
            rationale: String::new(),
        };
        assert!(validate_selection(&selection, &candidates, SelectionPolicy::Lenient).is_err());
    }

    #[test]
    fn test_short_selection_depends_on_policy() {
        let candidates = papers(8);
        let selection = selection_of(&candidates, &["P01", "P02", "P03"]);

        assert!(validate_selection(&selection, &candidates, SelectionPolicy::Lenient).is_ok());
        assert!(validate_selection(&selection, &candidates, SelectionPolicy::Strict).is_err());
    }

    #[test]
    fn test_strict_accepts_every_candidate_when_fewer_than_five() {
        let candidates = papers(3);
        let selection = selection_of(&candidates, &["P02", "P01", "P03"]);
        assert!(validate_selection(&selection, &candidates, SelectionPolicy::Strict).is_ok());
    }
}

//! End-to-end digest pipeline.
//!
//! Orchestrates the full flow:
//! 1. Fetch papers for the lookback window
//! 2. Cap the candidate list
//! 3. Rank and validate the selection
//! 4. Generate and validate summaries and concept blocks
//! 5. Render the email and send it exactly once

use std::sync::Arc;

use chrono::NaiveDate;

use crate::biorxiv::PaperSource;
use crate::config::{DigestConfig, Recipients};
use crate::error::DigestResult;
use crate::generator::{ensure_complete, ContentGenerator};
use crate::mailer::Mailer;
use crate::ranker::{validate_selection, PaperRanker, SelectionPolicy};
use crate::render::{DigestRenderer, RenderMeta};
use crate::topics::TopicCatalogue;
use crate::types::{
    DigestContent, EmailMessage, InterestProfile, LookbackWindow, PreprintServer,
    RenderedDigest, SelectionResult,
};

/// Settings the pipeline needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub interests: InterestProfile,
    pub server: PreprintServer,
    pub lookback_days: u32,
    pub max_papers_for_ai: usize,
    pub policy: SelectionPolicy,
    pub from_email: String,
    pub recipients: Recipients,
    pub topics: TopicCatalogue,
}

impl PipelineSettings {
    pub fn from_config(config: &DigestConfig, topics: TopicCatalogue) -> Self {
        Self {
            interests: config.interests.clone(),
            server: config.feed.server,
            lookback_days: config.feed.lookback_days,
            max_papers_for_ai: config.feed.max_papers_for_ai,
            policy: SelectionPolicy::from_strict_flag(config.strict_selection),
            from_email: config.from_email.clone(),
            recipients: config.recipients.clone(),
            topics,
        }
    }
}

/// A digest ready to send.
#[derive(Debug, Clone)]
pub struct ComposedDigest {
    pub selection: SelectionResult,
    pub content: DigestContent,
    pub rendered: RenderedDigest,
    pub message: EmailMessage,
}

/// Result of composing a digest.
#[derive(Debug, Clone)]
pub enum ComposeOutcome {
    /// The lookback window held no papers; nothing is sent.
    NoPapers,
    Composed(Box<ComposedDigest>),
}

/// Runs the fetch → rank → generate → render → send flow.
pub struct DigestPipeline {
    source: Arc<dyn PaperSource>,
    ranker: Arc<dyn PaperRanker>,
    generator: Arc<dyn ContentGenerator>,
    mailer: Arc<dyn Mailer>,
    settings: PipelineSettings,
}

impl DigestPipeline {
    pub fn new(
        source: Arc<dyn PaperSource>,
        ranker: Arc<dyn PaperRanker>,
        generator: Arc<dyn ContentGenerator>,
        mailer: Arc<dyn Mailer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            ranker,
            generator,
            mailer,
            settings,
        }
    }

    /// Build the digest for `run_date` without sending it.
    ///
    /// `generated_at` is the label shown in the email header.
    pub async fn compose(
        &self,
        run_date: NaiveDate,
        generated_at: &str,
    ) -> DigestResult<ComposeOutcome> {
        let settings = &self.settings;
        let window = LookbackWindow::ending_on(run_date, settings.lookback_days);

        tracing::info!(window = %window, server = %settings.server, "Fetching preprints");
        let mut candidates = self.source.fetch(&window).await?;

        if candidates.is_empty() {
            tracing::info!(window = %window, "No papers in lookback window, skipping digest");
            return Ok(ComposeOutcome::NoPapers);
        }

        if candidates.len() > settings.max_papers_for_ai {
            tracing::info!(
                fetched = candidates.len(),
                cap = settings.max_papers_for_ai,
                "Capping candidates offered to the ranker"
            );
            candidates.truncate(settings.max_papers_for_ai);
        }

        tracing::info!(candidates = candidates.len(), "Ranking papers");
        let selection = self.ranker.rank(&candidates, &settings.interests).await?;
        validate_selection(&selection, &candidates, settings.policy)?;

        let topic = settings.topics.topic_for(run_date).to_string();
        tracing::info!(selected = selection.len(), topic = %topic, "Generating digest content");
        let content = self
            .generator
            .generate(&selection, &settings.interests, &topic)
            .await?;
        ensure_complete(&content, &selection)?;

        let meta = RenderMeta {
            run_date,
            generated_at: generated_at.to_string(),
            server: settings.server,
            topic,
        };
        let rendered = DigestRenderer::render(&selection, &content, &meta);
        tracing::info!(subject = %rendered.subject, "Rendered digest");

        let message = EmailMessage {
            from: settings.from_email.clone(),
            to: settings.recipients.to.clone(),
            cc: settings.recipients.cc.clone(),
            bcc: settings.recipients.bcc.clone(),
            subject: rendered.subject.clone(),
            html_body: rendered.html_body.clone(),
            text_body: rendered.text_body.clone(),
        };

        Ok(ComposeOutcome::Composed(Box::new(ComposedDigest {
            selection,
            content,
            rendered,
            message,
        })))
    }

    /// Compose the digest for `run_date` and send it.
    pub async fn run(
        &self,
        run_date: NaiveDate,
        generated_at: &str,
    ) -> DigestResult<ComposeOutcome> {
        let outcome = self.compose(run_date, generated_at).await?;

        if let ComposeOutcome::Composed(digest) = &outcome {
            self.mailer.send(&digest.message).await?;
            tracing::info!(
                papers = digest.selection.len(),
                recipients = digest.message.all_recipients().count(),
                "Digest delivered"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biorxiv::MockPaperSource;
    use crate::error::DigestError;
    use crate::generator::MockContentGenerator;
    use crate::mailer::MockMailer;
    use crate::ranker::MockPaperRanker;
    use crate::types::{Concept, Paper, PaperSummary, SelectedPaper};

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn papers(n: usize) -> Vec<Paper> {
        (1..=n)
            .map(|i| Paper {
                id: format!("P{i:02}"),
                doi: format!("10.1101/2024.05.10.{i:06}"),
                version: Some(1),
                title: format!("Immune paper number {i}"),
                authors: vec!["Smith, J.".to_string()],
                date: run_date(),
                category: "immunology".to_string(),
                abstract_text: format!("Abstract {i}"),
                server: PreprintServer::Biorxiv,
            })
            .collect()
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            interests: InterestProfile::new("immunology").unwrap(),
            server: PreprintServer::Biorxiv,
            lookback_days: 1,
            max_papers_for_ai: 60,
            policy: SelectionPolicy::Lenient,
            from_email: "digest@example.com".to_string(),
            recipients: Recipients {
                to: vec!["reader@example.com".to_string()],
                cc: vec![],
                bcc: vec!["hidden@example.com".to_string()],
            },
            topics: TopicCatalogue::builtin(),
        }
    }

    fn select_all(candidates: &[Paper]) -> SelectionResult {
        SelectionResult {
            selected: candidates
                .iter()
                .map(|p| SelectedPaper {
                    paper: p.clone(),
                    reason: format!("Reason for {}", p.id),
                })
                .collect(),
            rationale: "All three are on topic.".to_string(),
        }
    }

    fn placeholder_content(selection: &SelectionResult, topic: &str) -> DigestContent {
        DigestContent {
            summaries: selection
                .papers()
                .map(|p| PaperSummary {
                    paper_id: p.id.clone(),
                    summary: format!("Summary placeholder {}", p.id),
                })
                .collect(),
            idea: vec!["Idea placeholder".to_string()],
            general_concept: Concept::new(topic, vec!["General placeholder".to_string()]),
            interest_concept: Concept::new(
                "Interest concept",
                vec!["Interest placeholder".to_string()],
            ),
        }
    }

    fn pipeline(
        source: MockPaperSource,
        ranker: MockPaperRanker,
        generator: MockContentGenerator,
        mailer: MockMailer,
        settings: PipelineSettings,
    ) -> DigestPipeline {
        DigestPipeline::new(
            Arc::new(source),
            Arc::new(ranker),
            Arc::new(generator),
            Arc::new(mailer),
            settings,
        )
    }

    #[tokio::test]
    async fn test_end_to_end_sends_one_complete_digest() {
        let mut source = MockPaperSource::new();
        source
            .expect_fetch()
            .withf(|w| {
                w.start == NaiveDate::from_ymd_opt(2024, 5, 9).unwrap() && w.end == run_date()
            })
            .times(1)
            .returning(|_| Ok(papers(3)));

        let mut ranker = MockPaperRanker::new();
        ranker
            .expect_rank()
            .withf(|candidates, interests| {
                candidates.len() == 3 && interests.as_str() == "immunology"
            })
            .times(1)
            .returning(|candidates, _| Ok(select_all(candidates)));

        let mut generator = MockContentGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|selection, _, topic| Ok(placeholder_content(selection, topic)));

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|message| {
                let body = &message.html_body;
                (1..=3).all(|i| body.contains(&format!("Immune paper number {i}")))
                    && body.contains("Summary placeholder P01")
                    && body.contains("Idea placeholder")
                    && body.contains("General placeholder")
                    && body.contains("Interest placeholder")
                    && message.subject == "bioRxiv digest: (2024-05-10)"
                    && message.bcc == vec!["hidden@example.com".to_string()]
            })
            .times(1)
            .returning(|_| Ok(()));

        let outcome = pipeline(source, ranker, generator, mailer, settings())
            .run(run_date(), "2024-05-10 07:00 EDT")
            .await
            .unwrap();

        match outcome {
            ComposeOutcome::Composed(digest) => {
                assert_eq!(digest.selection.len(), 3);
                assert!(digest.rendered.text_body.contains("Interest placeholder"));
            }
            ComposeOutcome::NoPapers => panic!("expected a composed digest"),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_pipeline() {
        let mut source = MockPaperSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_| Err(DigestError::Fetch("connection reset".to_string())));

        let mut ranker = MockPaperRanker::new();
        ranker.expect_rank().never();
        let mut generator = MockContentGenerator::new();
        generator.expect_generate().never();
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();

        let err = pipeline(source, ranker, generator, mailer, settings())
            .run(run_date(), "now")
            .await
            .unwrap_err();

        assert!(matches!(err, DigestError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_empty_window_sends_nothing() {
        let mut source = MockPaperSource::new();
        source.expect_fetch().times(1).returning(|_| Ok(Vec::new()));

        let mut ranker = MockPaperRanker::new();
        ranker.expect_rank().never();
        let mut generator = MockContentGenerator::new();
        generator.expect_generate().never();
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();

        let outcome = pipeline(source, ranker, generator, mailer, settings())
            .run(run_date(), "now")
            .await
            .unwrap();

        assert!(matches!(outcome, ComposeOutcome::NoPapers));
    }

    #[tokio::test]
    async fn test_candidates_are_capped() {
        let mut source = MockPaperSource::new();
        source.expect_fetch().returning(|_| Ok(papers(10)));

        let mut ranker = MockPaperRanker::new();
        ranker
            .expect_rank()
            .withf(|candidates, _| candidates.len() == 4 && candidates[3].id == "P04")
            .times(1)
            .returning(|candidates, _| Ok(select_all(&candidates[..2])));

        let mut generator = MockContentGenerator::new();
        generator
            .expect_generate()
            .returning(|selection, _, topic| Ok(placeholder_content(selection, topic)));

        let mut settings = settings();
        settings.max_papers_for_ai = 4;

        let outcome = pipeline(source, ranker, generator, MockMailer::new(), settings)
            .compose(run_date(), "now")
            .await
            .unwrap();

        assert!(matches!(outcome, ComposeOutcome::Composed(_)));
    }

    #[tokio::test]
    async fn test_invalid_ranker_output_aborts_before_generation() {
        let mut source = MockPaperSource::new();
        source.expect_fetch().returning(|_| Ok(papers(7)));

        let mut ranker = MockPaperRanker::new();
        ranker
            .expect_rank()
            .returning(|candidates, _| Ok(select_all(&candidates[..6])));

        let mut generator = MockContentGenerator::new();
        generator.expect_generate().never();
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();

        let err = pipeline(source, ranker, generator, mailer, settings())
            .run(run_date(), "now")
            .await
            .unwrap_err();

        assert!(matches!(err, DigestError::Selection(_)));
    }

    #[tokio::test]
    async fn test_incomplete_content_is_never_sent() {
        let mut source = MockPaperSource::new();
        source.expect_fetch().returning(|_| Ok(papers(3)));

        let mut ranker = MockPaperRanker::new();
        ranker
            .expect_rank()
            .returning(|candidates, _| Ok(select_all(candidates)));

        let mut generator = MockContentGenerator::new();
        generator.expect_generate().returning(|selection, _, topic| {
            let mut content = placeholder_content(selection, topic);
            content.summaries.pop();
            Ok(content)
        });

        let mut mailer = MockMailer::new();
        mailer.expect_send().never();

        let err = pipeline(source, ranker, generator, mailer, settings())
            .run(run_date(), "now")
            .await
            .unwrap_err();

        assert!(matches!(err, DigestError::Content(_)));
    }

    #[tokio::test]
    async fn test_mail_failure_is_reported() {
        let mut source = MockPaperSource::new();
        source.expect_fetch().returning(|_| Ok(papers(1)));

        let mut ranker = MockPaperRanker::new();
        ranker
            .expect_rank()
            .returning(|candidates, _| Ok(select_all(candidates)));

        let mut generator = MockContentGenerator::new();
        generator
            .expect_generate()
            .returning(|selection, _, topic| Ok(placeholder_content(selection, topic)));

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_| Err(DigestError::Mail("535 auth failed".to_string())));

        let err = pipeline(source, ranker, generator, mailer, settings())
            .run(run_date(), "now")
            .await
            .unwrap_err();

        assert!(matches!(err, DigestError::Mail(_)));
    }
}

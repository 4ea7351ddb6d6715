//! Catalogue of general concepts explained in the digest.

use std::path::Path;

use chrono::{Datelike, NaiveDate};

use crate::error::{DigestError, DigestResult};

/// Built-in topics, one of which is explained per digest.
const BUILTIN_TOPICS: &[&str] = &[
    "Entropy and the second law of thermodynamics",
    "Bayesian inference and prior sensitivity",
    "Natural selection and fitness landscapes",
    "Game theory and evolutionarily stable strategies",
    "Information theory and channel capacity",
    "Statistical power and false discovery rates",
    "Phase transitions and critical phenomena",
    "Network theory and scale-free graphs",
    "Feedback control and homeostasis",
    "Diffusion and random walks",
    "Chaos and sensitivity to initial conditions",
    "Allometric scaling laws",
    "Causal inference and confounding",
    "Signal detection theory",
    "Neutral theory of molecular evolution",
    "Dimensionality reduction and latent structure",
    "Free energy landscapes in protein folding",
    "Stochastic gene expression and noise",
    "Reaction-diffusion systems and pattern formation",
    "Optimal foraging theory",
    "Markov processes and stationary distributions",
    "Emergence and self-organization",
    "Robustness and evolvability trade-offs",
    "Hierarchical models and partial pooling",
    "Multiple testing and reproducibility",
    "Kinetic proofreading",
    "Population genetics of genetic drift",
    "Information bottlenecks in biological signaling",
    "Cooperativity and ultrasensitivity",
    "Ergodicity and time versus ensemble averages",
];

/// Ordered list of general concept topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCatalogue {
    topics: Vec<String>,
}

impl Default for TopicCatalogue {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TopicCatalogue {
    /// The built-in catalogue.
    pub fn builtin() -> Self {
        Self {
            topics: BUILTIN_TOPICS.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    /// Load a catalogue from a JSON array of strings, or use the built-in one.
    pub fn load(path: Option<&Path>) -> DigestResult<Self> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };

        let raw = std::fs::read_to_string(path).map_err(|e| {
            DigestError::Config(format!("cannot read topics file {}: {e}", path.display()))
        })?;
        let topics: Vec<String> = serde_json::from_str(&raw).map_err(|e| {
            DigestError::Config(format!(
                "topics file {} is not a JSON array of strings: {e}",
                path.display()
            ))
        })?;

        let topics: Vec<String> = topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if topics.is_empty() {
            return Err(DigestError::Config(format!(
                "topics file {} contains no topics",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), count = topics.len(), "Loaded topic catalogue");
        Ok(Self { topics })
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Topic for the digest of `date`; the same date always gets the same topic
    /// and consecutive dates walk through the catalogue.
    pub fn topic_for(&self, date: NaiveDate) -> &str {
        let day = usize::try_from(date.num_days_from_ce().unsigned_abs()).unwrap_or_default();
        &self.topics[day % self.topics.len()]
    }
}

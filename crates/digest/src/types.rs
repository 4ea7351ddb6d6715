//! Core data types flowing through one digest run.

use std::fmt;

use chrono::{Days, NaiveDate};

/// Preprint server queried through the bioRxiv API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreprintServer {
    #[default]
    Biorxiv,
    Medrxiv,
}

impl PreprintServer {
    /// Parse a server name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "biorxiv" => Some(Self::Biorxiv),
            "medrxiv" => Some(Self::Medrxiv),
            _ => None,
        }
    }

    /// Path segment used by the API.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Biorxiv => "biorxiv",
            Self::Medrxiv => "medrxiv",
        }
    }

    /// Human-facing name.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Biorxiv => "bioRxiv",
            Self::Medrxiv => "medRxiv",
        }
    }

    const fn content_host(self) -> &'static str {
        match self {
            Self::Biorxiv => "https://www.biorxiv.org",
            Self::Medrxiv => "https://www.medrxiv.org",
        }
    }
}

impl fmt::Display for PreprintServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A preprint fetched for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paper {
    /// Run-local identifier (`P01`, `P02`, ...) used in prompts.
    pub id: String,
    pub doi: String,
    /// Latest posted version, if known.
    pub version: Option<u32>,
    pub title: String,
    pub authors: Vec<String>,
    /// Posting date of this version.
    pub date: NaiveDate,
    pub category: String,
    pub abstract_text: String,
    pub server: PreprintServer,
}

impl Paper {
    /// Canonical link to the paper.
    ///
    /// Version-specific content URL when the version is known, otherwise the
    /// DOI resolver.
    pub fn link(&self) -> String {
        match self.version {
            Some(version) => format!(
                "{}/content/{}v{version}",
                self.server.content_host(),
                self.doi
            ),
            None => format!("https://doi.org/{}", self.doi),
        }
    }

    /// DOI with version suffix, e.g. `10.1101/2024.01.01.123456v2`.
    pub fn versioned_doi(&self) -> String {
        match self.version {
            Some(version) => format!("{}v{version}", self.doi),
            None => self.doi.clone(),
        }
    }

    /// Authors joined for display.
    pub fn authors_display(&self) -> String {
        self.authors.join("; ")
    }
}

/// Free-text description of what the reader cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestProfile(String);

impl InterestProfile {
    /// Create a profile; `None` when the text is blank.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterestProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive date range of eligible papers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl LookbackWindow {
    /// Window covering `days` days before `run_date` through `run_date`.
    pub fn ending_on(run_date: NaiveDate, days: u32) -> Self {
        let start = run_date
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self {
            start,
            end: run_date,
        }
    }

    /// Whether `date` falls inside the window (both ends included).
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for LookbackWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// A paper picked by the ranker, with the model's justification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedPaper {
    pub paper: Paper,
    pub reason: String,
}

/// Ordered selection produced by the ranker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionResult {
    pub selected: Vec<SelectedPaper>,
    /// Overall rationale for the selection.
    pub rationale: String,
}

impl SelectionResult {
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn papers(&self) -> impl Iterator<Item = &Paper> {
        self.selected.iter().map(|s| &s.paper)
    }
}

/// AI summary of one selected paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperSummary {
    pub paper_id: String,
    pub summary: String,
}

/// An explanatory block: a title and a few bullet points.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Concept {
    pub title: String,
    pub points: Vec<String>,
}

impl Concept {
    pub fn new(title: impl Into<String>, points: Vec<String>) -> Self {
        Self {
            title: title.into(),
            points,
        }
    }
}

/// All generated text for one digest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigestContent {
    pub summaries: Vec<PaperSummary>,
    /// Cross-paper synthesis points.
    pub idea: Vec<String>,
    pub general_concept: Concept,
    pub interest_concept: Concept,
}

impl DigestContent {
    /// Summary for a selected paper, if one was generated.
    pub fn summary_for(&self, paper_id: &str) -> Option<&str> {
        self.summaries
            .iter()
            .find(|s| s.paper_id == paper_id)
            .map(|s| s.summary.as_str())
    }
}

/// Subject and bodies produced by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// A single outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

impl EmailMessage {
    /// Every envelope recipient (To, then CC, then BCC).
    pub fn all_recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn paper(version: Option<u32>, server: PreprintServer) -> Paper {
        Paper {
            id: "P01".to_string(),
            doi: "10.1101/2024.05.01.592000".to_string(),
            version,
            title: "T".to_string(),
            authors: vec!["Smith, J.".to_string(), "Doe, A.".to_string()],
            date: date("2024-05-02"),
            category: "immunology".to_string(),
            abstract_text: "A".to_string(),
            server,
        }
    }

    #[test]
    fn test_window_is_inclusive_at_both_ends() {
        let window = LookbackWindow::ending_on(date("2024-05-10"), 3);

        assert_eq!(window.start, date("2024-05-07"));
        assert!(window.contains(date("2024-05-07")));
        assert!(window.contains(date("2024-05-10")));
        assert!(!window.contains(date("2024-05-06")));
        assert!(!window.contains(date("2024-05-11")));
    }

    #[test]
    fn test_zero_day_window_is_run_date_only() {
        let window = LookbackWindow::ending_on(date("2024-05-10"), 0);
        assert!(window.contains(date("2024-05-10")));
        assert!(!window.contains(date("2024-05-09")));
    }

    #[test]
    fn test_paper_links() {
        assert_eq!(
            paper(Some(2), PreprintServer::Biorxiv).link(),
            "https://www.biorxiv.org/content/10.1101/2024.05.01.592000v2"
        );
        assert_eq!(
            paper(Some(1), PreprintServer::Medrxiv).link(),
            "https://www.medrxiv.org/content/10.1101/2024.05.01.592000v1"
        );
        assert_eq!(
            paper(None, PreprintServer::Biorxiv).link(),
            "https://doi.org/10.1101/2024.05.01.592000"
        );
    }

    #[test]
    fn test_interest_profile_rejects_blank() {
        assert!(InterestProfile::new("   ").is_none());
        assert_eq!(
            InterestProfile::new(" immunology ").unwrap().as_str(),
            "immunology"
        );
    }

    #[test]
    fn test_server_parse() {
        assert_eq!(PreprintServer::parse("bioRxiv"), Some(PreprintServer::Biorxiv));
        assert_eq!(PreprintServer::parse("medrxiv"), Some(PreprintServer::Medrxiv));
        assert_eq!(PreprintServer::parse("arxiv"), None);
    }
}

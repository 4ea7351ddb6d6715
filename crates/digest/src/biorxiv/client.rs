//! HTTP client for the bioRxiv `details` API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::records::{into_papers, DetailsPage, RawPaper};
use super::PaperSource;
use crate::error::{DigestError, DigestResult};
use crate::types::{LookbackWindow, Paper, PreprintServer};

const BIORXIV_API_BASE: &str = "https://api.biorxiv.org";

/// Records per page returned by the API.
const PAGE_SIZE: usize = 100;

/// Upper bound on pages fetched for one window.
const MAX_PAGES: usize = 500;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the bioRxiv/medRxiv `details` endpoint.
pub struct BiorxivClient {
    client: Client,
    base_url: String,
    server: PreprintServer,
    category: Option<String>,
    max_pages: usize,
}

impl BiorxivClient {
    /// Create a client for `server`, optionally filtered to one category.
    pub fn new(server: PreprintServer, category: Option<String>) -> DigestResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DigestError::Fetch(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: BIORXIV_API_BASE.to_string(),
            server,
            category,
            max_pages: MAX_PAGES,
        })
    }

    /// Set a custom base URL (mirrors, tests).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch one page of the interval starting at `cursor`.
    async fn fetch_page(
        &self,
        window: &LookbackWindow,
        cursor: usize,
    ) -> DigestResult<DetailsPage> {
        let url = format!(
            "{}/details/{}/{}/{}/{cursor}/json",
            self.base_url,
            self.server.as_str(),
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d"),
        );

        let mut request = self.client.get(&url);
        if let Some(category) = &self.category {
            request = request.query(&[("category", category.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DigestError::Fetch(format!("bioRxiv request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            return Err(DigestError::Fetch(format!(
                "bioRxiv API error ({status}): {error_text}"
            )));
        }

        response
            .json::<DetailsPage>()
            .await
            .map_err(|e| DigestError::Fetch(format!("Failed to parse bioRxiv response: {e}")))
    }
}

#[async_trait]
impl PaperSource for BiorxivClient {
    async fn fetch(&self, window: &LookbackWindow) -> DigestResult<Vec<Paper>> {
        let mut rows: Vec<RawPaper> = Vec::new();
        let mut cursor = 0;
        let mut total: Option<usize> = None;
        let mut complete = false;

        for page_number in 0..self.max_pages {
            let page = self.fetch_page(window, cursor).await?;
            let received = page.collection.len();

            tracing::debug!(
                page = page_number,
                cursor,
                received,
                status = page
                    .messages
                    .first()
                    .and_then(|m| m.status.as_deref())
                    .unwrap_or("unknown"),
                "Fetched bioRxiv page"
            );

            if received == 0 {
                complete = true;
                break;
            }
            if total.is_none() {
                total = page.total();
            }

            rows.extend(page.collection);
            cursor += received;

            if received < PAGE_SIZE || total.is_some_and(|t| cursor >= t) {
                complete = true;
                break;
            }
        }

        if !complete {
            return Err(DigestError::Fetch(format!(
                "feed for {window} still had records after {} pages ({cursor} fetched)",
                self.max_pages
            )));
        }

        let fetched = rows.len();
        let papers = into_papers(rows, window, self.server);

        tracing::info!(
            server = %self.server,
            window = %window,
            category = self.category.as_deref().unwrap_or("all"),
            fetched,
            papers = papers.len(),
            "Fetched preprints"
        );

        Ok(papers)
    }
}

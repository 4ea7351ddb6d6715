//! bioRxiv/medRxiv feed fetching.
//!
//! Queries the public `details` endpoint for a lookback window and turns the
//! paginated collection into run-local [`Paper`]s.

mod client;
mod records;

pub use client::BiorxivClient;

use async_trait::async_trait;

use crate::error::DigestResult;
use crate::types::{LookbackWindow, Paper};

/// Source of candidate papers for a digest.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Fetch every paper posted inside `window`, newest first.
    async fn fetch(&self, window: &LookbackWindow) -> DigestResult<Vec<Paper>>;
}

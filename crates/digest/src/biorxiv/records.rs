//! Raw API payloads and their normalization into papers.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::{LookbackWindow, Paper, PreprintServer};

/// One page of the `details` endpoint.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DetailsPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<ApiMessage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collection: Vec<RawPaper>,
}

impl DetailsPage {
    /// Total number of records reported for the interval.
    ///
    /// The API reports it as a number or a numeric string.
    pub fn total(&self) -> Option<usize> {
        self.messages
            .first()
            .and_then(|m| value_as_u64(m.total.as_ref()?))
            .map(|t| t as usize)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMessage {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total: Option<Value>,
}

/// A record as returned by the API; any field may be missing or `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawPaper {
    #[serde(default, deserialize_with = "null_as_default")]
    pub doi: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, rename = "abstract", deserialize_with = "null_as_default")]
    pub abstract_text: String,
}

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl RawPaper {
    fn version_number(&self) -> Option<u32> {
        self.version
            .as_ref()
            .and_then(value_as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Keep only the highest version of each DOI; rows without a DOI are dropped.
pub(crate) fn keep_latest_versions(rows: Vec<RawPaper>) -> Vec<RawPaper> {
    let mut best: HashMap<String, RawPaper> = HashMap::new();

    for row in rows {
        let doi = row.doi.trim().to_string();
        if doi.is_empty() {
            continue;
        }
        match best.get(&doi) {
            Some(existing) if existing.version_number() >= row.version_number() => {}
            _ => {
                best.insert(doi, row);
            }
        }
    }

    best.into_values().collect()
}

/// Turn raw rows into papers inside `window`, newest first, with ids assigned.
pub(crate) fn into_papers(
    rows: Vec<RawPaper>,
    window: &LookbackWindow,
    server: PreprintServer,
) -> Vec<Paper> {
    let mut dated: Vec<(NaiveDate, RawPaper)> = keep_latest_versions(rows)
        .into_iter()
        .filter_map(|row| match NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d") {
            Ok(date) => Some((date, row)),
            Err(_) => {
                tracing::warn!(
                    doi = %row.doi,
                    date = %row.date,
                    "Skipping paper with unparseable date"
                );
                None
            }
        })
        .filter(|(date, _)| window.contains(*date))
        .collect();

    dated.sort_by(|(a_date, a), (b_date, b)| {
        Reverse(a_date)
            .cmp(&Reverse(b_date))
            .then_with(|| a.doi.cmp(&b.doi))
    });

    dated
        .into_iter()
        .enumerate()
        .map(|(i, (date, row))| Paper {
            id: format!("P{:02}", i + 1),
            version: row.version_number(),
            doi: row.doi.trim().to_string(),
            title: row.title.trim().to_string(),
            authors: split_authors(&row.authors),
            date,
            category: row.category.trim().to_string(),
            abstract_text: row.abstract_text.trim().to_string(),
            server,
        })
        .collect()
}

fn split_authors(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

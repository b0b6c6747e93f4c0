use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::utils::extract_json_payload;
use crate::Result;

/// Metadata for one candidate video, as returned by search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Opaque platform identifier, unique per video
    pub id: String,

    pub title: String,

    pub channel: String,

    /// Publish time, when the search surface exposes it
    pub published_at: Option<DateTime<Utc>>,

    /// Video length in seconds, when known
    pub duration_seconds: Option<u32>,
}

/// Source of candidate videos for a query.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Fetch an ordered list of candidate videos, capped at `max_results`.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        language_hint: &str,
    ) -> Result<Vec<VideoRecord>>;
}

/// Searches YouTube by scraping the `ytInitialData` payload embedded in the
/// results page, the same data the web player bootstraps from.
pub struct YoutubeSearch {
    client: Client,
    endpoint: String,
}

impl YoutubeSearch {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_results_page(&self, query: &str, language_hint: &str) -> Result<String> {
        let url = format!(
            "{}/results?search_query={}&hl={}",
            self.endpoint,
            urlencoding::encode(query),
            language_hint
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Search request failed: HTTP {}", response.status());
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl VideoSource for YoutubeSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        language_hint: &str,
    ) -> Result<Vec<VideoRecord>> {
        tracing::debug!("Searching for {query:?} (max {max_results})");

        let html = self.fetch_results_page(query, language_hint).await?;
        let data = extract_json_payload(&html, "var ytInitialData =")?;
        let videos = parse_results(&data, max_results);

        tracing::info!("Query {query:?} returned {} unique videos", videos.len());
        Ok(videos)
    }
}

/// Walk the search payload and collect video renderers, deduplicating ids
/// within the page.
fn parse_results(data: &Value, max_results: usize) -> Vec<VideoRecord> {
    let mut videos = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let sections = data
        .pointer("/contents/twoColumnSearchResultsRenderer/primaryContents/sectionListRenderer/contents")
        .and_then(Value::as_array);

    for section in sections.into_iter().flatten() {
        let Some(items) = section
            .pointer("/itemSectionRenderer/contents")
            .and_then(Value::as_array)
        else {
            continue;
        };

        for item in items {
            let Some(renderer) = item.get("videoRenderer") else {
                continue;
            };
            let Some(id) = renderer.get("videoId").and_then(Value::as_str) else {
                continue;
            };
            if !seen.insert(id.to_string()) {
                continue;
            }

            let title = renderer
                .pointer("/title/runs/0/text")
                .and_then(Value::as_str)
                .unwrap_or("Unknown Title");
            let channel = renderer
                .pointer("/ownerText/runs/0/text")
                .and_then(Value::as_str)
                .unwrap_or("Unknown Channel");
            let duration_seconds = renderer
                .pointer("/lengthText/simpleText")
                .and_then(Value::as_str)
                .and_then(parse_length);

            videos.push(VideoRecord {
                id: id.to_string(),
                title: title.to_string(),
                channel: channel.to_string(),
                // Search renderers do not carry a publish timestamp
                published_at: None,
                duration_seconds,
            });

            if videos.len() >= max_results {
                return videos;
            }
        }
    }

    videos
}

/// Parse a "MM:SS" or "HH:MM:SS" length label into seconds.
fn parse_length(text: &str) -> Option<u32> {
    let mut seconds: u32 = 0;
    for part in text.split(':') {
        let value: u32 = part.trim().parse().ok()?;
        seconds = seconds.checked_mul(60)?.checked_add(value)?;
    }
    Some(seconds)
}

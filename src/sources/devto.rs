use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::Deserialize;

use crate::models::{Category, DevToTier, SourceItem};
use crate::sources::SourceAdapter;

const MIN_REACTIONS: i64 = 20;
const MAX_ITEMS: usize = 5;
const MIN_ITEMS_BEFORE_WIDENING: usize = 2;

#[derive(Debug, Deserialize)]
struct DevToArticle {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "positive_reactions_count", default)]
    reactions: i64,
}

/// Community-articles adapter (spec.md §4.2 "Community articles"). Two-tier
/// fetch: a 365-day window first, widening to 730 days if fewer than two
/// items clear the `reactions >= 20` bar (P7).
pub struct DevToAdapter {
    client: reqwest::Client,
    timeout: Duration,
    primary_window_days: i64,
    fallback_window_days: i64,
}

impl DevToAdapter {
    pub fn new(timeout_s: u64, primary_window_days: i64, fallback_window_days: i64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_s),
            primary_window_days,
            fallback_window_days,
        }
    }

    async fn fetch_window(&self, topic: &str, window_days: i64) -> Option<Vec<SourceItem>> {
        let request = self
            .client
            .get("https://dev.to/api/articles")
            .query(&[("tag", topic), ("top", &window_days.to_string())])
            .send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(r)) if r.status().is_success() => r,
            Ok(Ok(r)) => {
                warn!("devto: unavailable (status {})", r.status());
                return None;
            }
            Ok(Err(e)) => {
                warn!("devto: request error: {e}");
                return None;
            }
            Err(_) => {
                warn!("devto: timed out");
                return None;
            }
        };

        let parsed: Vec<DevToArticle> = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!("devto: malformed response: {e}");
                return None;
            }
        };

        let items: Vec<SourceItem> = parsed
            .into_iter()
            .filter(|a| a.reactions >= MIN_REACTIONS)
            .take(MAX_ITEMS)
            .map(|a| SourceItem {
                title: a.title,
                url: a.url,
                body_excerpt: a.description,
                score: a.reactions as f64,
            })
            .collect();

        Some(items)
    }

    /// Returns the items together with which tier satisfied the request,
    /// so the research engine can populate `ResearchSourceStatus.devto_tier`.
    pub async fn fetch_with_tier(&self, topic: &str) -> (Vec<SourceItem>, bool, DevToTier) {
        let primary = match self.fetch_window(topic, self.primary_window_days).await {
            Some(items) => items,
            None => return (vec![], false, DevToTier::None),
        };

        if primary.len() >= MIN_ITEMS_BEFORE_WIDENING {
            return (primary, true, DevToTier::Recent);
        }

        match self.fetch_window(topic, self.fallback_window_days).await {
            Some(extended) if !extended.is_empty() => (extended, true, DevToTier::Extended),
            _ if !primary.is_empty() => (primary, true, DevToTier::Recent),
            _ => (vec![], false, DevToTier::None),
        }
    }
}

#[async_trait]
impl SourceAdapter for DevToAdapter {
    fn name(&self) -> &'static str {
        "devto"
    }

    async fn fetch(&self, topic: &str, _category: Category, _language: Option<&str>) -> (Vec<SourceItem>, bool) {
        let (items, ok, _tier) = self.fetch_with_tier(topic).await;
        (items, ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_floor_matches_spec() {
        assert_eq!(MIN_REACTIONS, 20);
    }

    #[test]
    fn widening_threshold_matches_spec() {
        assert_eq!(MIN_ITEMS_BEFORE_WIDENING, 2);
    }
}

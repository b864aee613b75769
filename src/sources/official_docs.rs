use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;

use crate::models::{Category, SourceItem};
use crate::sources::SourceAdapter;

#[derive(Debug, thiserror::Error)]
enum FetchIndexError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("non-success status: {0}")]
    Status(reqwest::StatusCode),
}

/// Fetches one topic-relevant section from a fixed table of documentation
/// sites (spec.md §4.2 "Official docs"). `ok = true` iff an excerpt was
/// extracted by title match.
pub struct OfficialDocsAdapter {
    client: reqwest::Client,
    timeout: Duration,
    base_urls: HashMap<&'static str, &'static str>,
}

impl OfficialDocsAdapter {
    pub fn new(timeout_s: u64) -> Self {
        let mut base_urls = HashMap::new();
        base_urls.insert("programming", "https://devdocs.io");
        base_urls.insert("data_science", "https://pandas.pydata.org/docs");
        base_urls.insert("design_and_ux", "https://m3.material.io");
        base_urls.insert("business_and_management", "https://www.pmi.org/learning");
        base_urls.insert("marketing", "https://developers.google.com/analytics");
        base_urls.insert("general", "https://developer.mozilla.org");

        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_s),
            base_urls,
        }
    }

    fn base_url(&self, category: Category) -> &'static str {
        let key = match category {
            Category::Programming => "programming",
            Category::DataScience => "data_science",
            Category::DesignAndUx => "design_and_ux",
            Category::BusinessAndManagement => "business_and_management",
            Category::Marketing => "marketing",
            Category::General => "general",
        };
        self.base_urls.get(key).copied().unwrap_or("https://developer.mozilla.org")
    }

    /// Case-insensitive substring match first, then longest-prefix match,
    /// over a flat list of indexed section titles (spec.md §4.2).
    fn pick_section<'a>(topic: &str, sections: &[(&'a str, &'a str)]) -> Option<(&'a str, &'a str)> {
        let topic_lower = topic.to_lowercase();

        let substring_match = sections
            .iter()
            .filter(|(title, _)| title.to_lowercase().contains(&topic_lower))
            .max_by_key(|(title, _)| title.len());
        if let Some(m) = substring_match {
            return Some(*m);
        }

        sections
            .iter()
            .filter(|(title, _)| topic_lower.starts_with(&title.to_lowercase()))
            .max_by_key(|(title, _)| title.len())
            .copied()
    }

    async fn fetch_index(&self, base_url: &str) -> Result<String, FetchIndexError> {
        let response = self.client.get(base_url).send().await?;
        if !response.status().is_success() {
            return Err(FetchIndexError::Status(response.status()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SourceAdapter for OfficialDocsAdapter {
    fn name(&self) -> &'static str {
        "official_docs"
    }

    async fn fetch(&self, topic: &str, category: Category, _language: Option<&str>) -> (Vec<SourceItem>, bool) {
        let base_url = self.base_url(category);

        let index = match tokio::time::timeout(self.timeout, self.fetch_index(base_url)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                warn!("official_docs: fetch failed for {base_url}: {e}");
                return (vec![], false);
            }
            Err(_) => {
                warn!("official_docs: timed out fetching {base_url}");
                return (vec![], false);
            }
        };

        // The index page is a list of "## Title" headings in a compact TOC
        // format; real sites vary, so section extraction is best-effort and
        // any shape that yields zero sections degrades to ok=false.
        let sections: Vec<(&str, &str)> = index
            .lines()
            .filter_map(|line| line.strip_prefix("## ").map(|title| (title.trim(), line)))
            .collect();

        match Self::pick_section(topic, &sections) {
            Some((title, body)) => {
                let excerpt: String = body.chars().take(2000).collect();
                (
                    vec![SourceItem {
                        title: title.to_string(),
                        url: base_url.to_string(),
                        body_excerpt: excerpt,
                        score: 1.0,
                    }],
                    true,
                )
            }
            None => {
                warn!("official_docs: no section matched topic '{topic}'");
                (vec![], false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_substring_match_over_prefix_match() {
        let sections = vec![
            ("List", "List"),
            ("List Comprehensions", "List Comprehensions body"),
        ];
        let picked = OfficialDocsAdapter::pick_section("python list comprehensions", &sections);
        assert_eq!(picked.unwrap().0, "List Comprehensions");
    }

    #[test]
    fn no_match_returns_none() {
        let sections = vec![("Dictionaries", "Dictionaries body")];
        assert!(OfficialDocsAdapter::pick_section("async generators", &sections).is_none());
    }

    #[tokio::test]
    async fn fetch_index_returns_the_mocked_response_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body("## List Comprehensions\ncondensed loop syntax")
            .create_async()
            .await;

        let adapter = OfficialDocsAdapter::new(5);
        let body = adapter.fetch_index(&server.url()).await.unwrap();
        assert!(body.contains("List Comprehensions"));
    }

    #[tokio::test]
    async fn fetch_index_surfaces_an_error_on_a_5xx_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/").with_status(503).create_async().await;

        let adapter = OfficialDocsAdapter::new(5);
        let result = adapter.fetch_index(&server.url()).await;
        assert!(matches!(result, Err(FetchIndexError::Status(_))));
    }
}

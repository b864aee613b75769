use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::Deserialize;

use crate::models::{Category, SourceItem};
use crate::sources::SourceAdapter;

const MIN_STARS: i64 = 100;
const MAX_ITEMS: usize = 5;

#[derive(Debug, Deserialize)]
struct GithubSearchResponse {
    items: Vec<GithubRepoItem>,
}

#[derive(Debug, Deserialize)]
struct GithubRepoItem {
    #[serde(rename = "full_name")]
    repo: String,
    path: String,
    #[serde(default)]
    stargazers_count: i64,
    html_url: String,
    #[serde(default)]
    text_matches: Vec<GithubTextMatch>,
}

#[derive(Debug, Deserialize, Default)]
struct GithubTextMatch {
    fragment: String,
}

/// Code-search adapter (spec.md §4.2 "Code examples"). Maps learning-style
/// language names onto GitHub's search-index language names via a fixed
/// alias table, then filters `stars >= 100`.
pub struct GithubAdapter {
    client: reqwest::Client,
    timeout: Duration,
    language_aliases: HashMap<&'static str, &'static str>,
}

impl GithubAdapter {
    pub fn new(timeout_s: u64) -> Self {
        let mut language_aliases = HashMap::new();
        language_aliases.insert("jsx", "javascript");
        language_aliases.insert("tsx", "typescript");
        language_aliases.insert("dockerfile", "dockerfile");
        language_aliases.insert("py", "python");
        language_aliases.insert("rs", "rust");

        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_s),
            language_aliases,
        }
    }

    fn resolve_language<'a>(&'a self, language: Option<&'a str>) -> Option<&'a str> {
        language.map(|l| self.language_aliases.get(l).copied().unwrap_or(l))
    }
}

#[async_trait]
impl SourceAdapter for GithubAdapter {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn fetch(&self, topic: &str, _category: Category, language: Option<&str>) -> (Vec<SourceItem>, bool) {
        let mut query = format!("{topic} stars:>={MIN_STARS}");
        if let Some(lang) = self.resolve_language(language) {
            query.push_str(&format!(" language:{lang}"));
        }

        let request = self
            .client
            .get("https://api.github.com/search/code")
            .header("User-Agent", "lessonforge-worker")
            .query(&[("q", query.as_str())])
            .send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(r)) if r.status().is_success() => r,
            Ok(Ok(r)) => {
                warn!("github: unavailable (status {})", r.status());
                return (vec![], false);
            }
            Ok(Err(e)) => {
                warn!("github: request error: {e}");
                return (vec![], false);
            }
            Err(_) => {
                warn!("github: timed out");
                return (vec![], false);
            }
        };

        let parsed: GithubSearchResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!("github: malformed response: {e}");
                return (vec![], false);
            }
        };

        let items: Vec<SourceItem> = parsed
            .items
            .into_iter()
            .filter(|i| i.stargazers_count >= MIN_STARS)
            .take(MAX_ITEMS)
            .map(|i| SourceItem {
                title: format!("{}/{}", i.repo, i.path),
                url: i.html_url,
                body_excerpt: i
                    .text_matches
                    .first()
                    .map(|m| m.fragment.clone())
                    .unwrap_or_default(),
                score: i.stargazers_count as f64,
            })
            .collect();

        (items, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsx_maps_to_javascript() {
        let adapter = GithubAdapter::new(15);
        assert_eq!(adapter.resolve_language(Some("jsx")), Some("javascript"));
        assert_eq!(adapter.resolve_language(Some("dockerfile")), Some("dockerfile"));
        assert_eq!(adapter.resolve_language(Some("kotlin")), Some("kotlin"));
        assert_eq!(adapter.resolve_language(None), None);
    }
}

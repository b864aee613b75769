use std::time::{Duration, Instant};

use log::warn;

use crate::config::Config;
use crate::models::{Category, ResearchBundle, ResearchSourceStatus, ResearchSources};
use crate::models::SourceItem;
use crate::sources::{DevToAdapter, GithubAdapter, OfficialDocsAdapter, SourceAdapter, StackOverflowAdapter, YoutubeAdapter};

/// Fans the five source adapters out concurrently, applies the two-pass
/// Stack Overflow compensation once the other fan-out results are known, and
/// bounds the whole thing by a single wall-clock deadline. A blown deadline
/// degrades to an empty bundle rather than propagating an error — research
/// never fails the lesson, it only starves it of citations.
pub struct ResearchEngine {
    official_docs: OfficialDocsAdapter,
    stackoverflow: StackOverflowAdapter,
    github: GithubAdapter,
    devto: DevToAdapter,
    youtube: YoutubeAdapter,
    deadline: Duration,
    so_base_count: usize,
    so_max_count: usize,
}

impl ResearchEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            official_docs: OfficialDocsAdapter::new(config.adapter_timeout_s),
            stackoverflow: StackOverflowAdapter::new(config.adapter_timeout_s),
            github: GithubAdapter::new(config.adapter_timeout_s),
            devto: DevToAdapter::new(
                config.adapter_timeout_s,
                config.devto_primary_window_days,
                config.devto_fallback_window_days,
            ),
            youtube: YoutubeAdapter::new(config.adapter_timeout_s, config.transcription_deadline_s),
            deadline: Duration::from_secs(config.research_deadline_s),
            so_base_count: config.so_base_count as usize,
            so_max_count: config.so_max_count as usize,
        }
    }

    pub async fn research(&self, topic: &str, category: Category, language: Option<&str>) -> ResearchBundle {
        let start = Instant::now();

        match tokio::time::timeout(self.deadline, self.run(topic, category, language)).await {
            Ok(mut bundle) => {
                bundle.elapsed_ms = start.elapsed().as_millis() as u64;
                bundle
            }
            Err(_) => {
                warn!("research: deadline of {:?} exceeded for topic '{topic}'", self.deadline);
                let mut bundle = ResearchBundle::empty(topic.to_string(), category, language.map(str::to_string));
                bundle.elapsed_ms = self.deadline.as_millis() as u64;
                bundle
            }
        }
    }

    async fn run(&self, topic: &str, category: Category, language: Option<&str>) -> ResearchBundle {
        let (
            (doc_items, doc_ok),
            (so_items, so_ok),
            (gh_items, gh_ok),
            (devto_items, devto_ok, devto_tier),
            (yt_items, yt_ok, video_source),
        ) = tokio::join!(
            self.official_docs.fetch(topic, category, language),
            self.stackoverflow.fetch_n(topic, self.so_base_count),
            self.github.fetch(topic, category, language),
            self.devto.fetch_with_tier(topic),
            self.youtube.fetch_with_tier(topic),
        );

        let mut status = ResearchSourceStatus {
            official_docs_ok: doc_ok,
            stackoverflow_ok: so_ok,
            github_ok: gh_ok,
            devto_ok,
            youtube_ok: yt_ok,
            devto_tier,
            video_source,
        };

        // Two-pass compensation: widen the Stack Overflow request by one per
        // unavailable source outside Q&A/docs, capped.
        // Only re-fetch when the first pass actually came up short — a full
        // first pass or an outright failure skips the second round.
        let missing = status.missing_for_compensation();
        let target = (self.so_base_count + missing as usize).min(self.so_max_count);

        let so_items = if target > self.so_base_count && so_ok && so_items.len() < target {
            let (widened, widened_ok) = self.stackoverflow.fetch_n(topic, target).await;
            if widened_ok {
                merge_dedup_by_url(so_items, widened)
            } else {
                so_items
            }
        } else {
            so_items
        };

        let sources = ResearchSources {
            official_doc: doc_items.into_iter().next(),
            so_answers: so_items,
            code_examples: gh_items,
            articles: devto_items,
            video: yt_items.into_iter().next(),
        };

        let summary = Self::summarize(&status);

        ResearchBundle {
            topic: topic.to_string(),
            category,
            language: language.map(str::to_string),
            elapsed_ms: 0,
            sources,
            source_status: status,
            summary,
        }
    }

    fn summarize(status: &ResearchSourceStatus) -> String {
        if status.all_unavailable() {
            return "all sources unavailable".to_string();
        }

        let mut ok: Vec<&str> = Vec::new();
        if status.official_docs_ok {
            ok.push("official_docs");
        }
        if status.stackoverflow_ok {
            ok.push("stackoverflow");
        }
        if status.github_ok {
            ok.push("github");
        }
        if status.devto_ok {
            ok.push("devto");
        }
        if status.youtube_ok {
            ok.push("youtube");
        }
        format!("sources used: {}", ok.join(", "))
    }
}

/// Merges a compensated second Stack Overflow pass into the first,
/// deduplicating by question URL.
fn merge_dedup_by_url(first: Vec<SourceItem>, second: Vec<SourceItem>) -> Vec<SourceItem> {
    let mut seen: std::collections::HashSet<String> = first.iter().map(|i| i.url.clone()).collect();
    let mut merged = first;
    for item in second {
        if seen.insert(item.url.clone()) {
            merged.push(item);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn summarize_reports_all_unavailable_when_every_source_failed() {
        let status = ResearchSourceStatus::default();
        assert_eq!(ResearchEngine::summarize(&status), "all sources unavailable");
    }

    #[test]
    fn summarize_lists_the_sources_that_succeeded() {
        let status = ResearchSourceStatus {
            official_docs_ok: true,
            stackoverflow_ok: false,
            github_ok: true,
            devto_ok: false,
            youtube_ok: false,
            ..Default::default()
        };
        assert_eq!(ResearchEngine::summarize(&status), "sources used: official_docs, github");
    }

    fn item(url: &str) -> SourceItem {
        SourceItem { title: url.to_string(), url: url.to_string(), body_excerpt: String::new(), score: 0.0 }
    }

    #[test]
    fn merge_dedup_keeps_first_pass_items_and_adds_only_new_urls() {
        let first = vec![item("https://so/1"), item("https://so/2")];
        let second = vec![item("https://so/2"), item("https://so/3")];
        let merged = merge_dedup_by_url(first, second);
        let urls: Vec<&str> = merged.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://so/1", "https://so/2", "https://so/3"]);
    }
}

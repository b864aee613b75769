use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use serde::Deserialize;

use crate::models::{Category, SourceItem, VideoSource};
use crate::sources::SourceAdapter;

#[derive(Debug, Deserialize)]
struct VideoSearchResponse {
    items: Vec<VideoCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct VideoCandidate {
    id: String,
    title: String,
    url: String,
    view_count: u64,
    like_count: u64,
    comment_count: u64,
    channel_subscriber_count: u64,
    published_at: DateTime<Utc>,
    #[serde(default)]
    transcript_relevance: f64,
}

impl VideoCandidate {
    /// Five-factor quality score from spec.md §4.2 "Video":
    /// views 30%, engagement 25%, channel authority 20%,
    /// topical relevance 15%, recency 10% (optimal band 6-36 months).
    fn quality_score(&self) -> f64 {
        let views_score = (self.view_count as f64).ln_1p() / 15.0;
        let engagement_score = if self.view_count == 0 {
            0.0
        } else {
            (self.like_count + self.comment_count) as f64 / self.view_count as f64
        };
        let authority_score = (self.channel_subscriber_count as f64).ln_1p() / 15.0;
        let relevance_score = self.transcript_relevance;
        let recency_score = self.recency_score();

        (views_score.min(1.0) * 0.30)
            + (engagement_score.min(1.0) * 0.25)
            + (authority_score.min(1.0) * 0.20)
            + (relevance_score.min(1.0) * 0.15)
            + (recency_score * 0.10)
    }

    fn recency_score(&self) -> f64 {
        let age_months = (Utc::now() - self.published_at).num_days() as f64 / 30.0;
        if (6.0..=36.0).contains(&age_months) {
            1.0
        } else if age_months < 6.0 {
            age_months / 6.0
        } else {
            (72.0 - age_months).max(0.0) / 36.0
        }
    }
}

/// Video adapter (spec.md §4.2 "Video"). Ranks candidates by a 5-factor
/// quality score, then fetches the top candidate's transcript through a
/// fall-back chain: platform captions -> audio-extract + transcription
/// provider -> give up. If the primary platform's search itself fails,
/// tries one alternate platform before giving up.
pub struct YoutubeAdapter {
    client: reqwest::Client,
    timeout: Duration,
    transcription_timeout: Duration,
}

impl YoutubeAdapter {
    pub fn new(timeout_s: u64, transcription_timeout_s: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_s),
            transcription_timeout: Duration::from_secs(transcription_timeout_s),
        }
    }

    async fn search(&self, base_url: &str, topic: &str) -> Option<Vec<VideoCandidate>> {
        let request = self
            .client
            .get(base_url)
            .query(&[("q", topic)])
            .send();

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(r)) if r.status().is_success() => {
                r.json::<VideoSearchResponse>().await.ok().map(|b| b.items)
            }
            Ok(Ok(r)) => {
                warn!("youtube: {base_url} unavailable (status {})", r.status());
                None
            }
            Ok(Err(e)) => {
                warn!("youtube: {base_url} request error: {e}");
                None
            }
            Err(_) => {
                warn!("youtube: {base_url} timed out");
                None
            }
        }
    }

    fn pick_best(candidates: Vec<VideoCandidate>) -> Option<VideoCandidate> {
        candidates
            .into_iter()
            .max_by(|a, b| a.quality_score().partial_cmp(&b.quality_score()).unwrap())
    }

    async fn fetch_captions(&self, video_id: &str) -> Option<String> {
        let url = format!("https://www.youtube.com/api/timedtext?v={video_id}");
        let request = self.client.get(&url).send();
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(r)) if r.status().is_success() => r.text().await.ok().filter(|t| !t.is_empty()),
            _ => None,
        }
    }

    async fn transcribe_audio(&self, video_id: &str) -> Option<String> {
        let url = "https://transcription.internal/v1/jobs";
        let request = self
            .client
            .post(url)
            .json(&serde_json::json!({ "video_id": video_id }))
            .send();
        match tokio::time::timeout(self.transcription_timeout, request).await {
            Ok(Ok(r)) if r.status().is_success() => r.text().await.ok(),
            _ => {
                warn!("youtube: transcription fallback failed for {video_id}");
                None
            }
        }
    }

    async fn transcript_for(&self, candidate: &VideoCandidate) -> Option<String> {
        if let Some(captions) = self.fetch_captions(&candidate.id).await {
            return Some(captions);
        }
        self.transcribe_audio(&candidate.id).await
    }
}

impl YoutubeAdapter {
    /// Returns the item together with which branch of spec.md §4.2's
    /// platform fallback satisfied the request, so the research engine can
    /// populate `ResearchSourceStatus.video_source`.
    pub async fn fetch_with_tier(&self, topic: &str) -> (Vec<SourceItem>, bool, VideoSource) {
        let primary_results = self
            .search("https://www.googleapis.com/youtube/v3/search", topic)
            .await;

        let (candidates, source) = match primary_results {
            Some(candidates) if !candidates.is_empty() => (candidates, VideoSource::Primary),
            _ => match self.search("https://api.vimeo.com/videos", topic).await {
                Some(candidates) if !candidates.is_empty() => (candidates, VideoSource::Fallback),
                _ => return (vec![], false, VideoSource::None),
            },
        };

        let best = match Self::pick_best(candidates) {
            Some(b) => b,
            None => return (vec![], false, VideoSource::None),
        };

        match self.transcript_for(&best).await {
            Some(transcript) => (
                vec![SourceItem {
                    title: best.title,
                    url: best.url,
                    body_excerpt: transcript.chars().take(4000).collect(),
                    score: best.quality_score(),
                }],
                true,
                source,
            ),
            None => (vec![], false, VideoSource::None),
        }
    }
}

#[async_trait]
impl SourceAdapter for YoutubeAdapter {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn fetch(&self, topic: &str, _category: Category, _language: Option<&str>) -> (Vec<SourceItem>, bool) {
        let (items, ok, _tier) = self.fetch_with_tier(topic).await;
        (items, ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(views: u64, likes: u64, subs: u64, months_old: i64) -> VideoCandidate {
        VideoCandidate {
            id: "v1".into(),
            title: "t".into(),
            url: "u".into(),
            view_count: views,
            like_count: likes,
            comment_count: 0,
            channel_subscriber_count: subs,
            published_at: Utc::now() - chrono::Duration::days(months_old * 30),
            transcript_relevance: 0.5,
        }
    }

    #[test]
    fn recency_peaks_in_the_six_to_thirty_six_month_band() {
        assert_eq!(candidate(1, 0, 1, 12).recency_score(), 1.0);
        assert!(candidate(1, 0, 1, 1).recency_score() < 1.0);
        assert!(candidate(1, 0, 1, 60).recency_score() < 1.0);
    }

    #[test]
    fn higher_views_and_engagement_score_higher() {
        let weak = candidate(10, 0, 10, 12);
        let strong = candidate(1_000_000, 100_000, 1_000_000, 12);
        assert!(strong.quality_score() > weak.quality_score());
    }
}

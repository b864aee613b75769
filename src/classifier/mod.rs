pub mod structure;

use std::num::NonZeroUsize;
use std::sync::Mutex;

use log::{debug, warn};
use lru::LruCache;

use crate::ai::AiOrchestrator;
use crate::models::Category;

const CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub category: Category,
    pub language: Option<&'static str>,
    pub confidence: f64,
}

/// Maps a free-form lesson title to `(category, language)`. Primary path
/// asks the AI orchestrator for a constrained
/// JSON classification; an LRU cache (>= 1000 entries) short-circuits
/// repeat lookups on the normalized topic. Fallback is a deterministic
/// keyword table used when the AI call fails or quota is exhausted.
pub struct TopicClassifier {
    cache: Mutex<LruCache<String, Classification>>,
    keyword_table: Vec<(&'static str, Category, Option<&'static str>)>,
}

impl TopicClassifier {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
            keyword_table: default_keyword_table(),
        }
    }

    fn normalize(topic: &str) -> String {
        topic.trim().to_lowercase()
    }

    pub async fn classify(&self, topic: &str, orchestrator: &AiOrchestrator) -> Classification {
        let key = Self::normalize(topic);

        if let Some(hit) = self.cache.lock().unwrap().get(&key).copied() {
            debug!("classifier: cache hit for '{topic}'");
            return hit;
        }

        let classification = match self.classify_via_ai(topic, orchestrator).await {
            Some(c) => c,
            None => {
                warn!("classifier: AI classification unavailable for '{topic}', using keyword fallback");
                self.classify_via_keywords(topic)
            }
        };

        self.cache.lock().unwrap().put(key, classification);
        classification
    }

    async fn classify_via_ai(&self, topic: &str, orchestrator: &AiOrchestrator) -> Option<Classification> {
        let prompt = format!(
            "Classify the lesson topic \"{topic}\" into exactly one category from \
             [programming, data_science, design_and_ux, business_and_management, marketing, general] \
             and, if applicable, a programming language. Respond with JSON only: \
             {{\"category\": \"...\", \"language\": \"...\" or null, \"confidence\": 0.0-1.0}}."
        );

        let (text, _provider) = orchestrator.generate(&prompt, true, 200).await.ok()?;
        let parsed: serde_json::Value = serde_json::from_str(text.trim()).ok()?;

        let category = match parsed.get("category")?.as_str()? {
            "programming" => Category::Programming,
            "data_science" => Category::DataScience,
            "design_and_ux" => Category::DesignAndUx,
            "business_and_management" => Category::BusinessAndManagement,
            "marketing" => Category::Marketing,
            _ => Category::General,
        };
        let confidence = parsed.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5);
        let language = parsed
            .get("language")
            .and_then(|v| v.as_str())
            .and_then(|s| known_language(s));

        Some(Classification {
            category,
            language,
            confidence,
        })
    }

    fn classify_via_keywords(&self, topic: &str) -> Classification {
        let topic_lower = topic.to_lowercase();
        for (keyword, category, language) in &self.keyword_table {
            if topic_lower.contains(keyword) {
                return Classification {
                    category: *category,
                    language: *language,
                    confidence: 0.4,
                };
            }
        }
        Classification {
            category: Category::General,
            language: None,
            confidence: 0.1,
        }
    }
}

impl Default for TopicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// `Classification::language` is `&'static str` (it's threaded straight into
/// adapter queries and the prompt builder without an owned-string lifetime),
/// so a free-form AI response is mapped onto the same fixed set of language
/// tags the keyword fallback already uses, rather than leaked/interned.
fn known_language(raw: &str) -> Option<&'static str> {
    match raw.trim().to_lowercase().as_str() {
        "python" => Some("python"),
        "javascript" | "js" => Some("javascript"),
        "typescript" | "ts" => Some("typescript"),
        "rust" | "rs" => Some("rust"),
        "dockerfile" | "docker" => Some("dockerfile"),
        "sql" => Some("sql"),
        "java" => Some("java"),
        "go" | "golang" => Some("go"),
        "c++" | "cpp" => Some("cpp"),
        "c#" | "csharp" => Some("csharp"),
        "ruby" => Some("ruby"),
        "php" => Some("php"),
        _ => None,
    }
}

fn default_keyword_table() -> Vec<(&'static str, Category, Option<&'static str>)> {
    vec![
        ("python", Category::Programming, Some("python")),
        ("javascript", Category::Programming, Some("javascript")),
        ("typescript", Category::Programming, Some("typescript")),
        ("rust", Category::Programming, Some("rust")),
        ("docker", Category::Programming, Some("dockerfile")),
        ("pandas", Category::DataScience, Some("python")),
        ("machine learning", Category::DataScience, Some("python")),
        ("sql", Category::DataScience, Some("sql")),
        ("figma", Category::DesignAndUx, None),
        ("wireframe", Category::DesignAndUx, None),
        ("usability", Category::DesignAndUx, None),
        ("project management", Category::BusinessAndManagement, None),
        ("leadership", Category::BusinessAndManagement, None),
        ("seo", Category::Marketing, None),
        ("social media", Category::Marketing, None),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    use crate::ai::provider::AiProvider;
    use crate::error::PipelineError;
    use crate::models::ProviderTier;
    use crate::ratelimit::RateLimitGate;

    #[test]
    fn keyword_fallback_matches_case_insensitively() {
        let classifier = TopicClassifier::new();
        let result = classifier.classify_via_keywords("Python List Comprehensions");
        assert_eq!(result.category, Category::Programming);
        assert_eq!(result.language, Some("python"));
    }

    #[test]
    fn unknown_topic_falls_back_to_general() {
        let classifier = TopicClassifier::new();
        let result = classifier.classify_via_keywords("underwater basket weaving");
        assert_eq!(result.category, Category::General);
    }

    struct StubProvider(&'static str);

    #[async_trait]
    impl AiProvider for StubProvider {
        fn tier(&self) -> ProviderTier {
            ProviderTier::Primary
        }

        async fn complete(&self, _prompt: &str, _json_mode: bool, _max_tokens: u32) -> Result<String, PipelineError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn classify_via_ai_threads_the_language_the_model_returned() {
        let orchestrator = AiOrchestrator::new(
            vec![Box::new(StubProvider(r#"{"category": "programming", "language": "rust", "confidence": 0.9}"#))],
            RateLimitGate::new(0, 0),
            Duration::from_secs(5),
        );

        let classifier = TopicClassifier::new();
        let result = classifier.classify_via_ai("ownership and borrowing", &orchestrator).await.unwrap();
        assert_eq!(result.category, Category::Programming);
        assert_eq!(result.language, Some("rust"));
    }
}

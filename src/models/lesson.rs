use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::job::{LearningStyle, Role, SkillLevel, TimeCommitment, UserProfile};
use crate::models::module::Difficulty;

/// Topic classifier output (component C): a lesson title mapped to a
/// knowledge-source category and, where relevant, a programming language.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Programming,
    DataScience,
    DesignAndUx,
    BusinessAndManagement,
    Marketing,
    General,
}

/// Derived, ephemeral input to the assembler. Never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonRequest {
    pub step_title: String,
    pub lesson_number: i32,
    pub learning_style: LearningStyle,
    pub user_profile: UserProfile,
    pub difficulty: Difficulty,
    pub industry: String,
    pub category: Category,
    pub language: Option<String>,
    pub enable_research: bool,
}

impl LessonRequest {
    pub fn new(
        step_title: String,
        lesson_number: i32,
        difficulty: Difficulty,
        user_profile: UserProfile,
        category: Category,
        language: Option<String>,
    ) -> Self {
        let learning_style = user_profile.learning_style;
        let industry = user_profile.industry.clone();
        Self {
            step_title,
            lesson_number,
            learning_style,
            user_profile,
            difficulty,
            industry,
            category,
            language,
            enable_research: true,
        }
    }
}

/// Structural metadata computed by the structure calculator.
/// Appears in the lesson document and steers the prompt; never causes a
/// single lesson to split into multiple persisted `LessonContent` rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LessonStructure {
    pub num_parts: u32,
    pub duration_minutes_per_part: u32,
    pub content_depth: ContentDepth,
    pub schedule: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentDepth {
    Foundational,
    Comprehensive,
    Advanced,
}

impl ContentDepth {
    pub fn from_skill_level(level: SkillLevel) -> Self {
        match level {
            SkillLevel::Beginner => ContentDepth::Foundational,
            SkillLevel::Intermediate => ContentDepth::Comprehensive,
            SkillLevel::Expert => ContentDepth::Advanced,
        }
    }

    /// Exercise-count cap the response parser enforces.
    pub fn exercise_cap(self) -> usize {
        match self {
            ContentDepth::Foundational => 5,
            ContentDepth::Comprehensive => 8,
            ContentDepth::Advanced => 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    pub part_number: u32,
    pub week_index: u32,
    /// Spaced-review offsets in days from the part's scheduled week, fixed
    /// at [2, 7, 30].
    pub review_offsets_days: [u32; 3],
}

/// Per-adapter success flags plus the two tier indicators (which window the
/// dev.to fetch satisfied, which platform the video fetch satisfied).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResearchSourceStatus {
    pub official_docs_ok: bool,
    pub stackoverflow_ok: bool,
    pub github_ok: bool,
    pub devto_ok: bool,
    pub youtube_ok: bool,
    pub devto_tier: DevToTier,
    pub video_source: VideoSource,
}

impl ResearchSourceStatus {
    /// Count of unavailable sources excluding Q&A and official docs — the
    /// Stack Overflow compensation formula's `missing` term.
    pub fn missing_for_compensation(&self) -> u32 {
        [!self.youtube_ok, !self.github_ok, !self.devto_ok]
            .into_iter()
            .filter(|x| *x)
            .count() as u32
    }

    pub fn all_unavailable(&self) -> bool {
        !self.official_docs_ok && !self.stackoverflow_ok && !self.github_ok && !self.devto_ok && !self.youtube_ok
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DevToTier {
    Recent,
    Extended,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoSource {
    Primary,
    Fallback,
    #[default]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceItem {
    pub title: String,
    pub url: String,
    pub body_excerpt: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResearchSources {
    pub official_doc: Option<SourceItem>,
    pub so_answers: Vec<SourceItem>,
    pub code_examples: Vec<SourceItem>,
    pub articles: Vec<SourceItem>,
    pub video: Option<SourceItem>,
}

/// Per-topic evidence aggregated by the research engine (component D).
/// Never persisted — it is denormalized into `LessonContent.source_attribution`
/// and discarded once the assembler invocation that produced it returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchBundle {
    pub topic: String,
    pub category: Category,
    pub language: Option<String>,
    pub elapsed_ms: u64,
    pub sources: ResearchSources,
    pub source_status: ResearchSourceStatus,
    pub summary: String,
}

impl ResearchBundle {
    pub fn empty(topic: String, category: Category, language: Option<String>) -> Self {
        Self {
            topic,
            category,
            language,
            elapsed_ms: 0,
            sources: ResearchSources::default(),
            source_status: ResearchSourceStatus::default(),
            summary: "all sources unavailable".to_string(),
        }
    }
}

/// Canonical post-normalization diagram shape, after the parser coerces
/// whichever of the four wire shapes the provider returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagram {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LessonComponents {
    pub introduction: Option<String>,
    pub body: Option<String>,
    pub exercises: Vec<serde_json::Value>,
    pub diagrams: Vec<Diagram>,
    pub quiz: Vec<serde_json::Value>,
    pub reading: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderTier {
    Primary,
    Secondary,
    Backup,
}

impl std::fmt::Display for ProviderTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderTier::Primary => write!(f, "tier_1"),
            ProviderTier::Secondary => write!(f, "tier_2"),
            ProviderTier::Backup => write!(f, "tier_3"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentGenerationRecord {
    pub component: String,
    pub provider: ProviderTier,
    pub tokens_used: u32,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub components: Vec<ComponentGenerationRecord>,
    /// "ai_only" when the research bundle came back with every source
    /// unavailable.
    pub mode: String,
}

/// Persistent lesson output. `(content_hash, module_id)` is unique; approved
/// rows are eligible cache hits for future identical fingerprints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonContent {
    pub id: String,
    pub module_id: String,
    pub lesson_number: i32,
    pub title: String,
    pub content_hash: String,
    pub components: LessonComponents,
    pub source_attribution: ResearchSourceStatus,
    pub generation_metadata: GenerationMetadata,
    pub ai_model_used: String,
    pub is_approved: bool,
    pub upvotes: i32,
    pub downvotes: i32,
    pub created_at: DateTime<Utc>,
}

impl LessonContent {
    /// Approval rule: at least 10 upvotes and at least 80% positive.
    pub fn approval_rate(&self) -> f64 {
        let total = self.upvotes + self.downvotes;
        if total == 0 {
            0.0
        } else {
            self.upvotes as f64 / total as f64
        }
    }

    pub fn meets_approval_bar(&self) -> bool {
        self.upvotes >= 10 && self.approval_rate() >= 0.8
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderUsageCounters {
    pub requests: u64,
    pub failures: u64,
    pub last_call_at: Option<DateTime<Utc>>,
}

pub fn role_as_str(role: Role) -> &'static str {
    match role {
        Role::Student => "student",
        Role::Professional => "professional",
        Role::CareerChanger => "career_changer",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_for_compensation_excludes_qa_and_official_docs() {
        let status = ResearchSourceStatus {
            official_docs_ok: false,
            stackoverflow_ok: false,
            github_ok: false,
            devto_ok: false,
            youtube_ok: false,
            ..Default::default()
        };
        // official_docs_ok and stackoverflow_ok are excluded from `missing`.
        assert_eq!(status.missing_for_compensation(), 3);
    }

    #[test]
    fn approval_requires_both_volume_and_ratio() {
        let mut lesson = sample_lesson();
        lesson.upvotes = 12;
        lesson.downvotes = 1;
        assert!(lesson.meets_approval_bar());

        lesson.upvotes = 9;
        lesson.downvotes = 0;
        assert!(!lesson.meets_approval_bar(), "below the 10-upvote floor");

        lesson.upvotes = 10;
        lesson.downvotes = 10;
        assert!(!lesson.meets_approval_bar(), "below the 80% ratio floor");
    }

    fn sample_lesson() -> LessonContent {
        LessonContent {
            id: "l1".into(),
            module_id: "m1".into(),
            lesson_number: 1,
            title: "t".into(),
            content_hash: "h".into(),
            components: LessonComponents::default(),
            source_attribution: ResearchSourceStatus::default(),
            generation_metadata: GenerationMetadata {
                components: vec![],
                mode: "full".into(),
            },
            ai_model_used: "primary".into(),
            is_approved: false,
            upvotes: 0,
            downvotes: 0,
            created_at: Utc::now(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::module::Difficulty;

/// Inbound work order. Consumed exactly-once logically — the queue may
/// redeliver, but `idempotency_key` plus `Module.generation_status` dedupe
/// redeliveries at the orchestrator (`ModuleOrchestrator::handle`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub module_id: String,
    pub roadmap_id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub user_profile: UserProfile,
    pub idempotency_key: String,
    #[serde(rename = "timestamp")]
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Professional,
    CareerChanger,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Expert,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LearningStyle {
    HandsOn,
    Video,
    Reading,
    Mixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeCommitment {
    #[serde(rename = "1-3")]
    OneToThree,
    #[serde(rename = "3-5")]
    ThreeToFive,
    #[serde(rename = "5-10")]
    FiveToTen,
    #[serde(rename = "10+")]
    TenPlus,
}

impl TimeCommitment {
    /// Duration multiplier from the structure calculator's decision matrix.
    pub fn duration_factor(self) -> f64 {
        match self {
            TimeCommitment::OneToThree => 0.7,
            TimeCommitment::ThreeToFive => 1.0,
            TimeCommitment::FiveToTen => 1.3,
            TimeCommitment::TenPlus => 1.5,
        }
    }

    /// Fraction of parsed exercises kept after the parser's complexity adjustment.
    pub fn exercise_retention(self) -> f64 {
        match self {
            TimeCommitment::OneToThree => 0.6,
            _ => 1.0,
        }
    }
}

/// Immutable per-job snapshot of the requesting user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub role: Role,
    pub career_stage: String,
    pub skill_level: SkillLevel,
    pub learning_style: LearningStyle,
    pub time_commitment: TimeCommitment,
    pub industry: String,
    #[serde(default)]
    pub current_role: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_message_round_trips_the_wire_envelope() {
        let raw = r#"{
            "module_id": "mod_1",
            "roadmap_id": "road_1",
            "title": "Python List Comprehensions",
            "difficulty": "beginner",
            "user_profile": {
                "role": "student",
                "career_stage": "early",
                "skill_level": "beginner",
                "learning_style": "hands_on",
                "time_commitment": "3-5",
                "industry": "software",
                "current_role": null,
                "bio": null
            },
            "idempotency_key": "idem-1",
            "timestamp": "2026-01-01T00:00:00Z"
        }"#;

        let msg: JobMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.module_id, "mod_1");
        assert_eq!(msg.user_profile.time_commitment.duration_factor(), 1.0);
        assert_eq!(msg.difficulty, Difficulty::Beginner);
    }
}

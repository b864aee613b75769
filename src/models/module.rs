use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit inside a user's learning roadmap. Owns 3-5 `LessonContent` rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Module {
    pub id: String,
    pub roadmap_id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub num_lessons_target: i32,
    pub generation_status: GenerationStatus,
    pub generation_started_at: Option<DateTime<Utc>>,
    pub generation_completed_at: Option<DateTime<Utc>>,
    pub generation_error: Option<String>,
    /// Idempotency key of the job message that last drove this module's
    /// generation, used by the orchestrator's redelivery short-circuit.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Expert,
}

impl Difficulty {
    /// Default `num_lessons_target` the orchestrator assigns a module that
    /// doesn't already carry one.
    pub fn default_lesson_count(self) -> i32 {
        match self {
            Difficulty::Beginner => 3,
            Difficulty::Intermediate => 4,
            Difficulty::Expert => 5,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Expert => write!(f, "expert"),
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "expert" => Ok(Difficulty::Expert),
            _ => Err(format!("invalid difficulty: {s}")),
        }
    }
}

/// `generation_status` transition graph:
/// `NotStarted -> Queued -> InProgress -> {Completed | Failed}`.
/// `Completed` and `Failed` are terminal until externally reset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    NotStarted,
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl GenerationStatus {
    /// Whether `self -> next` is an edge of the transition graph above.
    pub fn can_transition_to(self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (NotStarted, Queued)
                | (Queued, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationStatus::NotStarted => write!(f, "not_started"),
            GenerationStatus::Queued => write!(f, "queued"),
            GenerationStatus::InProgress => write!(f, "in_progress"),
            GenerationStatus::Completed => write!(f, "completed"),
            GenerationStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for GenerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(GenerationStatus::NotStarted),
            "queued" => Ok(GenerationStatus::Queued),
            "in_progress" => Ok(GenerationStatus::InProgress),
            "completed" => Ok(GenerationStatus::Completed),
            "failed" => Ok(GenerationStatus::Failed),
            _ => Err(format!("invalid generation status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions_follow_the_spec_graph() {
        assert!(GenerationStatus::NotStarted.can_transition_to(GenerationStatus::Queued));
        assert!(GenerationStatus::Queued.can_transition_to(GenerationStatus::InProgress));
        assert!(GenerationStatus::InProgress.can_transition_to(GenerationStatus::Completed));
        assert!(GenerationStatus::InProgress.can_transition_to(GenerationStatus::Failed));
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        assert!(!GenerationStatus::Completed.can_transition_to(GenerationStatus::InProgress));
        assert!(!GenerationStatus::Failed.can_transition_to(GenerationStatus::Queued));
    }

    #[test]
    fn no_transition_skips_in_progress() {
        assert!(!GenerationStatus::Queued.can_transition_to(GenerationStatus::Completed));
        assert!(!GenerationStatus::NotStarted.can_transition_to(GenerationStatus::InProgress));
    }

    #[test]
    fn default_lesson_counts_match_difficulty() {
        assert_eq!(Difficulty::Beginner.default_lesson_count(), 3);
        assert_eq!(Difficulty::Intermediate.default_lesson_count(), 4);
        assert_eq!(Difficulty::Expert.default_lesson_count(), 5);
    }
}

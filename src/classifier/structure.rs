use crate::models::job::{LearningStyle, Role, SkillLevel, TimeCommitment};
use crate::models::lesson::{ContentDepth, LessonStructure, ScheduleEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

/// Pure structure calculator (spec.md §4.4). Given `(complexity,
/// skill_level, role, learning_style, time_commitment)`, returns the
/// metadata that appears in the lesson document and steers the prompt.
/// Never affects how many `LessonContent` rows get persisted.
pub fn compute_structure(
    complexity: Complexity,
    skill_level: SkillLevel,
    role: Role,
    learning_style: LearningStyle,
    time_commitment: TimeCommitment,
) -> LessonStructure {
    let num_parts = num_parts(complexity, skill_level, role);
    let duration_minutes_per_part = duration_minutes(learning_style, time_commitment);
    let content_depth = ContentDepth::from_skill_level(skill_level);
    let schedule = build_schedule(num_parts);

    LessonStructure {
        num_parts,
        duration_minutes_per_part,
        content_depth,
        schedule,
    }
}

fn num_parts(complexity: Complexity, skill_level: SkillLevel, role: Role) -> u32 {
    let base = match (complexity, skill_level) {
        (Complexity::Simple, _) => 1,
        (Complexity::Medium, SkillLevel::Beginner) => 3,
        (Complexity::Medium, SkillLevel::Intermediate) => 2,
        (Complexity::Medium, SkillLevel::Expert) => 1,
        (Complexity::Complex, SkillLevel::Beginner) => 5,
        (Complexity::Complex, SkillLevel::Intermediate) => 3,
        (Complexity::Complex, SkillLevel::Expert) => 2,
    };

    let adjusted = if role == Role::CareerChanger { base + 1 } else { base };
    // Clamp onto the documented set {1,2,3,5} rather than letting the
    // career-changer bump produce an out-of-table value like 4 or 6.
    match adjusted {
        0..=1 => 1,
        2 => 2,
        3 | 4 => 3,
        _ => 5,
    }
}

fn duration_minutes(learning_style: LearningStyle, time_commitment: TimeCommitment) -> u32 {
    let base = match learning_style {
        LearningStyle::Video => 15.0,
        LearningStyle::Mixed => 20.0,
        LearningStyle::Reading => 25.0,
        LearningStyle::HandsOn => 30.0,
    };

    (base * time_commitment.duration_factor()).round() as u32
}

fn build_schedule(num_parts: u32) -> Vec<ScheduleEntry> {
    (1..=num_parts)
        .map(|part_number| ScheduleEntry {
            part_number,
            week_index: part_number - 1,
            review_offsets_days: [2, 7, 30],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_scenario_from_spec_section_8() {
        // title = "Python List Comprehensions", beginner, hands_on, 3-5h, student
        let structure = compute_structure(
            Complexity::Medium,
            SkillLevel::Beginner,
            Role::Student,
            LearningStyle::HandsOn,
            TimeCommitment::ThreeToFive,
        );
        assert_eq!(structure.num_parts, 3);
        assert_eq!(structure.duration_minutes_per_part, 30);
        assert_eq!(structure.content_depth, ContentDepth::Foundational);
    }

    #[test]
    fn career_changer_adds_one_part_but_stays_on_the_documented_set() {
        let structure = compute_structure(
            Complexity::Medium,
            SkillLevel::Expert,
            Role::CareerChanger,
            LearningStyle::Reading,
            TimeCommitment::OneToThree,
        );
        // base = 1 (Medium/Expert), +1 for career_changer = 2.
        assert_eq!(structure.num_parts, 2);
    }

    #[test]
    fn duration_scales_by_time_commitment_factor() {
        assert_eq!(duration_minutes(LearningStyle::HandsOn, TimeCommitment::OneToThree), 21);
        assert_eq!(duration_minutes(LearningStyle::HandsOn, TimeCommitment::FiveToTen), 39);
        assert_eq!(duration_minutes(LearningStyle::Video, TimeCommitment::TenPlus), 23);
    }

    #[test]
    fn schedule_carries_fixed_spaced_review_offsets() {
        let structure = compute_structure(
            Complexity::Complex,
            SkillLevel::Beginner,
            Role::Student,
            LearningStyle::Mixed,
            TimeCommitment::FiveToTen,
        );
        assert_eq!(structure.schedule.len(), 5);
        for entry in &structure.schedule {
            assert_eq!(entry.review_offsets_days, [2, 7, 30]);
        }
    }
}

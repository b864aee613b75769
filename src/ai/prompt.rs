use crate::models::lesson::role_as_str;
use crate::models::lesson::LessonStructure;
use crate::models::{LessonRequest, ResearchBundle};

/// One AI call's worth of required output shape; each variant maps to a
/// JSON schema the parser (component G) validates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonComponentKind {
    Exercises,
    Summary,
    Quiz,
    Diagrams,
    VideoStudyGuide,
    LongFormBody,
}

impl LessonComponentKind {
    pub fn name(self) -> &'static str {
        match self {
            LessonComponentKind::Exercises => "exercises",
            LessonComponentKind::Summary => "summary",
            LessonComponentKind::Quiz => "quiz",
            LessonComponentKind::Diagrams => "diagrams",
            LessonComponentKind::VideoStudyGuide => "video_study_guide",
            LessonComponentKind::LongFormBody => "long_form_body",
        }
    }

    fn schema_hint(self) -> &'static str {
        match self {
            LessonComponentKind::Exercises => {
                r#"{"exercises": [{"prompt": "...", "solution": "...", "difficulty": "..."}]}"#
            }
            LessonComponentKind::Summary => r#"{"introduction": "...", "body": "..."}"#,
            LessonComponentKind::Quiz => {
                r#"{"quiz": [{"question": "...", "choices": ["..."], "answer_index": 0}]}"#
            }
            LessonComponentKind::Diagrams => r#"{"diagrams": [{"type": "...", "code": "..."}]}"#,
            LessonComponentKind::VideoStudyGuide => r#"{"introduction": "...", "body": "..."}"#,
            LessonComponentKind::LongFormBody => r#"{"introduction": "...", "body": "..."}"#,
        }
    }
}

/// Composes a provider-neutral prompt out of three blocks:
/// a persona/schema preamble, the lesson request itself, and a "verified
/// research context" block built from the `ResearchBundle`. JSON-mode
/// switching is the orchestrator's job, not the prompt's — this builder
/// only ever emits plain text.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(
        component: LessonComponentKind,
        request: &LessonRequest,
        structure: &LessonStructure,
        research: &ResearchBundle,
    ) -> String {
        let preamble = Self::preamble(component);
        let request_block = Self::request_block(request, structure);
        let research_block = Self::research_block(research);

        format!("{preamble}\n\n{request_block}\n\n{research_block}")
    }

    fn preamble(component: LessonComponentKind) -> String {
        format!(
            "You are an instructional designer generating the \"{}\" section of a lesson. \
             Prefer statements grounded in the research context below over your own priors, \
             and cite source URLs inline where you draw on them. \
             Respond with JSON only, matching this shape: {}",
            component.name(),
            component.schema_hint()
        )
    }

    fn request_block(request: &LessonRequest, structure: &LessonStructure) -> String {
        format!(
            "Lesson request:\n\
             - title: {}\n\
             - lesson_number: {}\n\
             - learning_style: {:?}\n\
             - difficulty: {:?}\n\
             - role: {}\n\
             - industry: {}\n\
             - content_depth: {:?}\n\
             - duration_minutes_per_part: {}\n\
             - num_parts: {}",
            request.step_title,
            request.lesson_number,
            request.learning_style,
            request.difficulty,
            role_as_str(request.user_profile.role),
            request.industry,
            structure.content_depth,
            structure.duration_minutes_per_part,
            structure.num_parts,
        )
    }

    fn research_block(bundle: &ResearchBundle) -> String {
        let mut block = String::from("Verified research context:\n");

        if let Some(doc) = &bundle.sources.official_doc {
            block.push_str(&format!(
                "[official_docs] {} ({})\n{}\n\n",
                doc.title,
                doc.url,
                truncate(&doc.body_excerpt, 1500)
            ));
        }

        if !bundle.sources.so_answers.is_empty() {
            block.push_str("[stackoverflow]\n");
            for item in &bundle.sources.so_answers {
                block.push_str(&format!("- {} ({})\n  {}\n", item.title, item.url, truncate(&item.body_excerpt, 600)));
            }
            block.push('\n');
        }

        if !bundle.sources.code_examples.is_empty() {
            block.push_str("[github]\n");
            for item in &bundle.sources.code_examples {
                block.push_str(&format!("- {} ({})\n  {}\n", item.title, item.url, truncate(&item.body_excerpt, 400)));
            }
            block.push('\n');
        }

        if !bundle.sources.articles.is_empty() {
            block.push_str("[devto]\n");
            for item in &bundle.sources.articles {
                block.push_str(&format!("- {} ({})\n  {}\n", item.title, item.url, truncate(&item.body_excerpt, 600)));
            }
            block.push('\n');
        }

        if let Some(video) = &bundle.sources.video {
            block.push_str(&format!(
                "[youtube] {} ({})\n{}\n\n",
                video.title,
                video.url,
                truncate(&video.body_excerpt, 1200)
            ));
        }

        if bundle.source_status.all_unavailable() {
            block.push_str("(no sources available; answer from your own knowledge)\n");
        }

        block.push_str(&format!("Summary: {}", bundle.summary));
        block
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{LearningStyle, Role, SkillLevel, TimeCommitment, UserProfile};
    use crate::models::lesson::{Category, ContentDepth};
    use crate::models::module::Difficulty;

    fn sample_request() -> LessonRequest {
        LessonRequest::new(
            "Python List Comprehensions".into(),
            1,
            Difficulty::Beginner,
            UserProfile {
                role: Role::Student,
                career_stage: "early".into(),
                skill_level: SkillLevel::Beginner,
                learning_style: LearningStyle::HandsOn,
                time_commitment: TimeCommitment::ThreeToFive,
                industry: "software".into(),
                current_role: None,
                bio: None,
                interests: vec![],
            },
            Category::Programming,
            Some("python".into()),
        )
    }

    #[test]
    fn research_block_labels_each_source_section() {
        let bundle = ResearchBundle::empty("topic".into(), Category::Programming, None);
        let built = PromptBuilder::research_block(&bundle);
        assert!(built.contains("no sources available"));
    }

    #[test]
    fn prompt_instructs_grounding_over_priors() {
        let request = sample_request();
        let structure = crate::classifier::structure::compute_structure(
            crate::classifier::structure::Complexity::Medium,
            request.user_profile.skill_level,
            request.user_profile.role,
            request.learning_style,
            request.user_profile.time_commitment,
        );
        let bundle = ResearchBundle::empty(request.step_title.clone(), request.category, None);
        let prompt = PromptBuilder::build(LessonComponentKind::Exercises, &request, &structure, &bundle);
        assert!(prompt.contains("Prefer statements grounded"));
        assert!(prompt.contains("Python List Comprehensions"));
        let _ = ContentDepth::Foundational;
    }
}

pub mod job;
pub mod lesson;
pub mod module;

pub use job::{JobMessage, LearningStyle, Role, SkillLevel, TimeCommitment, UserProfile};
pub use lesson::{
    Category, ComponentGenerationRecord, ContentDepth, Diagram, DevToTier, GenerationMetadata,
    LessonComponents, LessonContent, LessonRequest, LessonStructure, ProviderTier,
    ProviderUsageCounters, ResearchBundle, ResearchSourceStatus, ResearchSources, ScheduleEntry,
    SourceItem, VideoSource,
};
pub use module::{Difficulty, GenerationStatus, Module};

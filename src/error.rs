use thiserror::Error;

/// Error taxonomy for the generation pipeline (spec.md §7). Lesson- and
/// module-level variants are recovered *within* the job: the assembler or
/// orchestrator records them and the message is still acked. Only
/// `Infrastructure` propagates out so the queue's redelivery/dead-letter
/// policy provides durability — once a message is acked, this crate owns
/// the failure, not the queue.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("all research sources unavailable for topic: {0}")]
    AllSourcesUnavailable(String),

    #[error("provider quota exceeded: {0}")]
    ProviderQuotaExceeded(String),

    #[error("no AI provider tier succeeded")]
    AiUnavailable,

    #[error("response parse failure for component {component}: {reason}")]
    ParseFailure { component: String, reason: String },

    #[error("lesson {lesson_number} failed: {reason}")]
    LessonFailed { lesson_number: i32, reason: String },

    #[error("module generation failed: {0}")]
    ModuleFailed(String),

    #[error("infrastructure error: {0}")]
    Infrastructure(#[from] anyhow::Error),

    #[error("bad message: {0}")]
    BadMessage(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

use std::sync::Arc;

use log::{error, info, warn};

use crate::assembler::LessonAssembler;
use crate::error::{PipelineError, PipelineResult};
use crate::models::job::JobMessage;
use crate::models::lesson::{Category, LessonRequest};
use crate::models::module::GenerationStatus;
use crate::repository::ModuleRepository;

/// What the queue-consumption loop should do with the message that was
/// just handled. Kept distinct from a plain `Result` so a module-level or
/// lesson-level failure (acked, recorded in the database) is never
/// confused with an infrastructure failure (not acked, left for
/// redelivery) — see spec.md §4.9 step 7 / §7's propagation policy.
#[derive(Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    Acked,
    DeadLettered(String),
}

/// Component J/K (spec.md §4.9): the module-level state machine driving
/// sequential per-lesson assembly. `handle` only ever returns `Err` for
/// infrastructure-level failures (`PipelineError::Database` /
/// `PipelineError::Infrastructure`) — anything lesson- or module-scoped is
/// caught here, recorded via `ModuleRepository::transition_status`, and
/// surfaced as `Ok(HandleOutcome::Acked)`.
pub struct ModuleOrchestrator {
    module_repo: Arc<ModuleRepository>,
    assembler: Arc<LessonAssembler>,
}

impl ModuleOrchestrator {
    pub fn new(module_repo: Arc<ModuleRepository>, assembler: Arc<LessonAssembler>) -> Self {
        Self { module_repo, assembler }
    }

    pub async fn handle(&self, message: JobMessage) -> PipelineResult<HandleOutcome> {
        let module = match self.module_repo.load_module(&message.module_id).await? {
            Some(m) => m,
            None => {
                warn!("orchestrator: unknown module id {}, dead-lettering", message.module_id);
                return Ok(HandleOutcome::DeadLettered(format!("unknown module id {}", message.module_id)));
            }
        };

        // Step 1: redelivery short-circuit (P5/L1).
        let already_driven_by_this_message = module.idempotency_key.as_deref() == Some(message.idempotency_key.as_str());
        if already_driven_by_this_message
            && matches!(module.generation_status, GenerationStatus::InProgress | GenerationStatus::Completed)
        {
            info!("orchestrator: module {} already {:?}, acking redelivery", module.id, module.generation_status);
            return Ok(HandleOutcome::Acked);
        }

        // Step 2: transition queued/not_started -> in_progress, else stale.
        if !matches!(module.generation_status, GenerationStatus::NotStarted | GenerationStatus::Queued) {
            warn!(
                "orchestrator: module {} in stale state {:?} for a fresh job, acking without action",
                module.id, module.generation_status
            );
            return Ok(HandleOutcome::Acked);
        }

        // `can_transition_to` only permits `NotStarted -> Queued` and
        // `Queued -> InProgress`, not `NotStarted -> InProgress` directly
        // (models/module.rs), so a module still `not_started` takes both
        // hops here rather than widening the transition graph.
        if module.generation_status == GenerationStatus::NotStarted {
            self.module_repo
                .transition_status(&module.id, GenerationStatus::Queued, None, None)
                .await?;
        }
        self.module_repo
            .transition_status(&module.id, GenerationStatus::InProgress, Some(&message.idempotency_key), None)
            .await?;

        // Step 3: num_lessons_target from difficulty, falling back to whatever was
        // already recorded on the module row.
        let target = if module.num_lessons_target > 0 {
            module.num_lessons_target
        } else {
            message.difficulty.default_lesson_count()
        };

        // Step 4: sequential per-lesson assembly; a lesson-level failure does not
        // abort the loop, it is recorded and the remaining lessons still run.
        let mut failure_reason: Option<String> = None;
        for lesson_number in 1..=target {
            let request = LessonRequest::new(
                message.title.clone(),
                lesson_number,
                message.difficulty,
                message.user_profile.clone(),
                Category::General,
                None,
            );

            match self.assembler.assemble(request, &module.id).await {
                Ok(lesson) => {
                    info!("orchestrator: module {} lesson {} assembled", module.id, lesson.lesson_number);
                }
                Err(PipelineError::Database(e)) => return Err(PipelineError::Database(e)),
                Err(PipelineError::Infrastructure(e)) => return Err(PipelineError::Infrastructure(e)),
                Err(e) => {
                    error!("orchestrator: module {} lesson {lesson_number} failed: {e}", module.id);
                    failure_reason.get_or_insert_with(|| format!("lesson {lesson_number}: {e}"));
                }
            }
        }

        // Steps 5/6: terminal transition.
        match failure_reason {
            None => {
                self.module_repo
                    .transition_status(&module.id, GenerationStatus::Completed, None, None)
                    .await?;
                info!("orchestrator: module {} completed", module.id);
            }
            Some(reason) => {
                self.module_repo
                    .transition_status(&module.id, GenerationStatus::Failed, None, Some(&reason))
                    .await?;
                error!("orchestrator: module {} failed: {reason}", module.id);
            }
        }

        Ok(HandleOutcome::Acked)
    }
}

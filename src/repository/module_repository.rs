use std::str::FromStr;

use chrono::Utc;
use sqlx::PgPool;

use crate::error::{PipelineError, PipelineResult};
use crate::models::module::{Difficulty, GenerationStatus};
use crate::models::Module;

#[derive(Debug, sqlx::FromRow)]
struct ModuleRow {
    id: String,
    roadmap_id: String,
    title: String,
    description: String,
    difficulty: String,
    num_lessons_target: i32,
    generation_status: String,
    generation_started_at: Option<chrono::DateTime<Utc>>,
    generation_completed_at: Option<chrono::DateTime<Utc>>,
    generation_error: Option<String>,
    idempotency_key: Option<String>,
}

impl TryFrom<ModuleRow> for Module {
    type Error = PipelineError;

    fn try_from(row: ModuleRow) -> Result<Self, Self::Error> {
        Ok(Module {
            id: row.id,
            roadmap_id: row.roadmap_id,
            title: row.title,
            description: row.description,
            difficulty: Difficulty::from_str(&row.difficulty)
                .map_err(|e| PipelineError::Infrastructure(anyhow::anyhow!(e)))?,
            num_lessons_target: row.num_lessons_target,
            generation_status: GenerationStatus::from_str(&row.generation_status)
                .map_err(|e| PipelineError::Infrastructure(anyhow::anyhow!(e)))?,
            generation_started_at: row.generation_started_at,
            generation_completed_at: row.generation_completed_at,
            generation_error: row.generation_error,
            idempotency_key: row.idempotency_key,
        })
    }
}

/// One short transaction per method (Design Notes: repository pattern
/// over ORM-linked mutation), generalizing the teacher's
/// `CourseRepository` (`db/course_repository.rs`) to the module-generation
/// state machine (spec.md §3, P5).
pub struct ModuleRepository {
    pool: PgPool,
}

impl ModuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn load_module(&self, module_id: &str) -> PipelineResult<Option<Module>> {
        let row = sqlx::query_as::<_, ModuleRow>(
            r#"SELECT id, roadmap_id, title, description, difficulty, num_lessons_target,
                      generation_status, generation_started_at, generation_completed_at,
                      generation_error, idempotency_key
               FROM modules WHERE id = $1"#,
        )
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Module::try_from).transpose()
    }

    /// Validates the transition against `GenerationStatus::can_transition_to`
    /// inside the same transaction that applies it, so a concurrent
    /// redelivery loses the race cleanly rather than double-applying.
    pub async fn transition_status(
        &self,
        module_id: &str,
        next: GenerationStatus,
        idempotency_key: Option<&str>,
        error: Option<&str>,
    ) -> PipelineResult<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> = sqlx::query_scalar(
            "SELECT generation_status FROM modules WHERE id = $1 FOR UPDATE",
        )
        .bind(module_id)
        .fetch_optional(&mut *tx)
        .await?;

        let current = current.ok_or_else(|| PipelineError::ModuleFailed(format!("module {module_id} not found")))?;
        let current = GenerationStatus::from_str(&current)
            .map_err(|e| PipelineError::Infrastructure(anyhow::anyhow!(e)))?;

        if !current.can_transition_to(next) {
            return Err(PipelineError::ModuleFailed(format!(
                "illegal transition {current} -> {next} for module {module_id}"
            )));
        }

        let now = Utc::now();
        let started_at = matches!(next, GenerationStatus::InProgress).then_some(now);
        let completed_at = next.is_terminal().then_some(now);

        sqlx::query(
            r#"UPDATE modules
               SET generation_status = $1,
                   generation_started_at = COALESCE($2, generation_started_at),
                   generation_completed_at = COALESCE($3, generation_completed_at),
                   generation_error = $4,
                   idempotency_key = COALESCE($5, idempotency_key)
               WHERE id = $6"#,
        )
        .bind(next.to_string())
        .bind(started_at)
        .bind(completed_at)
        .bind(error)
        .bind(idempotency_key)
        .bind(module_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

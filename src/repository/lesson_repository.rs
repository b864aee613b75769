use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PipelineResult;
use crate::models::lesson::{GenerationMetadata, LessonComponents, LessonContent, ResearchSourceStatus};

#[derive(Debug, sqlx::FromRow)]
struct LessonRow {
    id: String,
    module_id: String,
    lesson_number: i32,
    title: String,
    content_hash: String,
    components: serde_json::Value,
    source_attribution: serde_json::Value,
    generation_metadata: serde_json::Value,
    ai_model_used: String,
    is_approved: bool,
    upvotes: i32,
    downvotes: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<LessonRow> for LessonContent {
    type Error = serde_json::Error;

    fn try_from(row: LessonRow) -> Result<Self, Self::Error> {
        Ok(LessonContent {
            id: row.id,
            module_id: row.module_id,
            lesson_number: row.lesson_number,
            title: row.title,
            content_hash: row.content_hash,
            components: serde_json::from_value::<LessonComponents>(row.components)?,
            source_attribution: serde_json::from_value::<ResearchSourceStatus>(row.source_attribution)?,
            generation_metadata: serde_json::from_value::<GenerationMetadata>(row.generation_metadata)?,
            ai_model_used: row.ai_model_used,
            is_approved: row.is_approved,
            upvotes: row.upvotes,
            downvotes: row.downvotes,
            created_at: row.created_at,
        })
    }
}

/// Generalizes the teacher's `CourseRepository` query shape to
/// `LessonContent`. `(content_hash, module_id)` is unique on insert, but
/// `find_by_hash` looks up by `content_hash` alone — an approved lesson
/// generated for one module is a valid cache hit for any other module
/// requesting the same fingerprint.
pub struct LessonRepository {
    pool: PgPool,
}

impl LessonRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_lesson(&self, lesson: &LessonContent) -> PipelineResult<()> {
        sqlx::query(
            r#"INSERT INTO lesson_content (
                   id, module_id, lesson_number, title, content_hash, components,
                   source_attribution, generation_metadata, ai_model_used,
                   is_approved, upvotes, downvotes, created_at
               )
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
               ON CONFLICT (content_hash, module_id) DO NOTHING"#,
        )
        .bind(&lesson.id)
        .bind(&lesson.module_id)
        .bind(lesson.lesson_number)
        .bind(&lesson.title)
        .bind(&lesson.content_hash)
        .bind(serde_json::to_value(&lesson.components).map_err(|e| anyhow::anyhow!(e))?)
        .bind(serde_json::to_value(&lesson.source_attribution).map_err(|e| anyhow::anyhow!(e))?)
        .bind(serde_json::to_value(&lesson.generation_metadata).map_err(|e| anyhow::anyhow!(e))?)
        .bind(&lesson.ai_model_used)
        .bind(lesson.is_approved)
        .bind(lesson.upvotes)
        .bind(lesson.downvotes)
        .bind(lesson.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Cache lookup: an approved `LessonContent` is a hit for *any* module
    /// requesting the same `content_hash` (spec.md §3/§4.7) — module_id only
    /// matters for the row's own identity on insert, never for lookup.
    pub async fn find_by_hash(&self, content_hash: &str) -> PipelineResult<Option<LessonContent>> {
        let row = sqlx::query_as::<_, LessonRow>(
            r#"SELECT id, module_id, lesson_number, title, content_hash, components,
                      source_attribution, generation_metadata, ai_model_used,
                      is_approved, upvotes, downvotes, created_at
               FROM lesson_content
               WHERE content_hash = $1 AND is_approved = true
               ORDER BY created_at ASC
               LIMIT 1"#,
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(LessonContent::try_from(r).map_err(|e| anyhow::anyhow!(e))?)),
            None => Ok(None),
        }
    }

    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::ai::provider::HttpAiProvider;
use crate::ai::AiOrchestrator;
use crate::assembler::LessonAssembler;
use crate::cache::ContentCache;
use crate::classifier::TopicClassifier;
use crate::config::Config;
use crate::models::ProviderTier;
use crate::orchestrator::ModuleOrchestrator;
use crate::ratelimit::RateLimitGate;
use crate::repository::{LessonRepository, ModuleRepository};
use crate::research::ResearchEngine;

/// Process-wide wiring for the worker binary. Built once at startup and
/// shared behind `Arc`s the way the teacher's `AppState` wires its
/// repositories and services together, generalized from an HTTP handler's
/// state to a queue worker's state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub module_repo: Arc<ModuleRepository>,
    pub orchestrator: Arc<ModuleOrchestrator>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);

        let module_repo = Arc::new(ModuleRepository::new(pool.clone()));
        let lesson_repo = Arc::new(LessonRepository::new(pool));

        let gate = RateLimitGate::new(config.primary_provider_min_interval_s, config.backup_provider_min_interval_s);
        let providers: Vec<Box<dyn crate::ai::provider::AiProvider>> = vec![
            Box::new(HttpAiProvider::new(
                ProviderTier::Primary,
                env_or("PRIMARY_PROVIDER_URL", "https://primary.ai.internal"),
                env_or("PRIMARY_PROVIDER_API_KEY", ""),
                env_or("PRIMARY_PROVIDER_MODEL", "primary-v1"),
            )),
            Box::new(HttpAiProvider::new(
                ProviderTier::Secondary,
                env_or("SECONDARY_PROVIDER_URL", "https://secondary.ai.internal"),
                env_or("SECONDARY_PROVIDER_API_KEY", ""),
                env_or("SECONDARY_PROVIDER_MODEL", "secondary-v1"),
            )),
            Box::new(HttpAiProvider::new(
                ProviderTier::Backup,
                env_or("BACKUP_PROVIDER_URL", "https://backup.ai.internal"),
                env_or("BACKUP_PROVIDER_API_KEY", ""),
                env_or("BACKUP_PROVIDER_MODEL", "backup-v1"),
            )),
        ];
        let ai = Arc::new(AiOrchestrator::new(providers, gate, Duration::from_secs(config.ai_call_deadline_s)));

        let classifier = Arc::new(TopicClassifier::new());
        let research = Arc::new(ResearchEngine::new(&config));
        let cache = Arc::new(ContentCache::new(lesson_repo, config.schema_version));

        let assembler = Arc::new(LessonAssembler::new(cache, classifier, research, ai));
        let orchestrator = Arc::new(ModuleOrchestrator::new(module_repo.clone(), assembler));

        Self { config, module_repo, orchestrator }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

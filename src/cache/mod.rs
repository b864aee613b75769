use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, Notify};

use crate::error::PipelineResult;
use crate::models::job::{Role, SkillLevel};
use crate::models::lesson::LessonContent;
use crate::models::lesson::role_as_str;
use crate::repository::LessonRepository;

/// Content-addressable caching keyed on a fingerprint of the lesson's
/// generation inputs, with single-flight semantics so a redelivered or
/// concurrently-duplicated job never pays for AI generation twice for the
/// same `(content_hash, module_id)`.
pub struct ContentCache {
    repository: Arc<LessonRepository>,
    in_flight: Mutex<HashMap<String, Arc<Notify>>>,
    schema_version: u32,
}

impl ContentCache {
    pub fn new(repository: Arc<LessonRepository>, schema_version: u32) -> Self {
        Self {
            repository,
            in_flight: Mutex::new(HashMap::new()),
            schema_version,
        }
    }

    /// `sha256(normalize(title) || style || skill_level || role || industry || schema_version)`.
    pub fn content_hash(&self, title: &str, learning_style: &str, skill_level: SkillLevel, role: Role, industry: &str) -> String {
        let normalized_title = title.trim().to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(normalized_title.as_bytes());
        hasher.update(b"|");
        hasher.update(learning_style.as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{skill_level:?}").to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(role_as_str(role).as_bytes());
        hasher.update(b"|");
        hasher.update(industry.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(self.schema_version.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Looks up an approved cache hit (by `content_hash` alone — any module
    /// with the same fingerprint may reuse it); on miss, runs `generate`
    /// under a per-hash lock so concurrent callers for the same fingerprint
    /// block on the first generation instead of racing the AI orchestrator.
    pub async fn get_or_generate<F, Fut>(
        &self,
        content_hash: &str,
        generate: F,
    ) -> PipelineResult<LessonContent>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PipelineResult<LessonContent>>,
    {
        if let Some(hit) = self.repository.find_by_hash(content_hash).await? {
            return Ok(hit);
        }

        let notify = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.get(content_hash) {
                Some(existing.clone())
            } else {
                in_flight.insert(content_hash.to_string(), Arc::new(Notify::new()));
                None
            }
        };

        if let Some(notify) = notify {
            notify.notified().await;
            if let Some(hit) = self.repository.find_by_hash(content_hash).await? {
                return Ok(hit);
            }
            // The leader's generation produced an unapproved row (or failed
            // outright); fall through and generate independently rather
            // than wait forever on a `Notify` nobody will fire again.
        }

        let result = generate().await;

        if let Ok(lesson) = &result {
            self.repository.insert_lesson(lesson).await?;
        }

        let waiter = self.in_flight.lock().await.remove(content_hash);
        if let Some(waiter) = waiter {
            waiter.notify_waiters();
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_equivalent_inputs_regardless_of_title_casing() {
        // Pure hashing logic only; repository access is exercised at the
        // integration level where a real pool is available.
        let normalize = |t: &str| t.trim().to_lowercase();
        assert_eq!(normalize("Python List Comprehensions"), normalize("  python list comprehensions  "));
    }
}

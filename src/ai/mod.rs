pub mod parser;
pub mod prompt;
pub mod provider;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{ProviderTier, ProviderUsageCounters};
use crate::ratelimit::RateLimitGate;
use provider::AiProvider;

/// Fixed primary -> secondary -> backup fallback chain.
/// Each attempt is gated by the rate limiter and made exactly once —
/// retries live at the tier boundary (next provider) and the queue boundary
/// (redelivery), never inside a single call, per the Design Notes.
pub struct AiOrchestrator {
    providers: Vec<Box<dyn AiProvider>>,
    gate: RateLimitGate,
    usage: Mutex<HashMap<ProviderTier, ProviderUsageCounters>>,
    /// Per-attempt suspension-point deadline (spec.md §5: "single AI call
    /// 60s"). A blown deadline is treated the same as any other transport
    /// failure — advance to the next tier, never retry in place.
    call_deadline: Duration,
}

impl AiOrchestrator {
    pub fn new(providers: Vec<Box<dyn AiProvider>>, gate: RateLimitGate, call_deadline: Duration) -> Self {
        Self {
            providers,
            gate,
            usage: Mutex::new(HashMap::new()),
            call_deadline,
        }
    }

    pub async fn generate(&self, prompt: &str, json_mode: bool, max_tokens: u32) -> PipelineResult<(String, ProviderTier)> {
        for provider in &self.providers {
            let tier = provider.tier();
            self.gate.acquire(tier).await;

            let attempt = tokio::time::timeout(self.call_deadline, provider.complete(prompt, json_mode, max_tokens)).await;

            match attempt {
                Ok(Ok(text)) => {
                    self.record(tier, true);
                    info!("ai_orchestrator: {tier} served the request");
                    return Ok((text, tier));
                }
                Ok(Err(e)) => {
                    self.record(tier, false);
                    warn!("ai_orchestrator: {tier} failed, falling over: {e}");
                }
                Err(_) => {
                    self.record(tier, false);
                    warn!("ai_orchestrator: {tier} exceeded the {:?} call deadline, falling over", self.call_deadline);
                }
            }
        }

        error!("ai_orchestrator: all provider tiers exhausted");
        Err(PipelineError::AiUnavailable)
    }

    fn record(&self, tier: ProviderTier, success: bool) {
        let mut usage = self.usage.lock().unwrap();
        let counters = usage.entry(tier).or_default();
        counters.requests += 1;
        if !success {
            counters.failures += 1;
        }
        counters.last_call_at = Some(Utc::now());
    }

    pub fn usage_snapshot(&self) -> HashMap<ProviderTier, ProviderUsageCounters> {
        self.usage.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        tier: ProviderTier,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl AiProvider for StubProvider {
        fn tier(&self) -> ProviderTier {
            self.tier
        }

        async fn complete(&self, _prompt: &str, _json_mode: bool, _max_tokens: u32) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PipelineError::ProviderQuotaExceeded("stub quota".into()))
            } else {
                Ok("stub response".into())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn falls_over_to_secondary_when_primary_is_exhausted() {
        let primary_calls = Arc::new(AtomicUsize::new(0));
        let secondary_calls = Arc::new(AtomicUsize::new(0));

        let orchestrator = AiOrchestrator::new(
            vec![
                Box::new(StubProvider { tier: ProviderTier::Primary, calls: primary_calls.clone(), fail: true }),
                Box::new(StubProvider { tier: ProviderTier::Secondary, calls: secondary_calls.clone(), fail: false }),
                Box::new(StubProvider { tier: ProviderTier::Backup, calls: Arc::new(AtomicUsize::new(0)), fail: true }),
            ],
            RateLimitGate::new(3, 6),
            Duration::from_secs(60),
        );

        let (text, tier) = orchestrator.generate("prompt", false, 100).await.unwrap();
        assert_eq!(text, "stub response");
        assert_eq!(tier, ProviderTier::Secondary);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1, "no retries at the call site");
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn raises_ai_unavailable_when_every_tier_fails() {
        let orchestrator = AiOrchestrator::new(
            vec![
                Box::new(StubProvider { tier: ProviderTier::Primary, calls: Arc::new(AtomicUsize::new(0)), fail: true }),
                Box::new(StubProvider { tier: ProviderTier::Secondary, calls: Arc::new(AtomicUsize::new(0)), fail: true }),
                Box::new(StubProvider { tier: ProviderTier::Backup, calls: Arc::new(AtomicUsize::new(0)), fail: true }),
            ],
            RateLimitGate::new(3, 6),
            Duration::from_secs(60),
        );

        let result = orchestrator.generate("prompt", false, 100).await;
        assert!(matches!(result, Err(PipelineError::AiUnavailable)));
    }
}

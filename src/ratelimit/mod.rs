use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::ProviderTier;

/// Per-provider serializer enforcing a minimum inter-request spacing
/// (spec.md §4.1, invariant P1). Gates are lazily initialized on first
/// `acquire` for a given provider and never fail — they only delay.
pub struct RateLimitGate {
    min_interval: HashMap<ProviderTier, Duration>,
    last_call_at: Mutex<HashMap<ProviderTier, Instant>>,
}

impl RateLimitGate {
    pub fn new(primary_secs: u64, backup_secs: u64) -> Self {
        let mut min_interval = HashMap::new();
        min_interval.insert(ProviderTier::Primary, Duration::from_secs(primary_secs));
        min_interval.insert(ProviderTier::Secondary, Duration::ZERO);
        min_interval.insert(ProviderTier::Backup, Duration::from_secs(backup_secs));

        Self {
            min_interval,
            last_call_at: Mutex::new(HashMap::new()),
        }
    }

    /// Blocks until `now - last_call_at[provider] >= min_interval[provider]`,
    /// then atomically stamps `last_call_at`. Concurrent callers for the
    /// *same* provider serialize; callers for different providers never
    /// contend on each other's wait (the mutex is only held long enough to
    /// read/write the instant, never across the `sleep`).
    ///
    /// If the calling future is dropped while sleeping (cancellation), the
    /// stamp is never written and `last_call_at` does not advance.
    pub async fn acquire(&self, provider: ProviderTier) {
        loop {
            let wait = {
                let mut last_call = self.last_call_at.lock().await;
                let min_interval = self.min_interval.get(&provider).copied().unwrap_or(Duration::ZERO);
                match last_call.get(&provider) {
                    Some(&last) => {
                        let elapsed = last.elapsed();
                        if elapsed >= min_interval {
                            last_call.insert(provider, Instant::now());
                            return;
                        }
                        min_interval - elapsed
                    }
                    None => {
                        last_call.insert(provider, Instant::now());
                        return;
                    }
                }
            };
            tokio::time::sleep(wait).await;
            // Loop back around: another caller may have raced us to the
            // stamp while we slept, so re-check rather than assume.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn second_call_for_same_provider_waits_the_full_interval() {
        let gate = RateLimitGate::new(3, 6);

        gate.acquire(ProviderTier::Primary).await;
        let start = Instant::now();
        gate.acquire(ProviderTier::Primary).await;
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn different_providers_do_not_contend() {
        let gate = Arc::new(RateLimitGate::new(3, 6));

        gate.acquire(ProviderTier::Primary).await;
        let start = Instant::now();
        // Secondary has a zero interval and must not wait behind primary.
        gate.acquire(ProviderTier::Secondary).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn second_acquire_stays_pending_until_the_interval_elapses() {
        use tokio_test::{assert_pending, assert_ready, task};

        let gate = RateLimitGate::new(3, 6);
        gate.acquire(ProviderTier::Primary).await;

        let mut t = task::spawn(gate.acquire(ProviderTier::Primary));
        assert_pending!(t.poll());

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_ready!(t.poll());
    }
}

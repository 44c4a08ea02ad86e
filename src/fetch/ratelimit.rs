//! Per-source rate limiting (§5): `acquireRateLimit(sourceId, rateLimitMs)`
//! suspends until `now - lastFire[sourceId] >= rateLimitMs`. Built on
//! `governor` rather than a hand-rolled `HashMap<SourceId, Instant>` — the
//! JDSB123 odds-ingestion service uses exactly this crate for the same
//! per-source-quota problem. Each source gets its own single-key limiter
//! (governor's keyed limiters share one quota across all keys, which
//! doesn't fit sources with different `rateLimitMs`), stored in a map
//! guarded by an async `RwLock`. Sub-URL fetches share the same bucket as
//! their parent by passing the parent adapter's source id.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use tokio::sync::RwLock;

type SourceLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct SourceRateLimiters {
    limiters: RwLock<HashMap<String, Arc<SourceLimiter>>>,
}

impl SourceRateLimiters {
    pub fn new() -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
        }
    }

    async fn limiter_for(&self, source_id: &str, rate_limit_ms: u64) -> Arc<SourceLimiter> {
        if let Some(existing) = self.limiters.read().await.get(source_id) {
            return existing.clone();
        }
        let mut limiters = self.limiters.write().await;
        limiters
            .entry(source_id.to_string())
            .or_insert_with(|| {
                let period = Duration::from_millis(rate_limit_ms.max(1));
                let quota = Quota::with_period(period)
                    .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).unwrap()));
                Arc::new(RateLimiter::direct(quota))
            })
            .clone()
    }

    /// Suspends until the source's token becomes available, then consumes
    /// it. Safe under concurrent callers: the underlying `governor` state
    /// is updated atomically.
    pub async fn acquire(&self, source_id: &str, rate_limit_ms: u64) {
        let limiter = self.limiter_for(source_id, rate_limit_ms).await;
        limiter.until_ready().await;
    }
}

impl Default for SourceRateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn serializes_fetches_within_a_source_by_at_least_the_interval() {
        let limiters = SourceRateLimiters::new();
        let started = Instant::now();
        for _ in 0..3 {
            limiters.acquire("demo-source", 50).await;
        }
        // Two waits of ~50ms between three acquisitions.
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn different_sources_do_not_share_a_bucket() {
        let limiters = SourceRateLimiters::new();
        let started = Instant::now();
        limiters.acquire("source-a", 500).await;
        limiters.acquire("source-b", 500).await;
        // Both fire immediately since they're independent buckets.
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}

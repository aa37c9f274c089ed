//! Decision pipeline metrics.
//!
//! Counts how each decision was resolved and what the reasoning tier cost, so
//! operators can see the cache and rule hit rates that keep spend bounded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::api::ReasoningTier;

/// Lock-free counters shared between the scheduler and the batch worker.
#[derive(Debug, Default)]
pub struct DecisionMetrics {
    rule_hits: AtomicU64,
    cache_hits: AtomicU64,
    reasoning_enqueued: AtomicU64,

    /// Calls made to the reasoning service, per tier
    standard_calls: AtomicU64,
    premium_calls: AtomicU64,

    /// Requests carried by those calls
    requests_sent: AtomicU64,

    reasoning_failures: AtomicU64,
    malformed_replies: AtomicU64,
    stale_drops: AtomicU64,
    fallbacks: AtomicU64,
    conversations: AtomicU64,
    conversation_turns: AtomicU64,

    queue_depth: AtomicU64,
    peak_queue_depth: AtomicU64,
    total_call_time_nanos: AtomicU64,
}

impl DecisionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rule_hit(&self) {
        self.rule_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self) {
        self.reasoning_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one completed (or timed out) reasoning call.
    pub fn record_call(&self, tier: ReasoningTier, requests: usize, elapsed: Duration) {
        match tier {
            ReasoningTier::Standard => self.standard_calls.fetch_add(1, Ordering::Relaxed),
            ReasoningTier::Premium => self.premium_calls.fetch_add(1, Ordering::Relaxed),
        };
        self.requests_sent.fetch_add(requests as u64, Ordering::Relaxed);
        self.total_call_time_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.reasoning_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_drop(&self) {
        self.stale_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conversation(&self, turns: usize) {
        self.conversations.fetch_add(1, Ordering::Relaxed);
        self.conversation_turns.fetch_add(turns as u64, Ordering::Relaxed);
    }

    /// Updates queue depth and tracks peak.
    pub fn set_queue_depth(&self, depth: u64) {
        self.queue_depth.store(depth, Ordering::Relaxed);

        let mut current_peak = self.peak_queue_depth.load(Ordering::Relaxed);
        while depth > current_peak {
            match self.peak_queue_depth.compare_exchange_weak(
                current_peak,
                depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_peak = actual,
            }
        }
    }

    pub fn reasoning_calls(&self) -> u64 {
        self.standard_calls.load(Ordering::Relaxed) + self.premium_calls.load(Ordering::Relaxed)
    }

    pub fn calls_for(&self, tier: ReasoningTier) -> u64 {
        match tier {
            ReasoningTier::Standard => self.standard_calls.load(Ordering::Relaxed),
            ReasoningTier::Premium => self.premium_calls.load(Ordering::Relaxed),
        }
    }

    pub fn avg_call_time(&self) -> Duration {
        let calls = self.reasoning_calls();
        if calls == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_call_time_nanos.load(Ordering::Relaxed) / calls)
        }
    }

    /// Share of decisions answered without the reasoning service, 0-100.
    pub fn offload_rate(&self) -> f64 {
        let cheap = self.rule_hits.load(Ordering::Relaxed) + self.cache_hits.load(Ordering::Relaxed);
        let total = cheap + self.reasoning_enqueued.load(Ordering::Relaxed);
        if total == 0 {
            100.0
        } else {
            (cheap as f64 / total as f64) * 100.0
        }
    }

    /// Not atomic across fields; individual counters are.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rule_hits: self.rule_hits.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            reasoning_enqueued: self.reasoning_enqueued.load(Ordering::Relaxed),
            standard_calls: self.standard_calls.load(Ordering::Relaxed),
            premium_calls: self.premium_calls.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            reasoning_failures: self.reasoning_failures.load(Ordering::Relaxed),
            malformed_replies: self.malformed_replies.load(Ordering::Relaxed),
            stale_drops: self.stale_drops.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            conversations: self.conversations.load(Ordering::Relaxed),
            conversation_turns: self.conversation_turns.load(Ordering::Relaxed),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            peak_queue_depth: self.peak_queue_depth.load(Ordering::Relaxed),
            avg_call_time: self.avg_call_time(),
            offload_rate: self.offload_rate(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub rule_hits: u64,
    pub cache_hits: u64,
    pub reasoning_enqueued: u64,
    pub standard_calls: u64,
    pub premium_calls: u64,
    pub requests_sent: u64,
    pub reasoning_failures: u64,
    pub malformed_replies: u64,
    pub stale_drops: u64,
    pub fallbacks: u64,
    pub conversations: u64,
    pub conversation_turns: u64,
    pub queue_depth: u64,
    pub peak_queue_depth: u64,
    pub avg_call_time: Duration,
    pub offload_rate: f64,
}

impl MetricsSnapshot {
    pub fn reasoning_calls(&self) -> u64 {
        self.standard_calls + self.premium_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offload_rate_counts_rules_and_cache() {
        let metrics = DecisionMetrics::new();
        assert_eq!(metrics.offload_rate(), 100.0);
        metrics.record_rule_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_enqueued();
        assert_eq!(metrics.offload_rate(), 75.0);
    }

    #[test]
    fn calls_are_split_by_tier() {
        let metrics = DecisionMetrics::new();
        metrics.record_call(ReasoningTier::Standard, 3, Duration::from_millis(10));
        metrics.record_call(ReasoningTier::Premium, 1, Duration::from_millis(30));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.standard_calls, 1);
        assert_eq!(snapshot.premium_calls, 1);
        assert_eq!(snapshot.requests_sent, 4);
        assert_eq!(snapshot.avg_call_time, Duration::from_millis(20));
    }

    #[test]
    fn peak_queue_depth_is_monotonic() {
        let metrics = DecisionMetrics::new();
        metrics.set_queue_depth(4);
        metrics.set_queue_depth(1);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queue_depth, 1);
        assert_eq!(snapshot.peak_queue_depth, 4);
    }
}

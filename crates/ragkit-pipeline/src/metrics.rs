use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Pull-based pipeline counters.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    queries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    errors: AtomicU64,
    fallbacks: AtomicU64,
    rate_limited: AtomicU64,
    latency_count: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_max_ms: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
    pub fallbacks: u64,
    pub rate_limited: u64,
    pub latency_count: u64,
    pub latency_avg_ms: f64,
    pub latency_max_ms: u64,
}

impl PipelineMetrics {
    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache(&self, hit: bool) {
        let counter = if hit { &self.cache_hits } else { &self.cache_misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A failed external call that was answered with a fallback.
    pub fn record_fallback(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.latency_max_ms.fetch_max(ms, Ordering::Relaxed);
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let count = self.latency_count.load(Ordering::Relaxed);
        let sum = self.latency_sum_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            latency_count: count,
            latency_avg_ms: if count == 0 { 0.0 } else { sum as f64 / count as f64 },
            latency_max_ms: self.latency_max_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_average_and_max() {
        let m = PipelineMetrics::default();
        m.record_latency(Duration::from_millis(10));
        m.record_latency(Duration::from_millis(30));
        let s = m.snapshot();
        assert_eq!(s.latency_count, 2);
        assert!((s.latency_avg_ms - 20.0).abs() < f64::EPSILON);
        assert_eq!(s.latency_max_ms, 30);
    }

    #[test]
    fn fallback_counts_as_error() {
        let m = PipelineMetrics::default();
        m.record_fallback();
        let s = m.snapshot();
        assert_eq!((s.errors, s.fallbacks), (1, 1));
    }
}

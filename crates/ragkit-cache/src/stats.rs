use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss counters per tier.
///
/// Semantic hits and misses are also folded into the L2 bucket, which
/// covers every lookup that went past L1.
#[derive(Debug, Default)]
pub struct CacheStats {
    lookups: AtomicU64,
    hits: AtomicU64,
    l1_hits: AtomicU64,
    l1_misses: AtomicU64,
    l2_hits: AtomicU64,
    l2_misses: AtomicU64,
    semantic_hits: AtomicU64,
    semantic_misses: AtomicU64,
    l2_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub lookups: u64,
    pub hits: u64,
    pub l1_hits: u64,
    pub l1_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
    pub semantic_hits: u64,
    pub semantic_misses: u64,
    pub l2_errors: u64,
    pub hit_rate: f64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl CacheStats {
    pub(crate) fn lookup(&self, hit: bool) {
        bump(&self.lookups);
        if hit {
            bump(&self.hits);
        }
    }

    pub(crate) fn l1(&self, hit: bool) {
        bump(if hit { &self.l1_hits } else { &self.l1_misses });
    }

    pub(crate) fn l2(&self, hit: bool) {
        bump(if hit { &self.l2_hits } else { &self.l2_misses });
    }

    pub(crate) fn semantic(&self, hit: bool) {
        bump(if hit { &self.semantic_hits } else { &self.semantic_misses });
    }

    pub(crate) fn l2_error(&self) {
        bump(&self.l2_errors);
    }

    /// Share of lookups answered by any tier. 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let lookups = load(&self.lookups);
        let hits = load(&self.hits);
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 };
        CacheStatsSnapshot {
            lookups,
            hits,
            l1_hits: load(&self.l1_hits),
            l1_misses: load(&self.l1_misses),
            l2_hits: load(&self.l2_hits),
            l2_misses: load(&self.l2_misses),
            semantic_hits: load(&self.semantic_hits),
            semantic_misses: load(&self.semantic_misses),
            l2_errors: load(&self.l2_errors),
            hit_rate,
        }
    }
}

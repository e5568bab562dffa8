use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use ragkit_core::clock::Clock;
use ragkit_core::config::CacheConfig;
use ragkit_core::traits::{Embedder, SharedCacheStore};

use crate::health::HealthProbe;
use crate::key::CacheKey;
use crate::l1::LruTtlCache;
use crate::semantic::SemanticCache;
use crate::stats::{CacheStats, CacheStatsSnapshot};

struct SharedTier {
    store: Arc<dyn SharedCacheStore>,
    prefix: String,
    ttl: Duration,
    timeout: Duration,
}

impl SharedTier {
    fn key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.prefix, key.fingerprint)
    }
}

#[derive(Debug, Clone, Copy)]
struct Tunables {
    promote_ttl: Duration,
    semantic_threshold: f32,
}

pub struct LayeredCache {
    l1: LruTtlCache<String>,
    l2: Option<SharedTier>,
    semantic: Option<SemanticCache>,
    tunables: RwLock<Tunables>,
    stats: CacheStats,
    l2_healthy: Arc<AtomicBool>,
}

impl LayeredCache {
    /// L1-only cache. `promote_ttl` is used for entries copied up from
    /// slower tiers.
    pub fn new(l1_capacity: usize, promote_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            l1: LruTtlCache::new(l1_capacity, clock),
            l2: None,
            semantic: None,
            tunables: RwLock::new(Tunables { promote_ttl, semantic_threshold: 0.85 }),
            stats: CacheStats::default(),
            l2_healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_shared(
        mut self,
        store: Arc<dyn SharedCacheStore>,
        prefix: impl Into<String>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        self.l2 = Some(SharedTier { store, prefix: prefix.into(), ttl, timeout });
        self
    }

    pub fn with_semantic(mut self, semantic: SemanticCache, threshold: f32) -> Self {
        self.semantic = Some(semantic);
        self.tunables.get_mut().semantic_threshold = threshold;
        self
    }

    /// Build the tiers enabled in `cfg`. The shared store and embedder are
    /// only used when their tier is enabled.
    pub fn from_config(
        cfg: &CacheConfig,
        shared: Option<Arc<dyn SharedCacheStore>>,
        embedder: Option<Arc<dyn Embedder>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut cache = Self::new(cfg.l1_capacity, cfg.l1_ttl(), clock.clone());
        if cfg.l2_enabled {
            match shared {
                Some(store) => cache = cache.with_shared(store, cfg.key_prefix.clone(), cfg.l2_ttl(), cfg.l2_timeout()),
                None => warn!("shared cache tier enabled but no store configured; using L1 only"),
            }
        }
        if cfg.semantic_enabled {
            match embedder {
                Some(embedder) => {
                    let semantic = SemanticCache::new(embedder, cfg.semantic_capacity, clock);
                    cache = cache.with_semantic(semantic, cfg.semantic_threshold);
                }
                None => warn!("semantic cache tier enabled but no embedder configured"),
            }
        }
        cache
    }

    /// Apply runtime-adjustable settings: L1 capacity, promotion TTL and
    /// semantic threshold. Tier layout is fixed at construction.
    pub fn reconfigure(&self, cfg: &CacheConfig) {
        self.l1.set_capacity(cfg.l1_capacity);
        let mut t = self.tunables.write();
        t.promote_ttl = cfg.l1_ttl();
        t.semantic_threshold = cfg.semantic_threshold;
    }

    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let found = self.lookup(key).await;
        self.stats.lookup(found.is_some());
        found
    }

    async fn lookup(&self, key: &CacheKey) -> Option<String> {
        if let Some(value) = self.l1.get(&key.fingerprint) {
            self.stats.l1(true);
            return Some(value);
        }
        self.stats.l1(false);
        if self.l2.is_none() && self.semantic.is_none() {
            return None;
        }

        let tunables = *self.tunables.read();
        let mut found = match &self.l2 {
            Some(tier) => self.shared_get(tier, key).await,
            None => None,
        };
        if found.is_none() {
            if let Some(semantic) = &self.semantic {
                found = semantic.lookup_similar(&key.context, &key.query, tunables.semantic_threshold);
                self.stats.semantic(found.is_some());
            }
        }
        self.stats.l2(found.is_some());

        if let Some(value) = &found {
            debug!(key = %key.fingerprint, "promoting into L1");
            self.l1.put(&key.fingerprint, value.clone(), tunables.promote_ttl);
        }
        found
    }

    async fn shared_get(&self, tier: &SharedTier, key: &CacheKey) -> Option<String> {
        match tokio::time::timeout(tier.timeout, tier.store.get(&tier.key(key))).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                self.stats.l2_error();
                warn!(error = %e, "shared cache read failed, continuing with L1 only");
                None
            }
            Err(_) => {
                self.stats.l2_error();
                warn!(timeout_ms = tier.timeout.as_millis(), "shared cache read timed out");
                None
            }
        }
    }

    /// Write to every tier. `ttl` applies to L1 and the semantic tier; the
    /// shared tier uses its own TTL. Shared-tier failures are logged only.
    pub async fn put(&self, key: &CacheKey, value: &str, ttl: Duration) {
        self.l1.put(&key.fingerprint, value.to_string(), ttl);
        if let Some(tier) = &self.l2 {
            match tokio::time::timeout(tier.timeout, tier.store.set(&tier.key(key), value, tier.ttl)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.stats.l2_error();
                    warn!(error = %e, "shared cache write failed");
                }
                Err(_) => {
                    self.stats.l2_error();
                    warn!(timeout_ms = tier.timeout.as_millis(), "shared cache write timed out");
                }
            }
        }
        if let Some(semantic) = &self.semantic {
            semantic.insert(&key.context, &key.query, value, ttl);
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn hit_rate(&self) -> f64 {
        self.stats.hit_rate()
    }

    pub fn l1(&self) -> &LruTtlCache<String> {
        &self.l1
    }

    pub fn has_shared_tier(&self) -> bool {
        self.l2.is_some()
    }

    pub fn has_semantic_tier(&self) -> bool {
        self.semantic.is_some()
    }

    /// Last shared-tier health observed by the probe; `None` without L2.
    pub fn shared_healthy(&self) -> Option<bool> {
        self.l2.as_ref().map(|_| self.l2_healthy.load(Ordering::Relaxed))
    }

    /// Start pinging the shared tier. `None` without L2 or with a zero
    /// interval. Must be called from within a tokio runtime.
    pub fn start_health_probe(&self, interval: Duration) -> Option<HealthProbe> {
        let tier = self.l2.as_ref()?;
        if interval.is_zero() {
            return None;
        }
        Some(HealthProbe::spawn(tier.store.clone(), interval, self.l2_healthy.clone()))
    }
}

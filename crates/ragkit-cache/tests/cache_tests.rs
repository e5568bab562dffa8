use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use ragkit_cache::{CacheKey, InMemorySharedStore, KeyParams, LayeredCache, LruTtlCache, SemanticCache};
use ragkit_core::clock::{Clock, ManualClock, SystemClock};
use ragkit_core::config::CacheConfig;
use ragkit_core::traits::SharedCacheStore;
use ragkit_embed::HashEmbedder;

const TTL: Duration = Duration::from_secs(300);

fn params(backend: &str) -> KeyParams {
    KeyParams {
        top_k: 5,
        candidate_count: 10,
        weights_fingerprint: "default".to_string(),
        optimal_length: 500,
        backend: backend.to_string(),
        generation_fingerprint: "temperature=0.300000,max_tokens=250".to_string(),
    }
}

fn key(q: &str) -> CacheKey {
    CacheKey::derive(q, &params("extractive"))
}

#[test]
fn lru_capacity_two_evicts_oldest() {
    let cache = LruTtlCache::new(2, Arc::new(SystemClock));
    cache.put("A", 1, TTL);
    cache.put("B", 2, TTL);
    cache.put("C", 3, TTL);
    assert_eq!(cache.get("A"), None);
    assert_eq!(cache.get("B"), Some(2));
    assert_eq!(cache.get("C"), Some(3));
    assert_eq!(cache.len(), 2);
}

#[test]
fn get_promotes_to_most_recent() {
    let cache = LruTtlCache::new(2, Arc::new(SystemClock));
    cache.put("A", 1, TTL);
    cache.put("B", 2, TTL);
    assert_eq!(cache.get("A"), Some(1));
    cache.put("C", 3, TTL);
    assert_eq!(cache.get("B"), None, "B became least recently used");
    assert_eq!(cache.get("A"), Some(1));
}

#[test]
fn replacing_a_key_does_not_evict() {
    let cache = LruTtlCache::new(2, Arc::new(SystemClock));
    cache.put("A", 1, TTL);
    cache.put("B", 2, TTL);
    cache.put("A", 10, TTL);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("A"), Some(10));
    assert_eq!(cache.get("B"), Some(2));
}

#[test]
fn zero_ttl_is_absent_immediately() {
    let cache = LruTtlCache::new(4, Arc::new(SystemClock));
    cache.put("A", 1, Duration::ZERO);
    assert_eq!(cache.get("A"), None);
    assert!(cache.is_empty(), "expired entry is removed on read");
}

#[test]
fn entries_expire_after_ttl() {
    let clock = ManualClock::shared();
    let cache = LruTtlCache::new(4, clock.clone());
    cache.put("A", 1, Duration::from_secs(300));
    clock.advance(Duration::from_secs(299));
    assert_eq!(cache.get("A"), Some(1));
    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.get("A"), None);
}

#[test]
fn shrinking_capacity_evicts_lru() {
    let cache = LruTtlCache::new(3, Arc::new(SystemClock));
    cache.put("A", 1, TTL);
    cache.put("B", 2, TTL);
    cache.put("C", 3, TTL);
    cache.set_capacity(1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("C"), Some(3));
}

#[tokio::test]
async fn layered_l1_only_counts_hits_and_misses() {
    let cache = LayeredCache::new(2, TTL, Arc::new(SystemClock));
    assert_eq!(cache.get(&key("a")).await, None);
    cache.put(&key("a"), "answer", TTL).await;
    assert_eq!(cache.get(&key("a")).await.as_deref(), Some("answer"));

    let stats = cache.stats();
    assert_eq!((stats.l1_hits, stats.l1_misses), (1, 1));
    assert_eq!((stats.l2_hits, stats.l2_misses), (0, 0), "no secondary tier, no L2 accounting");
    assert!((cache.hit_rate() - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn l2_hit_is_promoted_into_l1() {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemorySharedStore::new(clock.clone()));
    let writer = LayeredCache::new(8, TTL, clock.clone()).with_shared(store.clone(), "rag:", Duration::from_secs(3600), Duration::from_millis(250));
    let reader = LayeredCache::new(8, TTL, clock).with_shared(store.clone(), "rag:", Duration::from_secs(3600), Duration::from_millis(250));

    writer.put(&key("vacation days"), "22", TTL).await;
    assert_eq!(store.get(&format!("rag:{}", key("vacation days").fingerprint)).await.expect("store").as_deref(), Some("22"));

    assert_eq!(reader.get(&key("vacation days")).await.as_deref(), Some("22"));
    assert_eq!(reader.l1().len(), 1, "promoted");
    assert_eq!(reader.get(&key("vacation days")).await.as_deref(), Some("22"));

    let stats = reader.stats();
    assert_eq!(stats.l2_hits, 1);
    assert_eq!(stats.l1_hits, 1);
    assert_eq!(stats.l1_misses, 1);
}

#[tokio::test]
async fn l2_outage_degrades_to_l1() {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemorySharedStore::new(clock.clone()));
    store.set_available(false);
    let cache = LayeredCache::new(8, TTL, clock).with_shared(store, "rag:", Duration::from_secs(3600), Duration::from_millis(250));

    assert_eq!(cache.get(&key("q")).await, None);
    cache.put(&key("q"), "v", TTL).await;
    assert_eq!(cache.get(&key("q")).await.as_deref(), Some("v"));

    let stats = cache.stats();
    assert_eq!(stats.l2_errors, 2, "one failed read, one failed write");
    assert_eq!(stats.l2_misses, 1);
}

struct StalledStore;

#[async_trait]
impl SharedCacheStore for StalledStore {
    async fn get(&self, _key: &str) -> ragkit_core::Result<Option<String>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Some("late".to_string()))
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> ragkit_core::Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
    async fn ping(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn slow_l2_is_bounded_by_timeout() {
    let cache = LayeredCache::new(8, TTL, Arc::new(SystemClock)).with_shared(Arc::new(StalledStore), "rag:", Duration::from_secs(3600), Duration::from_millis(20));
    let started = std::time::Instant::now();
    assert_eq!(cache.get(&key("q")).await, None);
    cache.put(&key("q"), "v", TTL).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(cache.get(&key("q")).await.as_deref(), Some("v"));
}

#[tokio::test]
async fn semantic_hit_counts_in_l2_bucket() {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let semantic = SemanticCache::new(Arc::new(HashEmbedder::default()), 16, clock.clone());
    let cache = LayeredCache::new(8, TTL, clock).with_semantic(semantic, 0.85);

    cache.put(&key("How many vacation days do I get"), "22 days", TTL).await;
    let similar = key("how many vacation days do I get?");
    assert_ne!(similar.fingerprint, key("How many vacation days do I get").fingerprint);
    assert_eq!(cache.get(&similar).await.as_deref(), Some("22 days"));

    let other_config = CacheKey::derive("how many vacation days do I get?", &params("other-backend"));
    assert_eq!(cache.get(&other_config).await, None, "no cross-configuration hits");

    let stats = cache.stats();
    assert_eq!(stats.semantic_hits, 1);
    assert_eq!(stats.semantic_misses, 1);
    assert_eq!(stats.l2_hits, 1);
    assert_eq!(stats.l2_misses, 1);
}

#[test]
fn semantic_cache_respects_capacity() {
    let semantic = SemanticCache::new(Arc::new(HashEmbedder::default()), 2, Arc::new(SystemClock));
    semantic.insert("ctx", "one", "1", TTL);
    semantic.insert("ctx", "two", "2", TTL);
    semantic.insert("ctx", "three", "3", TTL);
    assert_eq!(semantic.len(), 2);
    assert_eq!(semantic.lookup_similar("ctx", "one", 0.99), None);
    assert_eq!(semantic.lookup_similar("ctx", "three", 0.99).as_deref(), Some("3"));
}

#[tokio::test]
async fn from_config_builds_enabled_tiers() {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn SharedCacheStore> = Arc::new(InMemorySharedStore::new(clock.clone()));
    let cfg = CacheConfig { l2_enabled: true, semantic_enabled: true, ..CacheConfig::default() };
    let cache = LayeredCache::from_config(&cfg, Some(store), Some(Arc::new(HashEmbedder::default())), clock.clone());
    assert!(cache.has_shared_tier());
    assert!(cache.has_semantic_tier());
    assert_eq!(cache.l1().capacity(), 100);

    let plain = LayeredCache::from_config(&CacheConfig::default(), None, None, clock);
    assert!(!plain.has_shared_tier());
    assert_eq!(plain.shared_healthy(), None);
}

#[tokio::test]
async fn health_probe_tracks_store_availability() {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemorySharedStore::new(clock.clone()));
    let cache = LayeredCache::new(8, TTL, clock).with_shared(store.clone(), "rag:", Duration::from_secs(60), Duration::from_millis(50));
    let _probe = cache.start_health_probe(Duration::from_millis(10)).expect("probe");
    assert_eq!(cache.shared_healthy(), Some(true));

    store.set_available(false);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(cache.shared_healthy(), Some(false));

    store.set_available(true);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(cache.shared_healthy(), Some(true));
}

#[tokio::test]
async fn health_probe_purges_expired_shared_entries() {
    let clock = ManualClock::shared();
    let store = Arc::new(InMemorySharedStore::new(clock.clone()));
    store.set("rag:short", "a", Duration::from_secs(10)).await.expect("set");
    store.set("rag:long", "b", Duration::from_secs(3600)).await.expect("set");
    clock.advance(Duration::from_secs(11));
    assert_eq!(store.len(), 2, "expired rows stay until purged");

    let cache = LayeredCache::new(8, TTL, clock).with_shared(store.clone(), "rag:", Duration::from_secs(60), Duration::from_millis(50));
    let _probe = cache.start_health_probe(Duration::from_millis(10)).expect("probe");
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("rag:long").await.expect("get").as_deref(), Some("b"));
}

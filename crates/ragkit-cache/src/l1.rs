use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ragkit_core::clock::Clock;

struct Slot<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    tick: u64,
}

struct Inner<V> {
    map: HashMap<String, Slot<V>>,
    /// Recency order: smallest tick is least recently used.
    order: BTreeMap<u64, String>,
    next_tick: u64,
    capacity: usize,
}

impl<V> Inner<V> {
    fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;
        if let Some(slot) = self.map.get_mut(key) {
            self.order.remove(&slot.tick);
            slot.tick = tick;
            self.order.insert(tick, key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> Option<Slot<V>> {
        let slot = self.map.remove(key)?;
        self.order.remove(&slot.tick);
        Some(slot)
    }

    fn evict_over_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.map.len() > self.capacity {
            let Some((_, key)) = self.order.pop_first() else { break };
            self.map.remove(&key);
            evicted += 1;
        }
        evicted
    }
}

/// Bounded LRU map with a TTL per entry.
///
/// Expired entries are dropped lazily when read. Every operation holds one
/// lock, so recency updates from concurrent readers are never lost.
pub struct LruTtlCache<V> {
    inner: Mutex<Inner<V>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> LruTtlCache<V> {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: BTreeMap::new(),
                next_tick: 0,
                capacity: capacity.max(1),
            }),
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let expired = {
            let slot = inner.map.get(key)?;
            now.saturating_duration_since(slot.inserted_at) >= slot.ttl
        };
        if expired {
            inner.remove(key);
            return None;
        }
        inner.touch(key);
        inner.map.get(key).map(|slot| slot.value.clone())
    }

    /// Insert or replace. Evicts the least recently used entry only when the
    /// insert pushes the cache over capacity.
    pub fn put(&self, key: &str, value: V, ttl: Duration) {
        let inserted_at = self.clock.now();
        let mut inner = self.inner.lock();
        inner.remove(key);
        let tick = inner.next_tick;
        inner.next_tick += 1;
        inner.map.insert(key.to_string(), Slot { value, inserted_at, ttl, tick });
        inner.order.insert(tick, key.to_string());
        let evicted = inner.evict_over_capacity();
        if evicted > 0 {
            tracing::trace!(evicted, "l1 evicted least recently used");
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Change capacity, evicting least recently used entries if it shrinks.
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.lock();
        inner.capacity = capacity.max(1);
        inner.evict_over_capacity();
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.order.clear();
    }
}

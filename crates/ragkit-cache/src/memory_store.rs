use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ragkit_core::clock::Clock;
use ragkit_core::traits::SharedCacheStore;
use ragkit_core::{Error, Result};

/// In-process `SharedCacheStore`, useful when no external store is deployed
/// and for exercising the shared tier in tests.
///
/// `set_available(false)` makes every call fail as if the store were down.
pub struct InMemorySharedStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    available: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl InMemorySharedStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), available: AtomicBool::new(true), clock }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<()> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(Error::Storage("shared store unavailable".to_string()))
        }
    }
}

#[async_trait]
impl SharedCacheStore for InMemorySharedStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires_at)) if now < *expires_at => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check()?;
        let expires_at = self.clock.now() + ttl;
        self.entries.lock().insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn ping(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.check()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        Ok(before - entries.len())
    }
}

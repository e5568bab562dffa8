//! Request-result cache with three tiers.
//!
//! - L1: in-process LRU with per-entry TTL
//! - L2: optional shared store, read-through promoted into L1
//! - L3: optional semantic lookup over embedded queries
//!
//! Shared-tier failures never reach the caller; the cache degrades to
//! L1-only and logs a warning.

pub mod health;
pub mod key;
pub mod l1;
pub mod layered;
pub mod memory_store;
pub mod semantic;
pub mod stats;

pub use health::HealthProbe;
pub use key::{CacheKey, KeyParams};
pub use l1::LruTtlCache;
pub use layered::LayeredCache;
pub use memory_store::InMemorySharedStore;
pub use semantic::SemanticCache;
pub use stats::{CacheStats, CacheStatsSnapshot};

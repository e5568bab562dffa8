use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use ragkit_core::clock::Clock;
use ragkit_core::config::{RateLimitConfig, TierLimit};
use ragkit_core::{Error, Result};

/// A tier name checked against the configured tiers.
///
/// The limit captured at resolution is only used if the tier disappears
/// from a later configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    name: Arc<str>,
    limit: TierLimit,
}

impl Tier {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limit(&self) -> TierLimit {
        self.limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Requests left in the current window after this one.
    pub remaining: u32,
}

/// Sliding-log limiter keyed by `(identity, tier)`.
///
/// Logs that fall idle are swept from `check` once per longest tier window,
/// so memory tracks recently active identities only.
pub struct RateLimiter {
    enabled: AtomicBool,
    tiers: RwLock<BTreeMap<String, TierLimit>>,
    logs: Mutex<HashMap<(String, Arc<str>), VecDeque<Instant>>>,
    next_sweep: Mutex<Instant>,
    clock: Arc<dyn Clock>,
}

fn longest_window(tiers: &BTreeMap<String, TierLimit>) -> Duration {
    tiers.values().map(TierLimit::window).max().unwrap_or(Duration::from_secs(60))
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            enabled: AtomicBool::new(cfg.enabled),
            tiers: RwLock::new(cfg.tiers.clone()),
            logs: Mutex::new(HashMap::new()),
            next_sweep: Mutex::new(clock.now() + longest_window(&cfg.tiers)),
            clock,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn tier(&self, name: &str) -> Result<Tier> {
        let tiers = self.tiers.read();
        let limit = tiers.get(name).copied().ok_or_else(|| {
            let known: Vec<&str> = tiers.keys().map(String::as_str).collect();
            Error::config(format!("unknown rate limit tier '{name}' (known: {})", known.join(", ")))
        })?;
        Ok(Tier { name: Arc::from(name), limit })
    }

    /// Replace tier limits. Existing logs are kept and judged against the
    /// new limits.
    pub fn set_tiers(&self, cfg: &RateLimitConfig) -> Result<()> {
        cfg.validate()?;
        *self.tiers.write() = cfg.tiers.clone();
        self.enabled.store(cfg.enabled, Ordering::Relaxed);
        Ok(())
    }

    fn current_limit(&self, tier: &Tier) -> TierLimit {
        self.tiers.read().get(tier.name()).copied().unwrap_or(tier.limit)
    }

    /// Admit and record one request, or fail with `Error::RateLimited`
    /// without recording it.
    pub fn check(&self, identity: &str, tier: &Tier) -> Result<Admission> {
        let limit = self.current_limit(tier);
        if !self.is_enabled() {
            return Ok(Admission { remaining: limit.max_requests });
        }
        let window = limit.window();
        let now = self.clock.now();
        if self.sweep_due(now) {
            let purged = self.purge_idle();
            if purged > 0 {
                debug!(purged, "swept idle rate limit logs");
            }
        }
        let mut logs = self.logs.lock();
        let log = logs.entry((identity.to_string(), tier.name.clone())).or_default();
        prune(log, now, window);

        let used = u32::try_from(log.len()).unwrap_or(u32::MAX);
        if used < limit.max_requests {
            log.push_back(now);
            return Ok(Admission { remaining: limit.max_requests - used - 1 });
        }

        let retry_after = log
            .front()
            .map_or(window, |oldest| window.saturating_sub(now.saturating_duration_since(*oldest)));
        debug!(identity, tier = tier.name(), ?retry_after, "rate limited");
        Err(Error::RateLimited {
            identity: identity.to_string(),
            tier: tier.name().to_string(),
            retry_after,
        })
    }

    /// Requests still admissible for `identity` right now.
    pub fn remaining(&self, identity: &str, tier: &Tier) -> u32 {
        let limit = self.current_limit(tier);
        let now = self.clock.now();
        let mut logs = self.logs.lock();
        let Some(log) = logs.get_mut(&(identity.to_string(), tier.name.clone())) else {
            return limit.max_requests;
        };
        prune(log, now, limit.window());
        limit.max_requests.saturating_sub(u32::try_from(log.len()).unwrap_or(u32::MAX))
    }

    /// Number of `(identity, tier)` logs held in memory.
    pub fn tracked(&self) -> usize {
        self.logs.lock().len()
    }

    fn sweep_due(&self, now: Instant) -> bool {
        let mut next = self.next_sweep.lock();
        if now < *next {
            return false;
        }
        *next = now + longest_window(&self.tiers.read());
        true
    }

    /// Drop logs that hold no timestamps inside their window.
    pub fn purge_idle(&self) -> usize {
        let now = self.clock.now();
        let tiers = self.tiers.read();
        let mut logs = self.logs.lock();
        let before = logs.len();
        logs.retain(|(_, tier), log| {
            let window = tiers.get(&**tier).map_or(Duration::ZERO, TierLimit::window);
            prune(log, now, window);
            !log.is_empty()
        });
        before - logs.len()
    }
}

fn prune(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while log.front().is_some_and(|t| now.saturating_duration_since(*t) >= window) {
        log.pop_front();
    }
}

//! Circuit breaker around one external collaborator.
//!
//! - Closed: calls pass; consecutive failures are counted
//! - Open: calls fail fast with `Error::CircuitOpen` until the recovery
//!   timeout has elapsed since the last failure
//! - HalfOpen: a single probe call is admitted; its outcome closes or reopens
//!
//! Every admitted call runs under a timeout and a timeout counts as a failure.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use ragkit_core::clock::Clock;
use ragkit_core::config::BreakerConfig;
use ragkit_core::{Error, FailureKind, Result, Service};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    failure_threshold: u32,
    recovery_timeout: Duration,
    call_timeout: Duration,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    probe_in_flight: bool,
    total_calls: u64,
    total_failures: u64,
    rejected: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub rejected: u64,
}

pub struct CircuitBreaker {
    name: String,
    service: Service,
    settings: RwLock<Settings>,
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

/// Admission ticket for one call. Dropping an unfinished probe frees the
/// half-open slot so a cancelled caller cannot wedge the breaker.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, ok: bool) {
        self.settled = true;
        if ok {
            self.breaker.on_success(self.probe);
        } else {
            self.breaker.on_failure();
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            self.breaker.inner.lock().probe_in_flight = false;
        }
    }
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        service: Service,
        cfg: &BreakerConfig,
        call_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            service,
            settings: RwLock::new(Settings {
                failure_threshold: cfg.failure_threshold,
                recovery_timeout: cfg.recovery_timeout(),
                call_timeout,
            }),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                probe_in_flight: false,
                total_calls: 0,
                total_failures: 0,
                rejected: 0,
            }),
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, moving Open to HalfOpen once the recovery timeout has
    /// elapsed.
    pub fn state(&self) -> CircuitState {
        let recovery = self.settings.read().recovery_timeout;
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, now, recovery);
        inner.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state();
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state,
            consecutive_failures: inner.consecutive_failures,
            total_calls: inner.total_calls,
            total_failures: inner.total_failures,
            rejected: inner.rejected,
        }
    }

    /// Apply new thresholds. State and counters are kept.
    pub fn reconfigure(&self, cfg: &BreakerConfig, call_timeout: Duration) {
        *self.settings.write() = Settings {
            failure_threshold: cfg.failure_threshold,
            recovery_timeout: cfg.recovery_timeout(),
            call_timeout,
        };
    }

    /// Run `op` through the breaker.
    pub async fn call<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = self.acquire()?;
        let timeout = self.settings.read().call_timeout;
        let outcome = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(Error::failure(
                self.service,
                FailureKind::Timeout,
                format!("{} call exceeded {} ms", self.name, timeout.as_millis()),
            )),
        };
        permit.settle(outcome.is_ok());
        outcome
    }

    fn refresh(&self, inner: &mut Inner, now: Instant, recovery: Duration) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner.last_failure_at.map_or(recovery, |at| now.saturating_duration_since(at));
        if elapsed >= recovery {
            inner.state = CircuitState::HalfOpen;
            inner.probe_in_flight = false;
            info!(breaker = %self.name, "circuit half-open");
        }
    }

    fn acquire(&self) -> Result<Permit<'_>> {
        let recovery = self.settings.read().recovery_timeout;
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, now, recovery);
        let probe = match inner.state {
            CircuitState::Closed => false,
            CircuitState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                debug!(breaker = %self.name, "admitting probe call");
                true
            }
            CircuitState::Open | CircuitState::HalfOpen => {
                inner.rejected += 1;
                return Err(Error::CircuitOpen { name: self.name.clone() });
            }
        };
        inner.total_calls += 1;
        Ok(Permit { breaker: self, probe, settled: false })
    }

    fn on_success(&self, probe: bool) {
        let mut inner = self.inner.lock();
        // Only the probe may close a tripped circuit; a late success from a
        // call admitted while closed is ignored.
        if inner.state != CircuitState::Closed && !probe {
            return;
        }
        if inner.state != CircuitState::Closed {
            info!(breaker = %self.name, from = %inner.state, "circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
    }

    fn on_failure(&self) {
        let threshold = self.settings.read().failure_threshold;
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.last_failure_at = Some(now);
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.consecutive_failures = 1;
                inner.probe_in_flight = false;
                warn!(breaker = %self.name, "probe failed, circuit reopened");
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= threshold {
                    inner.state = CircuitState::Open;
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "circuit opened"
                    );
                }
            }
            // Calls admitted before the circuit opened can still finish.
            CircuitState::Open => inner.consecutive_failures += 1,
        }
    }
}

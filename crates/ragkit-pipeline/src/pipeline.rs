use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use ragkit_cache::{CacheKey, CacheStatsSnapshot, HealthProbe, KeyParams, LayeredCache};
use ragkit_core::clock::{self, Clock};
use ragkit_core::config::{RagConfig, DEFAULT_TIER};
use ragkit_core::traits::{Embedder, GenerationBackend, Retriever, SharedCacheStore};
use ragkit_core::types::RankedResult;
use ragkit_core::{Error, Result, Service};
use ragkit_rerank::sanitize_candidates;

use crate::backend::{backend_from_config, build_prompt, NOT_FOUND_ANSWER};
use crate::breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
use crate::context::RagContext;
use crate::metrics::MetricsSnapshot;
use crate::rate_limit::{RateLimiter, Tier};
use crate::request::{FallbackReason, QueryRequest, QueryResponse, Source, Timings};

pub const FALLBACK_ANSWER: &str =
    "Sorry, there was a problem processing your question. Please try again in a few moments.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub retrieval: BreakerSnapshot,
    pub generation: BreakerSnapshot,
    /// `None` when no shared cache tier is configured.
    pub shared_cache_healthy: Option<bool>,
    pub cache: CacheStatsSnapshot,
    pub metrics: MetricsSnapshot,
}

pub struct RagPipelineBuilder {
    config: RagConfig,
    retriever: Option<Arc<dyn Retriever>>,
    backend: Option<Arc<dyn GenerationBackend>>,
    shared_store: Option<Arc<dyn SharedCacheStore>>,
    embedder: Option<Arc<dyn Embedder>>,
    clock: Arc<dyn Clock>,
}

impl RagPipelineBuilder {
    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Overrides the backend named in `generation.backend`.
    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn shared_store(mut self, store: Arc<dyn SharedCacheStore>) -> Self {
        self.shared_store = Some(store);
        self
    }

    /// Embedder for the semantic cache tier.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<RagPipeline> {
        let ctx = Arc::new(RagContext::new(self.config, self.clock.clone())?);
        let cfg = ctx.config();
        let retriever = self.retriever.ok_or_else(|| Error::config("pipeline needs a retriever"))?;
        let backend = match self.backend {
            Some(b) => b,
            None => backend_from_config(&cfg.generation)?,
        };
        let limiter = RateLimiter::new(&cfg.rate_limit, self.clock.clone())?;
        let default_tier = limiter.tier(DEFAULT_TIER)?;
        let cache = LayeredCache::from_config(&cfg.cache, self.shared_store, self.embedder, self.clock.clone());
        let retrieval_breaker = CircuitBreaker::new(
            "retrieval",
            Service::Retrieval,
            &cfg.breaker,
            cfg.retrieval.timeout(),
            self.clock.clone(),
        );
        let generation_breaker = CircuitBreaker::new(
            "generation",
            Service::Generation,
            &cfg.breaker,
            cfg.generation.timeout(),
            self.clock.clone(),
        );
        info!(
            backend = backend.name(),
            top_k = cfg.retrieval.top_k,
            l2 = cache.has_shared_tier(),
            semantic = cache.has_semantic_tier(),
            "pipeline ready"
        );
        Ok(RagPipeline {
            ctx,
            retriever,
            backend,
            cache,
            retrieval_breaker,
            generation_breaker,
            limiter,
            default_tier,
            probe: Mutex::new(None),
        })
    }
}

/// Query pipeline: cache, rate limit, guarded retrieval, re-ranking,
/// guarded generation and cache store.
pub struct RagPipeline {
    ctx: Arc<RagContext>,
    retriever: Arc<dyn Retriever>,
    backend: Arc<dyn GenerationBackend>,
    cache: LayeredCache,
    retrieval_breaker: CircuitBreaker,
    generation_breaker: CircuitBreaker,
    limiter: RateLimiter,
    default_tier: Tier,
    probe: Mutex<Option<HealthProbe>>,
}

fn key_params(cfg: &RagConfig, backend: &str) -> KeyParams {
    KeyParams {
        top_k: cfg.retrieval.top_k,
        candidate_count: cfg.retrieval.candidate_count(),
        weights_fingerprint: cfg.rerank.effective_weights().fingerprint(),
        optimal_length: cfg.rerank.optimal_length,
        backend: backend.to_string(),
        generation_fingerprint: cfg.generation.fingerprint(),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl RagPipeline {
    pub fn builder(config: RagConfig) -> RagPipelineBuilder {
        RagPipelineBuilder {
            config,
            retriever: None,
            backend: None,
            shared_store: None,
            embedder: None,
            clock: clock::system(),
        }
    }

    pub fn context(&self) -> &Arc<RagContext> {
        &self.ctx
    }

    pub fn cache(&self) -> &LayeredCache {
        &self.cache
    }

    pub fn retrieval_breaker(&self) -> &CircuitBreaker {
        &self.retrieval_breaker
    }

    pub fn generation_breaker(&self) -> &CircuitBreaker {
        &self.generation_breaker
    }

    /// Resolve a tier name. Unknown names are configuration errors.
    pub fn tier(&self, name: &str) -> Result<Tier> {
        self.limiter.tier(name)
    }

    pub fn rate_limit_remaining(&self, identity: &str, tier: Option<&Tier>) -> u32 {
        self.limiter.remaining(identity, tier.unwrap_or(&self.default_tier))
    }

    fn since(&self, start: Instant) -> Duration {
        self.ctx.clock().now().saturating_duration_since(start)
    }

    /// Answer one question.
    ///
    /// Rate limiting is the only failure returned as `Err`; retrieval and
    /// generation failures yield a response with `fallback` set.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let started = self.ctx.clock().now();
        let active = self.ctx.active();
        let cfg = &active.config;
        let metrics = self.ctx.metrics();
        metrics.record_query();

        let key = CacheKey::derive(&request.question, &key_params(cfg, self.backend.name()));
        let caching = request.use_cache && cfg.cache.enabled;
        if caching {
            if let Some(mut hit) = self.cached(&key).await {
                metrics.record_cache(true);
                let latency = self.since(started);
                metrics.record_latency(latency);
                hit.question = request.question;
                hit.cache_hit = true;
                hit.latency_ms = millis(latency);
                hit.rate_limit_remaining = None;
                return Ok(hit);
            }
            metrics.record_cache(false);
        }

        let tier = request.tier.as_ref().unwrap_or(&self.default_tier);
        let admission = match self.limiter.check(&request.identity, tier) {
            Ok(a) => a,
            Err(err) => {
                metrics.record_rate_limited();
                return Err(err);
            }
        };
        let remaining = Some(admission.remaining);
        let mut timings = Timings::default();

        let t = self.ctx.clock().now();
        let k = cfg.retrieval.candidate_count();
        let retrieved = self
            .retrieval_breaker
            .call(|| self.retriever.similarity_search(&request.question, k))
            .await;
        timings.retrieval_ms = millis(self.since(t));
        let candidates = match retrieved {
            Ok(c) => c,
            Err(err) => {
                let reason = FallbackReason::from_error(Service::Retrieval, &err);
                return Ok(self.fallback(request.question, reason, Vec::new(), remaining, timings, started));
            }
        };

        let t = self.ctx.clock().now();
        let mut ranked: Vec<RankedResult> = active.reranker.rerank(&request.question, sanitize_candidates(candidates));
        ranked.truncate(cfg.retrieval.top_k);
        timings.rerank_ms = millis(self.since(t));
        let sources: Vec<Source> = ranked.iter().map(Source::from).collect();

        let answer = if ranked.is_empty() {
            debug!(question = %request.question, "no candidates retrieved");
            NOT_FOUND_ANSWER.to_string()
        } else {
            let prompt = build_prompt(&request.question, &ranked);
            let t = self.ctx.clock().now();
            let generated = self
                .generation_breaker
                .call(|| self.backend.complete(&prompt, cfg.generation.temperature, cfg.generation.max_tokens))
                .await;
            timings.generation_ms = millis(self.since(t));
            match generated {
                Ok(answer) => answer,
                Err(err) => {
                    let reason = FallbackReason::from_error(Service::Generation, &err);
                    return Ok(self.fallback(request.question, reason, sources, remaining, timings, started));
                }
            }
        };

        let latency = self.since(started);
        metrics.record_latency(latency);
        let response = QueryResponse {
            question: request.question,
            answer,
            sources,
            fallback: None,
            cache_hit: false,
            latency_ms: millis(latency),
            rate_limit_remaining: remaining,
            timings,
        };
        if caching {
            self.store(&key, &response, cfg.cache.l1_ttl()).await;
        }
        Ok(response)
    }

    /// Answer several questions concurrently. Results keep request order.
    pub async fn batch_query(&self, requests: Vec<QueryRequest>) -> Vec<Result<QueryResponse>> {
        join_all(requests.into_iter().map(|r| self.query(r))).await
    }

    async fn cached(&self, key: &CacheKey) -> Option<QueryResponse> {
        let raw = self.cache.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(error = %e, "discarding unreadable cached response");
                None
            }
        }
    }

    async fn store(&self, key: &CacheKey, response: &QueryResponse, ttl: Duration) {
        match serde_json::to_string(response) {
            Ok(json) => self.cache.put(key, &json, ttl).await,
            Err(e) => warn!(error = %e, "response not cached"),
        }
    }

    fn fallback(
        &self,
        question: String,
        reason: FallbackReason,
        sources: Vec<Source>,
        rate_limit_remaining: Option<u32>,
        timings: Timings,
        started: Instant,
    ) -> QueryResponse {
        warn!(question = %question, ?reason, "answering with fallback");
        let metrics = self.ctx.metrics();
        metrics.record_fallback();
        let latency = self.since(started);
        metrics.record_latency(latency);
        QueryResponse {
            question,
            answer: FALLBACK_ANSWER.to_string(),
            sources,
            fallback: Some(reason),
            cache_hit: false,
            latency_ms: millis(latency),
            rate_limit_remaining,
            timings,
        }
    }

    /// Swap in a new configuration. Applies to requests started afterwards.
    /// The generation backend and the cache tier layout are fixed at build
    /// time.
    pub fn reconfigure(&self, config: RagConfig) -> Result<()> {
        let next = RagContext::prepare(config)?;
        let current = self.ctx.config();
        let config = &next.config;
        if config.generation.backend != current.generation.backend {
            return Err(Error::config(format!(
                "generation.backend cannot change at runtime ('{}' -> '{}')",
                current.generation.backend, config.generation.backend
            )));
        }
        self.limiter.set_tiers(&config.rate_limit)?;
        self.retrieval_breaker.reconfigure(&config.breaker, config.retrieval.timeout());
        self.generation_breaker.reconfigure(&config.breaker, config.generation.timeout());
        self.cache.reconfigure(&config.cache);
        // config and reranker land in one swap so a request never mixes them
        self.ctx.install(next);
        info!("pipeline reconfigured");
        Ok(())
    }

    /// Start the shared cache health probe if one is configured and not yet
    /// running. Must be called from within a tokio runtime.
    pub fn start_health_probe(&self) -> bool {
        let mut probe = self.probe.lock();
        if probe.is_none() {
            let interval = Duration::from_secs(self.ctx.config().cache.health_interval_secs);
            *probe = self.cache.start_health_probe(interval);
        }
        probe.is_some()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics().snapshot()
    }

    pub fn health(&self) -> HealthReport {
        let retrieval = self.retrieval_breaker.snapshot();
        let generation = self.generation_breaker.snapshot();
        let shared_cache_healthy = self.cache.shared_healthy();
        let degraded = retrieval.state != CircuitState::Closed
            || generation.state != CircuitState::Closed
            || shared_cache_healthy == Some(false);
        HealthReport {
            status: if degraded { HealthStatus::Degraded } else { HealthStatus::Healthy },
            retrieval,
            generation,
            shared_cache_healthy,
            cache: self.cache.stats(),
            metrics: self.metrics(),
        }
    }
}

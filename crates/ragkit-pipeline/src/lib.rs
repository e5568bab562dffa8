//! Query pipeline over the retrieval, re-ranking and cache crates, with a
//! circuit breaker per external service and per-identity rate limiting.

pub mod backend;
pub mod breaker;
pub mod context;
pub mod metrics;
pub mod pipeline;
pub mod rate_limit;
pub mod request;

pub use backend::{backend_from_config, build_prompt, ExtractiveBackend, NOT_FOUND_ANSWER};
pub use breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use context::{ActiveSettings, RagContext};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::{HealthReport, HealthStatus, RagPipeline, RagPipelineBuilder, FALLBACK_ANSWER};
pub use rate_limit::{Admission, RateLimiter, Tier};
pub use request::{FallbackReason, QueryRequest, QueryResponse, Source, Timings};

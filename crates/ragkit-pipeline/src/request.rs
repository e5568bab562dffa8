use serde::{Deserialize, Serialize};

use ragkit_core::types::{RankedResult, Section};
use ragkit_core::{Error, FailureKind, Service};

use crate::rate_limit::Tier;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub question: String,
    pub identity: String,
    /// Falls back to the pipeline's default tier.
    pub tier: Option<Tier>,
    pub use_cache: bool,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            identity: "anonymous".to_string(),
            tier: None,
            use_cache: true,
        }
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub doc_id: String,
    pub chunk_index: usize,
    pub section: Section,
    pub score: f64,
    pub excerpt: String,
}

impl From<&RankedResult> for Source {
    fn from(r: &RankedResult) -> Self {
        let meta = &r.candidate.metadata;
        Self {
            doc_id: meta.doc_id.clone(),
            chunk_index: meta.chunk_index,
            section: meta.section,
            score: r.final_score,
            excerpt: r.candidate.chunk_text.trim().chars().take(EXCERPT_CHARS).collect(),
        }
    }
}

/// Why a response was answered with the fallback text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    CircuitOpen { service: Service },
    Retrieval { kind: FailureKind, message: String },
    Generation { kind: FailureKind, message: String },
}

impl FallbackReason {
    /// Classify a failed `service` call. Errors outside the retrieval and
    /// generation taxonomy are reported as the service being unavailable.
    pub fn from_error(service: Service, err: &Error) -> Self {
        match err {
            Error::CircuitOpen { .. } => FallbackReason::CircuitOpen { service },
            Error::Retrieval { kind, message } => FallbackReason::Retrieval { kind: *kind, message: message.clone() },
            Error::Generation { kind, message } => FallbackReason::Generation { kind: *kind, message: message.clone() },
            other => {
                let message = other.to_string();
                match service {
                    Service::Retrieval => FallbackReason::Retrieval { kind: FailureKind::Unavailable, message },
                    Service::Generation => FallbackReason::Generation { kind: FailureKind::Unavailable, message },
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub retrieval_ms: u64,
    pub rerank_ms: u64,
    pub generation_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub fallback: Option<FallbackReason>,
    pub cache_hit: bool,
    pub latency_ms: u64,
    pub rate_limit_remaining: Option<u32>,
    pub timings: Timings,
}

impl QueryResponse {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

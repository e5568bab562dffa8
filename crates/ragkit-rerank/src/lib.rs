//! Multi-signal re-ranking of retrieval candidates.
//!
//! `final_score = Σ component × weight` over semantic, keyword, position,
//! length and completeness signals. Output is sorted descending by score and
//! ties keep their retrieval order, so identical input always produces
//! identical output.

use ragkit_core::config::{RerankConfig, RerankWeights};
use ragkit_core::types::{RankedResult, RetrievalCandidate, ScoreBreakdown};
use ragkit_core::Result;

pub mod signals;
mod validate;

pub use validate::sanitize_candidates;

pub const DEFAULT_OPTIMAL_LENGTH: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct Reranker {
    weights: RerankWeights,
    optimal_length: usize,
}

impl Reranker {
    pub fn new(weights: RerankWeights, optimal_length: usize) -> Result<Self> {
        weights.validate()?;
        if optimal_length == 0 {
            return Err(ragkit_core::Error::config("optimal_length must be greater than 0"));
        }
        Ok(Self { weights, optimal_length })
    }

    pub fn from_config(cfg: &RerankConfig) -> Result<Self> {
        Self::new(cfg.effective_weights(), cfg.optimal_length)
    }

    pub fn weights(&self) -> &RerankWeights {
        &self.weights
    }

    pub fn optimal_length(&self) -> usize {
        self.optimal_length
    }

    pub fn score(&self, query: &str, candidate: &RetrievalCandidate) -> (f64, ScoreBreakdown) {
        let meta = &candidate.metadata;
        let b = ScoreBreakdown {
            semantic: signals::semantic_score(candidate.semantic_distance),
            keyword: signals::keyword_score(query, &candidate.chunk_text),
            position: signals::position_score(meta.chunk_index, meta.total_chunks),
            length: signals::length_score(candidate.chunk_text.chars().count(), self.optimal_length),
            completeness: signals::completeness_score(&candidate.chunk_text),
        };
        let w = &self.weights;
        let total = b.semantic * w.semantic
            + b.keyword * w.keyword
            + b.position * w.position
            + b.length * w.length
            + b.completeness * w.completeness;
        (total, b)
    }

    pub fn rerank(&self, query: &str, candidates: Vec<RetrievalCandidate>) -> Vec<RankedResult> {
        let mut ranked: Vec<RankedResult> = candidates
            .into_iter()
            .map(|candidate| {
                let (final_score, score_breakdown) = self.score(query, &candidate);
                RankedResult { candidate, final_score, score_breakdown }
            })
            .collect();
        // sort_by is stable: equal scores keep retrieval order
        ranked.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        tracing::trace!(n = ranked.len(), "reranked candidates");
        ranked
    }
}

/// Re-rank with explicit weights and the default optimal length.
pub fn rerank(query: &str, candidates: Vec<RetrievalCandidate>, weights: &RerankWeights) -> Result<Vec<RankedResult>> {
    Ok(Reranker::new(*weights, DEFAULT_OPTIMAL_LENGTH)?.rerank(query, candidates))
}

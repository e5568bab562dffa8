use ragkit_core::types::RetrievalCandidate;

/// Drop malformed candidates and restore ascending-distance order.
///
/// Retrieval output is untrusted: non-finite or negative distances and
/// blank texts are discarded. The sort is stable.
pub fn sanitize_candidates(candidates: Vec<RetrievalCandidate>) -> Vec<RetrievalCandidate> {
    let before = candidates.len();
    let mut kept: Vec<RetrievalCandidate> = candidates
        .into_iter()
        .filter(|c| c.semantic_distance.is_finite() && c.semantic_distance >= 0.0)
        .filter(|c| !c.chunk_text.trim().is_empty())
        .collect();
    if kept.len() < before {
        tracing::warn!(dropped = before - kept.len(), "discarded malformed retrieval candidates");
    }
    kept.sort_by(|a, b| a.semantic_distance.total_cmp(&b.semantic_distance));
    kept
}

use chrono::{TimeZone, Utc};

use ragkit_core::config::{RerankWeights, WeightPreset};
use ragkit_core::metadata::MetadataExtractor;
use ragkit_core::types::RetrievalCandidate;
use ragkit_rerank::signals::{keyword_score, length_score, position_score, semantic_score};
use ragkit_rerank::{rerank, sanitize_candidates, Reranker, DEFAULT_OPTIMAL_LENGTH};

fn candidate(doc: &str, text: &str, distance: f32, index: usize, total: usize) -> RetrievalCandidate {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("timestamp");
    RetrievalCandidate {
        chunk_text: text.to_string(),
        semantic_distance: distance,
        metadata: MetadataExtractor::new(doc).extract_at(text, index, total, at),
    }
}

fn pool() -> Vec<RetrievalCandidate> {
    vec![
        candidate("a", "Remote work is allowed three days per week with manager approval.", 0.42, 3, 10),
        candidate("b", "Employees get 22 vacation days per year. Unused days roll over once.", 0.55, 0, 8),
        candidate("c", "vacation", 0.30, 7, 8),
        candidate("d", "The VPN client must be installed before travelling abroad for work.", 0.61, 1, 4),
    ]
}

#[test]
fn rerank_is_deterministic() {
    let weights = RerankWeights::default();
    let a = rerank("how many vacation days", pool(), &weights).expect("rerank");
    let b = rerank("how many vacation days", pool(), &weights).expect("rerank");
    assert_eq!(a, b);
    assert_eq!(format!("{a:?}"), format!("{b:?}"));
}

#[test]
fn results_are_sorted_descending() {
    let ranked = rerank("vacation days", pool(), &RerankWeights::default()).expect("rerank");
    assert_eq!(ranked.len(), 4);
    for pair in ranked.windows(2) {
        assert!(pair[0].final_score >= pair[1].final_score);
    }
    assert_eq!(ranked[0].candidate.metadata.doc_id, "b", "keyword-rich, well-formed chunk wins");
}

#[test]
fn lower_distance_never_ranks_below() {
    let text = "Employees get 22 vacation days per year.";
    for (first, second) in [(0.2, 0.8), (0.8, 0.2)] {
        let ranked = rerank(
            "vacation days",
            vec![candidate("x", text, first, 1, 5), candidate("y", text, second, 1, 5)],
            &RerankWeights::default(),
        )
        .expect("rerank");
        assert!((ranked[0].candidate.semantic_distance - 0.2).abs() < f32::EPSILON);
    }
}

#[test]
fn ties_keep_retrieval_order() {
    let text = "Employees get 22 vacation days per year.";
    let ranked = rerank(
        "vacation",
        vec![candidate("first", text, 0.3, 2, 5), candidate("second", text, 0.3, 2, 5)],
        &RerankWeights::default(),
    )
    .expect("rerank");
    assert_eq!(ranked[0].candidate.metadata.doc_id, "first");
    assert_eq!(ranked[1].candidate.metadata.doc_id, "second");
}

#[test]
fn final_score_is_weighted_sum_of_breakdown() {
    let weights = WeightPreset::QualityFocused.weights();
    let reranker = Reranker::new(weights, DEFAULT_OPTIMAL_LENGTH).expect("reranker");
    for r in reranker.rerank("remote work", pool()) {
        let b = r.score_breakdown;
        let expected = b.semantic * weights.semantic
            + b.keyword * weights.keyword
            + b.position * weights.position
            + b.length * weights.length
            + b.completeness * weights.completeness;
        assert!((r.final_score - expected).abs() < 1e-12);
    }
}

#[test]
fn invalid_weights_are_rejected() {
    let bad = RerankWeights { semantic: f64::NAN, ..RerankWeights::default() };
    assert!(rerank("q", pool(), &bad).is_err());
    assert!(Reranker::new(RerankWeights::default(), 0).is_err());
}

#[test]
fn empty_candidates_rank_to_empty() {
    assert!(rerank("anything", Vec::new(), &RerankWeights::default()).expect("rerank").is_empty());
}

#[test]
fn signal_values() {
    assert!((semantic_score(0.0) - 1.0).abs() < 1e-12);
    assert!((semantic_score(1.0) - 0.5).abs() < 1e-12);

    let k = keyword_score("vacation days", "Employees get 22 vacation days per year.");
    assert!((k - (0.6 + 0.4 * 2.0 / 7.0)).abs() < 1e-9, "got {k}");
    assert_eq!(keyword_score("", "text"), 0.0);
    assert_eq!(keyword_score("pension", "nothing in common"), 0.0);
    assert!(keyword_score("a", "a a a a") <= 1.0);

    assert_eq!(position_score(0, 10), 1.0);
    assert_eq!(position_score(2, 10), 0.8);
    assert_eq!(position_score(5, 10), 0.6);
    assert_eq!(position_score(0, 0), 1.0);

    assert!((length_score(500, 500) - 1.0).abs() < 1e-12);
    assert!((length_score(99, 99) - 0.5).abs() < 1e-12, "fragments are halved");
    assert!(length_score(250, 500) < length_score(450, 500));
}

#[test]
fn sanitize_drops_bad_candidates_and_sorts() {
    let input = vec![
        candidate("far", "Far but valid text.", 0.9, 0, 1),
        candidate("nan", "Not a number.", f32::NAN, 0, 1),
        candidate("neg", "Negative distance.", -0.1, 0, 1),
        candidate("blank", "   ", 0.1, 0, 1),
        candidate("near", "Near and valid.", 0.2, 0, 1),
        candidate("inf", "Infinite.", f32::INFINITY, 0, 1),
    ];
    let kept: Vec<String> = sanitize_candidates(input).into_iter().map(|c| c.metadata.doc_id).collect();
    assert_eq!(kept, vec!["near", "far"]);
}

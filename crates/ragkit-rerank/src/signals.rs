//! Individual re-ranking signals, each in [0, 1].

use std::collections::BTreeSet;

pub use ragkit_core::metadata::completeness_score;

/// `1 / (1 + distance)`. Negative distances are treated as 0.
pub fn semantic_score(distance: f32) -> f64 {
    1.0 / (1.0 + f64::from(distance.max(0.0)))
}

fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
}

/// `0.6 × matched/query_terms + 0.4 × Σ min(tf, 0.3)` over matched terms,
/// clamped to [0, 1]. Matching is case-insensitive on whole words.
pub fn keyword_score(query: &str, text: &str) -> f64 {
    let query_terms: BTreeSet<String> = terms(query).collect();
    if query_terms.is_empty() {
        return 0.0;
    }
    let doc: Vec<String> = terms(text).collect();
    if doc.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let total = doc.len() as f64;
    let mut matched = 0usize;
    let mut tf_bonus = 0.0;
    for term in &query_terms {
        let freq = doc.iter().filter(|w| *w == term).count();
        if freq > 0 {
            matched += 1;
            #[allow(clippy::cast_precision_loss)]
            let tf = freq as f64 / total;
            tf_bonus += tf.min(0.3);
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let exact = matched as f64 / query_terms.len() as f64;
    (0.6 * exact + 0.4 * tf_bonus).clamp(0.0, 1.0)
}

/// Step decay by relative position: first 20% of chunks 1.0, first half
/// 0.8, rest 0.6.
pub fn position_score(chunk_index: usize, total_chunks: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let ratio = chunk_index as f64 / total_chunks.max(1) as f64;
    if ratio < 0.2 {
        1.0
    } else if ratio < 0.5 {
        0.8
    } else {
        0.6
    }
}

/// Gaussian around `optimal` with σ = optimal / 2, halved below 100 chars.
pub fn length_score(len: usize, optimal: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let (len_f, opt) = (len as f64, optimal.max(1) as f64);
    let sigma = opt * 0.5;
    let diff = len_f - opt;
    let score = (-(diff * diff) / (2.0 * sigma * sigma)).exp();
    if len < 100 {
        score * 0.5
    } else {
        score
    }
}

use serde::Serialize;

const KEY_VERSION: &str = "v2";

/// Everything besides the question text that changes a pipeline answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyParams {
    pub top_k: usize,
    pub candidate_count: usize,
    pub weights_fingerprint: String,
    pub optimal_length: usize,
    pub backend: String,
    pub generation_fingerprint: String,
}

/// Cache identity of one request.
///
/// `context` hashes the parameters only; `fingerprint` hashes parameters and
/// the normalized query. Semantic lookups match on `context` so an approximate
/// hit never crosses configurations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fingerprint: String,
    pub context: String,
    pub query: String,
}

impl CacheKey {
    pub fn derive(query: &str, params: &KeyParams) -> Self {
        let query = normalize_query(query);
        let context = hash(&[
            KEY_VERSION,
            &params.top_k.to_string(),
            &params.candidate_count.to_string(),
            &params.weights_fingerprint,
            &params.optimal_length.to_string(),
            &params.backend,
            &params.generation_fingerprint,
        ]);
        let fingerprint = hash(&[&context, &query]);
        Self { fingerprint, context, query }
    }
}

/// Trim, lowercase and collapse whitespace runs.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn hash(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        // length-prefixed so ("ab","c") and ("a","bc") differ
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

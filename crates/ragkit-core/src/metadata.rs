//! Per-chunk metadata heuristics.
//!
//! Everything here is a pure function of the chunk text. The keyword tables
//! are tuned for HR-style policy documents and are meant to be replaced for
//! other corpora.

use chrono::{DateTime, Utc};

use crate::types::{ChunkMetadata, ContentType, Section};

/// Checked in order; the first section with a matching keyword wins.
const SECTION_KEYWORDS: &[(Section, &[&str])] = &[
    (Section::Benefits, &["benefit", "insurance", "pension", "compensation", "bonus"]),
    (Section::Vacation, &["vacation", "days off", "time off", "absence", "leave"]),
    (Section::RemoteWork, &["remote", "telework", "home office", "work from home"]),
    (Section::Onboarding, &["onboarding", "induction", "new employee", "welcome"]),
    (Section::Policies, &["policy", "rule", "norm", "procedure"]),
    (Section::Technical, &["configuration", "vpn", "system", "software", "hardware"]),
];

const INFORMATIVE_KEYWORDS: &[&str] = &[
    "employee", "policy", "benefit", "vacation", "day", "company", "year", "process",
    "request", "remote", "work",
];

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

pub fn detect_section(text: &str) -> Section {
    let lower = text.to_lowercase();
    SECTION_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map_or(Section::General, |(section, _)| *section)
}

pub fn detect_content_type(text: &str) -> ContentType {
    if text.contains('•') || text.matches("\n-").count() > 2 || text.matches("\n*").count() > 2 {
        return ContentType::List;
    }
    if text.matches('|').count() > 5 || text.matches('\t').count() > 5 {
        return ContentType::Table;
    }
    if text.contains("```") || text.matches('=').count() > 5 {
        return ContentType::Code;
    }
    let questions = text.matches('?').count();
    if (1..=3).contains(&questions) {
        return ContentType::Qa;
    }
    if text.chars().filter(|c| is_sentence_end(*c)).count() > 3 {
        return ContentType::Narrative;
    }
    ContentType::Mixed
}

/// 0.5 for any sentence punctuation, 0.25 for an uppercase start and 0.25
/// for a punctuated end. Surrounding whitespace is ignored.
pub fn completeness_score(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    let mut score = 0.0;
    if text.chars().any(is_sentence_end) {
        score += 0.5;
    }
    if text.chars().next().is_some_and(char::is_uppercase) {
        score += 0.25;
    }
    if text.chars().next_back().is_some_and(is_sentence_end) {
        score += 0.25;
    }
    f64::min(score, 1.0)
}

/// Share of words containing an informative keyword, rounded to 2 decimals.
pub fn info_density_score(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let informative = words
        .iter()
        .filter(|w| INFORMATIVE_KEYWORDS.iter().any(|k| w.contains(k)))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let density = informative as f64 / words.len() as f64;
    (density.min(1.0) * 100.0).round() / 100.0
}

pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Derives `ChunkMetadata` for chunks of one document.
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor {
    doc_id: String,
}

impl MetadataExtractor {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self { doc_id: doc_id.into() }
    }

    pub fn extract(&self, chunk_text: &str, chunk_index: usize, total_chunks: usize) -> ChunkMetadata {
        self.extract_at(chunk_text, chunk_index, total_chunks, Utc::now())
    }

    /// Same as `extract` with an explicit timestamp, fully deterministic.
    pub fn extract_at(
        &self,
        chunk_text: &str,
        chunk_index: usize,
        total_chunks: usize,
        indexed_at: DateTime<Utc>,
    ) -> ChunkMetadata {
        ChunkMetadata {
            doc_id: self.doc_id.clone(),
            chunk_index,
            total_chunks,
            section: detect_section(chunk_text),
            content_type: detect_content_type(chunk_text),
            content_hash: content_hash(chunk_text),
            completeness_score: completeness_score(chunk_text),
            info_density_score: info_density_score(chunk_text),
            indexed_at,
        }
    }
}

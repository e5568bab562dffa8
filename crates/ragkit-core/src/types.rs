//! Domain types shared by the chunker, index, re-ranker and pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ChunkId = String;

/// A bounded contiguous slice of a source document.
///
/// - `text`: the trimmed chunk payload, always a literal slice of the source
/// - `start_offset`: byte offset of `text` within the source document
/// - `index`: position of the chunk in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub start_offset: usize,
    pub index: usize,
}

impl Chunk {
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.text.len()
    }
}

/// Topic category assigned by keyword matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Benefits,
    Vacation,
    RemoteWork,
    Onboarding,
    Policies,
    Technical,
    General,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Section::Benefits => "benefits",
            Section::Vacation => "vacation",
            Section::RemoteWork => "remote_work",
            Section::Onboarding => "onboarding",
            Section::Policies => "policies",
            Section::Technical => "technical",
            Section::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "benefits" => Section::Benefits,
            "vacation" => Section::Vacation,
            "remote_work" => Section::RemoteWork,
            "onboarding" => Section::Onboarding,
            "policies" => Section::Policies,
            "technical" => Section::Technical,
            "general" => Section::General,
            _ => return None,
        })
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural shape of a chunk's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    List,
    Table,
    Code,
    Qa,
    Narrative,
    Mixed,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::List => "list",
            ContentType::Table => "table",
            ContentType::Code => "code",
            ContentType::Qa => "qa",
            ContentType::Narrative => "narrative",
            ContentType::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "list" => ContentType::List,
            "table" => ContentType::Table,
            "code" => ContentType::Code,
            "qa" => ContentType::Qa,
            "narrative" => ContentType::Narrative,
            "mixed" => ContentType::Mixed,
            _ => return None,
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive tags attached 1:1 to a chunk.
///
/// Every field except `doc_id`, the positional fields and `indexed_at` is a
/// pure function of the chunk text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub section: Section,
    pub content_type: ContentType,
    pub content_hash: String,
    pub completeness_score: f64,
    pub info_density_score: f64,
    pub indexed_at: DateTime<Utc>,
}

/// A record handed to a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A raw similarity hit. `distance` is lower-is-closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    pub id: ChunkId,
    pub distance: f32,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A transient retrieval result awaiting validation and re-ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub chunk_text: String,
    pub semantic_distance: f32,
    pub metadata: ChunkMetadata,
}

impl From<IndexHit> for RetrievalCandidate {
    fn from(hit: IndexHit) -> Self {
        Self {
            chunk_text: hit.text,
            semantic_distance: hit.distance,
            metadata: hit.metadata,
        }
    }
}

/// Per-component scores behind a `RankedResult::final_score`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: f64,
    pub keyword: f64,
    pub position: f64,
    pub length: f64,
    pub completeness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub candidate: RetrievalCandidate,
    pub final_score: f64,
    pub score_breakdown: ScoreBreakdown,
}

/// A chunk with its provenance and metadata, ready for embedding.
///
/// `id` is `"<doc_id>:<chunk_index>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub doc_path: String,
    pub chunk: Chunk,
    pub metadata: ChunkMetadata,
}

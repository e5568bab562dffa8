use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::chunker::{chunker_from_config, ChunkStrategy};
use crate::config::ChunkingConfig;
use crate::metadata::MetadataExtractor;
use crate::types::DocumentChunk;

/// Turns `.txt` documents into chunks with metadata.
pub struct DataProcessor {
    chunker: Box<dyn ChunkStrategy>,
}

impl DataProcessor {
    pub fn new(config: &ChunkingConfig) -> crate::Result<Self> {
        Ok(Self { chunker: chunker_from_config(config)? })
    }

    pub fn with_chunker(chunker: Box<dyn ChunkStrategy>) -> Self {
        Self { chunker }
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<DocumentChunk>> {
        self.process_files(data_dir, self.list_txt_files(data_dir))
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<DocumentChunk>> {
        let mut files = self.list_txt_files(data_dir);
        if files.len() > limit {
            files.truncate(limit);
            info!(limit, "limited to first files");
        }
        self.process_files(data_dir, files)
    }

    /// Chunk one document and attach metadata to every chunk.
    pub fn process_text(&self, doc_id: &str, doc_path: &str, content: &str) -> Vec<DocumentChunk> {
        let chunks = self.chunker.chunk(content);
        let total = chunks.len();
        let extractor = MetadataExtractor::new(doc_id);
        chunks
            .into_iter()
            .map(|chunk| DocumentChunk {
                id: format!("{}:{}", doc_id, chunk.index),
                doc_path: doc_path.to_string(),
                metadata: extractor.extract(&chunk.text, chunk.index, total),
                chunk,
            })
            .collect()
    }

    fn process_files(&self, data_dir: &Path, files: Vec<PathBuf>) -> Result<Vec<DocumentChunk>> {
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), n = file_index + 1, of = files.len(), "processing file");
            let content = self.read_file_content(file_path)?;
            let doc_id = self.extract_doc_id(data_dir, file_path);
            all_chunks.extend(self.process_text(&doc_id, &file_path.to_string_lossy(), &content));
        }
        info!(files = files.len(), chunks = all_chunks.len(), strategy = self.chunker.name(), "processed documents");
        Ok(all_chunks)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => {
                let bytes = fs::read(file_path).with_context(|| format!("reading {}", file_path.display()))?;
                Ok(String::from_utf8_lossy(&bytes).to_string())
            }
        }
    }

    /// Path relative to `data_dir` without extension, so equal stems in
    /// different folders stay distinct.
    fn extract_doc_id(&self, data_dir: &Path, file_path: &Path) -> String {
        let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        relative.with_extension("").to_string_lossy().replace('\\', "/")
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
            .map(|e| e.path().to_path_buf())
            .collect();
        txt_files.sort();
        txt_files
    }
}

//! Text chunking strategies.
//!
//! Lengths are measured in characters. Offsets in `Chunk::start_offset` are
//! byte offsets into the source text, so `&text[c.start_offset..c.end_offset()]`
//! is always the chunk text.

use regex::Regex;

use crate::config::{ChunkStrategyKind, ChunkingConfig};
use crate::error::{Error, Result};
use crate::types::Chunk;

pub trait ChunkStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn chunk(&self, text: &str) -> Vec<Chunk>;
}

/// Validated size parameters shared by every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_chunk_len: usize,
}

impl ChunkParams {
    pub fn new(chunk_size: usize, overlap: usize, min_chunk_len: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }
        if overlap >= chunk_size {
            return Err(Error::config(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap, min_chunk_len })
    }

    fn keeps(&self, text: &str) -> bool {
        char_len(text.trim()) > self.min_chunk_len
    }
}

pub fn chunker_from_config(cfg: &ChunkingConfig) -> Result<Box<dyn ChunkStrategy>> {
    let params = ChunkParams::new(cfg.chunk_size, cfg.overlap, cfg.min_chunk_len)?;
    Ok(match cfg.strategy {
        ChunkStrategyKind::Sentence => Box::new(SentenceChunker::new(params)?),
        ChunkStrategyKind::Fixed => Box::new(FixedChunker::new(params)),
    })
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Sentence and paragraph aware chunker.
///
/// Units end at `.`/`!`/`?` followed by whitespace or at blank lines. Units
/// are packed greedily up to `chunk_size`; each emitted chunk donates up to
/// `overlap` trailing characters (whole words only) to the next one. A unit
/// longer than 1.5 x `chunk_size` is word-wrapped on its own.
pub struct SentenceChunker {
    params: ChunkParams,
    boundary: Regex,
}

impl SentenceChunker {
    pub fn new(params: ChunkParams) -> Result<Self> {
        let boundary = Regex::new(r"[.!?]+\s+|\n[ \t]*\n\s*")
            .map_err(|e| Error::config(format!("sentence boundary pattern: {e}")))?;
        Ok(Self { params, boundary })
    }

    /// Byte spans of trimmed, non-empty units.
    fn units(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut cursor = 0;
        for m in self.boundary.find_iter(text) {
            let matched = m.as_str();
            let punct = matched.len() - matched.trim_start_matches(['.', '!', '?']).len();
            push_trimmed(text, cursor, m.start() + punct, &mut spans);
            cursor = m.end();
        }
        push_trimmed(text, cursor, text.len(), &mut spans);
        spans
    }

    fn is_oversized(&self, len: usize) -> bool {
        len * 2 > self.params.chunk_size * 3
    }

    /// Start of the carried prefix: at most `overlap` chars from the end of
    /// `text[start..end]`, moved forward to the next word start.
    fn overlap_start(&self, text: &str, start: usize, end: usize) -> Option<usize> {
        if self.params.overlap == 0 {
            return None;
        }
        let slice = &text[start..end];
        let total = char_len(slice);
        let skip = total.saturating_sub(self.params.overlap);
        let mut pos = start + slice.char_indices().nth(skip).map_or(slice.len(), |(i, _)| i);
        let mid_word = pos > start
            && text[..pos].chars().next_back().is_some_and(|c| !c.is_whitespace());
        if mid_word {
            pos += text[pos..end].find(char::is_whitespace).unwrap_or(end - pos);
        }
        pos += text[pos..end].len() - text[pos..end].trim_start().len();
        (pos < end).then_some(pos)
    }

    /// Word-wrap `text[start..end]` into pieces of at most `chunk_size` chars.
    /// A single word longer than that becomes its own piece.
    fn wrap(&self, text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
        let mut pieces = Vec::new();
        let mut current: Option<(usize, usize)> = None;
        for (ws, we) in word_spans(text, start, end) {
            current = match current {
                Some((ps, pe)) if char_len(&text[ps..we]) > self.params.chunk_size => {
                    pieces.push((ps, pe));
                    Some((ws, we))
                }
                Some((ps, _)) => Some((ps, we)),
                None => Some((ws, we)),
            };
        }
        pieces.extend(current);
        pieces
    }
}

fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<(usize, usize)>) {
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = raw.len() - raw.trim_start().len();
    spans.push((start + lead, start + lead + trimmed.len()));
}

fn word_spans(text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut word_start = None;
    for (i, c) in text[start..end].char_indices() {
        match (c.is_whitespace(), word_start) {
            (true, Some(ws)) => {
                spans.push((ws, start + i));
                word_start = None;
            }
            (false, None) => word_start = Some(start + i),
            _ => {}
        }
    }
    if let Some(ws) = word_start {
        spans.push((ws, end));
    }
    spans
}

/// Collects emitted chunks and numbers them.
struct Emitter<'a> {
    text: &'a str,
    params: ChunkParams,
    chunks: Vec<Chunk>,
}

impl Emitter<'_> {
    /// Emit `text[start..end]` unless it is too short. Returns whether it was kept.
    fn emit(&mut self, start: usize, end: usize, force: bool) -> bool {
        let slice = &self.text[start..end];
        if !force && !self.params.keeps(slice) {
            return false;
        }
        self.chunks.push(Chunk {
            text: slice.to_string(),
            start_offset: start,
            index: self.chunks.len(),
        });
        true
    }
}

impl ChunkStrategy for SentenceChunker {
    fn name(&self) -> &'static str {
        "sentence"
    }

    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let mut out = Emitter { text, params: self.params, chunks: Vec::new() };
        let mut buffer: Option<(usize, usize)> = None;

        for (us, ue) in self.units(text) {
            if self.is_oversized(char_len(&text[us..ue])) {
                if let Some((bs, be)) = buffer.take() {
                    out.emit(bs, be, false);
                }
                let mut pieces = self.wrap(text, us, ue);
                buffer = pieces.pop();
                for (ps, pe) in pieces {
                    out.emit(ps, pe, false);
                }
                continue;
            }

            buffer = match buffer {
                Some((bs, be)) if char_len(&text[bs..ue]) > self.params.chunk_size => {
                    let start = if out.emit(bs, be, false) {
                        self.overlap_start(text, bs, be).unwrap_or(us)
                    } else {
                        us
                    };
                    Some((start, ue))
                }
                Some((bs, _)) => Some((bs, ue)),
                None => Some((us, ue)),
            };
        }

        if let Some((bs, be)) = buffer {
            out.emit(bs, be, true);
        }
        out.chunks
    }
}

/// Fixed-width character windows with stride `chunk_size - overlap`.
///
/// Windows keep their raw text so every full window is exactly
/// `chunk_size` characters; the drop threshold looks at trimmed length.
pub struct FixedChunker {
    params: ChunkParams,
}

impl FixedChunker {
    pub fn new(params: ChunkParams) -> Self {
        Self { params }
    }
}

impl ChunkStrategy for FixedChunker {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let n = bounds.len() - 1;
        let stride = self.params.chunk_size - self.params.overlap;
        let mut out = Emitter { text, params: self.params, chunks: Vec::new() };

        let mut i = 0;
        while i < n {
            let end = (i + self.params.chunk_size).min(n);
            out.emit(bounds[i], bounds[end], false);
            if end == n {
                break;
            }
            i += stride;
        }
        out.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(size: usize, overlap: usize, min: usize) -> SentenceChunker {
        SentenceChunker::new(ChunkParams::new(size, overlap, min).expect("params")).expect("chunker")
    }

    #[test]
    fn units_keep_punctuation_and_split_paragraphs() {
        let c = sentence(100, 10, 0);
        let text = "One. Two!  Three?\n\nFour five\n  \nsix";
        let units: Vec<&str> = c.units(text).into_iter().map(|(s, e)| &text[s..e]).collect();
        assert_eq!(units, vec!["One.", "Two!", "Three?", "Four five", "six"]);
    }

    #[test]
    fn overlap_start_snaps_to_word() {
        let c = sentence(100, 8, 0);
        let text = "alpha bravo charlie";
        let pos = c.overlap_start(text, 0, text.len()).expect("overlap");
        assert_eq!(&text[pos..], "charlie");
    }

    #[test]
    fn overlap_start_none_when_single_long_word() {
        let c = sentence(100, 3, 0);
        let text = "supercalifragilistic";
        assert_eq!(c.overlap_start(text, 0, text.len()), None);
    }

    #[test]
    fn wrap_respects_size() {
        let c = sentence(10, 2, 0);
        let text = "aaa bbb ccc ddd eee";
        let pieces: Vec<&str> = c.wrap(text, 0, text.len()).into_iter().map(|(s, e)| &text[s..e]).collect();
        assert_eq!(pieces, vec!["aaa bbb", "ccc ddd", "eee"]);
    }
}

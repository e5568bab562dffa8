use ragkit_core::chunker::{chunker_from_config, ChunkParams, ChunkStrategy, FixedChunker, SentenceChunker};
use ragkit_core::config::{ChunkStrategyKind, ChunkingConfig};
use ragkit_core::metadata::MetadataExtractor;
use ragkit_core::types::{Chunk, Section};
use ragkit_core::Error;

const EXAMPLE: &str = "Intro sentence. Benefits: health, dental. Vacation policy: 22 days.";

fn sentence(size: usize, overlap: usize, min: usize) -> SentenceChunker {
    SentenceChunker::new(ChunkParams::new(size, overlap, min).expect("params")).expect("chunker")
}

fn fixed(size: usize, overlap: usize, min: usize) -> FixedChunker {
    FixedChunker::new(ChunkParams::new(size, overlap, min).expect("params"))
}

fn policy_document() -> String {
    let paragraphs = [
        "Employees accrue vacation days every month. Requests go through the HR portal at least two weeks ahead! Unused days roll over once.",
        "Remote work is allowed up to three days per week. A stable connection and a quiet space are expected. Managers may ask for office presence during planning weeks.",
        "Onboarding takes two weeks. Every new employee gets a buddy, a laptop, and VPN credentials on the first day. Questions? Ask the people team.",
    ];
    paragraphs.join("\n\n")
}

/// Every chunk is a literal slice, chunks are ordered, gaps hold only
/// whitespace, and overlaps stay within the configured budget.
fn assert_covers(text: &str, chunks: &[Chunk], overlap: usize) {
    assert!(!chunks.is_empty(), "non-empty input yields chunks");
    assert!(text[..chunks[0].start_offset].trim().is_empty(), "no gap before first chunk");
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.index, i, "indices follow emission order");
        assert_eq!(&text[c.start_offset..c.end_offset()], c.text, "chunk is a slice of the source");
    }
    for pair in chunks.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        assert!(next.start_offset > prev.start_offset, "document order");
        if next.start_offset >= prev.end_offset() {
            assert!(text[prev.end_offset()..next.start_offset].trim().is_empty(), "gap between chunks is whitespace");
        } else {
            let shared = text[next.start_offset..prev.end_offset()].chars().count();
            assert!(shared <= overlap, "overlap {shared} exceeds {overlap}");
        }
    }
    let last = chunks.last().expect("last");
    assert!(text[last.end_offset()..].trim().is_empty(), "no gap after last chunk");
}

#[test]
fn example_document_keeps_the_vacation_sentence_whole() {
    let chunks = sentence(40, 10, 50).chunk(EXAMPLE);
    assert_eq!(chunks.len(), 1, "short fragments are dropped, the final buffer is flushed");
    assert_eq!(chunks[0].text, "Vacation policy: 22 days.");
    assert!(chunks[0].text.ends_with("22 days."), "no mid-word split");

    let meta = MetadataExtractor::new("handbook").extract(&chunks[0].text, 0, chunks.len());
    assert_eq!(meta.section, Section::Vacation);
    assert!((meta.completeness_score - 1.0).abs() < f64::EPSILON);
}

#[test]
fn sentence_chunks_cover_the_document() {
    let text = policy_document();
    let chunks = sentence(120, 30, 0).chunk(&text);
    assert!(chunks.len() > 2, "document is split");
    assert_covers(&text, &chunks, 30);
}

#[test]
fn sentence_chunks_never_split_words() {
    let text = policy_document();
    for chunk in sentence(90, 25, 0).chunk(&text) {
        let before = text[..chunk.start_offset].chars().next_back();
        let after = text[chunk.end_offset()..].chars().next();
        assert!(before.map_or(true, char::is_whitespace), "chunk starts at a word: {:?}", chunk.text);
        assert!(after.map_or(true, char::is_whitespace), "chunk ends at a word: {:?}", chunk.text);
    }
}

#[test]
fn sentence_overlap_carries_whole_words() {
    let text = "The first sentence is here. The second sentence is here. The third sentence is here. The fourth sentence is here.";
    let chunks = sentence(80, 20, 0).chunk(text);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text, "The first sentence is here. The second sentence is here.");
    assert!(chunks[1].text.starts_with("sentence is here. The third"), "got {:?}", chunks[1].text);
    let shared = chunks[0].end_offset() - chunks[1].start_offset;
    assert!(shared > 0 && shared <= 20);
}

#[test]
fn dropped_fragment_carries_no_overlap() {
    let text = "Tiny one. Then a considerably longer sentence that easily passes the minimum length threshold.";
    let chunks = sentence(60, 10, 50).chunk(text);
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].text.starts_with("Then a"), "got {:?}", chunks[0].text);
}

#[test]
fn oversized_sentence_is_word_wrapped() {
    let long = "word ".repeat(60);
    let text = format!("Short lead sentence here. {}end.", long);
    let chunks = sentence(50, 10, 0).chunk(&text);
    assert!(chunks.len() >= 5);
    for c in &chunks[..chunks.len() - 1] {
        assert!(c.text.chars().count() <= 50, "wrapped piece too long: {:?}", c.text);
    }
    assert_covers(&text, &chunks, 10);
}

#[test]
fn empty_and_blank_input_yield_nothing() {
    assert!(sentence(100, 10, 50).chunk("").is_empty());
    assert!(sentence(100, 10, 50).chunk("   \n\n\t ").is_empty());
    assert!(fixed(100, 10, 50).chunk("").is_empty());
}

#[test]
fn fixed_windows_are_exactly_chunk_size() {
    let text = "abcdefghij".repeat(100);
    let chunks = fixed(150, 0, 50).chunk(&text);
    assert_eq!(chunks.len(), 7);
    for c in &chunks[..6] {
        assert_eq!(c.text.len(), 150);
    }
    assert_eq!(chunks[6].text.len(), 100, "partial tail above threshold is kept");
    assert_eq!(chunks[6].start_offset, 900);
}

#[test]
fn fixed_drops_short_tail() {
    let text = "abcdefghij".repeat(93);
    let chunks = fixed(150, 0, 50).chunk(&text);
    assert_eq!(chunks.len(), 6, "30-char tail is below the threshold");
}

#[test]
fn fixed_stride_applies_overlap() {
    let text = "abcdefghij".repeat(30);
    let chunks = fixed(100, 25, 10).chunk(&text);
    let starts: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
    assert_eq!(starts, vec![0, 75, 150, 225]);
    assert_eq!(chunks[3].text.len(), 75);
}

#[test]
fn invalid_sizes_are_rejected() {
    assert!(matches!(ChunkParams::new(0, 0, 50), Err(Error::Configuration(_))));
    assert!(matches!(ChunkParams::new(100, 100, 50), Err(Error::Configuration(_))));
    assert!(matches!(ChunkParams::new(100, 150, 50), Err(Error::Configuration(_))));

    let cfg = ChunkingConfig { strategy: ChunkStrategyKind::Fixed, chunk_size: 10, overlap: 10, min_chunk_len: 0 };
    assert!(chunker_from_config(&cfg).is_err());
}

#[test]
fn config_selects_strategy() {
    let mut cfg = ChunkingConfig::default();
    assert_eq!(chunker_from_config(&cfg).expect("sentence").name(), "sentence");
    cfg.strategy = ChunkStrategyKind::Fixed;
    assert_eq!(chunker_from_config(&cfg).expect("fixed").name(), "fixed");
}

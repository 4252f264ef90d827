//! Semantic chunking with a sliding overlap.
//!
//! Text is first split on semantic boundaries by `semchunk-rs` into segments that leave room
//! for the overlap, then each segment is prefixed with the tail of its predecessor. Segments
//! are never trimmed, so every character of the input lands in at least one chunk. Window and
//! overlap are measured either in characters (default) or in `cl100k_base` tokens.

use crate::config::ChunkUnit;
use semchunk_rs::Chunker;
use std::sync::{Arc, OnceLock};
use tiktoken_rs::{CoreBPE, cl100k_base};

use super::types::ChunkingError;

type LengthCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

static CL100K: OnceLock<Arc<CoreBPE>> = OnceLock::new();

/// Chunk text into overlapping windows.
///
/// - `chunk_size` is a hard upper bound on the length of every returned chunk.
/// - `overlap` is clamped to `chunk_size - 1`; consecutive chunks share up to that much text.
///
/// Returns an empty vector when the input text is all whitespace. CPU bound: call it from a
/// blocking context.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    unit: ChunkUnit,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let counter = build_counter(unit)?;
    Ok(chunk_text_with_counter(text, chunk_size, overlap, counter))
}

fn build_counter(unit: ChunkUnit) -> Result<LengthCounter, ChunkingError> {
    match unit {
        ChunkUnit::Chars => Ok(char_counter()),
        ChunkUnit::Tokens => {
            let encoding = cl100k()?;
            Ok(Arc::new(move |segment: &str| {
                encoding.encode_ordinary(segment).len()
            }))
        }
    }
}

/// Shared `cl100k_base` encoding, loaded on first use.
fn cl100k() -> Result<Arc<CoreBPE>, ChunkingError> {
    if let Some(encoding) = CL100K.get() {
        return Ok(encoding.clone());
    }
    let encoding =
        Arc::new(cl100k_base().map_err(|error| ChunkingError::Tokenizer(error.to_string()))?);
    Ok(CL100K.get_or_init(|| encoding).clone())
}

fn char_counter() -> LengthCounter {
    Arc::new(|segment: &str| segment.chars().count())
}

fn chunk_text_with_counter(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    counter: LengthCounter,
) -> Vec<String> {
    let effective_overlap = overlap.min(chunk_size.saturating_sub(1));
    let segment_budget = chunk_size - effective_overlap;

    let counter_for_chunker = counter.clone();
    let chunker = Chunker::new(
        segment_budget,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );
    let segments: Vec<String> = chunker
        .chunk(text)
        .into_iter()
        .flat_map(|segment| split_to_fit(&segment, segment_budget, &counter))
        .collect();
    apply_overlap(segments, chunk_size, effective_overlap, &counter)
}

/// Split a segment the chunker left over budget, preferring whitespace cut points.
fn split_to_fit(segment: &str, limit: usize, counter: &LengthCounter) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = segment.trim();

    while !rest.is_empty() {
        if counter.as_ref()(rest) <= limit {
            pieces.push(rest.to_string());
            break;
        }
        let mut cut = prefix_within(rest, limit, counter);
        if cut < rest.len()
            && let Some(space) = rest[..cut].rfind(char::is_whitespace)
            && space > 0
        {
            cut = space;
        }
        if cut == 0 {
            // A single character over budget (possible with token counting); keep it whole.
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    pieces
}

/// Byte length of the longest prefix of `text` whose length fits `limit`.
fn prefix_within(text: &str, limit: usize, counter: &LengthCounter) -> usize {
    let mut boundaries: Vec<usize> = text.char_indices().map(|(index, _)| index).collect();
    boundaries.push(text.len());

    // boundaries[lo] always fits (the empty prefix); boundaries[hi] does not.
    let (mut lo, mut hi) = (0, boundaries.len() - 1);
    if counter.as_ref()(text) <= limit {
        return text.len();
    }
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if counter.as_ref()(&text[..boundaries[mid]]) <= limit {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    boundaries[lo]
}

/// Prefix each segment with the tail of the previous one. Only the tail is shortened when the
/// combination would exceed `chunk_size`.
fn apply_overlap(
    segments: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    counter: &LengthCounter,
) -> Vec<String> {
    if overlap == 0 || segments.len() < 2 {
        return segments;
    }

    let mut overlapped = Vec::with_capacity(segments.len());
    let mut previous: Option<&str> = None;

    for current in &segments {
        let chunk = match previous {
            Some(prev) => build_overlapped_chunk(prev, current, overlap, chunk_size, counter),
            None => current.clone(),
        };
        overlapped.push(chunk);
        previous = Some(current);
    }

    overlapped
}

fn build_overlapped_chunk(
    previous: &str,
    current: &str,
    overlap: usize,
    chunk_size: usize,
    counter: &LengthCounter,
) -> String {
    let mut limit = overlap.min(chunk_size.saturating_sub(counter.as_ref()(current)));

    loop {
        let tail = tail_within(previous, limit, counter);
        if tail.is_empty() {
            return current.to_string();
        }
        let combined = join(tail, current);
        if counter.as_ref()(&combined) <= chunk_size {
            return combined;
        }
        limit = counter.as_ref()(tail).min(limit).saturating_sub(1);
    }
}

fn join(tail: &str, current: &str) -> String {
    let mut combined = String::with_capacity(tail.len() + current.len() + 1);
    combined.push_str(tail);
    if !ends_with_whitespace(tail) && !starts_with_whitespace(current) {
        combined.push(' ');
    }
    combined.push_str(current);
    combined
}

/// Longest suffix of `text` (leading whitespace trimmed) whose length fits `limit`.
fn tail_within<'a>(text: &'a str, limit: usize, counter: &LengthCounter) -> &'a str {
    if limit == 0 {
        return "";
    }

    let trimmed_text = text.trim_start();
    if counter.as_ref()(trimmed_text) <= limit {
        return trimmed_text;
    }

    let boundaries: Vec<usize> = text.char_indices().map(|(index, _)| index).collect();
    // The suffix at boundaries[lo] is too long; the suffix at boundaries[hi] fits, with
    // hi == len standing for the empty suffix.
    let (mut lo, mut hi) = (0, boundaries.len());
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if counter.as_ref()(text[boundaries[mid]..].trim_start()) <= limit {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    match boundaries.get(hi) {
        Some(&offset) => text[offset..].trim_start(),
        None => "",
    }
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_whitespace)
}

fn ends_with_whitespace(text: &str) -> bool {
    text.chars().next_back().is_some_and(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_counter() -> LengthCounter {
        Arc::new(|segment: &str| {
            let words = segment.split_whitespace().count();
            if words == 0 && !segment.is_empty() {
                1
            } else {
                words
            }
        })
    }

    #[test]
    fn chunks_respect_window_with_word_counter() {
        let text = "one two three four five";
        let chunks = chunk_text_with_counter(text, 2, 0, word_counter());
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn overlap_carries_previous_tail() {
        let text = "one two three four five";
        let counter = word_counter();
        let chunks = chunk_text_with_counter(text, 3, 1, counter.clone());
        assert_eq!(chunks, vec!["one two", "two three four", "four five"]);
        for chunk in &chunks {
            assert!(counter.as_ref()(chunk) <= 3);
        }
    }

    #[test]
    fn whitespace_only_input_yields_nothing() {
        let chunks = chunk_text("  \n ", 10, 2, ChunkUnit::Chars).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let error = chunk_text("hello", 0, 0, ChunkUnit::Chars).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn char_windows_never_exceed_size() {
        let text = "Retrieval augmented generation pairs a search index with a language model. "
            .repeat(20);
        let chunks = chunk_text(&text, 120, 30, ChunkUnit::Chars).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 120, "chunk too long: {chunk}");
        }
    }

    #[test]
    fn token_windows_never_exceed_size() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(10);
        let chunks = chunk_text(&text, 16, 4, ChunkUnit::Tokens).unwrap();
        let counter = build_counter(ChunkUnit::Tokens).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(counter.as_ref()(chunk) <= 16);
        }
    }

    fn numbered_sentences(count: usize) -> String {
        (0..count)
            .map(|n| format!("Sentence {n:04} records a distinct observation about item {n:04}."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Length in bytes of the longest prefix of `next` that is also a suffix of `previous`.
    fn shared_overlap(previous: &str, next: &str) -> usize {
        next.char_indices()
            .map(|(index, ch)| index + ch.len_utf8())
            .filter(|&end| previous.ends_with(&next[..end]))
            .max()
            .unwrap_or(0)
    }

    fn assert_covers_and_overlaps(
        count: usize,
        chunks: &[String],
        chunk_size: usize,
        min_overlap: usize,
        counter: &LengthCounter,
    ) {
        assert!(chunks.len() > 2, "expected several chunks, got {}", chunks.len());
        for chunk in chunks {
            assert!(
                counter.as_ref()(chunk) <= chunk_size,
                "chunk over budget: {}",
                counter.as_ref()(chunk)
            );
        }
        let missing: Vec<usize> = (0..count)
            .filter(|n| {
                let sentence = format!("Sentence {n:04} records");
                !chunks.iter().any(|chunk| chunk.contains(&sentence))
            })
            .collect();
        assert!(missing.is_empty(), "sentences missing from every chunk: {missing:?}");
        for pair in chunks.windows(2) {
            let shared = shared_overlap(&pair[0], &pair[1]);
            assert!(
                shared >= min_overlap,
                "neighbouring chunks share only {shared} bytes"
            );
        }
    }

    #[test]
    fn default_char_windows_keep_all_text_and_overlap() {
        let text = numbered_sentences(300);
        let chunks = chunk_text(&text, 1000, 200, ChunkUnit::Chars).unwrap();
        assert_covers_and_overlaps(300, &chunks, 1000, 150, &char_counter());
    }

    #[test]
    fn token_windows_keep_all_text_and_overlap() {
        let text = numbered_sentences(80);
        let chunks = chunk_text(&text, 200, 40, ChunkUnit::Tokens).unwrap();
        let counter = build_counter(ChunkUnit::Tokens).unwrap();
        assert_covers_and_overlaps(80, &chunks, 200, 20, &counter);
    }

    #[test]
    fn tail_within_returns_longest_fitting_suffix() {
        let counter = char_counter();
        assert_eq!(tail_within("alpha beta gamma", 10, &counter), "beta gamma");
        assert_eq!(tail_within("alpha beta gamma", 5, &counter), "gamma");
        assert_eq!(tail_within("alpha", 0, &counter), "");
        assert_eq!(tail_within("short", 50, &counter), "short");
    }

    #[test]
    fn oversized_segments_are_split_at_whitespace() {
        let counter = char_counter();
        let pieces = split_to_fit("aaaa bbbb cccc dddd", 10, &counter);
        assert_eq!(pieces, vec!["aaaa bbbb", "cccc dddd"]);

        let pieces = split_to_fit("abcdefghijkl", 5, &counter);
        assert_eq!(pieces, vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn tokenizer_is_loaded_once() {
        let first = cl100k().unwrap();
        let second = cl100k().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("A short note.", 1000, 200, ChunkUnit::Chars).unwrap();
        assert_eq!(chunks, vec!["A short note."]);
    }
}

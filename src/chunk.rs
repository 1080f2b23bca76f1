//! Sentence-packing transcript chunker.
//!
//! Collapses whitespace, splits the text into sentences at terminal
//! punctuation, then greedily packs sentences into [`Chunk`]s under a
//! character budget. A chunk closes as soon as the next sentence would
//! overflow it; a single sentence longer than the budget gets a chunk of its
//! own and is never split, so the budget is soft.
//!
//! Joining every chunk's text with a single space reproduces the normalized
//! input exactly.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Default character budget per chunk.
pub const DEFAULT_CHUNK_CHARS: usize = 1000;

/// Characters that may trail a sentence terminator before the boundary space.
const CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201d}', '\u{2019}'];

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text into sentences. Boundaries are the spaces that
/// follow `.`, `!` or `?` (optionally followed by closing quotes/brackets).
pub fn split_sentences(normalized: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut after_terminator = false;

    for (idx, ch) in normalized.char_indices() {
        if ch == ' ' {
            if after_terminator && idx > start {
                sentences.push(&normalized[start..idx]);
                start = idx + 1;
            }
            after_terminator = false;
        } else if matches!(ch, '.' | '!' | '?') {
            after_terminator = true;
        } else if !(after_terminator && CLOSERS.contains(&ch)) {
            after_terminator = false;
        }
    }

    if start < normalized.len() {
        sentences.push(&normalized[start..]);
    }
    sentences
}

/// Split `text` into chunks of at most `max_chars` characters (soft limit).
/// Indices are contiguous from 0. Blank text yields no chunks.
pub fn chunk_text(source_document: &str, text: &str, max_chars: usize) -> Vec<Chunk> {
    let normalized = normalize_whitespace(text);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for sentence in split_sentences(&normalized) {
        let sentence_chars = sentence.chars().count();
        let would_be = if current.is_empty() {
            sentence_chars
        } else {
            current_chars + 1 + sentence_chars
        };

        if would_be > max_chars && !current.is_empty() {
            let index = chunks.len() as i64;
            chunks.push(make_chunk(source_document, index, &current));
            current.clear();
            current_chars = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(sentence);
        current_chars += sentence_chars;
    }

    if !current.is_empty() {
        let index = chunks.len() as i64;
        chunks.push(make_chunk(source_document, index, &current));
    }

    chunks
}

pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn make_chunk(source_document: &str, index: i64, text: &str) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        source_document: source_document.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash: text_hash(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("minutes.docx", "Hello, world!", 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].source_document, "minutes.docx");
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        assert!(chunk_text("doc", "", 100).is_empty());
        assert!(chunk_text("doc", " \n\t ", 100).is_empty());
    }

    #[test]
    fn test_whitespace_is_normalized() {
        assert_eq!(normalize_whitespace("  a\n\n b\t c  "), "a b c");
    }

    #[test]
    fn test_sentence_split() {
        let s = split_sentences("Ship it. Really? Yes! (Done.) And \"quoted.\" tail");
        assert_eq!(
            s,
            vec!["Ship it.", "Really?", "Yes!", "(Done.)", "And \"quoted.\"", "tail"]
        );
    }

    #[test]
    fn test_abbreviation_without_space_is_not_a_boundary() {
        assert_eq!(split_sentences("Version 2.5 ships"), vec!["Version 2.5 ships"]);
    }

    #[test]
    fn test_packing_closes_when_next_sentence_overflows() {
        // 9 + 1 + 9 = 19 fits in 20; the third sentence would overflow.
        let text = "Aaaa bbb. Cccc ddd. Eeee fff.";
        let chunks = chunk_text("doc", text, 20);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Aaaa bbb. Cccc ddd.");
        assert_eq!(chunks[1].text, "Eeee fff.");
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let long = "This single sentence is much longer than the tiny budget allows.";
        let text = format!("Short. {} End.", long);
        let chunks = chunk_text("doc", &text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].text, long);
        assert!(chunks[1].text.chars().count() > 10);
    }

    #[test]
    fn test_join_reproduces_normalized_text() {
        let text = "Alice opened the meeting.  Bob asked about Q3!\n\nCarol will follow up? \
                    Dave: \"sure.\" The budget (draft) is due Friday. ok";
        for budget in [1, 5, 20, 40, 1000] {
            let chunks = chunk_text("doc", text, budget);
            assert_eq!(joined(&chunks), normalize_whitespace(text), "budget {}", budget);
        }
    }

    #[test]
    fn test_budget_respected_when_it_covers_longest_sentence() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} is here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let longest = split_sentences(&text)
            .iter()
            .map(|s| s.chars().count())
            .max()
            .unwrap();
        for budget in [longest, longest + 7, 120, 400] {
            for c in chunk_text("doc", &text, budget) {
                assert!(c.text.chars().count() <= budget);
            }
        }
    }

    #[test]
    fn test_budget_counts_characters_not_bytes() {
        let text = "Équipe résumé prêt. Ça marche.";
        let chunks = chunk_text("doc", text, 19);
        assert_eq!(chunks[0].text, "Équipe résumé prêt.");
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = (0..50)
            .map(|i| format!("Item number {}.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text("doc", &text, 30);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_deterministic_text_and_hash() {
        let text = "Alpha. Beta. Gamma. Delta.";
        let c1 = chunk_text("doc", text, 12);
        let c2 = chunk_text("doc", text, 12);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
        }
    }
}

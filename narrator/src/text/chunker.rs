//! Packing sentences into narration chunks.
//!
//! Sentences are packed greedily up to the target size. A sentence longer
//! than the hard maximum is broken at clause punctuation, then at word
//! boundaries, and a single overlong word is cut by characters. Sizes are
//! counted in characters.

use super::cleaner::clean_text;
use super::sentences::split_sentences;

/// Default target chunk size in characters.
pub const DEFAULT_TARGET_SIZE: usize = 280;

/// How far a single sentence may run past the target before it is split.
pub const MAX_OVERSHOOT: usize = 70;

const CLAUSE_BREAKS: &[char] = &[';', ':', ','];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` into chunks of at most `max_size` characters, packed toward
/// `target_size`.
pub fn chunk_text(text: &str, target_size: usize, max_size: usize) -> Vec<String> {
    let target_size = target_size.max(1);
    let max_size = max_size.max(target_size);

    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    for sentence in split_sentences(&cleaned) {
        let sentence = sentence.split_whitespace().collect::<Vec<_>>().join(" ");
        if sentence.is_empty() {
            continue;
        }
        if char_len(&sentence) > max_size {
            pieces.extend(split_long(&sentence, target_size));
        } else {
            pieces.push(sentence);
        }
    }

    pack(pieces, target_size)
}

/// Join pieces with single spaces while the result stays within `limit`.
///
/// A piece longer than `limit` is emitted on its own.
fn pack(pieces: Vec<String>, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        if current.is_empty() {
            current = piece;
        } else if char_len(&current) + 1 + char_len(&piece) <= limit {
            current.push(' ');
            current.push_str(&piece);
        } else {
            chunks.push(std::mem::replace(&mut current, piece));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Break a sentence into pieces of at most `limit` characters.
fn split_long(sentence: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    for clause in sentence.split_inclusive(CLAUSE_BREAKS) {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        if char_len(clause) <= limit {
            pieces.push(clause.to_string());
        } else {
            pieces.extend(split_words(clause, limit));
        }
    }
    pack(pieces, limit)
}

fn split_words(text: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    for word in text.split_whitespace() {
        if char_len(word) <= limit {
            pieces.push(word.to_string());
        } else {
            pieces.extend(hard_split(word, limit));
        }
    }
    pack(pieces, limit)
}

fn hard_split(word: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.chunks(limit).map(|part| part.iter().collect()).collect()
}

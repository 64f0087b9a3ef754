//! Sentence boundaries via the seams dialog-aware detector.

use seams::sentence_detector::dialog_detector::SentenceDetectorDialog;
use std::sync::OnceLock;

static DETECTOR: OnceLock<Option<SentenceDetectorDialog>> = OnceLock::new();

fn detector() -> Option<&'static SentenceDetectorDialog> {
    DETECTOR
        .get_or_init(|| match SentenceDetectorDialog::new() {
            Ok(detector) => Some(detector),
            Err(e) => {
                log::warn!("Sentence detector unavailable, splitting on punctuation: {:?}", e);
                None
            }
        })
        .as_ref()
}

/// Split `text` into sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    let detected = detector().and_then(|d| match d.detect_sentences_borrowed(text) {
        Ok(sentences) => Some(
            sentences
                .iter()
                .map(|s| s.normalize())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>(),
        ),
        Err(e) => {
            log::debug!("Sentence detection failed: {:?}", e);
            None
        }
    });

    detected.unwrap_or_else(|| split_on_terminators(text))
}

/// Fallback splitter: break after `.`, `!` or `?` followed by whitespace.
fn split_on_terminators(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().is_none_or(|next| next.is_whitespace());
        if at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

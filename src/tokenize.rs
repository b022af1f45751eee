//! Tokens and sentences.
//!
//! Both chunkers measure text in tokens and the semantic chunker walks
//! sentences, so the two splitters live together.
//!
//! ## Tokens
//!
//! A token is one non-whitespace segment under Unicode word boundaries
//! (UAX #29): a word, a number, or a single punctuation mark. Whitespace is
//! not a token. It is glued onto the preceding token so that token spans tile
//! the text exactly:
//!
//! ```text
//! "  Hello, world. "
//!  [  Hello][,][ world][.][ ]   <- spans, leading ws joins the first token
//!       1    2     3    4       <- count_tokens == 4
//! ```
//!
//! Tiling matters for the naive chunker: decoding a run of tokens is a plain
//! byte slice, and concatenating windows minus their overlap gives back the
//! original text.
//!
//! ## Sentences
//!
//! A sentence ends at a run of `.`, `!` or `?`. This is cruder than UAX #29
//! sentence segmentation ("Dr. Smith" is two sentences here) but it is
//! predictable, which is what boundary scoring needs.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+(?:[.!?]+|$)").expect("static regex"));

/// A sentence with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// Trimmed sentence text, terminal punctuation included.
    pub text: String,
    /// Byte offset of the first non-whitespace character.
    pub start: usize,
    /// Byte offset one past the last non-whitespace character.
    pub end: usize,
}

fn is_blank(segment: &str) -> bool {
    segment.chars().all(char::is_whitespace)
}

/// Count tokens in `text`.
///
/// ```rust
/// use slabscore::tokenize::count_tokens;
///
/// assert_eq!(count_tokens("Hello, world."), 4);
/// assert_eq!(count_tokens("   "), 0);
/// ```
pub fn count_tokens(text: &str) -> usize {
    text.split_word_bounds().filter(|s| !is_blank(s)).count()
}

/// Byte offset of the first character of every token.
pub fn token_starts(text: &str) -> Vec<usize> {
    text.split_word_bound_indices()
        .filter(|(_, s)| !is_blank(s))
        .map(|(offset, _)| offset)
        .collect()
}

/// Byte spans of every token, tiling the text from 0 to `text.len()`.
///
/// Returns an empty vector for whitespace-only input.
pub fn token_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = Vec::new();
    let mut leading: Option<usize> = None;

    for (offset, segment) in text.split_word_bound_indices() {
        let end = offset + segment.len();
        if is_blank(segment) {
            match spans.last_mut() {
                Some(last) => last.end = end,
                None => {
                    leading.get_or_insert(offset);
                }
            }
            continue;
        }
        let start = leading.take().unwrap_or(offset);
        spans.push(start..end);
    }

    spans
}

/// Decode a token window back to text.
///
/// `tokens` is a range of indices into `spans`.
pub fn decode<'a>(text: &'a str, spans: &[Range<usize>], tokens: Range<usize>) -> &'a str {
    if tokens.start >= tokens.end || tokens.end > spans.len() {
        return "";
    }
    &text[spans[tokens.start].start..spans[tokens.end - 1].end]
}

/// Split text into trimmed, non-empty sentences.
///
/// ```rust
/// use slabscore::tokenize::split_sentences;
///
/// let s = split_sentences("One. Two!? Three");
/// let texts: Vec<&str> = s.iter().map(|s| s.text.as_str()).collect();
/// assert_eq!(texts, ["One.", "Two!?", "Three"]);
/// ```
pub fn split_sentences(text: &str) -> Vec<Sentence> {
    SENTENCE
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str();
            let trimmed = raw.trim();
            if trimmed.trim_end_matches(['.', '!', '?']).trim().is_empty() {
                return None;
            }
            let lead = raw.len() - raw.trim_start().len();
            let start = m.start() + lead;
            Some(Sentence {
                text: trimmed.to_string(),
                start,
                end: start + trimmed.len(),
            })
        })
        .collect()
}

/// Lowercased Unicode words, punctuation stripped.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

//! Answer synthesis.
//!
//! A hosted [`Generator`] writes the answer when one is configured. Without
//! one, or when it fails, [`synthesize`] assembles an extractive answer from
//! the retrieved context: the sentences that mention the question's
//! keywords most often, in score order.

use tracing::{debug, warn};

use crate::tokenize::{split_sentences, words};
use crate::Result;

/// Answer returned when there is no context at all.
pub const NO_CONTEXT_ANSWER: &str = "No relevant context found.";

const QUESTION_STOP_WORDS: &[&str] = &[
    "what", "which", "where", "when", "how", "does", "this", "that", "the",
];

const MAX_ANSWER_SENTENCES: usize = 3;
const SHORT_ANSWER_CHARS: usize = 50;

/// Turns a prompt into text.
pub trait Generator: Send + Sync {
    /// Stable identifier for the backend and model.
    fn id(&self) -> &str;

    /// Generate a completion for `prompt`.
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the grounded-answer prompt sent to a [`Generator`].
pub fn prompt(question: &str, contexts: &[String]) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {question}",
        contexts.join("\n\n")
    )
}

/// Answer with `generator` if present, falling back to [`synthesize`].
pub fn answer(question: &str, contexts: &[String], generator: Option<&dyn Generator>) -> String {
    if let Some(generator) = generator {
        if !contexts.is_empty() {
            match generator.generate(&prompt(question, contexts)) {
                Ok(text) => return text,
                Err(e) => {
                    warn!(provider = generator.id(), error = %e, "generation failed, using extractive answer");
                }
            }
        }
    }
    synthesize(question, contexts)
}

/// Question keywords: lowercased words longer than three characters that are
/// not interrogatives or fillers.
pub fn keywords(question: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for w in words(question) {
        if w.chars().count() > 3 && !QUESTION_STOP_WORDS.contains(&w.as_str()) && !out.contains(&w) {
            out.push(w);
        }
    }
    out
}

fn strip_terminal(sentence: &str) -> &str {
    sentence.trim_end_matches(['.', '!', '?']).trim_end()
}

fn join_answer(sentences: &[&str]) -> String {
    let mut out = sentences
        .iter()
        .map(|s| strip_terminal(s))
        .collect::<Vec<_>>()
        .join(". ");
    out.push('.');
    out
}

/// Extractive answer from context sentences.
///
/// Sentences are scored by keyword occurrences and the top three (ties in
/// context order) are joined with periods. A short answer built from fewer
/// than three matches is padded with the fourth-ranked sentence, if any.
///
/// ```rust
/// use slabscore::generate::synthesize;
///
/// let contexts = vec![
///     "Rivers flow downhill. Gradient descent minimizes loss.".to_string(),
/// ];
/// let answer = synthesize("What does gradient descent minimize?", &contexts);
/// assert!(answer.starts_with("Gradient descent minimizes loss."));
/// ```
pub fn synthesize(question: &str, contexts: &[String]) -> String {
    if contexts.is_empty() {
        return NO_CONTEXT_ANSWER.to_string();
    }

    let joined = contexts.join(" ");
    let sentences = split_sentences(&joined);
    let Some(first) = sentences.first() else {
        return NO_CONTEXT_ANSWER.to_string();
    };

    let keywords = keywords(question);
    let mut ranked: Vec<(usize, &str)> = sentences
        .iter()
        .map(|s| {
            let lower = s.text.to_lowercase();
            let score = keywords.iter().map(|k| lower.matches(k.as_str()).count()).sum();
            (score, s.text.as_str())
        })
        .collect();
    // Stable: equal scores keep context order.
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let qualifying = ranked.iter().take_while(|(score, _)| *score > 0).count();
    if qualifying == 0 {
        debug!("no keyword matches, answering with first context sentence");
        return first.text.clone();
    }

    let mut picked: Vec<&str> = ranked
        .iter()
        .take(qualifying.min(MAX_ANSWER_SENTENCES))
        .map(|(_, s)| *s)
        .collect();
    let mut answer = join_answer(&picked);

    if qualifying < MAX_ANSWER_SENTENCES && answer.chars().count() < SHORT_ANSWER_CHARS {
        if let Some((_, fourth)) = ranked.get(MAX_ANSWER_SENTENCES) {
            picked.push(*fourth);
            answer = join_answer(&picked);
        }
    }

    answer
}

//! Documents and test questions.
//!
//! [`TestSetBuilder`] derives questions from the document itself when a
//! request brings none. It is rule-based and deterministic:
//!
//! 1. Definitions: "`X` is a/an/the ..." becomes "What is `X`?"
//! 2. Key facts: sentences that include, provide, allow, enable, define or
//!    flag something as main/key/important become "What can you tell me
//!    about `subject`?"
//! 3. A summary question about the most mentioned capitalized topic.
//! 4. Generic main-topic and key-points questions to fill up.
//!
//! Definitions and facts alternate so that both kinds are represented. The
//! ground truth is always the source sentence (or sentences), so every
//! answer is recoverable from the document.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tokenize::split_sentences;

static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+(?:is|are)\s+(?:a|an|the)\b").expect("static regex")
});
static KEY_FACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:is|are)\s+(?:a|an|the)|consists?\s+of|includes?|defines?|means?|provides?|allows?|enables?|main|primary|key|important|significant)\b",
    )
    .expect("static regex")
});

const PRONOUNS: &[&str] = &["it", "this", "that", "they", "these", "those"];
const SUBJECT_SKIP: &[&str] = &["these", "this", "that", "those", "the"];
const MIN_SENTENCE_WORDS: usize = 6;
const MAX_TERM_WORDS: usize = 4;
const MAX_DEFINITIONS: usize = 10;
const MAX_FACTS: usize = 20;

fn default_id() -> String {
    "user_document".to_string()
}

fn default_title() -> String {
    "Uploaded Document".to_string()
}

fn default_kind() -> String {
    "text/plain".to_string()
}

/// A document to chunk and evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier.
    #[serde(default = "default_id")]
    pub id: String,
    /// Title.
    #[serde(default = "default_title")]
    pub title: String,
    /// Plain text content.
    pub content: String,
    /// MIME type of the original upload.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

impl Document {
    /// A plain-text document.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: default_id(),
            title: title.into(),
            content: content.into(),
            kind: default_kind(),
        }
    }

    /// The built-in "Machine Learning Fundamentals" document.
    ///
    /// About 880 words over eighteen paragraphs, used when no document is
    /// supplied on purpose (the CLI `--sample` flag).
    pub fn sample() -> Self {
        Self {
            id: "ml_fundamentals_doc".to_string(),
            title: "Machine Learning Fundamentals".to_string(),
            content: include_str!("../data/ml_fundamentals.txt").to_string(),
            kind: default_kind(),
        }
    }

    /// `true` when the content is blank.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// A question with its reference answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestQuestion {
    /// The question.
    pub question: String,
    /// The expected answer.
    pub ground_truth: String,
}

impl TestQuestion {
    /// Pair a question with its reference answer.
    pub fn new(question: impl Into<String>, ground_truth: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ground_truth: ground_truth.into(),
        }
    }
}

/// Lowercase the first letter unless the first word looks like an acronym.
fn lower_initial(s: &str) -> String {
    let first_word = s.split_whitespace().next().unwrap_or("");
    if first_word.chars().skip(1).any(char::is_uppercase) {
        return s.to_string();
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn clean_word(word: &str) -> &str {
    word.trim_matches(|c: char| !(c.is_alphanumeric() || c == '-'))
}

fn valid_term(term: &str) -> bool {
    let words = term.split_whitespace().count();
    words > 0 && words <= MAX_TERM_WORDS && !PRONOUNS.contains(&term.to_lowercase().as_str())
}

/// Builds a test set from a document.
///
/// ```rust
/// use slabscore::document::{Document, TestSetBuilder};
///
/// let questions = TestSetBuilder::new(8).build(&Document::sample());
/// assert_eq!(questions.len(), 8);
/// assert_eq!(questions[0].question, "What is machine learning?");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSetBuilder {
    num_questions: usize,
}

impl TestSetBuilder {
    /// A builder producing up to `num_questions` questions.
    pub fn new(num_questions: usize) -> Self {
        Self { num_questions }
    }

    fn definition(sentence: &str) -> Option<TestQuestion> {
        let caps = DEFINITION.captures(sentence)?;
        let term = caps.get(1)?.as_str().trim();
        if !valid_term(term) {
            return None;
        }
        Some(TestQuestion::new(
            format!("What is {}?", lower_initial(term)),
            sentence,
        ))
    }

    fn fact_subject(sentence: &str) -> Option<String> {
        let m = KEY_FACT.find(sentence)?;
        let lead = sentence[..m.start()].trim();
        if valid_term(lead) {
            return Some(lower_initial(lead));
        }

        // Longest capitalized or long word; ties keep sentence order.
        let mut best: Option<&str> = None;
        for word in sentence.split_whitespace().map(clean_word) {
            let important = word.chars().next().is_some_and(char::is_uppercase)
                || word.chars().count() > 6;
            if !important || SUBJECT_SKIP.contains(&word.to_lowercase().as_str()) {
                continue;
            }
            if best.map_or(true, |b| word.chars().count() > b.chars().count()) {
                best = Some(word);
            }
        }
        best.map(str::to_string)
    }

    fn fact(sentence: &str) -> Option<TestQuestion> {
        let question = match Self::fact_subject(sentence) {
            Some(subject) => format!("What can you tell me about {subject}?"),
            None => "What does this document say about this topic?".to_string(),
        };
        Some(TestQuestion::new(question, sentence))
    }

    fn summary(facts: &[&str]) -> Option<TestQuestion> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for fact in facts.iter().take(5) {
            for word in fact.split_whitespace().map(clean_word) {
                if word.chars().count() > 4 && word.chars().next().is_some_and(char::is_uppercase) {
                    let count = counts.entry(word).or_insert(0);
                    if *count == 0 {
                        order.push(word);
                    }
                    *count += 1;
                }
            }
        }

        // Most frequent, ties by first appearance.
        let mut topic: Option<&str> = None;
        for word in order {
            if topic.map_or(true, |t| counts[word] > counts[t]) {
                topic = Some(word);
            }
        }

        let topic = topic?;
        let needle = topic.to_lowercase();
        let related: Vec<&str> = facts
            .iter()
            .filter(|f| f.to_lowercase().contains(&needle))
            .take(3)
            .copied()
            .collect();
        Some(TestQuestion::new(
            format!("Summarize the key points about {topic}."),
            related.join(" "),
        ))
    }

    fn fallbacks(document: &Document, sentences: &[String]) -> Vec<TestQuestion> {
        let opening: String = document.content.trim().chars().take(200).collect();
        let key_points: Vec<&str> = sentences.iter().take(3).map(String::as_str).collect();
        vec![
            TestQuestion::new(
                "What is the main topic of this document?",
                format!("The document discusses {}. {}...", document.title, opening.trim_end()),
            ),
            TestQuestion::new(
                "What are the key points mentioned in this document?",
                format!("The key points include: {}", key_points.join(" ")),
            ),
        ]
    }

    /// Derive up to `num_questions` questions from `document`.
    ///
    /// May return fewer when the document is too short to yield distinct
    /// questions.
    pub fn build(&self, document: &Document) -> Vec<TestQuestion> {
        let all: Vec<String> = split_sentences(&document.content)
            .into_iter()
            .map(|s| s.text)
            .collect();
        let sentences: Vec<&str> = all
            .iter()
            .map(String::as_str)
            .filter(|s| s.split_whitespace().count() >= MIN_SENTENCE_WORDS && !s.ends_with('?'))
            .collect();

        let definitions: Vec<TestQuestion> = sentences
            .iter()
            .filter_map(|s| Self::definition(s))
            .take(MAX_DEFINITIONS)
            .collect();
        let fact_sentences: Vec<&str> = sentences
            .iter()
            .copied()
            .filter(|s| KEY_FACT.is_match(s))
            .take(MAX_FACTS)
            .collect();
        let facts: Vec<TestQuestion> = fact_sentences
            .iter()
            .filter(|s| !definitions.iter().any(|d| d.ground_truth == **s))
            .filter_map(|s| Self::fact(s))
            .collect();

        let mut candidates: Vec<TestQuestion> = Vec::new();
        let mut defs = definitions.into_iter();
        let mut facts = facts.into_iter();
        loop {
            let d = defs.next();
            let f = facts.next();
            if d.is_none() && f.is_none() {
                break;
            }
            candidates.extend(d);
            candidates.extend(f);
        }
        candidates.extend(Self::summary(&fact_sentences));
        candidates.extend(Self::fallbacks(document, &all));

        let mut out: Vec<TestQuestion> = Vec::with_capacity(self.num_questions);
        for candidate in candidates {
            if out.len() == self.num_questions {
                break;
            }
            if candidate.ground_truth.trim().is_empty()
                || out.iter().any(|q| q.question == candidate.question)
            {
                continue;
            }
            out.push(candidate);
        }

        debug!(
            sentences = sentences.len(),
            questions = out.len(),
            "built test set"
        );
        out
    }
}

impl Default for TestSetBuilder {
    fn default() -> Self {
        Self::new(8)
    }
}

//! RAGAS-style answer and retrieval metrics without a judge model.
//!
//! Five scores, each in `[0, 1]`:
//!
//! | Metric | Compares | Heuristic |
//! |--------|----------|-----------|
//! | faithfulness | answer vs context | share of answer statements whose content words appear in the context |
//! | answer_relevancy | answer vs question | embedding cosine, or question-word overlap |
//! | context_precision | context vs question + truth | average precision over relevant positions |
//! | context_recall | context vs truth | share of ground-truth key phrases found in the context |
//! | answer_correctness | answer vs truth | fact F1 blended with embedding cosine |
//!
//! Degenerate inputs never fail. Each metric has a fixed value for them
//! (empty answer, empty context, nothing to check), documented on the
//! method.
//!
//! Word matching is deliberately loose: words are whitespace tokens with
//! edge punctuation trimmed, and "appears in the context" means substring
//! containment in the lowercased, space-joined context.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};
use tracing::{debug, warn};

use crate::embed::{check_batch, cosine_similarity, Embedder};

static STATEMENT_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?;]+").expect("static regex"));
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("static regex"));
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+\b").expect("static regex"));

const STATEMENT_FILLERS: &[&str] = &["this", "that", "these", "those", "with", "from"];
const RELEVANCY_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "what", "how", "why", "when", "where",
];
const PHRASE_STOP_WORDS: &[&str] = &["the", "a", "an", "is", "are"];
const KEY_WORD_FILLERS: &[&str] = &["these", "those", "which", "where"];

const SUPPORT_RATIO: f64 = 0.6;
const RELEVANCE_RATIO: f64 = 0.3;
const KEY_WORDS_PER_TRUTH: usize = 5;
const FACTS_PER_KIND: usize = 10;

/// One of the five RAGAS metrics.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    /// Answer statements supported by the context.
    Faithfulness,
    /// Answer relevance to the question.
    AnswerRelevancy,
    /// Ranking quality of the retrieved context.
    ContextPrecision,
    /// Ground-truth coverage of the retrieved context.
    ContextRecall,
    /// Agreement between answer and ground truth.
    AnswerCorrectness,
}

/// Scores for all five metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricScores {
    /// See [`Metric::Faithfulness`].
    pub faithfulness: f64,
    /// See [`Metric::AnswerRelevancy`].
    pub answer_relevancy: f64,
    /// See [`Metric::ContextPrecision`].
    pub context_precision: f64,
    /// See [`Metric::ContextRecall`].
    pub context_recall: f64,
    /// See [`Metric::AnswerCorrectness`].
    pub answer_correctness: f64,
}

impl MetricScores {
    /// Score for `metric`.
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Faithfulness => self.faithfulness,
            Metric::AnswerRelevancy => self.answer_relevancy,
            Metric::ContextPrecision => self.context_precision,
            Metric::ContextRecall => self.context_recall,
            Metric::AnswerCorrectness => self.answer_correctness,
        }
    }

    fn get_mut(&mut self, metric: Metric) -> &mut f64 {
        match metric {
            Metric::Faithfulness => &mut self.faithfulness,
            Metric::AnswerRelevancy => &mut self.answer_relevancy,
            Metric::ContextPrecision => &mut self.context_precision,
            Metric::ContextRecall => &mut self.context_recall,
            Metric::AnswerCorrectness => &mut self.answer_correctness,
        }
    }

    /// Aggregate score: the mean of the five metrics.
    pub fn ragas_score(&self) -> f64 {
        Metric::iter().map(|m| self.get(m)).sum::<f64>() / Metric::iter().count() as f64
    }

    /// Per-metric arithmetic mean. All zeros for an empty slice.
    pub fn mean_of(scores: &[Self]) -> Self {
        let mut mean = Self::default();
        if scores.is_empty() {
            return mean;
        }
        for metric in Metric::iter() {
            *mean.get_mut(metric) =
                scores.iter().map(|s| s.get(metric)).sum::<f64>() / scores.len() as f64;
        }
        mean
    }
}

/// Parallel per-question records of one evaluated strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagDetails {
    /// Test questions.
    pub questions: Vec<String>,
    /// Answers, one per question.
    pub answers: Vec<String>,
    /// Retrieved contexts, most relevant first, one list per question.
    pub contexts: Vec<Vec<String>>,
    /// Reference answers, one per question.
    pub ground_truths: Vec<String>,
}

impl RagDetails {
    /// Number of complete question records.
    pub fn len(&self) -> usize {
        self.questions
            .len()
            .min(self.answers.len())
            .min(self.contexts.len())
            .min(self.ground_truths.len())
    }

    /// `true` when there are no complete records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whitespace tokens, lowercased, edge punctuation trimmed.
fn terms(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn joined_context(contexts: &[String]) -> String {
    contexts.join(" ").to_lowercase()
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn all_blank(contexts: &[String]) -> bool {
    contexts.iter().all(|c| is_blank(c))
}

/// Clauses of more than three words.
fn statements(answer: &str) -> Vec<&str> {
    STATEMENT_BREAK
        .split(answer)
        .map(str::trim)
        .filter(|s| s.split_whitespace().count() > 3)
        .collect()
}

fn is_supported(statement: &str, context: &str) -> bool {
    let content: Vec<String> = terms(statement)
        .into_iter()
        .filter(|w| char_len(w) > 3 && !STATEMENT_FILLERS.contains(&w.as_str()))
        .collect();
    if content.is_empty() {
        return true;
    }
    let found = content.iter().filter(|w| context.contains(w.as_str())).count();
    found as f64 >= content.len() as f64 * SUPPORT_RATIO
}

fn lexical_relevancy(question: &str, answer: &str) -> f64 {
    let filter = |text: &str| -> HashSet<String> {
        terms(text)
            .into_iter()
            .filter(|w| !RELEVANCY_STOP_WORDS.contains(&w.as_str()))
            .collect()
    };
    let q = filter(question);
    if q.is_empty() {
        return 0.5;
    }
    let a = filter(answer);
    (q.intersection(&a).count() as f64 / q.len() as f64).min(1.0)
}

fn is_relevant(context: &str, key_terms: &HashSet<String>) -> bool {
    let context = context.to_lowercase();
    let matches = key_terms
        .iter()
        .filter(|t| context.contains(t.as_str()))
        .count();
    matches as f64 >= (key_terms.len() as f64 * RELEVANCE_RATIO).max(1.0)
}

fn push_unique(phrases: &mut Vec<String>, phrase: String) -> bool {
    if phrases.contains(&phrase) {
        return false;
    }
    phrases.push(phrase);
    true
}

/// Ground-truth phrases a complete context should mention.
fn key_phrases(ground_truth: &str) -> Vec<String> {
    let mut phrases: Vec<String> = Vec::new();

    for sentence in SENTENCE_BREAK.split(ground_truth) {
        if sentence.split_whitespace().count() <= 3 {
            continue;
        }
        let words = terms(sentence);
        for window in words.windows(3) {
            if window.iter().any(|w| PHRASE_STOP_WORDS.contains(&w.as_str())) {
                continue;
            }
            push_unique(&mut phrases, window.join(" "));
        }
    }

    let mut long: Vec<String> = terms(ground_truth)
        .into_iter()
        .filter(|w| char_len(w) > 5 && !KEY_WORD_FILLERS.contains(&w.as_str()))
        .collect();
    // Stable: equal lengths keep text order.
    long.sort_by_key(|w| std::cmp::Reverse(char_len(w)));
    let mut taken = 0;
    for word in long {
        if taken == KEY_WORDS_PER_TRUTH {
            break;
        }
        if push_unique(&mut phrases, word) {
            taken += 1;
        }
    }

    phrases
}

fn is_covered(phrase: &str, context: &str) -> bool {
    phrase.split(' ').all(|w| context.contains(w))
}

/// Numbers, capitalized words and long words, lowercased.
fn facts(text: &str) -> HashSet<String> {
    let mut out: HashSet<String> = NUMBER
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    out.extend(
        text.split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.chars().next().is_some_and(char::is_uppercase) && char_len(w) > 2)
            .take(FACTS_PER_KIND)
            .map(str::to_lowercase),
    );
    out.extend(
        terms(text)
            .into_iter()
            .filter(|w| char_len(w) > 6)
            .take(FACTS_PER_KIND),
    );
    out
}

fn factual_similarity(answer: &str, ground_truth: &str) -> f64 {
    let answer_facts = facts(answer);
    let truth_facts = facts(ground_truth);

    if truth_facts.is_empty() {
        return if answer_facts.is_empty() { 1.0 } else { 0.5 };
    }
    if answer_facts.is_empty() {
        return 0.0;
    }

    let common = answer_facts.intersection(&truth_facts).count() as f64;
    let precision = common / answer_facts.len() as f64;
    let recall = common / truth_facts.len() as f64;
    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

/// Scores RAG outputs.
///
/// Holds the run's embedding provider, if any. Without one the
/// embedding-backed parts fall back to lexical overlap.
///
/// ```rust
/// use slabscore::ragas::RagasEngine;
///
/// let engine = RagasEngine::new();
/// let contexts = vec!["X is Y and Z.".to_string()];
/// let scores = engine.score_question("What is X?", "X is Y and Z.", &contexts, "X is Y.");
///
/// assert!(scores.faithfulness >= 0.5);
/// assert_eq!(scores.context_recall, 1.0);
/// ```
#[derive(Clone, Default)]
pub struct RagasEngine {
    embedder: Option<Arc<dyn Embedder>>,
}

impl RagasEngine {
    /// An engine without an embedding provider.
    #[must_use]
    pub fn new() -> Self {
        Self { embedder: None }
    }

    /// Use `embedder` for relevancy and correctness.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Cosine of two texts, `None` when there is no provider or it fails.
    fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        let embedder = self.embedder.as_deref()?;
        let vectors = embedder
            .embed(&[a, b])
            .and_then(|v| check_batch(&v, 2).map(|()| v));
        match vectors {
            Ok(v) => Some(f64::from(cosine_similarity(&v[0], &v[1]))),
            Err(e) => {
                warn!(provider = embedder.id(), error = %e, "metric embedding failed, using lexical fallback");
                None
            }
        }
    }

    /// Share of answer statements supported by the context.
    ///
    /// 0.0 for an empty answer or empty context; 1.0 when the answer has no
    /// statement of more than three words.
    pub fn faithfulness(&self, answer: &str, contexts: &[String]) -> f64 {
        if is_blank(answer) || all_blank(contexts) {
            return 0.0;
        }
        let statements = statements(answer);
        if statements.is_empty() {
            return 1.0;
        }
        let context = joined_context(contexts);
        let supported = statements
            .iter()
            .filter(|s| is_supported(s, &context))
            .count();
        supported as f64 / statements.len() as f64
    }

    /// Relevance of the answer to the question.
    ///
    /// Embedding cosine floored at 0. Without embeddings: the share of
    /// question words (stop words removed) that the answer repeats, or 0.5
    /// when the question is nothing but stop words. 0.0 if either is empty.
    pub fn answer_relevancy(&self, question: &str, answer: &str) -> f64 {
        if is_blank(question) || is_blank(answer) {
            return 0.0;
        }
        match self.similarity(question, answer) {
            Some(sim) => sim.clamp(0.0, 1.0),
            None => lexical_relevancy(question, answer),
        }
    }

    /// Average precision of the context ranking.
    ///
    /// A context is relevant when it contains at least 30% (and at least
    /// one) of the words longer than four characters from the question and
    /// ground truth. 0.0 when nothing is relevant or there is no context.
    pub fn context_precision(&self, question: &str, contexts: &[String], ground_truth: &str) -> f64 {
        if contexts.is_empty() {
            return 0.0;
        }
        let key_terms: HashSet<String> = terms(question)
            .into_iter()
            .chain(terms(ground_truth))
            .filter(|w| char_len(w) > 4)
            .collect();

        let mut relevant = 0usize;
        let mut precision_sum = 0.0;
        for (k, context) in contexts.iter().enumerate() {
            if is_relevant(context, &key_terms) {
                relevant += 1;
                precision_sum += relevant as f64 / (k + 1) as f64;
            }
        }

        if relevant == 0 {
            0.0
        } else {
            precision_sum / relevant as f64
        }
    }

    /// Share of ground-truth key phrases found in the context.
    ///
    /// Key phrases are three-word windows from sentences of more than three
    /// words (skipping windows with articles or "is"/"are") plus the five
    /// longest words over five characters. A phrase is found when each of
    /// its words occurs somewhere in the context. 1.0 for an empty ground
    /// truth or one without key phrases; 0.0 for an empty context.
    pub fn context_recall(&self, contexts: &[String], ground_truth: &str) -> f64 {
        if is_blank(ground_truth) {
            return 1.0;
        }
        if all_blank(contexts) {
            return 0.0;
        }
        let phrases = key_phrases(ground_truth);
        if phrases.is_empty() {
            return 1.0;
        }
        let context = joined_context(contexts);
        let covered = phrases.iter().filter(|p| is_covered(p, &context)).count();
        covered as f64 / phrases.len() as f64
    }

    /// Agreement between answer and ground truth.
    ///
    /// `0.5 * fact F1 + 0.5 * embedding cosine`, where the cosine is clamped
    /// to `[0, 1]` and replaced by the fact F1 without embeddings. Facts are
    /// numbers, the first ten capitalized words and the first ten words over
    /// six characters. 0.0 if either text is empty.
    pub fn answer_correctness(&self, answer: &str, ground_truth: &str) -> f64 {
        if is_blank(answer) || is_blank(ground_truth) {
            return 0.0;
        }
        let factual = factual_similarity(answer, ground_truth);
        let semantic = self
            .similarity(answer, ground_truth)
            .map_or(factual, |s| s.clamp(0.0, 1.0));
        0.5 * factual + 0.5 * semantic
    }

    /// All five metrics for one question.
    pub fn score_question(
        &self,
        question: &str,
        answer: &str,
        contexts: &[String],
        ground_truth: &str,
    ) -> MetricScores {
        MetricScores {
            faithfulness: self.faithfulness(answer, contexts),
            answer_relevancy: self.answer_relevancy(question, answer),
            context_precision: self.context_precision(question, contexts, ground_truth),
            context_recall: self.context_recall(contexts, ground_truth),
            answer_correctness: self.answer_correctness(answer, ground_truth),
        }
    }

    /// Score every question and average.
    ///
    /// Returns the mean scores and the per-question scores in question order.
    pub fn score_all(&self, details: &RagDetails) -> (MetricScores, Vec<MetricScores>) {
        let per_question: Vec<MetricScores> = (0..details.len())
            .into_par_iter()
            .map(|i| {
                self.score_question(
                    &details.questions[i],
                    &details.answers[i],
                    &details.contexts[i],
                    &details.ground_truths[i],
                )
            })
            .collect();
        let mean = MetricScores::mean_of(&per_question);
        debug!(
            questions = per_question.len(),
            ragas_score = mean.ragas_score(),
            "ragas scores"
        );
        (mean, per_question)
    }
}

impl std::fmt::Debug for RagasEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagasEngine")
            .field("embedder", &self.embedder.as_ref().map(|e| e.id()))
            .finish()
    }
}

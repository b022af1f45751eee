//! Request in, report out.
//!
//! ```text
//! document ─┬─ FixedChunker ────┬─ quality
//!           │                   └─ retrieve → answer → RAGAS ─┐
//!           └─ SemanticChunker ─┬─ quality                    ├─ compare → report
//!                               └─ retrieve → answer → RAGAS ─┘
//! ```
//!
//! The two strategies run in parallel, and within a strategy every question
//! runs in parallel. Providers are chosen once, in [`Providers::from_config`],
//! and handed to every stage. A provider that cannot be built is logged and
//! left out; a provider call that fails later is recovered by the stage that
//! made it. Only input problems fail a run.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::compare::{compare, ComparisonReport, StrategyScores};
use crate::config::{EmbeddingBackend, EvalConfig, GenerationBackend, ProviderConfig};
use crate::document::{Document, TestQuestion, TestSetBuilder};
use crate::embed::{Embedder, HashEmbedder};
use crate::generate::{answer, Generator};
use crate::quality::ChunkQuality;
use crate::ragas::{MetricScores, RagDetails, RagasEngine};
use crate::retrieve::ChunkIndex;
use crate::tokenize::{count_tokens, split_sentences};
use crate::{Chunker, Error, FixedChunker, Result, SemanticChunker, Slab};

/// The embedding and generation backends of one run.
#[derive(Clone, Default)]
pub struct Providers {
    /// Embedding provider, if any.
    pub embedder: Option<Arc<dyn Embedder>>,
    /// Generation provider, if any.
    pub generator: Option<Arc<dyn Generator>>,
}

#[cfg(feature = "openai")]
fn hosted_client(config: &ProviderConfig) -> Option<crate::openai::OpenAiClient> {
    let key = config
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|k| !k.trim().is_empty());
    let Some(key) = key else {
        warn!("no API key configured, hosted providers disabled");
        return None;
    };
    crate::openai::OpenAiClient::new(
        key,
        config.base_url.as_deref(),
        std::time::Duration::from_secs(config.timeout_secs),
    )
    .map_err(|e| warn!(error = %e, "hosted client unavailable"))
    .ok()
}

impl Providers {
    /// No providers: every stage uses its offline fallback.
    pub fn offline() -> Self {
        Self::default()
    }

    /// Build the providers named in `config`.
    ///
    /// A backend that is not compiled in, lacks credentials, or fails to
    /// initialise is replaced by "none" with a warning.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let embedder: Option<Arc<dyn Embedder>> = match config.embedding {
            EmbeddingBackend::None => None,
            EmbeddingBackend::Hash => Some(Arc::new(HashEmbedder::new(config.hash_dim))),
            EmbeddingBackend::Local => Self::local_embedder(),
            EmbeddingBackend::OpenAi => Self::hosted_embedder(config),
        };
        let generator: Option<Arc<dyn Generator>> = match config.generation {
            GenerationBackend::None => None,
            GenerationBackend::OpenAi => Self::hosted_generator(config),
        };

        info!(
            embedder = embedder.as_ref().map_or("none", |e| e.id()),
            generator = generator.as_ref().map_or("none", |g| g.id()),
            "providers selected"
        );
        Self {
            embedder,
            generator,
        }
    }

    #[cfg(feature = "local")]
    fn local_embedder() -> Option<Arc<dyn Embedder>> {
        match crate::embed::FastEmbedder::new() {
            Ok(e) => Some(Arc::new(e)),
            Err(e) => {
                warn!(error = %e, "local embedder unavailable");
                None
            }
        }
    }

    #[cfg(not(feature = "local"))]
    fn local_embedder() -> Option<Arc<dyn Embedder>> {
        warn!("built without the `local` feature, no embedder");
        None
    }

    #[cfg(feature = "openai")]
    fn hosted_embedder(config: &ProviderConfig) -> Option<Arc<dyn Embedder>> {
        let client = hosted_client(config)?;
        Some(Arc::new(crate::openai::OpenAiEmbedder::new(
            client,
            config.embedding_model.clone(),
        )))
    }

    #[cfg(not(feature = "openai"))]
    fn hosted_embedder(_config: &ProviderConfig) -> Option<Arc<dyn Embedder>> {
        warn!("built without the `openai` feature, no embedder");
        None
    }

    #[cfg(feature = "openai")]
    fn hosted_generator(config: &ProviderConfig) -> Option<Arc<dyn Generator>> {
        let client = hosted_client(config)?;
        Some(Arc::new(crate::openai::OpenAiGenerator::new(
            client,
            config.generation_model.clone(),
        )))
    }

    #[cfg(not(feature = "openai"))]
    fn hosted_generator(_config: &ProviderConfig) -> Option<Arc<dyn Generator>> {
        warn!("built without the `openai` feature, extractive answers only");
        None
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("embedder", &self.embedder.as_ref().map(|e| e.id()))
            .field("generator", &self.generator.as_ref().map(|g| g.id()))
            .finish()
    }
}

/// Chunking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Fixed-size token windows.
    Naive,
    /// Similarity-driven sentence groups.
    Semantic,
}

/// Parameters a strategy ran with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyInfo {
    /// [`FixedChunker`] parameters.
    Naive {
        /// Window size in tokens.
        chunk_size: usize,
        /// Window overlap in tokens.
        overlap: usize,
    },
    /// [`SemanticChunker`] parameters.
    Semantic {
        /// Merge threshold.
        similarity_threshold: f32,
        /// Chunk ceiling in tokens.
        max_tokens: usize,
        /// Chunk floor in tokens.
        min_tokens: usize,
        /// Sentence embedder id.
        embedder: String,
    },
}

/// Everything measured for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Which strategy.
    pub strategy: Strategy,
    /// Mean RAGAS scores.
    pub ragas: MetricScores,
    /// Mean of `ragas`.
    pub ragas_score: f64,
    /// Chunk-set statistics.
    pub chunking_quality: ChunkQuality,
    /// Questions, answers, contexts and ground truths.
    pub rag_details: RagDetails,
    /// RAGAS scores per question.
    pub per_question: Vec<MetricScores>,
    /// The chunks.
    pub chunks: Vec<Slab>,
    /// Strategy parameters.
    pub strategy_info: StrategyInfo,
}

impl EvaluationResult {
    /// The scores a comparison reads.
    pub fn scores(&self) -> StrategyScores {
        StrategyScores {
            ragas: self.ragas,
            quality: self.chunking_quality,
        }
    }
}

/// Size of the evaluated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Title.
    pub title: String,
    /// Tokens in the content.
    pub total_tokens: usize,
    /// Sentences in the content.
    pub total_sentences: usize,
}

/// One evaluation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// The document.
    pub document: Document,
    /// Partial config merged over the evaluator's.
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    /// Test questions; derived from the document when absent.
    #[serde(default)]
    pub test_set: Option<Vec<TestQuestion>>,
}

impl EvaluationRequest {
    /// A request for `document` with default settings.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            config: None,
            test_set: None,
        }
    }

    /// Use `test_set` instead of a derived one.
    #[must_use]
    pub fn with_test_set(mut self, test_set: Vec<TestQuestion>) -> Self {
        self.test_set = Some(test_set);
        self
    }

    /// Merge `config` over the evaluator's settings.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }
}

/// The response to an [`EvaluationRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Naive strategy results.
    pub naive_result: EvaluationResult,
    /// Semantic strategy results.
    pub semantic_result: EvaluationResult,
    /// Comparison of the two.
    pub comparison: ComparisonReport,
    /// Document size.
    pub document_info: DocumentInfo,
}

/// Runs evaluations.
///
/// ```rust
/// use slabscore::config::EvalConfig;
/// use slabscore::document::Document;
/// use slabscore::pipeline::{EvaluationRequest, Evaluator, Providers};
///
/// let evaluator = Evaluator::new(EvalConfig::default(), Providers::offline());
/// let report = evaluator.run(&EvaluationRequest::new(Document::sample())).unwrap();
///
/// assert_eq!(report.naive_result.rag_details.questions.len(), 8);
/// assert!(report.comparison.summary.total_metrics == 5);
/// ```
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: EvalConfig,
    providers: Providers,
}

struct RunContext<'a> {
    document: &'a Document,
    test_set: &'a [TestQuestion],
    config: &'a EvalConfig,
    providers: &'a Providers,
}

impl Evaluator {
    /// An evaluator with explicit providers.
    pub fn new(config: EvalConfig, providers: Providers) -> Self {
        Self { config, providers }
    }

    /// An evaluator whose providers are built from `config`.
    pub fn from_config(config: EvalConfig) -> Self {
        let providers = Providers::from_config(&config.providers);
        Self { config, providers }
    }

    /// Base configuration.
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate both strategies on the request's document and compare them.
    ///
    /// # Errors
    ///
    /// Input errors only: an empty document, a test set smaller than
    /// `min_test_questions`, or invalid config overrides.
    pub fn run(&self, request: &EvaluationRequest) -> Result<EvaluationReport> {
        let config = match &request.config {
            Some(overrides) => self.config.merged(overrides)?,
            None => self.config.clone(),
        };
        let rebuilt;
        let providers = if config.providers == self.config.providers {
            &self.providers
        } else {
            rebuilt = Providers::from_config(&config.providers);
            &rebuilt
        };

        let document = &request.document;
        if document.is_empty() {
            return Err(Error::EmptyDocument);
        }

        let test_set = match &request.test_set {
            Some(questions) => questions.clone(),
            None => TestSetBuilder::new(config.num_questions).build(document),
        };
        if test_set.len() < config.min_test_questions {
            return Err(Error::TooFewQuestions {
                found: test_set.len(),
                required: config.min_test_questions,
            });
        }

        let naive = FixedChunker::try_new(config.chunk_size, config.overlap)?;
        let mut semantic = SemanticChunker::try_new(config.similarity_threshold, config.capacity()?)?;
        if let Some(embedder) = &providers.embedder {
            semantic = semantic.with_embedder(Arc::clone(embedder));
        }

        info!(
            title = %document.title,
            questions = test_set.len(),
            "evaluation started"
        );

        let ctx = RunContext {
            document,
            test_set: &test_set,
            config: &config,
            providers,
        };
        let naive_info = StrategyInfo::Naive {
            chunk_size: config.chunk_size,
            overlap: config.overlap,
        };
        let semantic_info = StrategyInfo::Semantic {
            similarity_threshold: config.similarity_threshold,
            max_tokens: config.max_tokens,
            min_tokens: config.min_tokens,
            embedder: providers
                .embedder
                .as_ref()
                .map_or_else(|| HashEmbedder::new(config.providers.hash_dim).id().to_string(), |e| e.id().to_string()),
        };

        let (naive_result, semantic_result) = rayon::join(
            || evaluate_strategy(&ctx, Strategy::Naive, &naive, naive_info),
            || evaluate_strategy(&ctx, Strategy::Semantic, &semantic, semantic_info),
        );

        let comparison = compare(&naive_result, &semantic_result, &config.compare_options());
        let document_info = DocumentInfo {
            title: document.title.clone(),
            total_tokens: count_tokens(&document.content),
            total_sentences: split_sentences(&document.content).len(),
        };

        info!(
            naive_score = naive_result.ragas_score,
            semantic_score = semantic_result.ragas_score,
            overall_improvement = comparison.summary.overall_improvement,
            verdict = %comparison.summary.verdict,
            "evaluation finished"
        );

        Ok(EvaluationReport {
            naive_result,
            semantic_result,
            comparison,
            document_info,
        })
    }
}

fn evaluate_strategy(
    ctx: &RunContext<'_>,
    strategy: Strategy,
    chunker: &dyn Chunker,
    strategy_info: StrategyInfo,
) -> EvaluationResult {
    let chunks = chunker.chunk(&ctx.document.content);
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let embedder = ctx.providers.embedder.as_deref();
    let generator = ctx.providers.generator.as_deref();
    let index = ChunkIndex::build(&texts, embedder);

    let answered: Vec<(Vec<String>, String)> = ctx
        .test_set
        .par_iter()
        .map(|q| {
            let contexts = index.retrieve(&q.question, ctx.config.top_k);
            let answer = answer(&q.question, &contexts, generator);
            (contexts, answer)
        })
        .collect();

    let (contexts, answers): (Vec<_>, Vec<_>) = answered.into_iter().unzip();
    let rag_details = RagDetails {
        questions: ctx.test_set.iter().map(|q| q.question.clone()).collect(),
        answers,
        contexts,
        ground_truths: ctx.test_set.iter().map(|q| q.ground_truth.clone()).collect(),
    };

    let mut engine = RagasEngine::new();
    if let Some(embedder) = &ctx.providers.embedder {
        engine = engine.with_embedder(Arc::clone(embedder));
    }
    let (ragas, per_question) = engine.score_all(&rag_details);
    let chunking_quality = ChunkQuality::measure(&ctx.document.content, &chunks, embedder);

    info!(
        ?strategy,
        chunks = chunks.len(),
        ragas_score = ragas.ragas_score(),
        "strategy evaluated"
    );

    EvaluationResult {
        strategy,
        ragas,
        ragas_score: ragas.ragas_score(),
        chunking_quality,
        rag_details,
        per_question,
        chunks,
        strategy_info,
    }
}

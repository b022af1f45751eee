//! Naive vs semantic comparison.
//!
//! Percent improvements for every RAGAS and chunk-quality metric, a t-test
//! per RAGAS metric, and a recommendation.
//!
//! ## Significance is simulated
//!
//! A single evaluation yields one mean per metric, not a distribution. The
//! t-tests run on pseudo-samples drawn around that mean
//! (`Normal(mean, max(0.1 * mean, 0.01))`, clamped to `[0, 1]`) from a
//! seeded generator. The p-values illustrate how large a difference is
//! relative to a 10% spread; they are not evidence from repeated runs.
//! The seed makes them reproducible.
//!
//! ## Recommendation
//!
//! | overall improvement | significant positive metrics | verdict |
//! |---|---|---|
//! | > 10% | ≥ 3 | strong |
//! | > 5% | ≥ 2 | moderate |
//! | > 0% | ≥ 1 | weak |
//! | > -5% | any | neutral |
//! | otherwise | any | not recommended |

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::debug;

use crate::pipeline::EvaluationResult;
use crate::quality::ChunkQuality;
use crate::ragas::{Metric, MetricScores};

const ALPHA: f64 = 0.05;
const STD_RATIO: f64 = 0.1;
const MIN_STD: f64 = 0.01;

/// Which way a quality metric should move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Larger is better.
    Higher,
    /// Smaller is better; the reported improvement is sign-inverted.
    Lower,
    /// No preferred direction; reported as the raw change.
    Neutral,
}

/// A chunk-set statistic from [`ChunkQuality`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QualityMetric {
    /// [`ChunkQuality::chunk_count`]
    ChunkCount,
    /// [`ChunkQuality::avg_length`]
    AvgLength,
    /// [`ChunkQuality::length_std`]
    LengthStd,
    /// [`ChunkQuality::avg_coherence`]
    AvgCoherence,
    /// [`ChunkQuality::coherence_std`]
    CoherenceStd,
    /// [`ChunkQuality::coverage_ratio`]
    CoverageRatio,
}

impl QualityMetric {
    /// Preferred direction of change.
    pub fn direction(self) -> Direction {
        match self {
            Self::ChunkCount | Self::AvgLength => Direction::Neutral,
            Self::LengthStd | Self::CoherenceStd => Direction::Lower,
            Self::AvgCoherence | Self::CoverageRatio => Direction::Higher,
        }
    }

    /// Value of this statistic in `quality`.
    pub fn value(self, quality: &ChunkQuality) -> f64 {
        match self {
            Self::ChunkCount => quality.chunk_count as f64,
            Self::AvgLength => quality.avg_length,
            Self::LengthStd => quality.length_std,
            Self::AvgCoherence => quality.avg_coherence,
            Self::CoherenceStd => quality.coherence_std,
            Self::CoverageRatio => quality.coverage_ratio,
        }
    }
}

/// Two-sample t-test on one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignificanceTest {
    /// Pooled-variance t statistic (semantic minus naive).
    pub t_statistic: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// `p_value < 0.05`.
    pub significant: bool,
    /// Cohen's d.
    pub effect_size: f64,
    /// 95% confidence interval for the mean difference.
    pub confidence_interval: [f64; 2],
}

/// Strength of the adoption recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Verdict {
    /// Adopt semantic chunking.
    Strong,
    /// Consider adopting.
    Moderate,
    /// Evaluate case by case.
    Weak,
    /// No meaningful difference.
    Neutral,
    /// Naive chunking did better.
    NotRecommended,
}

impl Verdict {
    /// Pick a verdict from the mean RAGAS improvement and the number of
    /// significant positive metrics.
    pub fn from_results(overall_improvement: f64, significant: usize) -> Self {
        if overall_improvement > 10.0 && significant >= 3 {
            Self::Strong
        } else if overall_improvement > 5.0 && significant >= 2 {
            Self::Moderate
        } else if overall_improvement > 0.0 && significant >= 1 {
            Self::Weak
        } else if overall_improvement > -5.0 {
            Self::Neutral
        } else {
            Self::NotRecommended
        }
    }

    /// Human-readable recommendation.
    pub fn message(self) -> &'static str {
        match self {
            Self::Strong => "Strong recommendation: Semantic chunking shows significant improvements across multiple metrics. Adopt semantic chunking for production use.",
            Self::Moderate => "Moderate recommendation: Semantic chunking shows meaningful improvements in key metrics. Consider adopting with further validation.",
            Self::Weak => "Weak recommendation: Semantic chunking shows some improvements but benefits are limited. Evaluate based on specific use case requirements.",
            Self::Neutral => "Neutral: Both chunking strategies perform similarly. Choice may depend on computational resources and specific requirements.",
            Self::NotRecommended => "Not recommended: Naive chunking appears to perform better for this dataset. Consider optimizing semantic chunking parameters.",
        }
    }
}

/// How many of the tests came out significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    /// At least 80% significant.
    #[serde(rename = "Very High")]
    VeryHigh,
    /// At least 60%.
    High,
    /// At least 40%.
    Moderate,
    /// At least 20%.
    Low,
    /// Below 20%.
    #[serde(rename = "Very Low")]
    VeryLow,
    /// No tests were run.
    #[serde(rename = "No data")]
    NoData,
}

impl ConfidenceLevel {
    /// Band for `significant` out of `total` tests.
    pub fn from_counts(significant: usize, total: usize) -> Self {
        if total == 0 {
            return Self::NoData;
        }
        let ratio = significant as f64 / total as f64;
        if ratio >= 0.8 {
            Self::VeryHigh
        } else if ratio >= 0.6 {
            Self::High
        } else if ratio >= 0.4 {
            Self::Moderate
        } else if ratio >= 0.2 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }
}

/// A metric and its percent improvement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricImprovement {
    /// The metric.
    pub metric: Metric,
    /// Percent improvement of semantic over naive.
    pub improvement: f64,
}

/// Headline numbers of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Mean of the RAGAS percent improvements.
    pub overall_improvement: f64,
    /// Metrics with a significant test and a positive improvement.
    pub significant_metrics: Vec<Metric>,
    /// `significant_metrics.len()`.
    pub significant_count: usize,
    /// Number of RAGAS metrics compared.
    pub total_metrics: usize,
    /// Largest improvement.
    pub best_improvement: Option<MetricImprovement>,
    /// Smallest improvement.
    pub worst_improvement: Option<MetricImprovement>,
    /// Recommendation text.
    pub recommendation: String,
    /// Recommendation strength.
    pub verdict: Verdict,
    /// Share of significant tests, as a band.
    pub confidence_level: ConfidenceLevel,
}

/// Full comparison of two strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Percent improvement per RAGAS metric.
    pub ragas_improvements: BTreeMap<Metric, f64>,
    /// Direction-adjusted percent improvement per quality metric.
    pub quality_improvements: BTreeMap<QualityMetric, f64>,
    /// t-test per RAGAS metric.
    pub significance_tests: BTreeMap<Metric, SignificanceTest>,
    /// Headline numbers and recommendation.
    pub summary: Summary,
}

/// Parameters of the simulated significance tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareOptions {
    /// Pseudo-samples per metric per strategy.
    pub samples: usize,
    /// Seed for the sample generator.
    pub seed: u64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            samples: 30,
            seed: 42,
        }
    }
}

/// The scores of one strategy that a comparison reads.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StrategyScores {
    /// Mean RAGAS scores.
    pub ragas: MetricScores,
    /// Chunk-set statistics.
    pub quality: ChunkQuality,
}

/// Percent change from `naive` to `semantic`.
///
/// When `naive` is zero there is no base: 100 if `semantic` is positive,
/// otherwise 0.
pub fn percent_improvement(naive: f64, semantic: f64) -> f64 {
    if naive == 0.0 {
        if semantic > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (semantic - naive) / naive * 100.0
    }
}

fn quality_improvement(metric: QualityMetric, naive: f64, semantic: f64) -> f64 {
    if naive == 0.0 {
        return 0.0;
    }
    let raw = (semantic - naive) / naive * 100.0;
    match metric.direction() {
        Direction::Lower => -raw,
        Direction::Higher | Direction::Neutral => raw,
    }
}

/// Draw `n` pseudo-measurements around `mean`.
pub fn simulate_samples(mean: f64, n: usize, rng: &mut StdRng) -> Vec<f64> {
    let std = (mean * STD_RATIO).max(MIN_STD);
    match Normal::new(mean, std) {
        Ok(normal) => (0..n)
            .map(|_| normal.sample(rng).clamp(0.0, 1.0))
            .collect(),
        Err(_) => vec![mean.clamp(0.0, 1.0); n],
    }
}

fn mean_var(samples: &[f64]) -> (f64, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var)
}

/// Pooled two-sample t-test of `semantic` against `naive`.
///
/// With fewer than two samples on either side, or zero variance, the test
/// is inconclusive: `t = 0`, `p = 1`.
pub fn t_test(naive: &[f64], semantic: &[f64]) -> SignificanceTest {
    let inconclusive = |diff: f64| SignificanceTest {
        t_statistic: 0.0,
        p_value: 1.0,
        significant: false,
        effect_size: 0.0,
        confidence_interval: [diff, diff],
    };
    if naive.len() < 2 || semantic.len() < 2 {
        return inconclusive(0.0);
    }

    let (n1, n2) = (naive.len() as f64, semantic.len() as f64);
    let (m1, v1) = mean_var(naive);
    let (m2, v2) = mean_var(semantic);
    let diff = m2 - m1;
    let df = n1 + n2 - 2.0;
    let pooled_std = (((n1 - 1.0) * v1 + (n2 - 1.0) * v2) / df).sqrt();
    let se = pooled_std * (1.0 / n1 + 1.0 / n2).sqrt();

    let Ok(dist) = StudentsT::new(0.0, 1.0, df) else {
        return inconclusive(diff);
    };
    if se == 0.0 || !se.is_finite() {
        return inconclusive(diff);
    }

    let t = diff / se;
    let p = (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0);
    let margin = dist.inverse_cdf(0.975) * se;

    SignificanceTest {
        t_statistic: t,
        p_value: p,
        significant: p < ALPHA,
        effect_size: diff / pooled_std,
        confidence_interval: [diff - margin, diff + margin],
    }
}

/// Compare two strategies' scores.
///
/// ```rust
/// use slabscore::compare::{compare_scores, CompareOptions, StrategyScores, Verdict};
///
/// let x = StrategyScores::default();
/// let report = compare_scores(&x, &x, &CompareOptions::default());
/// assert!(report.ragas_improvements.values().all(|&v| v == 0.0));
/// assert_eq!(report.summary.verdict, Verdict::Neutral);
/// ```
pub fn compare_scores(
    naive: &StrategyScores,
    semantic: &StrategyScores,
    options: &CompareOptions,
) -> ComparisonReport {
    let ragas_improvements: BTreeMap<Metric, f64> = Metric::iter()
        .map(|m| (m, percent_improvement(naive.ragas.get(m), semantic.ragas.get(m))))
        .collect();

    let quality_improvements: BTreeMap<QualityMetric, f64> = QualityMetric::iter()
        .map(|m| {
            (
                m,
                quality_improvement(m, m.value(&naive.quality), m.value(&semantic.quality)),
            )
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(options.seed);
    let significance_tests: BTreeMap<Metric, SignificanceTest> = Metric::iter()
        .map(|m| {
            let a = simulate_samples(naive.ragas.get(m), options.samples, &mut rng);
            let b = simulate_samples(semantic.ragas.get(m), options.samples, &mut rng);
            (m, t_test(&a, &b))
        })
        .collect();

    let summary = summarize(&ragas_improvements, &significance_tests);
    debug!(
        overall = summary.overall_improvement,
        significant = summary.significant_count,
        verdict = %summary.verdict,
        "comparison"
    );

    ComparisonReport {
        ragas_improvements,
        quality_improvements,
        significance_tests,
        summary,
    }
}

/// Compare two evaluated strategies.
pub fn compare(
    naive: &EvaluationResult,
    semantic: &EvaluationResult,
    options: &CompareOptions,
) -> ComparisonReport {
    compare_scores(&naive.scores(), &semantic.scores(), options)
}

fn summarize(
    improvements: &BTreeMap<Metric, f64>,
    tests: &BTreeMap<Metric, SignificanceTest>,
) -> Summary {
    let overall_improvement = if improvements.is_empty() {
        0.0
    } else {
        improvements.values().sum::<f64>() / improvements.len() as f64
    };

    let significant_metrics: Vec<Metric> = tests
        .iter()
        .filter(|(m, t)| t.significant && improvements.get(*m).is_some_and(|&v| v > 0.0))
        .map(|(m, _)| *m)
        .collect();

    let mut best: Option<MetricImprovement> = None;
    let mut worst: Option<MetricImprovement> = None;
    for (&metric, &improvement) in improvements {
        let entry = MetricImprovement {
            metric,
            improvement,
        };
        if best.map_or(true, |b| improvement > b.improvement) {
            best = Some(entry);
        }
        if worst.map_or(true, |w| improvement < w.improvement) {
            worst = Some(entry);
        }
    }

    let verdict = Verdict::from_results(overall_improvement, significant_metrics.len());
    let significant_tests = tests.values().filter(|t| t.significant).count();

    Summary {
        overall_improvement,
        significant_count: significant_metrics.len(),
        significant_metrics,
        total_metrics: improvements.len(),
        best_improvement: best,
        worst_improvement: worst,
        recommendation: verdict.message().to_string(),
        verdict,
        confidence_level: ConfidenceLevel::from_counts(significant_tests, tests.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(score: f64) -> MetricScores {
        MetricScores {
            faithfulness: score,
            answer_relevancy: score,
            context_precision: score,
            context_recall: score,
            answer_correctness: score,
        }
    }

    fn scores(ragas: f64) -> StrategyScores {
        StrategyScores {
            ragas: uniform(ragas),
            quality: ChunkQuality {
                chunk_count: 10,
                avg_length: 100.0,
                length_std: 20.0,
                avg_coherence: 0.5,
                coherence_std: 0.1,
                coverage_ratio: 1.0,
            },
        }
    }

    #[test]
    fn test_percent_improvement() {
        assert!((percent_improvement(0.5, 0.6) - 20.0).abs() < 1e-9);
        assert!((percent_improvement(0.5, 0.4) + 20.0).abs() < 1e-9);
        assert_eq!(percent_improvement(0.0, 0.3), 100.0);
        assert_eq!(percent_improvement(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_quality_direction() {
        assert!((quality_improvement(QualityMetric::LengthStd, 20.0, 10.0) - 50.0).abs() < 1e-9);
        assert!((quality_improvement(QualityMetric::AvgCoherence, 0.5, 0.6) - 20.0).abs() < 1e-9);
        assert!((quality_improvement(QualityMetric::ChunkCount, 10.0, 5.0) + 50.0).abs() < 1e-9);
        assert_eq!(quality_improvement(QualityMetric::CoverageRatio, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_identical_inputs_are_neutral() {
        let x = scores(0.6);
        let report = compare_scores(&x, &x, &CompareOptions::default());
        assert!(report.ragas_improvements.values().all(|&v| v == 0.0));
        assert!(report.quality_improvements.values().all(|&v| v == 0.0));
        assert_eq!(report.summary.verdict, Verdict::Neutral);
        assert!(report.summary.significant_metrics.is_empty());
        assert_eq!(report.summary.total_metrics, 5);
    }

    #[test]
    fn test_large_gain_is_strong() {
        let report = compare_scores(&scores(0.4), &scores(0.8), &CompareOptions::default());
        assert!((report.summary.overall_improvement - 100.0).abs() < 1e-9);
        assert_eq!(report.summary.significant_count, 5);
        assert_eq!(report.summary.verdict, Verdict::Strong);
        assert_eq!(report.summary.confidence_level, ConfidenceLevel::VeryHigh);
        assert!(report.summary.recommendation.starts_with("Strong recommendation"));
    }

    #[test]
    fn test_large_loss_not_recommended() {
        let report = compare_scores(&scores(0.8), &scores(0.4), &CompareOptions::default());
        assert_eq!(report.summary.verdict, Verdict::NotRecommended);
        // Significant, but negative: not counted.
        assert_eq!(report.summary.significant_count, 0);
    }

    #[test]
    fn test_seed_reproducible() {
        let opts = CompareOptions { samples: 30, seed: 7 };
        let a = compare_scores(&scores(0.5), &scores(0.55), &opts);
        let b = compare_scores(&scores(0.5), &scores(0.55), &opts);
        assert_eq!(a, b);
    }

    #[test]
    fn test_t_test_degenerate() {
        let flat = vec![0.5; 10];
        let t = t_test(&flat, &flat);
        assert_eq!(t.t_statistic, 0.0);
        assert_eq!(t.p_value, 1.0);
        assert!(!t.significant);
        assert_eq!(t_test(&[0.1], &[0.2, 0.3]).p_value, 1.0);
    }

    #[test]
    fn test_t_test_known_values() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [6.0, 7.0, 8.0, 9.0, 10.0];
        let t = t_test(&a, &b);
        // diff = 5, pooled var = 2.5, se = 1.0
        assert!((t.t_statistic - 5.0).abs() < 1e-9);
        assert!(t.significant);
        assert!(t.p_value < 0.01);
        assert!(t.confidence_interval[0] < 5.0 && t.confidence_interval[1] > 5.0);
        assert!((t.effect_size - 5.0 / 2.5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_samples_clamped() {
        let mut rng = StdRng::seed_from_u64(1);
        let samples = simulate_samples(0.99, 200, &mut rng);
        assert_eq!(samples.len(), 200);
        assert!(samples.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(ConfidenceLevel::from_counts(0, 0), ConfidenceLevel::NoData);
        assert_eq!(ConfidenceLevel::from_counts(4, 5), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_counts(3, 5), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_counts(2, 5), ConfidenceLevel::Moderate);
        assert_eq!(ConfidenceLevel::from_counts(1, 5), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_counts(0, 5), ConfidenceLevel::VeryLow);
        assert_eq!(
            serde_json::to_string(&ConfidenceLevel::VeryHigh).unwrap(),
            "\"Very High\""
        );
    }

    #[test]
    fn test_verdict_table() {
        assert_eq!(Verdict::from_results(12.0, 3), Verdict::Strong);
        assert_eq!(Verdict::from_results(12.0, 2), Verdict::Moderate);
        assert_eq!(Verdict::from_results(3.0, 1), Verdict::Weak);
        assert_eq!(Verdict::from_results(3.0, 0), Verdict::Neutral);
        assert_eq!(Verdict::from_results(-5.0, 0), Verdict::NotRecommended);
    }

    #[test]
    fn test_best_and_worst() {
        let naive = scores(0.5);
        let mut semantic = scores(0.5);
        semantic.ragas.faithfulness = 0.75;
        semantic.ragas.context_recall = 0.25;
        let report = compare_scores(&naive, &semantic, &CompareOptions::default());
        assert_eq!(report.summary.best_improvement.map(|b| b.metric), Some(Metric::Faithfulness));
        assert_eq!(report.summary.worst_improvement.map(|w| w.metric), Some(Metric::ContextRecall));
    }
}

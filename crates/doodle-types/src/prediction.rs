//! Classifier output types.

use serde::{Deserialize, Serialize};

/// Maximum number of ranked results kept in a [`StagedPrediction`].
pub const TOP_K: usize = 5;

/// A single label with its classifier confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Classifier label.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub score: f64,
}

impl PredictionResult {
    /// Create a prediction result.
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// The most recent ranked classifier output.
///
/// Holds at most [`TOP_K`] results ordered by non-increasing score. The
/// only constructor is [`StagedPrediction::rank`], so every value of this
/// type satisfies the ordering and length bound. A staged prediction is
/// never mutated; a newer inference replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StagedPrediction {
    results: Vec<PredictionResult>,
}

impl StagedPrediction {
    /// Rank raw classifier output.
    ///
    /// Results with a non-finite score are dropped, scores are clamped
    /// into `[0, 1]`, the rest are sorted by descending score and the
    /// list is cut to [`TOP_K`] entries. Ties keep the classifier's order.
    pub fn rank(raw: Vec<PredictionResult>) -> Self {
        let mut results: Vec<PredictionResult> = raw
            .into_iter()
            .filter(|r| r.score.is_finite())
            .map(|r| PredictionResult {
                score: r.score.clamp(0.0, 1.0),
                ..r
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(TOP_K);
        Self { results }
    }

    /// The ranked results, best first.
    pub fn results(&self) -> &[PredictionResult] {
        &self.results
    }

    /// The best result, if any.
    pub fn top1(&self) -> Option<&PredictionResult> {
        self.results.first()
    }

    /// Number of ranked results.
    pub const fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no result survived ranking.
    pub const fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

//! Classifier trait and a fixed-ranking implementation.
//!
//! The scheduler hands the latest canvas bytes to a [`Classifier`] and
//! ranks whatever comes back. How labels are produced is up to the
//! implementation. [`MockClassifier`] returns the same ranking for every
//! image, which lets the whole pipeline run without a model.

use doodle_types::PredictionResult;

/// Errors a classifier can report.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The image could not be decoded or preprocessed.
    #[error("cannot read image: {message}")]
    InvalidImage {
        /// Description of the problem.
        message: String,
    },

    /// Inference itself failed.
    #[error("inference failed: {message}")]
    Inference {
        /// Description of the failure.
        message: String,
    },
}

/// Turns image bytes into labels with confidence scores.
///
/// Implementations may return results in any order and any number; the
/// caller ranks and truncates them.
pub trait Classifier: Send + Sync {
    /// Classify one encoded image.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError`] if the image cannot be classified.
    fn infer(&self, image: &[u8]) -> Result<Vec<PredictionResult>, ClassifierError>;
}

/// A classifier that always returns the same ranking.
#[derive(Debug, Clone)]
pub struct MockClassifier {
    results: Vec<PredictionResult>,
}

impl MockClassifier {
    /// Create a mock that returns `results` for every image.
    pub const fn new(results: Vec<PredictionResult>) -> Self {
        Self { results }
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new(vec![
            PredictionResult::new("alice_margatroid", 0.9),
            PredictionResult::new("konpaku_youmu", 0.05),
            PredictionResult::new("tamatsukuri_misumaru", 0.03),
            PredictionResult::new("usami_renko", 0.01),
            PredictionResult::new("ebisu_eika", 0.009),
        ])
    }
}

impl Classifier for MockClassifier {
    fn infer(&self, image: &[u8]) -> Result<Vec<PredictionResult>, ClassifierError> {
        if image.is_empty() {
            return Err(ClassifierError::InvalidImage {
                message: String::from("empty image"),
            });
        }
        Ok(self.results.clone())
    }
}

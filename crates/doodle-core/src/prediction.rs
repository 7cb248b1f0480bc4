//! Debounced inference over the latest canvas.
//!
//! [`PredictionScheduler`] is a single background loop:
//!
//! 1. wait for the canvas change signal
//! 2. run one cycle: classify the latest snapshot on the worker pool,
//!    stage the ranked result on the [`PredictionBoard`] and publish a
//!    `top5` event
//! 3. pad the cycle out to the configured interval
//!
//! Cycle starts are therefore at least one interval apart, and the
//! classifier is never called more than once per interval. Updates that
//! arrive during a cycle coalesce into one pending signal, so the newest
//! canvas is always classified eventually.

use std::sync::Arc;
use std::time::Duration;

use doodle_types::{ServerEvent, StagedPrediction};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::broadcast::BroadcastBus;
use crate::cadence::Cadence;
use crate::canvas::{CanvasSnapshot, CanvasStore};
use crate::collaborators::Classifier;
use crate::pool::WorkerPool;
use crate::signal::Signal;

/// Holds the most recent staged prediction.
///
/// Written only by the scheduler; read by the game when revealing
/// results. Each write swaps in a new [`Arc`], so readers keep a stable
/// ranking for as long as they hold it.
#[derive(Debug, Default)]
pub struct PredictionBoard {
    staged: RwLock<Option<Arc<StagedPrediction>>>,
}

impl PredictionBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current staged prediction, if any inference has succeeded.
    pub async fn current(&self) -> Option<Arc<StagedPrediction>> {
        self.staged.read().await.clone()
    }

    pub(crate) async fn replace(&self, staged: Arc<StagedPrediction>) {
        *self.staged.write().await = Some(staged);
    }
}

/// Why a cycle did not call the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The canvas is blank.
    EmptyCanvas,
    /// The canvas is identical to the last classified one.
    AlreadyClassified,
}

/// What one inference cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No classifier call was made.
    Skipped(SkipReason),
    /// A new ranking with this many entries was staged and published.
    Staged(usize),
    /// The classifier or the pool failed; the previous ranking stands.
    Failed,
}

/// The background inference loop.
pub struct PredictionScheduler {
    canvas: Arc<CanvasStore>,
    classifier: Arc<dyn Classifier>,
    pool: WorkerPool,
    board: Arc<PredictionBoard>,
    bus: Arc<BroadcastBus>,
    cadence: Cadence,
    last_classified: Option<Arc<CanvasSnapshot>>,
}

impl std::fmt::Debug for PredictionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionScheduler")
            .field("interval", &self.cadence.period())
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl PredictionScheduler {
    /// Create a scheduler with the given minimum cycle spacing.
    pub fn new(
        canvas: Arc<CanvasStore>,
        classifier: Arc<dyn Classifier>,
        pool: WorkerPool,
        board: Arc<PredictionBoard>,
        bus: Arc<BroadcastBus>,
        interval: Duration,
    ) -> Self {
        Self {
            canvas,
            classifier,
            pool,
            board,
            bus,
            cadence: Cadence::new(interval),
            last_classified: None,
        }
    }

    /// Run until `shutdown` is raised.
    pub async fn run(mut self, shutdown: Arc<Signal>) {
        info!(
            interval_ms = self.cadence.period().as_millis(),
            "Prediction scheduler started"
        );
        loop {
            tokio::select! {
                () = shutdown.wait() => break,
                () = self.canvas.changed() => {}
            }
            let step = self.cadence.begin();
            let outcome = self.run_cycle().await;
            debug!(?outcome, "Prediction cycle finished");
            tokio::select! {
                () = shutdown.wait() => break,
                () = step.finish() => {}
            }
        }
        info!("Prediction scheduler stopped");
    }

    /// Run one inference cycle against the latest canvas.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let latest = self.canvas.latest().await;
        if latest.is_blank() {
            return CycleOutcome::Skipped(SkipReason::EmptyCanvas);
        }
        if self
            .last_classified
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(last, &latest) || **last == *latest)
        {
            return CycleOutcome::Skipped(SkipReason::AlreadyClassified);
        }

        let classifier = Arc::clone(&self.classifier);
        let image = Arc::clone(&latest);
        let raw = match self.pool.run(move || classifier.infer(&image.bytes)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                error!(error = %e, "Classifier failed, keeping previous prediction");
                return CycleOutcome::Failed;
            }
            Err(e) => {
                error!(error = %e, "Classifier job failed, keeping previous prediction");
                return CycleOutcome::Failed;
            }
        };

        let staged = Arc::new(StagedPrediction::rank(raw));
        let ranking = staged
            .results()
            .iter()
            .map(|r| format!("{}={:.3}", r.label, r.score))
            .collect::<Vec<_>>()
            .join(", ");
        info!(ranking = %ranking, "Prediction staged");

        self.board.replace(Arc::clone(&staged)).await;
        self.last_classified = Some(latest);
        self.bus.publish(&ServerEvent::Top5 {
            results: staged.results().to_vec(),
        });
        CycleOutcome::Staged(staged.len())
    }
}

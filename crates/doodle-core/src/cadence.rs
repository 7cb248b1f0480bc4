//! Fixed-cadence pacing for periodic loops.
//!
//! A loop body started with [`Cadence::begin`] and finished with
//! [`CadenceStep::finish`] takes at least one period of wall-clock time:
//! `finish` sleeps for whatever is left of the period after the work.
//! If the work overran, `finish` returns immediately.

use std::time::Duration;

use tokio::time::Instant;

/// A constant loop period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    period: Duration,
}

impl Cadence {
    /// Create a cadence with the given period.
    pub const fn new(period: Duration) -> Self {
        Self { period }
    }

    /// The configured period.
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Start timing one iteration.
    pub fn begin(&self) -> CadenceStep {
        let started = Instant::now();
        CadenceStep {
            started,
            deadline: started.checked_add(self.period).unwrap_or(started),
        }
    }
}

/// One timed iteration of a [`Cadence`].
#[derive(Debug, Clone, Copy)]
#[must_use = "a cadence step does nothing unless finished"]
pub struct CadenceStep {
    started: Instant,
    deadline: Instant,
}

impl CadenceStep {
    /// When the iteration started.
    pub const fn started(&self) -> Instant {
        self.started
    }

    /// Sleep out the rest of the period.
    pub async fn finish(self) {
        tokio::time::sleep_until(self.deadline).await;
    }
}

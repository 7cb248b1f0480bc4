//! The countdown task.
//!
//! One task per server instance. It sleeps until `START_TIMER` raises
//! the start signal, then counts the game timer down from its maximum to
//! zero, one value per step, publishing each value as a `timer` event.
//!
//! A reset (`RESET_TIMER`, or a round or try change) cancels the run at
//! the next step boundary. Every start and reset bumps the game's run
//! generation; the task remembers the generation it started with and
//! treats any change like a reset. This catches a reset that is
//! immediately followed by a new start, which clears the reset flag
//! before the task can see it.
//!
//! When the count reaches zero without interruption the game moves to
//! `REVEAL_WAITING` and the canvas is archived with reason `auto` on the
//! worker pool. The task does not wait for the archive.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use doodle_types::{Phase, ServerEvent, TimerSource};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cadence::Cadence;
use crate::collaborators::ArchiveReason;
use crate::game::GameMachine;
use crate::signal::Signal;

/// How a countdown run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEnd {
    /// The count reached zero.
    Expired,
    /// A reset or a newer run superseded this one.
    Cancelled,
}

impl GameMachine {
    /// Spawn the countdown task.
    ///
    /// Only the first call spawns; later calls log a warning and return
    /// `None`. The task exits when `shutdown` is raised.
    pub fn spawn_countdown(self: &Arc<Self>, shutdown: Arc<Signal>) -> Option<JoinHandle<()>> {
        if self.countdown_spawned.swap(true, Ordering::AcqRel) {
            warn!("Countdown task already running, not spawning another");
            return None;
        }
        let game = Arc::clone(self);
        Some(tokio::spawn(async move { game.countdown_loop(shutdown).await }))
    }

    async fn countdown_loop(self: Arc<Self>, shutdown: Arc<Signal>) {
        info!(
            timer_max = self.settings.timer_max,
            step_ms = self.settings.timer_step.as_millis(),
            "Countdown task started"
        );
        loop {
            tokio::select! {
                () = shutdown.wait() => break,
                () = self.start.wait() => {}
            }
            self.start.clear();

            let Some(generation) = self.begin_run().await else {
                continue;
            };

            let end = tokio::select! {
                () = shutdown.wait() => break,
                end = self.count_down(generation) => end,
            };
            if end == CountdownEnd::Expired {
                self.expire(generation).await;
            }

            // A newer run already cleared the reset flag; go straight back
            // to waiting for the start it raised.
            if self.generation.load(Ordering::Acquire) == generation {
                tokio::select! {
                    () = shutdown.wait() => break,
                    () = self.reset.wait() => {}
                }
            }
        }
        info!("Countdown task stopped");
    }

    /// Check the phase and capture the run generation.
    async fn begin_run(&self) -> Option<u64> {
        let state = self.state.lock().await;
        if state.phase != Phase::Drawing {
            warn!(phase = %state.phase, "Start signal outside DRAWING, discarding");
            return None;
        }
        let generation = self.generation.load(Ordering::Acquire);
        info!(
            round = state.round_num,
            try_num = state.try_num,
            generation,
            "Countdown started"
        );
        Some(generation)
    }

    /// Whether run `generation` has been reset or replaced.
    fn superseded(&self, generation: u64) -> bool {
        self.reset.is_set() || self.generation.load(Ordering::Acquire) != generation
    }

    async fn count_down(&self, generation: u64) -> CountdownEnd {
        let cadence = Cadence::new(self.settings.timer_step);
        for remaining in (0..=self.settings.timer_max).rev() {
            let step = cadence.begin();
            {
                let mut state = self.state.lock().await;
                if self.superseded(generation) {
                    info!(remaining, "Countdown cancelled");
                    return CountdownEnd::Cancelled;
                }
                state.timer_value = remaining;
                self.services.bus.publish(&ServerEvent::Timer {
                    value: remaining,
                    by: TimerSource::Countdown,
                });
            }
            debug!(remaining, "Countdown step");
            step.finish().await;
        }
        CountdownEnd::Expired
    }

    /// Move to `REVEAL_WAITING` and hand the canvas to the archiver.
    ///
    /// The archive job runs detached on the worker pool, so the task is
    /// back waiting for the next start as soon as the reveal is published.
    async fn expire(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if self.superseded(generation) {
            info!("Timer reset at expiry, skipping reveal");
            return;
        }
        let context = state.clone();
        let snapshot = self.services.canvas.latest().await;

        state.phase = Phase::RevealWaiting;
        state.timer_value = self.settings.timer_max;
        self.publish_state(&state);
        self.reset.set();
        info!(
            round = state.round_num,
            try_num = state.try_num,
            "Countdown expired, waiting for reveal"
        );
        drop(state);

        self.spawn_archive(snapshot, context, ArchiveReason::Auto);
    }
}
